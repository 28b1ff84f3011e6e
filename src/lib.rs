//! lotshot
//!
//! 驱动真实浏览器打开拍卖列表页的图片画廊，逐页翻阅缩略图轮播，
//! 收集去重后的全尺寸图片地址，并可选地顺序下载到本地目录。

pub mod core;
pub mod engine;
pub mod interfaces;
pub mod network;
pub mod sites;
pub mod ui;
pub mod utils;

pub use crate::core::{
    AppConfig, CanonicalImageUrl, DownloadOutcome, ExtractionResult, ListingReference, Result,
    ScrapeError,
};
pub use crate::engine::{GalleryState, ListingReport, Scraper, extract_with};
