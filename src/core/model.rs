use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::error::{Result, ScrapeError};
use crate::engine::GalleryState;

/// 待抓取的拍卖列表页
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingReference {
    url: Url,
}

impl ListingReference {
    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw).map_err(|e| ScrapeError::Parse(format!("{}: {}", raw, e)))?;
        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl fmt::Display for ListingReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// 全分辨率内容图片地址
///
/// 只能经由 `sites::copart::canonical` 构造，保证已通过内容判定且完成规范化。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalImageUrl(String);

impl CanonicalImageUrl {
    pub(crate) fn new_unchecked(url: String) -> Self {
        Self(url)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalImageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalImageUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 单次提取调用的结果
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub listing: String,
    /// 去重且按字典序排列
    pub urls: Vec<CanonicalImageUrl>,
    pub pages_attempted: usize,
    pub gallery_located: bool,
    pub snapshot_captured: bool,
    pub final_state: GalleryState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigation_error: Option<String>,
}

impl ExtractionResult {
    pub fn empty(listing: &ListingReference) -> Self {
        Self {
            listing: listing.to_string(),
            urls: Vec::new(),
            pages_attempted: 0,
            gallery_located: false,
            snapshot_captured: false,
            final_state: GalleryState::Unopened,
            navigation_error: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// 单个 URL 的下载记录
#[derive(Debug, Clone, Serialize)]
pub struct DownloadOutcome {
    pub url: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_written: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_filename: Option<String>,
    pub attempts: u32,
}

impl DownloadOutcome {
    pub fn saved(url: &str, filename: String, bytes: u64, attempts: u32) -> Self {
        Self {
            url: url.to_string(),
            success: true,
            bytes_written: Some(bytes),
            error: None,
            final_filename: Some(filename),
            attempts,
        }
    }

    pub fn failed(url: &str, error: impl fmt::Display, attempts: u32) -> Self {
        Self {
            url: url.to_string(),
            success: false,
            bytes_written: None,
            error: Some(error.to_string()),
            final_filename: None,
            attempts,
        }
    }
}
