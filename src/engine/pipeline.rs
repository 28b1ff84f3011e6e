//! 抓取调度器
//!
//! 负责协调一次列表抓取的生命周期：导航 -> 画廊提取 -> (可选) 下载

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::core::config::AppConfig;
use crate::core::error::Result;
use crate::core::event::{EmitExt, EventSender, ScrapeEvent};
use crate::core::model::{DownloadOutcome, ExtractionResult, ListingReference};
use crate::interfaces::renderer::PageRenderer;
use crate::interfaces::timing::TimingStrategy;
use crate::network::{BrowserSession, ChromiumRenderer, HttpFetcher};
use crate::sites::copart::{listing_folder_name, sanitize_folder_name};

use super::download::DownloadPipeline;
use super::gallery::GalleryEngine;
use super::navigation::{NavigationController, NavigationOutcome};
use super::timing::HumanTiming;

/// 在给定渲染器上执行一次完整提取
///
/// 不返回错误：导航失败与画廊失败都体现在结果字段中，并尽量留下诊断快照。
pub async fn extract_with<R, T>(
    renderer: &R,
    timing: &T,
    config: &AppConfig,
    listing: &ListingReference,
    events: Option<EventSender>,
) -> ExtractionResult
where
    R: PageRenderer,
    T: TimingStrategy,
{
    let mut result = ExtractionResult::empty(listing);

    let outcome = NavigationController::new(renderer, timing, &config.navigation)
        .with_events(events.clone())
        .navigate(listing)
        .await;

    if let NavigationOutcome::Failed { reason, attempts } = outcome {
        error!("导航在 {} 次尝试后失败: {}", attempts, reason);
        result.navigation_error = Some(reason);
        result.snapshot_captured = capture_snapshot(renderer, &config.diagnostics.snapshot_path).await;
        events.emit(ScrapeEvent::ExtractionFinished { total: 0 });
        return result;
    }

    let report = GalleryEngine::new(renderer, timing, &config.gallery)
        .with_events(events.clone())
        .extract(listing.url())
        .await;

    if let Some(reason) = &report.failure {
        warn!("画廊提取未正常完成: {}", reason);
        result.snapshot_captured = capture_snapshot(renderer, &config.diagnostics.snapshot_path).await;
    }

    result.urls = report.urls;
    result.pages_attempted = report.pages_visited;
    result.gallery_located = report.gallery_located;
    result.final_state = report.state;

    info!("{} 共提取 {} 张图片", listing, result.urls.len());
    events.emit(ScrapeEvent::ExtractionFinished {
        total: result.urls.len(),
    });
    result
}

/// 写入诊断快照，任何失败都只记录日志
async fn capture_snapshot<R: PageRenderer>(renderer: &R, path: &Path) -> bool {
    let png = match renderer.snapshot().await {
        Ok(png) => png,
        Err(e) => {
            warn!("无法截取诊断快照: {}", e);
            return false;
        }
    };

    match tokio::fs::write(path, png).await {
        Ok(()) => {
            info!("诊断快照已保存到 {:?}", path);
            true
        }
        Err(e) => {
            warn!("诊断快照写入 {:?} 失败: {}", path, e);
            false
        }
    }
}

/// `scrape_listing` 的汇总
#[derive(Debug, Clone, Serialize)]
pub struct ListingReport {
    pub extraction: ExtractionResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    pub downloads: Vec<DownloadOutcome>,
}

impl ListingReport {
    pub fn saved(&self) -> usize {
        self.downloads.iter().filter(|d| d.success).count()
    }
}

/// 抓取门面
///
/// 每次提取独占一个浏览器会话，结束时无论成败都会关闭。
pub struct Scraper {
    config: Arc<AppConfig>,
    timing: HumanTiming,
    events: Option<EventSender>,
}

impl Scraper {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            config,
            timing: HumanTiming::new(),
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// 提取列表页全部全尺寸图片地址
    pub async fn extract(&self, listing: &ListingReference) -> Result<ExtractionResult> {
        let mut session = BrowserSession::launch(&self.config).await?;

        // 使用 scope 确保即使提取出错也能走到 session.close()
        let result = self.extract_in(&session, listing).await;

        if let Err(e) = session.close().await {
            debug!("关闭浏览器时发生非致命错误: {}", e);
        }
        result
    }

    async fn extract_in(
        &self,
        session: &BrowserSession,
        listing: &ListingReference,
    ) -> Result<ExtractionResult> {
        let renderer = ChromiumRenderer::open(session).await?;
        Ok(extract_with(&renderer, &self.timing, &self.config, listing, self.events.clone()).await)
    }

    /// 列表对应的确定性下载目录
    pub fn listing_folder(&self, listing: &ListingReference) -> PathBuf {
        self.resolve_destination(&listing_folder_name(
            listing.url(),
            &self.config.download.folder_prefix,
        ))
    }

    /// 清洗后的目录名挂在 `output_root` 之下
    pub fn resolve_destination(&self, hint: &str) -> PathBuf {
        self.config
            .download
            .output_root
            .join(sanitize_folder_name(hint))
    }

    /// 顺序下载到指定目录
    pub async fn download<U: AsRef<str>>(
        &self,
        urls: &[U],
        destination: &Path,
    ) -> Result<Vec<DownloadOutcome>> {
        let fetcher = HttpFetcher::new(&self.config)?;
        DownloadPipeline::new(&fetcher, &self.timing, &self.config.download)
            .with_events(self.events.clone())
            .download(urls, destination)
            .await
    }

    /// 提取，按需下载到列表目录
    pub async fn scrape_listing(&self, url: &str, download: bool) -> Result<ListingReport> {
        let listing = ListingReference::parse(url)?;
        let extraction = self.extract(&listing).await?;

        if !download || extraction.is_empty() {
            return Ok(ListingReport {
                extraction,
                destination: None,
                downloads: Vec::new(),
            });
        }

        let destination = self.listing_folder(&listing);
        let downloads = self.download(&extraction.urls, &destination).await?;
        Ok(ListingReport {
            extraction,
            destination: Some(destination),
            downloads,
        })
    }
}
