//! 下载管线 (Download Pipeline)
//!
//! 顺序下载、单项独立重试、碰撞安全命名。单项失败只记录在结果中，不会中断批次。

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, error, info, warn};

use crate::core::config::DownloadConfig;
use crate::core::error::{Result, ScrapeError};
use crate::core::event::{EmitExt, EventSender, ScrapeEvent};
use crate::core::model::DownloadOutcome;
use crate::interfaces::fetcher::ImageFetcher;
use crate::interfaces::timing::TimingStrategy;
use crate::utils::{derive_filename, write_unique};

pub struct DownloadPipeline<'a, F: ImageFetcher, T: TimingStrategy> {
    fetcher: &'a F,
    timing: &'a T,
    config: &'a DownloadConfig,
    events: Option<EventSender>,
}

impl<'a, F: ImageFetcher, T: TimingStrategy> DownloadPipeline<'a, F, T> {
    pub fn new(fetcher: &'a F, timing: &'a T, config: &'a DownloadConfig) -> Self {
        Self {
            fetcher,
            timing,
            config,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Option<EventSender>) -> Self {
        self.events = events;
        self
    }

    /// 下载全部地址到 `destination`
    ///
    /// 目录创建失败时整体返回错误；否则结果与输入一一对应。
    pub async fn download<U: AsRef<str>>(
        &self,
        urls: &[U],
        destination: &Path,
    ) -> Result<Vec<DownloadOutcome>> {
        tokio::fs::create_dir_all(destination)
            .await
            .map_err(|source| ScrapeError::Destination {
                path: destination.to_path_buf(),
                source,
            })?;

        info!("开始下载 {} 张图片到 {:?}", urls.len(), destination);
        self.events.emit(ScrapeEvent::DownloadStarted { total: urls.len() });

        let mut outcomes = Vec::with_capacity(urls.len());
        for (index, url) in urls.iter().enumerate() {
            if index > 0 {
                self.timing
                    .delay(
                        Duration::from_millis(self.config.delay_min_ms),
                        Duration::from_millis(self.config.delay_max_ms),
                    )
                    .await;
            }

            let outcome = self.download_one(index, url.as_ref(), destination).await;
            match &outcome {
                DownloadOutcome {
                    success: true,
                    final_filename: Some(name),
                    ..
                } => {
                    info!("已保存 ({}/{}): {}", index + 1, urls.len(), name);
                    self.events.emit(ScrapeEvent::ItemSaved {
                        index,
                        filename: name.clone(),
                    });
                }
                failed => {
                    let reason = failed.error.clone().unwrap_or_default();
                    error!("下载失败 {}: {}", failed.url, reason);
                    self.events.emit(ScrapeEvent::ItemFailed {
                        index,
                        url: failed.url.clone(),
                        error: reason,
                    });
                }
            }
            outcomes.push(outcome);
        }

        let saved = outcomes.iter().filter(|o| o.success).count();
        info!("下载完成: {}/{}", saved, urls.len());
        self.events.emit(ScrapeEvent::DownloadFinished {
            saved,
            total: urls.len(),
        });
        Ok(outcomes)
    }

    async fn download_one(&self, index: usize, url: &str, destination: &Path) -> DownloadOutcome {
        let (bytes, attempts) = match self.fetch_with_retry(url).await {
            Ok(ok) => ok,
            Err((e, attempts)) => return DownloadOutcome::failed(url, e, attempts),
        };

        let filename = derive_filename(url, index);
        match write_unique(destination, &filename, &bytes).await {
            Ok(path) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or(filename);
                DownloadOutcome::saved(url, name, bytes.len() as u64, attempts)
            }
            Err(e) => DownloadOutcome::failed(url, ScrapeError::Io(e), attempts),
        }
    }

    /// 最多 `max_attempts` 次；成功立即返回，全部失败时带回最后一次的错误
    async fn fetch_with_retry(
        &self,
        url: &str,
    ) -> std::result::Result<(Bytes, u32), (ScrapeError, u32)> {
        let max_attempts = self.config.max_attempts.max(1);
        let timeout = self.config.timeout();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = match tokio::time::timeout(timeout, self.fetcher.fetch(url)).await {
                Ok(r) => r,
                Err(_) => Err(ScrapeError::Timeout(format!("fetch {}", url))),
            };

            match result {
                Ok(bytes) => return Ok((bytes, attempt)),
                Err(e) if attempt >= max_attempts || !e.is_transient() => {
                    return Err((e, attempt));
                }
                Err(e) => {
                    warn!("下载第 {}/{} 次失败，准备重试: {} ({})", attempt, max_attempts, url, e);
                    self.timing
                        .delay(
                            Duration::from_millis(self.config.delay_min_ms),
                            Duration::from_millis(self.config.delay_max_ms),
                        )
                        .await;
                    debug!("重试 {}", url);
                }
            }
        }
    }
}
