//! 导航控制器 (Navigation Controller)
//!
//! 在有限重试内把渲染器带到一个已加载、标题正常的列表页。

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::core::config::NavigationConfig;
use crate::core::error::{Result, ScrapeError};
use crate::core::event::{EmitExt, EventSender, ScrapeEvent};
use crate::core::model::ListingReference;
use crate::interfaces::renderer::PageRenderer;
use crate::interfaces::timing::TimingStrategy;

/// 导航结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Ready { title: String, attempts: u32 },
    Failed { reason: String, attempts: u32 },
}

impl NavigationOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, NavigationOutcome::Ready { .. })
    }
}

pub struct NavigationController<'a, R: PageRenderer, T: TimingStrategy> {
    renderer: &'a R,
    timing: &'a T,
    config: &'a NavigationConfig,
    events: Option<EventSender>,
}

impl<'a, R: PageRenderer, T: TimingStrategy> NavigationController<'a, R, T> {
    pub fn new(renderer: &'a R, timing: &'a T, config: &'a NavigationConfig) -> Self {
        Self {
            renderer,
            timing,
            config,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Option<EventSender>) -> Self {
        self.events = events;
        self
    }

    pub async fn navigate(&self, listing: &ListingReference) -> NavigationOutcome {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = String::from("no attempt made");

        for attempt in 1..=max_attempts {
            info!("正在导航 ({}/{}): {}", attempt, max_attempts, listing);
            self.events.emit(ScrapeEvent::NavigationAttempt {
                attempt,
                max: max_attempts,
            });

            match self.try_single_attempt(listing).await {
                Ok(title) => {
                    info!("页面已就绪: {}", title);
                    self.events.emit(ScrapeEvent::NavigationReady {
                        title: title.clone(),
                    });
                    return NavigationOutcome::Ready {
                        title,
                        attempts: attempt,
                    };
                }
                Err(e) => {
                    warn!("导航失败 ({}/{}): {}", attempt, max_attempts, e);
                    last_error = e.to_string();
                    if attempt < max_attempts {
                        self.timing
                            .delay(
                                Duration::from_millis(self.config.backoff_min_ms),
                                Duration::from_millis(self.config.backoff_max_ms),
                            )
                            .await;
                    }
                }
            }
        }

        self.events.emit(ScrapeEvent::NavigationFailed {
            reason: last_error.clone(),
        });
        NavigationOutcome::Failed {
            reason: last_error,
            attempts: max_attempts,
        }
    }

    async fn try_single_attempt(&self, listing: &ListingReference) -> Result<String> {
        // 上一次失败可能已经让页面句柄失效
        if !self.renderer.is_usable().await {
            debug!("页面句柄不可用，重新创建");
            self.renderer.reopen().await?;
        }

        let timeout = self.config.timeout();
        tokio::time::timeout(timeout, self.renderer.navigate(listing.as_str(), timeout))
            .await
            .map_err(|_| ScrapeError::Timeout(format!("navigation to {}", listing)))??;

        self.timing
            .delay(
                Duration::from_millis(self.config.settle_min_ms),
                Duration::from_millis(self.config.settle_max_ms),
            )
            .await;

        let title = self.renderer.title().await?.unwrap_or_default();
        self.check_title(&title)?;
        Ok(title)
    }

    fn check_title(&self, title: &str) -> Result<()> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(ScrapeError::Browser("page has no title".into()));
        }

        let lower = trimmed.to_lowercase();
        if let Some(marker) = self
            .config
            .error_title_markers
            .iter()
            .find(|m| lower.contains(&m.to_lowercase()))
        {
            return Err(ScrapeError::Browser(format!(
                "error marker {:?} in title {:?}",
                marker, trimmed
            )));
        }
        Ok(())
    }
}
