//! 画廊分页引擎 (Gallery Pagination Engine)
//!
//! 打开画廊 -> 读取计数 -> 采集/翻页循环。循环由 `PaginationCursor` 驱动，
//! 单个元素或单页的失败只会被跳过；只有会话丢失会提前结束并返回已采集部分。

use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use crate::core::config::GalleryConfig;
use crate::core::error::{Result, ScrapeError};
use crate::core::event::{EmitExt, EventSender, ScrapeEvent};
use crate::core::model::CanonicalImageUrl;
use crate::interfaces::renderer::PageRenderer;
use crate::interfaces::timing::TimingStrategy;
use crate::sites::copart::{IMAGE_SOURCE_ATTRIBUTES, SiteLocators, THUMBNAIL_SOURCE_ATTRIBUTE};

use super::locator::LocatorResolver;
use super::pagination::{Action, GalleryState, HarvestSet, PaginationCursor, parse_counter};

/// 画廊提取报告
#[derive(Debug)]
pub struct GalleryReport {
    pub urls: Vec<CanonicalImageUrl>,
    pub pages_visited: usize,
    pub gallery_located: bool,
    pub state: GalleryState,
    /// 需要诊断快照的失败原因 (弹层未出现或会话丢失)
    pub failure: Option<String>,
}

pub struct GalleryEngine<'a, R: PageRenderer, T: TimingStrategy> {
    renderer: &'a R,
    timing: &'a T,
    config: &'a GalleryConfig,
    locators: &'static SiteLocators,
    events: Option<EventSender>,
}

impl<'a, R: PageRenderer, T: TimingStrategy> GalleryEngine<'a, R, T> {
    pub fn new(renderer: &'a R, timing: &'a T, config: &'a GalleryConfig) -> Self {
        Self {
            renderer,
            timing,
            config,
            locators: SiteLocators::get(),
            events: None,
        }
    }

    pub fn with_events(mut self, events: Option<EventSender>) -> Self {
        self.events = events;
        self
    }

    fn resolver(&self) -> LocatorResolver<'a, R> {
        LocatorResolver::new(self.renderer, self.config.locator_timeout())
    }

    /// 执行完整提取
    pub async fn extract(&self, base: &Url) -> GalleryReport {
        match self.open_gallery().await {
            Ok(true) => {
                self.events.emit(ScrapeEvent::GalleryOpened);
                self.paginate(base).await
            }
            Ok(false) => {
                let report = self.fallback_harvest(base, true, GalleryState::Aborted).await;
                GalleryReport {
                    failure: Some("gallery did not open".into()),
                    ..report
                }
            }
            Err(OpenError::NotLocated) => {
                self.fallback_harvest(base, false, GalleryState::Unopened).await
            }
            Err(OpenError::Fatal(e)) => {
                warn!("打开画廊时会话丢失: {}", e);
                GalleryReport {
                    urls: Vec::new(),
                    pages_visited: 0,
                    gallery_located: false,
                    state: GalleryState::Aborted,
                    failure: Some(e.to_string()),
                }
            }
        }
    }

    /// Unopened -> Opened
    ///
    /// `Ok(true)` 弹层已打开；`Ok(false)` 已点击但标志元素未出现。
    async fn open_gallery(&self) -> std::result::Result<bool, OpenError> {
        let resolver = self.resolver();

        // 等待首屏图片渲染，未出现也继续
        resolver
            .resolve_within(
                &self.locators.page_ready,
                Duration::from_millis(self.config.ready_timeout_ms),
            )
            .await
            .map_err(OpenError::Fatal)?;

        let Some(trigger) = resolver
            .resolve(&self.locators.open_gallery)
            .await
            .map_err(OpenError::Fatal)?
        else {
            info!("未找到画廊入口，改为提取主页面图片");
            return Err(OpenError::NotLocated);
        };

        self.approach(&trigger).await.map_err(OpenError::Fatal)?;
        self.timing
            .delay(Duration::from_millis(500), Duration::from_millis(1000))
            .await;

        match self.renderer.click(&trigger).await {
            Ok(()) => debug!("已点击画廊入口"),
            Err(e) if e.is_fatal() => return Err(OpenError::Fatal(e)),
            Err(e) => {
                warn!("画廊入口不可点击: {}", e);
                return Ok(false);
            }
        }

        let marker = resolver
            .resolve_within(
                &self.locators.gallery_marker,
                Duration::from_millis(self.config.open_timeout_ms),
            )
            .await
            .map_err(OpenError::Fatal)?;

        if marker.is_none() {
            warn!("画廊弹层未在限定时间内出现");
        }
        Ok(marker.is_some())
    }

    /// 指针移向目标中心，仅为外观行为，失败不影响结果
    async fn approach(&self, element: &R::Element) -> Result<()> {
        let bbox = match self.renderer.bounding_box(element).await {
            Ok(Some(b)) => b,
            Ok(None) => return Ok(()),
            Err(e) if e.is_fatal() => return Err(e),
            Err(_) => return Ok(()),
        };

        for step in self.timing.pointer_path(bbox.center()) {
            match self.renderer.move_pointer(step.point).await {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(_) => break,
            }
            self.timing.delay(step.pause, step.pause).await;
        }
        Ok(())
    }

    /// 读取 "X of Y" 计数，失败返回 `None`
    async fn read_expected_total(&self) -> Result<Option<usize>> {
        let counter = self
            .resolver()
            .resolve_within(
                &self.locators.counter,
                Duration::from_millis(self.config.counter_timeout_ms),
            )
            .await?;

        let Some(counter) = counter else {
            debug!("未找到画廊计数器");
            return Ok(None);
        };

        match self.renderer.read_text(&counter).await {
            Ok(Some(text)) => {
                let total = parse_counter(&text);
                if total.is_none() {
                    debug!("无法解析计数文本: {:?}", text);
                }
                Ok(total)
            }
            Ok(None) => Ok(None),
            Err(e) if e.is_fatal() => Err(e),
            Err(_) => Ok(None),
        }
    }

    /// Opened -> Paginating -> Exhausted | Aborted
    async fn paginate(&self, base: &Url) -> GalleryReport {
        let expected = match self.read_expected_total().await {
            Ok(total) => total,
            Err(e) => {
                return GalleryReport {
                    urls: Vec::new(),
                    pages_visited: 0,
                    gallery_located: true,
                    state: GalleryState::Aborted,
                    failure: Some(e.to_string()),
                };
            }
        };
        if let Some(total) = expected {
            info!("画廊共 {} 张图片", total);
        }

        let mut cursor = PaginationCursor::new(
            expected,
            self.config.thumbnails_per_page,
            self.config.min_page_attempts,
        );
        let mut failure = None;
        let mut action = cursor.start();

        while action != Action::Finish {
            let step = match action {
                Action::Harvest => self.harvest_page(base, &mut cursor).await,
                Action::Advance => self.advance().await.map(|clicked| cursor.on_advanced(clicked)),
                Action::Finish => break,
            };

            action = match step {
                Ok(next) => next,
                Err(e) => {
                    warn!("会话丢失，返回已采集的 {} 张: {}", cursor.harvested.len(), e);
                    failure = Some(e.to_string());
                    cursor.abort()
                }
            };
        }

        info!(
            "画廊采集结束 ({}): {} 页, {} 张",
            cursor.state(),
            cursor.pages_visited,
            cursor.harvested.len()
        );

        let state = cursor.state();
        let pages_visited = cursor.pages_visited;
        GalleryReport {
            urls: cursor.harvested.into_sorted(),
            pages_visited,
            gallery_located: true,
            state,
            failure,
        }
    }

    /// 采集当前可见缩略图；失效或无 src 的元素单独跳过
    async fn harvest_page(&self, base: &Url, cursor: &mut PaginationCursor) -> Result<Action> {
        let thumbnails = self
            .resolver()
            .query_first_nonempty(&self.locators.thumbnails)
            .await?;

        let mut sources = Vec::with_capacity(thumbnails.len());
        for (i, thumb) in thumbnails.iter().enumerate() {
            match self.renderer.read_attribute(thumb, THUMBNAIL_SOURCE_ATTRIBUTE).await {
                Ok(Some(src)) => sources.push(src),
                Ok(None) => debug!("缩略图 {} 没有 src，跳过", i),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => debug!("缩略图 {} 读取失败，跳过: {}", i, e),
            }
        }

        let added = cursor.harvested.absorb(base, &sources);
        let next = cursor.on_harvested(thumbnails.len());

        debug!(
            "第 {}/{} 页: {} 个缩略图, 新增 {}",
            cursor.pages_visited,
            cursor.ceiling,
            thumbnails.len(),
            added
        );
        self.events.emit(ScrapeEvent::PageHarvested {
            page: cursor.pages_visited,
            ceiling: cursor.ceiling,
            found: thumbnails.len(),
            added,
        });
        Ok(next)
    }

    /// 点击翻页控件；找不到或点不动返回 `false`
    async fn advance(&self) -> Result<bool> {
        let Some(next) = self.resolver().resolve(&self.locators.next_page).await? else {
            debug!("翻页控件不存在，视为已到末页");
            return Ok(false);
        };

        match self.renderer.click(&next).await {
            Ok(()) => {
                let settle = Duration::from_millis(self.config.page_settle_ms);
                self.timing.delay(settle, settle).await;
                Ok(true)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                debug!("翻页控件不可点击: {}", e);
                Ok(false)
            }
        }
    }

    /// 直接从未打开画廊的页面上提取图片
    async fn fallback_harvest(
        &self,
        base: &Url,
        gallery_located: bool,
        state: GalleryState,
    ) -> GalleryReport {
        self.events.emit(ScrapeEvent::GalleryFallback {
            reason: if gallery_located {
                "gallery marker missing".into()
            } else {
                "gallery trigger missing".into()
            },
        });

        let mut harvested = HarvestSet::new();
        let mut failure = None;

        match self.collect_page_sources().await {
            Ok(sources) => {
                harvested.absorb(base, &sources);
            }
            Err(e) => failure = Some(e.to_string()),
        }

        info!("主页面回退提取到 {} 张图片", harvested.len());
        GalleryReport {
            urls: harvested.into_sorted(),
            pages_visited: 0,
            gallery_located,
            state,
            failure,
        }
    }

    async fn collect_page_sources(&self) -> Result<Vec<String>> {
        let images = self
            .resolver()
            .query_first_nonempty(&self.locators.page_images)
            .await?;

        let mut sources = Vec::with_capacity(images.len());
        for image in &images {
            if let Some(src) = self.first_source(image).await? {
                sources.push(src);
            }
        }
        Ok(sources)
    }

    /// 按 data-original -> data-src -> src 的顺序取第一个非空属性
    async fn first_source(&self, image: &R::Element) -> Result<Option<String>> {
        for attr in IMAGE_SOURCE_ATTRIBUTES {
            match self.renderer.read_attribute(image, attr).await {
                Ok(Some(v)) if !v.trim().is_empty() => return Ok(Some(v)),
                Ok(_) => continue,
                Err(e) if e.is_fatal() => return Err(e),
                Err(ScrapeError::StaleElement) => return Ok(None),
                Err(_) => continue,
            }
        }
        Ok(None)
    }
}

enum OpenError {
    NotLocated,
    Fatal(ScrapeError),
}
