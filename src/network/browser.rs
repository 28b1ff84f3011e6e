//! 浏览器服务
//!
//! 封装 Chromium 会话的启动/关闭，并以 `PageRenderer` 暴露给引擎。

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::{
    Element, Page,
    browser::{Browser, BrowserConfig},
    cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams,
    error::CdpError,
    handler::viewport::Viewport,
    layout,
    page::ScreenshotParams,
};
use futures::StreamExt;
use parking_lot::RwLock;
use rand::Rng;
use rand::seq::IndexedRandom;
use tokio::{task::JoinHandle, time::interval};
use tracing::{debug, info};

use crate::core::config::AppConfig;
use crate::core::error::{Result, ScrapeError};
use crate::interfaces::locator::{Locator, Query};
use crate::interfaces::renderer::{BoundingBox, PageRenderer, Point};

/// 隐藏自动化特征的注入脚本
static STEALTH_JS: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
window.chrome = window.chrome || { runtime: {} };
const originalQuery = window.navigator.permissions.query;
window.navigator.permissions.query = (parameters) =>
  parameters.name === 'notifications'
    ? Promise.resolve({ state: Notification.permission })
    : originalQuery(parameters);
"#;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// 浏览器会话
/// 采用显式的所有权管理，确保关闭逻辑的确定性
pub struct BrowserSession {
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
}

impl BrowserSession {
    /// 启动浏览器会话
    pub async fn launch(config: &AppConfig) -> Result<Self> {
        let browser_config = build_browser_config(config)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScrapeError::Browser(e.to_string()))?;

        // 启动事件循环
        let handle = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        info!("浏览器已启动");
        Ok(Self {
            browser: Some(browser),
            handler: Some(handle),
        })
    }

    /// 创建注入了隐身脚本的新页面
    pub async fn new_page(&self) -> Result<Page> {
        let browser = self
            .browser
            .as_ref()
            .ok_or(ScrapeError::SessionClosed)?;
        let page = browser.new_page("about:blank").await.map_err(classify)?;

        if let Err(e) = page
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(
                STEALTH_JS.to_string(),
            ))
            .await
        {
            debug!("Stealth injection warning: {}", e);
        }

        Ok(page)
    }

    /// 优雅关闭浏览器，并等待事件循环结束
    pub async fn close(&mut self) -> Result<()> {
        let browser = self.browser.take();
        let handler = self.handler.take();

        if let Some(mut b) = browser {
            let _ = b.close().await;
            if let Some(h) = handler {
                let _ = h.await;
            }
            debug!("浏览器已关闭");
        }
        Ok(())
    }
}

/// 构建浏览器配置：随机 UA 与视口、可选代理
fn build_browser_config(config: &AppConfig) -> Result<BrowserConfig> {
    let browser = &config.browser;
    let (ua, width, height) = {
        let mut rng = rand::rng();
        let ua = browser
            .user_agents
            .choose(&mut rng)
            .cloned()
            .unwrap_or_else(fallback_ua);
        let width = random_in(&mut rng, browser.viewport_width);
        let height = random_in(&mut rng, browser.viewport_height);
        (ua, width, height)
    };
    debug!("UA: {}, 视口: {}x{}", ua, width, height);

    let mut builder = BrowserConfig::builder()
        .arg("--disable-blink-features=AutomationControlled")
        .arg(format!("--user-agent={}", ua))
        .arg("--disable-infobars")
        .arg("--no-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-extensions")
        .arg(format!("--window-size={},{}", width, height))
        .viewport(Viewport {
            width,
            height,
            ..Default::default()
        });

    if let Some(proxy) = &browser.proxy_server {
        builder = builder.arg(format!("--proxy-server={}", proxy));
    }

    if browser.headless {
        builder = builder.arg("--headless=new");
    } else {
        builder = builder.with_head();
    }

    let chrome_path = if let Some(path) = &browser.chrome_path {
        Some(path.clone())
    } else {
        [
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
        ]
        .iter()
        .find(|p| Path::new(p).exists())
        .map(|p| p.to_string())
    };

    if let Some(path) = chrome_path {
        builder = builder.chrome_executable(path);
    }

    builder.build().map_err(ScrapeError::Browser)
}

fn random_in(rng: &mut impl Rng, (min, max): (u32, u32)) -> u32 {
    if max > min {
        rng.random_range(min..=max)
    } else {
        min
    }
}

fn fallback_ua() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

/// CDP 错误映射：连接/通道断开即会话丢失，节点失效即元素过期
fn classify(err: CdpError) -> ScrapeError {
    match err {
        CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse => {
            ScrapeError::SessionClosed
        }
        other => {
            let msg = other.to_string();
            let lower = msg.to_lowercase();
            if lower.contains("target closed") || lower.contains("session with given id not found")
            {
                ScrapeError::SessionClosed
            } else if lower.contains("node with given id")
                || lower.contains("could not find node")
                || lower.contains("detached")
            {
                ScrapeError::StaleElement
            } else {
                ScrapeError::Browser(msg)
            }
        }
    }
}

// 在 Drop 时尝试最后一次保护，但不报 WARN
impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Some(mut browser) = self.browser.take() {
            let handler = self.handler.take();
            // 在后台清理
            tokio::spawn(async move {
                let _ = browser.close().await;
                if let Some(h) = handler {
                    let _ = h.await;
                }
            });
        }
    }
}

// =============================================================================
// ChromiumRenderer
// =============================================================================

/// 基于 Chromium 页面的渲染器
pub struct ChromiumRenderer<'a> {
    session: &'a BrowserSession,
    page: RwLock<Page>,
    closed: AtomicBool,
}

impl<'a> ChromiumRenderer<'a> {
    pub async fn open(session: &'a BrowserSession) -> Result<Self> {
        let page = session.new_page().await?;
        Ok(Self {
            session,
            page: RwLock::new(page),
            closed: AtomicBool::new(false),
        })
    }

    /// Page 内部为共享句柄，克隆后释放锁再 await
    fn page(&self) -> Page {
        self.page.read().clone()
    }

    fn track<T>(&self, result: std::result::Result<T, CdpError>) -> Result<T> {
        result.map_err(|e| {
            let err = classify(e);
            if err.is_fatal() {
                self.closed.store(true, Ordering::SeqCst);
            }
            err
        })
    }

    /// 只保留会话级错误，其余按"无结果"处理
    fn swallow(&self, err: CdpError) -> Result<()> {
        match self.track::<()>(Err(err)) {
            Err(e) if e.is_fatal() => Err(e),
            _ => Ok(()),
        }
    }

    async fn find(&self, locator: &Locator) -> Result<Vec<Element>> {
        let page = self.page();
        let found = match locator.query() {
            Query::Css(css) => page.find_elements(css).await,
            Query::XPath(xpath) => page.find_xpaths(xpath).await,
        };
        match found {
            Ok(elements) => Ok(elements),
            // 无匹配时 CDP 返回错误而非空列表
            Err(CdpError::NotFound) => Ok(Vec::new()),
            Err(e) => self.swallow(e).map(|()| Vec::new()),
        }
    }

    /// 轮询直到出现匹配元素，由调用方限定时长
    async fn poll_until(&self, locator: &Locator, visible: bool) -> Result<Option<Element>> {
        let mut ticker = interval(POLL_INTERVAL);
        loop {
            ticker.tick().await;
            let elements = self.find(locator).await?;
            if elements.is_empty() {
                continue;
            }
            if !visible {
                return Ok(elements.into_iter().next());
            }
            if let Some(element) = self.first_visible(elements).await? {
                return Ok(Some(element));
            }
        }
    }

    async fn first_visible(&self, elements: Vec<Element>) -> Result<Option<Element>> {
        for element in elements {
            match self.bounding_box(&element).await {
                Ok(Some(b)) if b.is_visible() => return Ok(Some(element)),
                Ok(_) => continue,
                Err(e) if e.is_fatal() => return Err(e),
                Err(_) => continue,
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl PageRenderer for ChromiumRenderer<'_> {
    type Element = Element;

    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        let page = self.page();
        let nav = tokio::time::timeout(timeout, page.goto(url))
            .await
            .map_err(|_| ScrapeError::Timeout(format!("goto {}", url)))?;
        self.track(nav)?;
        Ok(())
    }

    async fn title(&self) -> Result<Option<String>> {
        let page = self.page();
        self.track(page.get_title().await)
    }

    async fn wait_for(
        &self,
        locator: &Locator,
        visible: bool,
        timeout: Duration,
    ) -> Result<Option<Element>> {
        let polled = tokio::time::timeout(timeout, self.poll_until(locator, visible)).await;

        match polled {
            Ok(result) => result,
            Err(_) => Ok(None),
        }
    }

    async fn query_all(&self, locator: &Locator) -> Result<Vec<Element>> {
        self.find(locator).await
    }

    async fn read_attribute(&self, element: &Element, name: &str) -> Result<Option<String>> {
        self.track(element.attribute(name).await)
    }

    async fn read_text(&self, element: &Element) -> Result<Option<String>> {
        self.track(element.inner_text().await)
    }

    async fn click(&self, element: &Element) -> Result<()> {
        self.track(element.click().await)?;
        Ok(())
    }

    async fn bounding_box(&self, element: &Element) -> Result<Option<BoundingBox>> {
        match element.bounding_box().await {
            Ok(b) => Ok(Some(BoundingBox {
                x: b.x,
                y: b.y,
                width: b.width,
                height: b.height,
            })),
            Err(e) => self.swallow(e).map(|()| None),
        }
    }

    async fn move_pointer(&self, to: Point) -> Result<()> {
        let page = self.page();
        self.track(page.move_mouse(layout::Point::new(to.x, to.y)).await)?;
        Ok(())
    }

    async fn snapshot(&self) -> Result<Vec<u8>> {
        let page = self.page();
        self.track(
            page.screenshot(ScreenshotParams::builder().full_page(true).build())
                .await,
        )
    }

    async fn is_usable(&self) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        self.page().get_title().await.is_ok()
    }

    async fn reopen(&self) -> Result<()> {
        let fresh = self.session.new_page().await?;
        let old = std::mem::replace(&mut *self.page.write(), fresh);
        self.closed.store(false, Ordering::SeqCst);
        if let Err(e) = old.close().await {
            debug!("关闭旧页面失败: {}", e);
        }
        Ok(())
    }
}
