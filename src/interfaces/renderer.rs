//! 页面渲染器能力接口 (Page Renderer Capability)
//!
//! 引擎只依赖这里的最小能力面；生产实现见 `network::browser::ChromiumRenderer`。

use std::time::Duration;

use async_trait::async_trait;

use crate::core::error::Result;
use crate::interfaces::locator::Locator;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// 渲染器能力
///
/// 错误约定：会话丢失返回 `ScrapeError::SessionClosed`，元素失效返回
/// `ScrapeError::StaleElement`，其余均视为可跳过的单项失败。
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// 元素句柄
    type Element: Send + Sync;

    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()>;

    async fn title(&self) -> Result<Option<String>>;

    /// 等待定位器解析出至少一个元素；超时返回 `None`
    async fn wait_for(
        &self,
        locator: &Locator,
        visible: bool,
        timeout: Duration,
    ) -> Result<Option<Self::Element>>;

    async fn query_all(&self, locator: &Locator) -> Result<Vec<Self::Element>>;

    async fn read_attribute(&self, element: &Self::Element, name: &str) -> Result<Option<String>>;

    async fn read_text(&self, element: &Self::Element) -> Result<Option<String>>;

    async fn click(&self, element: &Self::Element) -> Result<()>;

    async fn bounding_box(&self, element: &Self::Element) -> Result<Option<BoundingBox>>;

    async fn move_pointer(&self, to: Point) -> Result<()>;

    /// 诊断快照 (PNG)
    async fn snapshot(&self) -> Result<Vec<u8>>;

    /// 当前页面句柄是否仍可驱动
    async fn is_usable(&self) -> bool;

    /// 丢弃当前页面并打开一个新的
    async fn reopen(&self) -> Result<()>;
}
