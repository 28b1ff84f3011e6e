#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use lotshot::core::config::{AppConfig, DiagnosticsConfig, GalleryConfig};
use lotshot::interfaces::{BoundingBox, Locator, PageRenderer, Point};
use lotshot::sites::copart::SiteLocators;
use lotshot::{Result, ScrapeError};

/// 缩略图脚本
#[derive(Debug, Clone)]
pub enum Thumb {
    Src(String),
    /// 读取时元素已被替换
    Stale,
    /// 没有 src 属性
    Missing,
}

/// 脚本中的页面节点
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Ready,
    Trigger,
    Marker,
    Counter,
    Thumb { page: usize, index: usize },
    Next,
    Image(usize),
}

/// 列表页脚本
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub title: String,
    /// 前 N 次导航失败
    pub nav_failures: u32,
    pub start_unusable: bool,
    pub trigger: bool,
    /// 点击入口后弹层是否出现
    pub opens: bool,
    pub counter: Option<String>,
    pub pages: Vec<Vec<Thumb>>,
    /// 翻页控件永远存在且可点
    pub next_always: bool,
    pub page_images: Vec<Vec<(&'static str, String)>>,
    /// 采集第 N 页 (从 1 开始) 时会话丢失
    pub die_on_page: Option<usize>,
}

impl Script {
    pub fn listing() -> Self {
        Self {
            title: "2019 TOYOTA CAMRY SE for Sale at Copart".into(),
            ..Default::default()
        }
    }

    pub fn with_gallery(mut self, pages: Vec<Vec<Thumb>>) -> Self {
        self.trigger = true;
        self.opens = true;
        self.pages = pages;
        self
    }
}

#[derive(Debug, Default)]
pub struct Counters {
    pub nav_calls: u32,
    pub reopens: u32,
    pub next_clicks: u32,
    pub harvests: u32,
    pub pointer_moves: u32,
    pub snapshots: u32,
}

struct State {
    script: Script,
    counters: Counters,
    unusable: bool,
    closed: bool,
    opened: bool,
    current: usize,
}

/// 内存脚本渲染器
pub struct ScriptedRenderer {
    state: Mutex<State>,
}

impl ScriptedRenderer {
    pub fn new(script: Script) -> Self {
        Self {
            state: Mutex::new(State {
                unusable: script.start_unusable,
                script,
                counters: Counters::default(),
                closed: false,
                opened: false,
                current: 0,
            }),
        }
    }

    pub fn counters<T>(&self, f: impl FnOnce(&Counters) -> T) -> T {
        f(&self.state.lock().counters)
    }
}

fn locators() -> &'static SiteLocators {
    SiteLocators::get()
}

#[async_trait]
impl PageRenderer for ScriptedRenderer {
    type Element = Node;

    async fn navigate(&self, _url: &str, _timeout: Duration) -> Result<()> {
        let mut s = self.state.lock();
        if s.closed {
            return Err(ScrapeError::SessionClosed);
        }
        s.counters.nav_calls += 1;
        if s.counters.nav_calls <= s.script.nav_failures {
            return Err(ScrapeError::Browser("net::ERR_CONNECTION_RESET".into()));
        }
        Ok(())
    }

    async fn title(&self) -> Result<Option<String>> {
        Ok(Some(self.state.lock().script.title.clone()))
    }

    async fn wait_for(
        &self,
        locator: &Locator,
        _visible: bool,
        _timeout: Duration,
    ) -> Result<Option<Node>> {
        let s = self.state.lock();
        if s.closed {
            return Err(ScrapeError::SessionClosed);
        }
        let l = locators();
        let node = if l.page_ready.contains(locator) {
            Some(Node::Ready)
        } else if l.open_gallery.contains(locator) {
            s.script.trigger.then_some(Node::Trigger)
        } else if l.gallery_marker.contains(locator) {
            s.opened.then_some(Node::Marker)
        } else if l.counter.contains(locator) {
            (s.opened && s.script.counter.is_some()).then_some(Node::Counter)
        } else if l.next_page.contains(locator) {
            let more = s.current + 1 < s.script.pages.len();
            (s.opened && (s.script.next_always || more)).then_some(Node::Next)
        } else {
            None
        };
        Ok(node)
    }

    async fn query_all(&self, locator: &Locator) -> Result<Vec<Node>> {
        let mut s = self.state.lock();
        if s.closed {
            return Err(ScrapeError::SessionClosed);
        }
        let l = locators();
        if l.thumbnails.contains(locator) {
            if !s.opened {
                return Ok(Vec::new());
            }
            s.counters.harvests += 1;
            if s.script.die_on_page == Some(s.counters.harvests as usize) {
                s.closed = true;
                return Err(ScrapeError::SessionClosed);
            }
            let page = s.current;
            let count = s.script.pages.get(page).map_or(0, Vec::len);
            return Ok((0..count).map(|index| Node::Thumb { page, index }).collect());
        }
        if l.page_images.contains(locator) {
            return Ok((0..s.script.page_images.len()).map(Node::Image).collect());
        }
        Ok(Vec::new())
    }

    async fn read_attribute(&self, element: &Node, name: &str) -> Result<Option<String>> {
        let s = self.state.lock();
        if s.closed {
            return Err(ScrapeError::SessionClosed);
        }
        match element {
            Node::Thumb { page, index } => match &s.script.pages[*page][*index] {
                Thumb::Src(src) if name == "src" => Ok(Some(src.clone())),
                Thumb::Src(_) | Thumb::Missing => Ok(None),
                Thumb::Stale => Err(ScrapeError::StaleElement),
            },
            Node::Image(i) => Ok(s.script.page_images[*i]
                .iter()
                .find(|(attr, _)| *attr == name)
                .map(|(_, v)| v.clone())),
            _ => Ok(None),
        }
    }

    async fn read_text(&self, element: &Node) -> Result<Option<String>> {
        let s = self.state.lock();
        match element {
            Node::Counter => Ok(s.script.counter.clone()),
            _ => Ok(None),
        }
    }

    async fn click(&self, element: &Node) -> Result<()> {
        let mut s = self.state.lock();
        if s.closed {
            return Err(ScrapeError::SessionClosed);
        }
        match element {
            Node::Trigger => {
                if s.script.opens {
                    s.opened = true;
                }
            }
            Node::Next => {
                s.counters.next_clicks += 1;
                let last = s.script.pages.len().saturating_sub(1);
                s.current = (s.current + 1).min(last);
            }
            _ => {}
        }
        Ok(())
    }

    async fn bounding_box(&self, _element: &Node) -> Result<Option<BoundingBox>> {
        Ok(Some(BoundingBox {
            x: 100.0,
            y: 200.0,
            width: 120.0,
            height: 40.0,
        }))
    }

    async fn move_pointer(&self, _to: Point) -> Result<()> {
        self.state.lock().counters.pointer_moves += 1;
        Ok(())
    }

    async fn snapshot(&self) -> Result<Vec<u8>> {
        let mut s = self.state.lock();
        if s.closed {
            return Err(ScrapeError::SessionClosed);
        }
        s.counters.snapshots += 1;
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }

    async fn is_usable(&self) -> bool {
        let s = self.state.lock();
        !s.closed && !s.unusable
    }

    async fn reopen(&self) -> Result<()> {
        let mut s = self.state.lock();
        s.counters.reopens += 1;
        s.closed = false;
        s.unusable = false;
        s.opened = false;
        s.current = 0;
        Ok(())
    }
}

/// 第 `page` 页的 `n` 张缩略图
pub fn thumb_page(page: usize, n: usize) -> Vec<Thumb> {
    (0..n)
        .map(|i| Thumb::Src(format!("//cs.copart.com/v1/lpp/0923/p{}_{:02}_thb.jpg", page, i)))
        .collect()
}

/// 快照写入 `dir` 的配置；脚本页面不会延迟出现，等待时限缩短
pub fn config_in(dir: &Path) -> AppConfig {
    AppConfig::builder()
        .gallery(
            GalleryConfig::builder()
                .ready_timeout_ms(200)
                .open_timeout_ms(200)
                .counter_timeout_ms(200)
                .build(),
        )
        .diagnostics(
            DiagnosticsConfig::builder()
                .snapshot_path(dir.join("error.png"))
                .build(),
        )
        .build()
}
