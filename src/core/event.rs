//! 事件系统定义
//!
//! 用于 Engine 与 UI 之间的完全解耦通信

use flume::{Receiver, Sender};

/// 抓取事件类型
#[derive(Debug, Clone)]
pub enum ScrapeEvent {
    /// 导航尝试
    NavigationAttempt { attempt: u32, max: u32 },

    /// 页面已就绪
    NavigationReady { title: String },

    /// 导航重试耗尽
    NavigationFailed { reason: String },

    /// 画廊弹层已打开
    GalleryOpened,

    /// 画廊未能打开，回退到主页面提取
    GalleryFallback { reason: String },

    /// 一页缩略图采集完成
    PageHarvested {
        page: usize,
        ceiling: usize,
        found: usize,
        added: usize,
    },

    /// 提取结束
    ExtractionFinished { total: usize },

    /// 下载开始
    DownloadStarted { total: usize },

    /// 单项下载完成
    ItemSaved { index: usize, filename: String },

    /// 单项下载失败
    ItemFailed { index: usize, url: String, error: String },

    /// 下载结束
    DownloadFinished { saved: usize, total: usize },
}

/// 事件发送器
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<ScrapeEvent>,
}

impl EventSender {
    pub fn new(tx: Sender<ScrapeEvent>) -> Self {
        Self { tx }
    }

    /// 发送事件 (接收端关闭时静默丢弃)
    pub fn emit(&self, event: ScrapeEvent) {
        let _ = self.tx.send(event);
    }
}

/// 可选发送器的便捷扩展
pub trait EmitExt {
    fn emit(&self, event: ScrapeEvent);
}

impl EmitExt for Option<EventSender> {
    fn emit(&self, event: ScrapeEvent) {
        if let Some(sender) = self {
            sender.emit(event);
        }
    }
}

/// 事件接收器
pub struct EventReceiver {
    rx: Receiver<ScrapeEvent>,
}

impl EventReceiver {
    pub fn new(rx: Receiver<ScrapeEvent>) -> Self {
        Self { rx }
    }

    /// 异步接收事件
    pub async fn recv_async(&self) -> Option<ScrapeEvent> {
        self.rx.recv_async().await.ok()
    }

    /// 取出当前已缓冲的全部事件
    pub fn drain(&self) -> Vec<ScrapeEvent> {
        self.rx.drain().collect()
    }
}

/// 创建事件通道
pub fn create_event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = flume::unbounded();
    (EventSender::new(tx), EventReceiver::new(rx))
}
