//! 错误处理体系 (Error Handling System)
//!
//! 定义抓取/下载领域的错误类型以及全局 Result 别名。

use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// 全局错误定义 (Scrape Domain Errors)
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    #[error("Browser error: {0}")]
    Browser(String),

    /// 渲染会话已关闭 (页面/浏览器进程不可用)
    #[error("Renderer session closed")]
    SessionClosed,

    /// 元素在查询与读取之间被页面替换
    #[error("Stale element reference")]
    StaleElement,

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Unexpected HTTP status: {0}")]
    HttpStatus(StatusCode),

    /// 目标目录不可写，整个下载调用终止
    #[error("Destination {path:?} is not writable: {source}")]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Parsing error: {0}")]
    Parse(String),
}

/// 全局 Result 别名
pub type Result<T> = std::result::Result<T, ScrapeError>;

impl ScrapeError {
    /// 是否为会话级致命错误
    ///
    /// 只有渲染会话丢失才会中止整个画廊提取，其余错误都按单项跳过处理。
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScrapeError::SessionClosed)
    }

    /// 下载层面可重试的失败 (非 2xx、传输超时、连接错误)
    pub fn is_transient(&self) -> bool {
        match self {
            ScrapeError::HttpStatus(_) | ScrapeError::Timeout(_) => true,
            ScrapeError::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ScrapeError::Middleware(_) => true,
            _ => false,
        }
    }
}
