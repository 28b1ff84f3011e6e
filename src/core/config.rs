//! 配置管理系统 (Configuration Management)
//!
//! 负责 `lotshot.toml` 的反序列化及其层级结构映射，支持 `LOTSHOT__*` 环境变量覆盖与默认值回退。

use std::path::{Path, PathBuf};
use std::time::Duration;

use bon::Builder;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::core::error::{Result, ScrapeError};

/// 全局应用配置
#[derive(Debug, Deserialize, Builder, Clone, Default)]
pub struct AppConfig {
    /// 自动化浏览器 (Chromium) 相关配置
    #[serde(default)]
    #[builder(default)]
    pub browser: BrowserConfig,

    /// 页面导航重试参数
    #[serde(default)]
    #[builder(default)]
    pub navigation: NavigationConfig,

    /// 画廊分页参数
    #[serde(default)]
    #[builder(default)]
    pub gallery: GalleryConfig,

    /// 下载管线参数
    #[serde(default)]
    #[builder(default)]
    pub download: DownloadConfig,

    /// 故障诊断输出
    #[serde(default)]
    #[builder(default)]
    pub diagnostics: DiagnosticsConfig,
}

/// 浏览器引擎配置
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct BrowserConfig {
    /// 是否以无头模式 (Headless) 运行
    #[serde(default = "default_headless")]
    #[builder(default = default_headless())]
    pub headless: bool,
    /// 自定义可执行文件路径
    pub chrome_path: Option<String>,
    /// 可选的上游代理 (如 `http://127.0.0.1:7890`)
    pub proxy_server: Option<String>,
    /// 轮换使用的 User-Agent 池
    #[serde(default = "default_user_agents")]
    #[builder(default = default_user_agents())]
    pub user_agents: Vec<String>,
    /// 视口宽度随机区间 [min, max]
    #[serde(default = "default_viewport_width")]
    #[builder(default = default_viewport_width())]
    pub viewport_width: (u32, u32),
    /// 视口高度随机区间 [min, max]
    #[serde(default = "default_viewport_height")]
    #[builder(default = default_viewport_height())]
    pub viewport_height: (u32, u32),
}

/// 导航控制参数
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct NavigationConfig {
    #[serde(default = "default_nav_attempts")]
    #[builder(default = default_nav_attempts())]
    pub max_attempts: u32,
    #[serde(default = "default_nav_timeout_ms")]
    #[builder(default = default_nav_timeout_ms())]
    pub timeout_ms: u64,
    /// 加载完成后等待客户端渲染的随机区间
    #[serde(default = "default_settle_min_ms")]
    #[builder(default = default_settle_min_ms())]
    pub settle_min_ms: u64,
    #[serde(default = "default_settle_max_ms")]
    #[builder(default = default_settle_max_ms())]
    pub settle_max_ms: u64,
    #[serde(default = "default_backoff_min_ms")]
    #[builder(default = default_backoff_min_ms())]
    pub backoff_min_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    #[builder(default = default_backoff_max_ms())]
    pub backoff_max_ms: u64,
    /// 视为加载失败的标题片段 (不区分大小写)
    #[serde(default = "default_error_markers")]
    #[builder(default = default_error_markers())]
    pub error_title_markers: Vec<String>,
}

/// 画廊分页参数
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct GalleryConfig {
    /// 缩略图轮播每页的条目数
    #[serde(default = "default_per_page")]
    #[builder(default = default_per_page())]
    pub thumbnails_per_page: usize,
    /// 计数器缺失时的最小分页尝试次数，低于 5 按 5 处理
    #[serde(default = "default_min_page_attempts")]
    #[builder(default = default_min_page_attempts())]
    pub min_page_attempts: usize,
    /// 单个候选定位器的等待上限
    #[serde(default = "default_locator_timeout_ms")]
    #[builder(default = default_locator_timeout_ms())]
    pub locator_timeout_ms: u64,
    /// 初始页面出现任意图片的等待上限
    #[serde(default = "default_ready_timeout_ms")]
    #[builder(default = default_ready_timeout_ms())]
    pub ready_timeout_ms: u64,
    /// 点击后等待画廊弹层出现的上限
    #[serde(default = "default_open_timeout_ms")]
    #[builder(default = default_open_timeout_ms())]
    pub open_timeout_ms: u64,
    #[serde(default = "default_counter_timeout_ms")]
    #[builder(default = default_counter_timeout_ms())]
    pub counter_timeout_ms: u64,
    /// 翻页后等待轮播滑动结束
    #[serde(default = "default_page_settle_ms")]
    #[builder(default = default_page_settle_ms())]
    pub page_settle_ms: u64,
}

/// 下载管线参数
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct DownloadConfig {
    #[serde(default = "default_download_attempts")]
    #[builder(default = default_download_attempts())]
    pub max_attempts: u32,
    #[serde(default = "default_download_timeout_secs")]
    #[builder(default = default_download_timeout_secs())]
    pub timeout_secs: u64,
    /// 相邻下载之间的随机间隔
    #[serde(default = "default_delay_min_ms")]
    #[builder(default = default_delay_min_ms())]
    pub delay_min_ms: u64,
    #[serde(default = "default_delay_max_ms")]
    #[builder(default = default_delay_max_ms())]
    pub delay_max_ms: u64,
    #[serde(default = "default_referer")]
    #[builder(default = default_referer())]
    pub referer: String,
    /// 所有列表目录的根路径
    #[serde(default = "default_output_root")]
    #[builder(default = default_output_root())]
    pub output_root: PathBuf,
    #[serde(default = "default_folder_prefix")]
    #[builder(default = default_folder_prefix())]
    pub folder_prefix: String,
}

/// 诊断快照配置
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct DiagnosticsConfig {
    #[serde(default = "default_snapshot_path")]
    #[builder(default = default_snapshot_path())]
    pub snapshot_path: PathBuf,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            chrome_path: None,
            proxy_server: None,
            user_agents: default_user_agents(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_nav_attempts(),
            timeout_ms: default_nav_timeout_ms(),
            settle_min_ms: default_settle_min_ms(),
            settle_max_ms: default_settle_max_ms(),
            backoff_min_ms: default_backoff_min_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            error_title_markers: default_error_markers(),
        }
    }
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            thumbnails_per_page: default_per_page(),
            min_page_attempts: default_min_page_attempts(),
            locator_timeout_ms: default_locator_timeout_ms(),
            ready_timeout_ms: default_ready_timeout_ms(),
            open_timeout_ms: default_open_timeout_ms(),
            counter_timeout_ms: default_counter_timeout_ms(),
            page_settle_ms: default_page_settle_ms(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_download_attempts(),
            timeout_secs: default_download_timeout_secs(),
            delay_min_ms: default_delay_min_ms(),
            delay_max_ms: default_delay_max_ms(),
            referer: default_referer(),
            output_root: default_output_root(),
            folder_prefix: default_folder_prefix(),
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
        }
    }
}

impl NavigationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl GalleryConfig {
    pub fn locator_timeout(&self) -> Duration {
        Duration::from_millis(self.locator_timeout_ms)
    }
}

impl DownloadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_headless() -> bool {
    true
}
fn default_user_agents() -> Vec<String> {
    [
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_viewport_width() -> (u32, u32) {
    (1366, 1920)
}
fn default_viewport_height() -> (u32, u32) {
    (768, 1080)
}
fn default_nav_attempts() -> u32 {
    3
}
fn default_nav_timeout_ms() -> u64 {
    60_000
}
fn default_settle_min_ms() -> u64 {
    3_000
}
fn default_settle_max_ms() -> u64 {
    5_000
}
fn default_backoff_min_ms() -> u64 {
    2_000
}
fn default_backoff_max_ms() -> u64 {
    4_000
}
fn default_error_markers() -> Vec<String> {
    ["error", "404", "not found", "access denied", "403 forbidden"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_per_page() -> usize {
    8
}
fn default_min_page_attempts() -> usize {
    5
}
fn default_locator_timeout_ms() -> u64 {
    5_000
}
fn default_ready_timeout_ms() -> u64 {
    30_000
}
fn default_open_timeout_ms() -> u64 {
    30_000
}
fn default_counter_timeout_ms() -> u64 {
    5_000
}
fn default_page_settle_ms() -> u64 {
    1_500
}
fn default_download_attempts() -> u32 {
    3
}
fn default_download_timeout_secs() -> u64 {
    15
}
fn default_delay_min_ms() -> u64 {
    1_000
}
fn default_delay_max_ms() -> u64 {
    2_000
}
fn default_referer() -> String {
    "https://www.copart.com/".to_string()
}
fn default_output_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_folder_prefix() -> String {
    "copart_images".to_string()
}
fn default_snapshot_path() -> PathBuf {
    PathBuf::from("copart_error_screenshot.png")
}

impl AppConfig {
    /// 从工作目录加载 `lotshot.toml`，再叠加环境变量
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("lotshot.toml"))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let builder = Config::builder();

        let builder = if path.exists() {
            builder.add_source(File::from(path))
        } else {
            builder
        };

        let settings = builder
            .add_source(Environment::with_prefix("LOTSHOT").separator("__"))
            .build()
            .map_err(ScrapeError::Config)?;
        settings.try_deserialize().map_err(ScrapeError::Config)
    }
}
