//! 终端进度渲染引擎 (Terminal UI Progress Engine)
//!
//! 基于 `indicatif` 实现非阻塞式进度显示：提取阶段为旋转指示器，下载阶段为进度条。

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use parking_lot::RwLock;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::core::event::{EventReceiver, ScrapeEvent};

/// 全局 TUI 容器 (Singleton)
static MULTI: OnceLock<MultiProgress> = OnceLock::new();

/// 获取全局进度容器实例
pub fn get_multi() -> &'static MultiProgress {
    MULTI.get_or_init(MultiProgress::new)
}

/// TUI 状态容器
#[derive(Default)]
struct UiState {
    /// 提取阶段指示器
    extract_bar: Option<ProgressBar>,
    /// 下载进度条
    download_bar: Option<ProgressBar>,
    failed: usize,
}

static STATE: OnceLock<Arc<RwLock<UiState>>> = OnceLock::new();

fn get_state() -> &'static Arc<RwLock<UiState>> {
    STATE.get_or_init(|| Arc::new(RwLock::new(UiState::default())))
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
}

/// 进度协调器 (Progress Orchestrator)
pub struct Ui;

impl Ui {
    /// 激活事件监听循环，发送端全部释放后退出
    pub fn run(receiver: EventReceiver) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = receiver.recv_async().await {
                Self::handle_event(event);
            }
        })
    }

    fn extract_bar(ui: &mut UiState) -> &ProgressBar {
        ui.extract_bar.get_or_insert_with(|| {
            let bar = get_multi().add(ProgressBar::new_spinner());
            bar.set_style(spinner_style());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        })
    }

    /// 执行 UI 状态转换与渲染更新
    fn handle_event(event: ScrapeEvent) {
        let state = get_state();
        let mut ui = state.write();

        match event {
            ScrapeEvent::NavigationAttempt { attempt, max } => {
                Self::extract_bar(&mut ui)
                    .set_message(format!("🌐 LOADING ({}/{})", attempt, max));
            }
            ScrapeEvent::NavigationReady { title } => {
                Self::extract_bar(&mut ui).set_message(format!("📄 {}", truncate_string(&title, 50)));
            }
            ScrapeEvent::NavigationFailed { reason } => {
                Self::extract_bar(&mut ui)
                    .abandon_with_message(format!("❌ FAILED: {}", truncate_string(&reason, 60)));
            }
            ScrapeEvent::GalleryOpened => {
                Self::extract_bar(&mut ui).set_message("🖼️ GALLERY OPENED");
            }
            ScrapeEvent::GalleryFallback { reason } => {
                Self::extract_bar(&mut ui).set_message(format!("⚠️ FALLBACK: {}", reason));
            }
            ScrapeEvent::PageHarvested {
                page,
                ceiling,
                added,
                ..
            } => {
                Self::extract_bar(&mut ui)
                    .set_message(format!("🔎 PAGE {}/{} (+{})", page, ceiling, added));
            }
            ScrapeEvent::ExtractionFinished { total } => {
                if let Some(bar) = ui.extract_bar.take()
                    && !bar.is_finished()
                {
                    bar.finish_with_message(format!("✅ {} IMAGES FOUND", total));
                }
            }
            ScrapeEvent::DownloadStarted { total } => {
                let bar = get_multi().add(ProgressBar::new(total as u64));
                bar.set_style(bar_style());
                ui.download_bar = Some(bar);
                ui.failed = 0;
            }
            ScrapeEvent::ItemSaved { filename, .. } => {
                if let Some(ref bar) = ui.download_bar {
                    bar.inc(1);
                    bar.set_message(truncate_string(&filename, 30));
                }
            }
            ScrapeEvent::ItemFailed { url, .. } => {
                ui.failed += 1;
                if let Some(ref bar) = ui.download_bar {
                    bar.inc(1);
                    bar.set_message(format!("⚠️ {}", truncate_string(&url, 30)));
                }
            }
            ScrapeEvent::DownloadFinished { saved, total } => {
                let failed = ui.failed;
                if let Some(bar) = ui.download_bar.take() {
                    if failed == 0 {
                        bar.finish_with_message(format!("✅ {}/{} SAVED", saved, total));
                    } else {
                        bar.abandon_with_message(format!(
                            "⚠️ {}/{} SAVED, {} FAILED",
                            saved, total, failed
                        ));
                    }
                }
            }
        }
    }
}

/// 执行语义化字符串截断
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("abcdefghij", 8), "abcde...");
        assert_eq!(truncate_string("图片图片图片", 5), "图片...");
    }
}
