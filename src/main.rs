//! 应用程序入口 (Application Entrypoint)
//!
//! 负责 CLI 指令解析、遥测层初始化、依赖注入及系统生命周期管理。

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

use lotshot::core::create_event_channel;
use lotshot::ui::{Ui, get_multi};
use lotshot::{AppConfig, DownloadOutcome, ListingReport, Scraper};

/// 进度条感知的日志写入器 (TUI-aware Log Writer)
///
/// 确保非同步日志输出不会破坏终端进度条的渲染布局。
struct IndicatifWriter;

impl io::Write for IndicatifWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let _ = get_multi().println(s.trim_end());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for IndicatifWriter {
    type Writer = IndicatifWriter;

    fn make_writer(&self) -> Self::Writer {
        IndicatifWriter
    }
}

/// 命令行界面脚手架 (CLI Scaffolding)
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 配置文件路径 (默认 ./lotshot.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 提取列表页的全尺寸图片地址
    Extract {
        /// 列表页 URL
        url: String,
        /// 提取后下载到列表目录
        #[arg(short, long)]
        download: bool,
        /// 以 JSON 输出结果
        #[arg(long)]
        json: bool,
    },
    /// 将给定图片地址顺序下载到目录
    Download {
        /// 目标目录名，清洗后挂在 output_root 下
        folder: String,
        /// 图片地址
        #[arg(required = true)]
        urls: Vec<String>,
        /// 以 JSON 输出结果
        #[arg(long)]
        json: bool,
    },
}

/// 命令执行产物
enum Output {
    Listing(ListingReport),
    Downloads {
        destination: PathBuf,
        outcomes: Vec<DownloadOutcome>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 遥测层初始化 (Telemetry Layer Initialization)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(IndicatifWriter)
        .with_target(false)
        .with_ansi(true)
        .init();

    let cli = Cli::parse();
    let config = Arc::new(match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    });

    // 信号处理与优雅退出 (Signal Handling)
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    // 建立 UI 事件反馈链路 (Event feedback loop)
    let (event_sender, event_receiver) = create_event_channel();
    let ui_handle = Ui::run(event_receiver);

    let json = match &cli.command {
        Commands::Extract { json, .. } | Commands::Download { json, .. } => *json,
    };

    // 任务域限制：Scraper 析构后事件通道关闭，UI 循环随之退出
    let outcome = {
        let scraper = Scraper::new(config).with_events(event_sender);
        tokio::select! {
            _ = shutdown.cancelled() => None,
            result = execute(&scraper, cli.command) => Some(result),
        }
    };
    let _ = ui_handle.await;

    match outcome {
        None => {
            warn!("已取消，正在释放浏览器...");
            // 给 Drop 中派生的清理任务留出时间
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(())
        }
        Some(result) => render(result?, json),
    }
}

async fn execute(scraper: &Scraper, command: Commands) -> anyhow::Result<Output> {
    match command {
        Commands::Extract { url, download, .. } => {
            let report = scraper.scrape_listing(&url, download).await?;
            Ok(Output::Listing(report))
        }
        Commands::Download { folder, urls, .. } => {
            let destination = scraper.resolve_destination(&folder);
            let outcomes = scraper.download(&urls, &destination).await?;
            Ok(Output::Downloads {
                destination,
                outcomes,
            })
        }
    }
}

fn render(output: Output, json: bool) -> anyhow::Result<()> {
    match output {
        Output::Listing(report) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }
            if report.extraction.is_empty() {
                println!("no images found");
                return Ok(());
            }
            for url in &report.extraction.urls {
                println!("{}", url);
            }
            if let Some(destination) = &report.destination {
                print_summary(destination, &report.downloads);
            }
        }
        Output::Downloads {
            destination,
            outcomes,
        } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&outcomes)?);
                return Ok(());
            }
            print_summary(&destination, &outcomes);
        }
    }
    Ok(())
}

fn print_summary(destination: &Path, outcomes: &[DownloadOutcome]) {
    let saved = outcomes.iter().filter(|o| o.success).count();
    for failed in outcomes.iter().filter(|o| !o.success) {
        println!(
            "failed: {} ({})",
            failed.url,
            failed.error.as_deref().unwrap_or("unknown error")
        );
    }
    info!("下载结果已写入 {:?}", destination);
    println!("saved {}/{} to {}", saved, outcomes.len(), destination.display());
}
