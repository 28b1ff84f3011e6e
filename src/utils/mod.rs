use std::io;
use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;
use url::Url;

/// 可识别的图片扩展名
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
const DEFAULT_EXTENSION: &str = "jpg";

pub fn to_absolute_url(base: &Url, href: &str) -> String {
    if href.is_empty() {
        return String::new();
    }

    if let Some(path_without_slashes) = href.strip_prefix("//") {
        return format!("{}://{}", base.scheme(), path_without_slashes);
    }

    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }

    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// 由 URL 推导文件名
///
/// 取最后一个非空路径段并解码；缺少图片扩展名时补 `.jpg`；无可用段时使用 `image_{index:03}`。
pub fn derive_filename(url: &str, index: usize) -> String {
    let segment = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segs| segs.rfind(|s| !s.is_empty()).map(str::to_string))
        })
        .map(|s| percent_decode_str(&s).decode_utf8_lossy().into_owned())
        .map(|s| sanitize_filename(&s))
        .filter(|s| !s.is_empty() && s != "." && s != "..");

    let name = segment.unwrap_or_else(|| format!("image_{:03}", index + 1));

    if has_image_extension(&name) {
        name
    } else {
        format!("{}.{}", name, DEFAULT_EXTENSION)
    }
}

fn has_image_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// 解码后的段可能带有路径分隔符或控制字符
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// 第 n 个碰撞候选名: `stem_n.ext`
pub fn numbered_filename(filename: &str, n: usize) -> String {
    if n == 0 {
        return filename.to_string();
    }
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}_{}.{}", stem, n, ext),
        _ => format!("{}_{}", filename, n),
    }
}

/// 以独占创建方式写入，遇到同名文件时追加递增后缀
///
/// 返回最终路径。`create_new` 保证不会覆盖已有文件。
pub async fn write_unique(dir: &Path, filename: &str, data: &[u8]) -> io::Result<PathBuf> {
    let mut n = 0;
    loop {
        let path = dir.join(numbered_filename(filename, n));
        match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => {
                fill_or_remove(&path, file, data).await?;
                return Ok(path);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(e),
        }
    }
}

/// 写入失败时删除刚创建的文件，不留下截断的半成品
async fn fill_or_remove<W: AsyncWrite + Unpin>(
    path: &Path,
    mut file: W,
    data: &[u8],
) -> io::Result<()> {
    let written = match file.write_all(data).await {
        Ok(()) => file.flush().await,
        Err(e) => Err(e),
    };
    if written.is_err() {
        drop(file);
        if let Err(e) = fs::remove_file(path).await {
            debug!("清理未写完的文件 {:?} 失败: {}", path, e);
        }
    }
    written
}
