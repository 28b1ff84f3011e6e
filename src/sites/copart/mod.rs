//! Copart 站点模块
//!
//! 定位器链、图片地址规范化以及列表目录命名。

pub mod canonical;
mod selectors;

use url::Url;

pub use self::canonical::{canonicalize, content_url, is_content_image};
pub use self::selectors::{IMAGE_SOURCE_ATTRIBUTES, SiteLocators, THUMBNAIL_SOURCE_ATTRIBUTE};

const FALLBACK_LISTING_ID: &str = "listing";

/// 从列表 URL 推导稳定的目录标识
///
/// 优先末段数字 ID，其次任意数字段 (从后往前)，再次为清洗后的末段，最后回退固定标记。
pub fn listing_id(listing: &Url) -> String {
    let parts: Vec<&str> = listing
        .path_segments()
        .map(|segs| segs.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    if let Some(id) = parts
        .iter()
        .rev()
        .find(|s| s.chars().all(|c| c.is_ascii_digit()))
    {
        return id.to_string();
    }

    parts
        .last()
        .map(|last| sanitize_folder_name(last))
        .unwrap_or_else(|| FALLBACK_LISTING_ID.to_string())
}

/// 只保留 `[A-Za-z0-9_-]`，清洗后为空时回退固定标记
pub fn sanitize_folder_name(raw: &str) -> String {
    let sanitized: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if sanitized.is_empty() {
        FALLBACK_LISTING_ID.to_string()
    } else {
        sanitized
    }
}

/// 列表目录名 `<prefix>_<id>`
pub fn listing_folder_name(listing: &Url, prefix: &str) -> String {
    format!("{}_{}", prefix, listing_id(listing))
}
