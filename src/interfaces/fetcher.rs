use async_trait::async_trait;
use bytes::Bytes;

use crate::core::error::Result;

/// 图片字节获取接口
///
/// 非 2xx 响应必须映射为 `ScrapeError::HttpStatus`。
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}
