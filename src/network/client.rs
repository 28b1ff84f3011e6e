use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use tracing::debug;

use crate::core::config::AppConfig;
use crate::core::error::{Result, ScrapeError};
use crate::interfaces::fetcher::ImageFetcher;
use crate::network::middleware::BrowserHeadersMiddleware;

/// 基于 reqwest 的图片下载客户端
#[derive(Clone)]
pub struct HttpFetcher {
    client: ClientWithMiddleware,
}

impl HttpFetcher {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let mut client_builder = reqwest::Client::builder()
            .pool_max_idle_per_host(8)
            .tcp_nodelay(true)
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.download.timeout());

        if let Some(proxy) = &config.browser.proxy_server {
            client_builder =
                client_builder.proxy(reqwest::Proxy::all(proxy).map_err(ScrapeError::Network)?);
        }

        let client = client_builder.build().map_err(ScrapeError::Network)?;

        Ok(Self {
            client: ClientBuilder::new(client)
                .with(BrowserHeadersMiddleware::new(
                    &config.browser.user_agents,
                    &config.download.referer,
                ))
                .build(),
        })
    }
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(ScrapeError::Middleware)?;

        let status = resp.status();
        if !status.is_success() {
            debug!("{} 返回 {}", url, status);
            return Err(ScrapeError::HttpStatus(status));
        }

        resp.bytes().await.map_err(ScrapeError::Network)
    }
}
