use reqwest::header::{ACCEPT, HeaderValue, REFERER, USER_AGENT};
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};
use rand::seq::IndexedRandom;
use tracing::trace;

/// 图片请求的 Accept 头
const IMAGE_ACCEPT: &str = "image/avif,image/webp,image/apng,image/*,*/*;q=0.8";

/// 浏览器伪装中间件
/// 负责在每次请求前注入随机 UA、Referer 与图片 Accept 头
pub struct BrowserHeadersMiddleware {
    user_agents: Vec<HeaderValue>,
    referer: Option<HeaderValue>,
}

impl BrowserHeadersMiddleware {
    pub fn new(user_agents: &[String], referer: &str) -> Self {
        Self {
            user_agents: user_agents
                .iter()
                .filter_map(|ua| HeaderValue::from_str(ua).ok())
                .collect(),
            referer: HeaderValue::from_str(referer)
                .ok()
                .filter(|_| !referer.is_empty()),
        }
    }

    fn pick_ua(&self) -> Option<HeaderValue> {
        self.user_agents.choose(&mut rand::rng()).cloned()
    }
}

#[async_trait::async_trait]
impl Middleware for BrowserHeadersMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        let ua = self.pick_ua();
        let headers = req.headers_mut();

        if let Some(ua) = ua {
            headers.insert(USER_AGENT, ua);
        }
        if let Some(referer) = &self.referer
            && !headers.contains_key(REFERER)
        {
            headers.insert(REFERER, referer.clone());
        }
        headers
            .entry(ACCEPT)
            .or_insert(HeaderValue::from_static(IMAGE_ACCEPT));

        trace!("请求 {}", req.url());
        next.run(req, extensions).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_invalid_header_values() {
        let mw = BrowserHeadersMiddleware::new(
            &["Mozilla/5.0".to_string(), "bad\nvalue".to_string()],
            "https://www.copart.com/",
        );
        assert_eq!(mw.user_agents.len(), 1);
        assert!(mw.referer.is_some());
        assert_eq!(mw.pick_ua().unwrap(), "Mozilla/5.0");
    }

    #[test]
    fn empty_referer_is_not_sent() {
        let mw = BrowserHeadersMiddleware::new(&[], "");
        assert!(mw.referer.is_none());
        assert!(mw.pick_ua().is_none());
    }
}
