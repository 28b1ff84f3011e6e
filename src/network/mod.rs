pub mod browser;
pub mod client;
pub mod middleware;

pub use browser::{BrowserSession, ChromiumRenderer};
pub use client::HttpFetcher;
pub use middleware::BrowserHeadersMiddleware;
