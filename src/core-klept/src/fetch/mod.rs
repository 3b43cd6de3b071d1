//! Page and sitemap download.

pub mod mock;

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::errors::{Error, Result};

/// Fetch timeout used when no other timeout is configured.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Downloads the full body of a URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Returns the response bytes, or an error for transport failures and non-2xx statuses.
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>>;
}

/// `Fetcher` backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Builds a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("autoklept/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        let response = self.client.get(url.as_str()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await?;
        tracing::debug!("Fetched {} bytes from '{}'", body.len(), url);
        Ok(body.to_vec())
    }
}
