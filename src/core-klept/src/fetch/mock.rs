//! In-memory `Fetcher` for tests.
//!
//! Serves canned bodies keyed by the normalized URL string, so the pipeline
//! can be exercised without touching the network.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use url::Url;

use crate::errors::{Error, Result};
use crate::fetch::Fetcher;

/// Mock fetcher with per-URL bodies or statuses.
#[derive(Default)]
pub struct MockFetcher {
    pages: HashMap<String, Vec<u8>>,
    statuses: HashMap<String, u16>,
    requested: Mutex<Vec<String>>,
}

impl MockFetcher {
    /// Create a mock that knows no URLs (every fetch is a 404).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock serving the given `(url, body)` pairs.
    pub fn with_pages(pages: Vec<(&str, &str)>) -> Self {
        let mut fetcher = Self::new();
        for (url, body) in pages {
            fetcher.add_page(url, body);
        }
        fetcher
    }

    /// Serve `body` for `url`.
    pub fn add_page(&mut self, url: &str, body: &str) {
        self.pages.insert(normalize(url), body.as_bytes().to_vec());
    }

    /// Answer `url` with a non-success `status`.
    pub fn add_status(&mut self, url: &str, status: u16) {
        self.statuses.insert(normalize(url), status);
    }

    /// Every URL fetched so far, in request order.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

fn normalize(url: &str) -> String {
    Url::parse(url).map(|u| u.to_string()).unwrap_or_else(|_| url.to_string())
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        if let Ok(mut requested) = self.requested.lock() {
            requested.push(url.to_string());
        }
        if let Some(status) = self.statuses.get(url.as_str()) {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: *status,
            });
        }
        self.pages.get(url.as_str()).cloned().ok_or_else(|| Error::HttpStatus {
            url: url.to_string(),
            status: 404,
        })
    }
}
