//! Shared fixtures for integration tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use sumi_atlas::fetcher::{FetchError, FetchedPage, PageFetcher};
use sumi_atlas::queue::CrawlQueue;
use sumi_atlas::storage::SqliteStorage;
use tokio::sync::Notify;
use url::Url;

/// What the stub returns for a host
#[derive(Clone)]
pub enum StubResponse {
    Page(FetchedPage),
    Timeout,
}

/// Serves canned pages keyed by host instead of driving a browser
#[derive(Default)]
pub struct StubFetcher {
    responses: HashMap<String, StubResponse>,
    calls: AtomicUsize,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, host: &str, html: &str) -> Self {
        self.responses.insert(
            host.to_string(),
            StubResponse::Page(FetchedPage {
                html: html.to_string(),
                title: "Stub".to_string(),
                css: String::new(),
            }),
        );
        self
    }

    pub fn timeout(mut self, host: &str) -> Self {
        self.responses
            .insert(host.to_string(), StubResponse::Timeout);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let host = url.host_str().unwrap_or_default();

        match self.responses.get(host) {
            Some(StubResponse::Page(page)) => Ok(page.clone()),
            Some(StubResponse::Timeout) => Err(FetchError::Timeout {
                url: url.to_string(),
                millis: 30_000,
            }),
            None => Err(FetchError::Navigation {
                url: url.to_string(),
                message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            }),
        }
    }
}

/// Holds its first fetch open until released
pub struct GatedFetcher {
    html: String,
    calls: AtomicUsize,
    pub entered: Notify,
    pub release: Notify,
}

impl GatedFetcher {
    pub fn new(html: &str) -> Self {
        Self {
            html: html.to_string(),
            calls: AtomicUsize::new(0),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl PageFetcher for GatedFetcher {
    async fn fetch(&self, _url: &Url) -> Result<FetchedPage, FetchError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.entered.notify_one();
            self.release.notified().await;
        }
        Ok(FetchedPage {
            html: self.html.clone(),
            title: "Gated".to_string(),
            css: String::new(),
        })
    }
}

pub fn memory_queue() -> CrawlQueue {
    CrawlQueue::new(SqliteStorage::new_in_memory().unwrap())
}

/// Polls `check` until it holds or five seconds pass
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

pub const ACME_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Acme</title><style>body { margin: 0 }</style></head>
<body>
  <nav class="navbar">
    <a href="/about">About</a>
    <img src="/img/logo.png" alt="Acme">
    <script>track('nav')</script>
    <noscript><img src="/pixel.gif"></noscript>
  </nav>
  <footer class="footer">
    <p>Acme Inc.</p>
    <iframe src="https://ads.example/frame"></iframe>
  </footer>
</body>
</html>"#;
