//! Page fetching
//!
//! A fetch renders one URL and hands back the document after scripts have run.
//! The worker only sees the `PageFetcher` trait so tests can substitute a
//! canned page for a real browser.

mod browser;

pub use browser::BrowserFetcher;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// A rendered page as captured from the browser
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedPage {
    /// Serialized DOM after rendering
    pub html: String,

    /// Document title, empty when the page has none
    pub title: String,

    /// One `@import url("...");` line per linked stylesheet, then the text of
    /// every inline `<style>` element, newline separated
    pub css: String,
}

/// Errors that can occur while fetching a page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Timed out after {millis}ms loading {url}")]
    Timeout { url: String, millis: u64 },

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Browser crashed: {0}")]
    Crashed(String),

    #[error("Script evaluation failed: {0}")]
    Script(String),
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Renders pages for the worker
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Loads `url` and returns the rendered document
    ///
    /// Implementations do not retry; the first failure is returned.
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError>;
}
