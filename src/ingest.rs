//! Ingest entry point
//!
//! Turns a submitted URL into a queued crawl job. Validation happens before
//! any write, so a rejected URL leaves the store untouched.

use crate::queue::CrawlQueue;
use crate::storage::Storage;
use crate::url::{extract_domain, normalize_url};
use crate::{AtlasError, Result};
use tracing::{info, warn};

/// What an accepted ingest created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReceipt {
    pub archive_id: i64,
    pub job_id: i64,
    /// The normalized root URL the archive is keyed on
    pub root_url: String,
}

/// Submits a root URL for crawling
///
/// The URL is normalized and its archive created, or reset to `Pending` if it
/// already exists whatever its status. A fresh job is enqueued every time and
/// one idle worker is woken.
///
/// # Arguments
///
/// * `queue` - The job queue and its store
/// * `url` - The URL as submitted
///
/// # Returns
///
/// * `Ok(IngestReceipt)` - The archive and job created for the URL
/// * `Err(AtlasError::Validation)` - The URL is not an http(s) URL with a host
pub fn ingest(queue: &CrawlQueue, url: &str) -> Result<IngestReceipt> {
    ingest_with_depth(queue, url, 0)
}

/// Same as [`ingest`], recording a link depth on the job
///
/// Only the submitted page is fetched; the depth is kept for later use.
pub fn ingest_with_depth(queue: &CrawlQueue, url: &str, depth: u32) -> Result<IngestReceipt> {
    let normalized = normalize_url(url).map_err(|e| {
        warn!("Rejected ingest of {:?}: {}", url, e);
        AtlasError::Validation(format!("{}: {}", url.trim(), e))
    })?;

    let domain = extract_domain(&normalized).ok_or_else(|| {
        AtlasError::Validation(format!("{}: URL has no domain", url.trim()))
    })?;

    let root_url = normalized.to_string();
    let archive_id = queue.storage().upsert_archive(&root_url, &domain)?;
    let job_id = queue.enqueue(archive_id, &root_url, depth)?;

    info!(
        "Ingested {} as archive {} (job {})",
        root_url, archive_id, job_id
    );

    Ok(IngestReceipt {
        archive_id,
        job_id,
        root_url,
    })
}
