//! Crawl workers
//!
//! This module drives the pipeline for each claimed job:
//! - Flip the archive to `Processing`
//! - Render the page with the configured fetcher
//! - Run the analyzer over the rendered HTML
//! - Store one snapshot and its components, then mark the archive `Completed`
//!
//! Any failure is caught once, at the job boundary: it is logged, the archive
//! becomes `Failed` with the error recorded, and the job is marked failed.
//! Rows written before the failure are kept.

mod pool;

pub use pool::{RunSummary, WorkerPool};

use crate::analyzer::{markers, ExtractedComponent, PageAnalyzer};
use crate::fetcher::PageFetcher;
use crate::queue::CrawlQueue;
use crate::state::{ArchiveStatus, ComponentType};
use crate::storage::{ArchiveStatusUpdate, JobRecord, NewComponent, Storage};
use crate::{Result, UrlError};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use url::Url;

/// Result of processing one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed {
        snapshot_id: i64,
        /// Components newly stored; duplicates of an existing identity are not counted
        components: usize,
    },
    Failed(String),
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Everything a worker needs to process jobs
///
/// Shared by all workers of a pool behind an `Arc`.
pub struct Worker {
    queue: CrawlQueue,
    fetcher: Arc<dyn PageFetcher>,
    analyzer: PageAnalyzer,
}

impl Worker {
    pub fn new(queue: CrawlQueue, fetcher: Arc<dyn PageFetcher>, analyzer: PageAnalyzer) -> Self {
        Self {
            queue,
            fetcher,
            analyzer,
        }
    }

    pub fn queue(&self) -> &CrawlQueue {
        &self.queue
    }

    /// Processes one claimed job to completion
    ///
    /// Never returns an error: failures are recorded on the archive and job.
    pub async fn process_job(&self, job: &JobRecord) -> JobOutcome {
        info!(
            "Processing job {} for archive {} ({})",
            job.id, job.site_archive_id, job.url
        );

        match self.crawl(job).await {
            Ok((snapshot_id, components)) => {
                if let Err(e) = self.queue.finish(job.id) {
                    error!("Failed to mark job {} done: {}", job.id, e);
                }
                info!(
                    "Archive {} ({}) completed with {} components",
                    job.site_archive_id, job.url, components
                );
                JobOutcome::Completed {
                    snapshot_id,
                    components,
                }
            }
            Err(e) => {
                let message = e.to_string();
                error!(
                    "Crawl of archive {} ({}) failed: {}",
                    job.site_archive_id, job.url, message
                );
                self.record_failure(job, &message);
                JobOutcome::Failed(message)
            }
        }
    }

    async fn crawl(&self, job: &JobRecord) -> Result<(i64, usize)> {
        let url = Url::parse(&job.url).map_err(|e| UrlError::Parse(e.to_string()))?;

        self.set_status(job.site_archive_id, ArchiveStatus::Processing, Default::default())?;

        let page = self.fetcher.fetch(&url).await?;

        let components: Vec<NewComponent> = self
            .analyzer
            .extract_all(&page.html, &url)
            .iter()
            .map(component_from_candidate)
            .collect();
        debug!(
            "Analyzer found {} candidates on {}",
            components.len(),
            job.url
        );

        let mut storage = self.queue.storage();
        let snapshot_id =
            storage.create_snapshot(job.site_archive_id, &job.url, &page.title, &page.css)?;

        let mut created = 0;
        for component in &components {
            let outcome = storage.create_component(snapshot_id, component)?;
            if outcome.is_created() {
                created += 1;
            } else {
                debug!(
                    "Component {} already stored as {}",
                    component.name,
                    outcome.id()
                );
            }
        }
        drop(storage);

        self.set_status(
            job.site_archive_id,
            ArchiveStatus::Completed,
            ArchiveStatusUpdate::crawled(Utc::now()),
        )?;

        Ok((snapshot_id, created))
    }

    /// Writes an archive status, last writer wins
    ///
    /// Jobs for the same archive may run concurrently, so a transition outside
    /// the usual lifecycle is logged but still applied.
    fn set_status(
        &self,
        archive_id: i64,
        status: ArchiveStatus,
        update: ArchiveStatusUpdate,
    ) -> Result<()> {
        let mut storage = self.queue.storage();
        let current = storage.get_archive(archive_id)?.status;
        if !current.can_transition_to(status) {
            warn!(
                "Archive {} moving {} -> {} outside the usual lifecycle",
                archive_id, current, status
            );
        }
        storage.update_archive_status(archive_id, status, update)?;
        Ok(())
    }

    fn record_failure(&self, job: &JobRecord, message: &str) {
        if let Err(e) = self.set_status(
            job.site_archive_id,
            ArchiveStatus::Failed,
            ArchiveStatusUpdate::failed(message),
        ) {
            error!(
                "Failed to mark archive {} ({}) failed: {}",
                job.site_archive_id, job.url, e
            );
        }
        if let Err(e) = self.queue.fail(job.id, message) {
            error!("Failed to mark job {} failed: {}", job.id, e);
        }
    }
}

/// Maps an analyzer candidate to the row stored for it
///
/// Kind labels without a matching component type are stored as `Unknown`;
/// the lower-cased label is always the first tag, followed by any framework
/// markers found in the snippet.
pub fn component_from_candidate(candidate: &ExtractedComponent) -> NewComponent {
    let component_type = ComponentType::from_label(&candidate.kind);

    let mut tags = vec![candidate.kind.to_lowercase()];
    for tag in markers::derived_tags(&candidate.html) {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    NewComponent {
        name: candidate.display_name(),
        component_type,
        selector: candidate.selector.clone(),
        html_snippet: candidate.html.clone(),
        complexity_score: candidate.score,
        is_react: markers::is_react(&candidate.html),
        is_tailwind: markers::is_tailwind(&candidate.html),
        tags,
    }
}
