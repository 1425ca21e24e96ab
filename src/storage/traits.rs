//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::{ArchiveStatus, ComponentType, JobState};
use crate::storage::{
    ArchiveRecord, ArchiveStatusUpdate, ComponentFilter, ComponentRecord, CreateOutcome,
    ExplanationRecord, JobRecord, NewComponent, NewExplanation, SnapshotRecord,
};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Archive not found: {0}")]
    ArchiveNotFound(String),

    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(i64),

    #[error("Component not found: {0}")]
    ComponentNotFound(i64),

    #[error("Job not found: {0}")]
    JobNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Every write touches a single entity row (plus, for components, its tag
/// rows). Callers that share a backend across workers wrap it in a mutex.
pub trait Storage {
    // ===== Archives =====

    /// Creates the archive for a root URL or resets an existing one
    ///
    /// An existing archive is forced back to `Pending` whatever its current
    /// status; no second row is ever created for the same root URL.
    ///
    /// # Returns
    ///
    /// The archive ID (either newly created or existing)
    fn upsert_archive(&mut self, root_url: &str, domain: &str) -> StorageResult<i64>;

    /// Gets an archive by ID
    fn get_archive(&self, archive_id: i64) -> StorageResult<ArchiveRecord>;

    /// Gets an archive by its normalized root URL
    fn get_archive_by_url(&self, root_url: &str) -> StorageResult<Option<ArchiveRecord>>;

    /// Lists archives, most recently updated first
    fn list_archives(&self) -> StorageResult<Vec<ArchiveRecord>>;

    /// Sets the status of an archive along with crawl bookkeeping
    fn update_archive_status(
        &mut self,
        archive_id: i64,
        status: ArchiveStatus,
        update: ArchiveStatusUpdate,
    ) -> StorageResult<()>;

    /// Counts archives in a status
    fn count_archives_by_status(&self, status: ArchiveStatus) -> StorageResult<u64>;

    // ===== Snapshots =====

    /// Records a fetched page for an archive
    fn create_snapshot(
        &mut self,
        archive_id: i64,
        url: &str,
        title: &str,
        css: &str,
    ) -> StorageResult<i64>;

    /// Gets a snapshot by ID
    fn get_snapshot(&self, snapshot_id: i64) -> StorageResult<SnapshotRecord>;

    /// Lists an archive's snapshots, newest first
    fn list_snapshots(&self, archive_id: i64) -> StorageResult<Vec<SnapshotRecord>>;

    /// Counts an archive's snapshots
    fn count_snapshots(&self, archive_id: i64) -> StorageResult<u64>;

    // ===== Components =====

    /// Stores an extracted component under a snapshot
    ///
    /// Components are identified by the snapshot's page URL, type and
    /// selector, so re-crawling a page does not store its components again.
    /// Storing the same identity twice returns `CreateOutcome::Duplicate`
    /// with the existing ID and leaves the stored row unchanged.
    fn create_component(
        &mut self,
        snapshot_id: i64,
        component: &NewComponent,
    ) -> StorageResult<CreateOutcome>;

    /// Gets a component by ID, tags included
    fn get_component(&self, component_id: i64) -> StorageResult<ComponentRecord>;

    /// Lists components matching a filter, newest first
    fn list_components(&self, filter: &ComponentFilter) -> StorageResult<Vec<ComponentRecord>>;

    /// Counts components of a type
    fn count_components_by_type(&self, component_type: ComponentType) -> StorageResult<u64>;

    /// Marks or unmarks a component as favorite
    fn set_favorite(&mut self, component_id: i64, favorite: bool) -> StorageResult<()>;

    /// Stores framework code generated for a component
    fn set_react_code(&mut self, component_id: i64, code: &str) -> StorageResult<()>;

    /// Adds tags to a component; tags already present are ignored
    fn add_component_tags(&mut self, component_id: i64, tags: &[String]) -> StorageResult<()>;

    // ===== Explanations =====

    /// Stores the explanation for a component, replacing any previous one
    fn upsert_explanation(
        &mut self,
        component_id: i64,
        explanation: &NewExplanation,
    ) -> StorageResult<()>;

    /// Gets a component's explanation
    fn get_explanation(&self, component_id: i64) -> StorageResult<Option<ExplanationRecord>>;

    // ===== Job Queue =====

    /// Appends a crawl job to the queue
    fn enqueue_job(&mut self, archive_id: i64, url: &str, depth: u32) -> StorageResult<i64>;

    /// Claims the oldest queued job, marking it running
    fn claim_next_job(&mut self) -> StorageResult<Option<JobRecord>>;

    /// Marks a running job as done
    fn finish_job(&mut self, job_id: i64) -> StorageResult<()>;

    /// Marks a running job as failed
    fn fail_job(&mut self, job_id: i64, error_message: &str) -> StorageResult<()>;

    /// Gets a job by ID
    fn get_job(&self, job_id: i64) -> StorageResult<JobRecord>;

    /// Puts running jobs claimed before `claimed_before` back in the queue
    ///
    /// Several processes may share one queue, so a running job only counts
    /// as interrupted once its claim is older than any live worker could hold
    /// it. Younger claims are left alone.
    ///
    /// # Returns
    ///
    /// The number of jobs re-queued
    fn requeue_interrupted_jobs(&mut self, claimed_before: DateTime<Utc>) -> StorageResult<usize>;

    /// Counts jobs in a state
    fn count_jobs_by_state(&self, state: JobState) -> StorageResult<u64>;
}
