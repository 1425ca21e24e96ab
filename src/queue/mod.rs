//! Persistent crawl job queue
//!
//! Jobs live in the `crawl_jobs` table of the shared store, so they survive a
//! restart. A `Notify` wakes idle workers when something is enqueued; workers
//! also poll on an interval in case a wake-up is missed.
//!
//! Several processes may share one database. A running job is only taken back
//! from its worker once its claim is older than the job lease.

use crate::state::JobState;
use crate::storage::{JobRecord, SqliteStorage, Storage, StorageResult};
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info};

/// Lease used when none is configured
pub const DEFAULT_JOB_LEASE: Duration = Duration::from_secs(600);

/// Store shared between ingest, workers and the CLI
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// Handle to the job queue and the store it lives in
///
/// Cheap to clone; clones share the store and the wake-up signal.
#[derive(Clone)]
pub struct CrawlQueue {
    storage: SharedStorage,
    notify: Arc<Notify>,
    lease: Duration,
}

impl CrawlQueue {
    pub fn new(storage: SqliteStorage) -> Self {
        Self::from_shared(Arc::new(Mutex::new(storage)))
    }

    pub fn from_shared(storage: SharedStorage) -> Self {
        Self {
            storage,
            notify: Arc::new(Notify::new()),
            lease: DEFAULT_JOB_LEASE,
        }
    }

    /// Sets how long a claim protects a running job from being re-queued
    ///
    /// Must outlast the longest job a live worker can run.
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    pub fn lease(&self) -> Duration {
        self.lease
    }

    /// Locks the store
    ///
    /// A panic while holding the lock leaves SQLite consistent, so a poisoned
    /// lock is recovered rather than propagated.
    pub fn storage(&self) -> MutexGuard<'_, SqliteStorage> {
        self.storage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a job and wakes one idle worker
    pub fn enqueue(&self, archive_id: i64, url: &str, depth: u32) -> StorageResult<i64> {
        let job_id = self.storage().enqueue_job(archive_id, url, depth)?;
        debug!("Enqueued job {} for archive {} ({})", job_id, archive_id, url);
        self.notify.notify_one();
        Ok(job_id)
    }

    /// Claims the oldest queued job
    pub fn claim(&self) -> StorageResult<Option<JobRecord>> {
        self.storage().claim_next_job()
    }

    pub fn finish(&self, job_id: i64) -> StorageResult<()> {
        self.storage().finish_job(job_id)
    }

    pub fn fail(&self, job_id: i64, error_message: &str) -> StorageResult<()> {
        self.storage().fail_job(job_id, error_message)
    }

    /// Puts jobs whose lease has run out back in the queue
    ///
    /// Jobs claimed within the lease may belong to a live worker in another
    /// process and are left running.
    pub fn requeue_interrupted(&self) -> StorageResult<usize> {
        let cutoff = chrono::Duration::from_std(self.lease)
            .ok()
            .and_then(|lease| Utc::now().checked_sub_signed(lease));
        let Some(cutoff) = cutoff else {
            return Ok(0);
        };

        let requeued = self.storage().requeue_interrupted_jobs(cutoff)?;
        if requeued > 0 {
            info!("Re-queued {} interrupted jobs", requeued);
            self.notify.notify_waiters();
        }
        Ok(requeued)
    }

    /// Number of jobs waiting to be claimed
    pub fn pending(&self) -> StorageResult<u64> {
        self.storage().count_jobs_by_state(JobState::Queued)
    }

    /// Waits for an enqueue signal or until `poll` elapses
    ///
    /// Returns true when woken by a signal.
    pub async fn wait(&self, poll: Duration) -> bool {
        tokio::time::timeout(poll, self.notify.notified())
            .await
            .is_ok()
    }

    /// Wakes every worker currently waiting
    pub fn wake_all(&self) {
        self.notify.notify_waiters();
    }
}
