use crate::worker::{JobOutcome, Worker};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Totals from a drained queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: usize,
    pub failed: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &JobOutcome) {
        if outcome.is_completed() {
            self.completed += 1;
        } else {
            self.failed += 1;
        }
    }

    fn merge(&mut self, other: RunSummary) {
        self.completed += other.completed;
        self.failed += other.failed;
    }
}

/// A fixed set of long-running workers
///
/// Created once at start-up. Each worker claims and processes jobs one at a
/// time; idle workers sleep until an enqueue wakes them or the poll interval
/// passes.
pub struct WorkerPool {
    worker: Arc<Worker>,
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<RunSummary>>,
}

impl WorkerPool {
    /// Spawns `count` workers
    ///
    /// Running jobs whose lease has expired are re-queued first.
    pub fn start(count: usize, worker: Worker, poll_interval: Duration) -> Self {
        let worker = Arc::new(worker);

        if let Err(e) = worker.queue().requeue_interrupted() {
            error!("Failed to re-queue interrupted jobs: {}", e);
        }

        let (shutdown, receiver) = watch::channel(false);
        let handles = (0..count.max(1))
            .map(|index| {
                let worker = Arc::clone(&worker);
                let receiver = receiver.clone();
                tokio::spawn(run_worker(index, worker, receiver, poll_interval))
            })
            .collect();

        info!("Started {} workers", count.max(1));

        Self {
            worker,
            shutdown,
            handles,
        }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Stops all workers, letting in-flight jobs finish first
    pub async fn shutdown(self) -> RunSummary {
        info!("Shutting down {} workers", self.handles.len());
        let _ = self.shutdown.send(true);
        self.worker.queue().wake_all();

        let summary = join_all(self.handles).await;
        info!(
            "Workers stopped: {} completed, {} failed",
            summary.completed, summary.failed
        );
        summary
    }

    /// Processes queued jobs with `count` workers until none are left
    ///
    /// Used by one-shot runs; returns once every worker finds the queue empty.
    pub async fn run_until_idle(count: usize, worker: Worker) -> RunSummary {
        let worker = Arc::new(worker);

        if let Err(e) = worker.queue().requeue_interrupted() {
            error!("Failed to re-queue interrupted jobs: {}", e);
        }

        let handles = (0..count.max(1))
            .map(|index| {
                let worker = Arc::clone(&worker);
                tokio::spawn(async move {
                    let mut summary = RunSummary::default();
                    while let Some(outcome) = claim_and_process(index, &worker).await {
                        summary.record(&outcome);
                    }
                    summary
                })
            })
            .collect();

        join_all(handles).await
    }
}

async fn join_all(handles: Vec<JoinHandle<RunSummary>>) -> RunSummary {
    let mut total = RunSummary::default();
    for handle in handles {
        match handle.await {
            Ok(summary) => total.merge(summary),
            Err(e) => error!("Worker task ended abnormally: {}", e),
        }
    }
    total
}

/// Claims one job and processes it; None when the queue is empty or unreadable
async fn claim_and_process(index: usize, worker: &Worker) -> Option<JobOutcome> {
    let job = match worker.queue().claim() {
        Ok(Some(job)) => job,
        Ok(None) => return None,
        Err(e) => {
            error!("Worker {} could not claim a job: {}", index, e);
            return None;
        }
    };

    debug!("Worker {} claimed job {}", index, job.id);
    Some(worker.process_job(&job).await)
}

async fn run_worker(
    index: usize,
    worker: Arc<Worker>,
    mut shutdown: watch::Receiver<bool>,
    poll_interval: Duration,
) -> RunSummary {
    let mut summary = RunSummary::default();

    loop {
        if *shutdown.borrow() {
            break;
        }

        if let Some(outcome) = claim_and_process(index, &worker).await {
            summary.record(&outcome);
            continue;
        }

        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    warn!("Worker {} lost its shutdown signal; stopping", index);
                    break;
                }
            }
            _ = worker.queue().wait(poll_interval) => {}
        }
    }

    debug!("Worker {} stopped", index);
    summary
}
