//! End-to-end crawl pipeline tests
//!
//! These drive ingest, the worker pool and SQLite storage together, with a
//! stub fetcher standing in for the headless browser.

use crate::common::{eventually, memory_queue, GatedFetcher, StubFetcher, ACME_PAGE};
use std::sync::Arc;
use std::time::Duration;
use sumi_atlas::analyzer::{HeuristicRule, PageAnalyzer, RuleEntry, RuleTable};
use sumi_atlas::queue::CrawlQueue;
use sumi_atlas::storage::{open_storage, ComponentFilter, Storage};
use sumi_atlas::worker::{RunSummary, Worker, WorkerPool};
use sumi_atlas::{ingest, ArchiveStatus, ComponentType, JobState};

#[tokio::test]
async fn test_navbar_page_is_archived() {
    let queue = memory_queue();
    let fetcher = Arc::new(
        StubFetcher::new().page("x.com", r#"<nav class="navbar"><a>Home</a><a>About</a></nav>"#),
    );
    let receipt = ingest(&queue, "https://x.com").unwrap();

    let worker = Worker::new(queue.clone(), fetcher.clone(), PageAnalyzer::default());
    let summary = WorkerPool::run_until_idle(2, worker).await;
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(fetcher.calls(), 1);

    let storage = queue.storage();
    let archive = storage.get_archive(receipt.archive_id).unwrap();
    assert_eq!(archive.status, ArchiveStatus::Completed);
    assert!(archive.last_crawled_at.is_some());
    assert!(archive.last_error.is_none());

    let snapshots = storage.list_snapshots(receipt.archive_id).unwrap();
    assert_eq!(snapshots.len(), 1);

    let components = storage
        .list_components(&ComponentFilter {
            archive_id: Some(receipt.archive_id),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(components.len(), 1);
    let nav = &components[0];
    assert_eq!(nav.component_type, ComponentType::Nav);
    assert_eq!(nav.name, "NAV - nav0");
    assert!(nav.complexity_score >= 15);
    assert!(nav.tags.contains(&"nav".to_string()));
    assert_eq!(nav.page_snapshot_id, snapshots[0].id);
}

#[tokio::test]
async fn test_fragments_are_sanitized() {
    let queue = memory_queue();
    let fetcher = Arc::new(StubFetcher::new().page("acme.example", ACME_PAGE));
    ingest(&queue, "https://acme.example/").unwrap();

    let worker = Worker::new(queue.clone(), fetcher, PageAnalyzer::default());
    WorkerPool::run_until_idle(1, worker).await;

    let components = queue
        .storage()
        .list_components(&ComponentFilter::default())
        .unwrap();
    let types: Vec<_> = components.iter().map(|c| c.component_type).collect();
    assert!(types.contains(&ComponentType::Nav));
    assert!(types.contains(&ComponentType::Footer));

    for component in &components {
        let html = &component.html_snippet;
        for tag in ["<script", "<style", "<iframe", "<noscript"] {
            assert!(!html.contains(tag), "{} found in {}", tag, html);
        }
        assert!(!html.contains("src=\"/"), "relative src in {}", html);
        assert!(!html.contains("href=\"/"), "relative href in {}", html);
    }

    let nav = components
        .iter()
        .find(|c| c.component_type == ComponentType::Nav)
        .unwrap();
    assert!(nav
        .html_snippet
        .contains(r#"href="https://acme.example/about""#));
    assert!(nav
        .html_snippet
        .contains(r#"src="https://acme.example/img/logo.png""#));
}

#[tokio::test]
async fn test_reingest_while_processing_requeues() {
    let queue = memory_queue();
    let fetcher = Arc::new(GatedFetcher::new(
        r#"<footer class="footer"><p>Acme</p></footer>"#,
    ));
    let worker = Worker::new(queue.clone(), fetcher.clone(), PageAnalyzer::default());
    let pool = WorkerPool::start(1, worker, Duration::from_millis(50));

    let first = ingest(&queue, "https://acme.example").unwrap();
    tokio::time::timeout(Duration::from_secs(5), fetcher.entered.notified())
        .await
        .expect("worker never started the first fetch");

    assert_eq!(
        queue.storage().get_archive(first.archive_id).unwrap().status,
        ArchiveStatus::Processing
    );

    let second = ingest(&queue, "https://acme.example").unwrap();
    assert_eq!(second.archive_id, first.archive_id);
    assert_ne!(second.job_id, first.job_id);
    {
        let storage = queue.storage();
        assert_eq!(
            storage.get_archive(first.archive_id).unwrap().status,
            ArchiveStatus::Pending
        );
        assert_eq!(storage.count_jobs_by_state(JobState::Queued).unwrap(), 1);
        assert_eq!(storage.count_jobs_by_state(JobState::Running).unwrap(), 1);
    }

    fetcher.release.notify_one();
    let drained = eventually(|| {
        queue.storage().count_jobs_by_state(JobState::Done).unwrap() == 2
    })
    .await;
    assert!(drained, "both jobs should finish");

    let summary = pool.shutdown().await;
    assert_eq!(summary.completed, 2);

    let storage = queue.storage();
    assert_eq!(
        storage.get_archive(first.archive_id).unwrap().status,
        ArchiveStatus::Completed
    );
    assert_eq!(storage.count_snapshots(first.archive_id).unwrap(), 2);
}

#[tokio::test]
async fn test_fetch_timeout_fails_archive() {
    let queue = memory_queue();
    let fetcher = Arc::new(StubFetcher::new().timeout("slow.example"));
    let receipt = ingest(&queue, "https://slow.example").unwrap();

    let worker = Worker::new(queue.clone(), fetcher, PageAnalyzer::default());
    let summary = WorkerPool::run_until_idle(1, worker).await;
    assert_eq!(summary.completed, 0);
    assert_eq!(summary.failed, 1);

    let storage = queue.storage();
    let archive = storage.get_archive(receipt.archive_id).unwrap();
    assert_eq!(archive.status, ArchiveStatus::Failed);
    assert!(archive.last_error.unwrap().contains("Timed out"));
    assert_eq!(storage.count_snapshots(receipt.archive_id).unwrap(), 0);

    let job = storage.get_job(receipt.job_id).unwrap();
    assert_eq!(job.state, JobState::Failed);
}

#[tokio::test]
async fn test_failures_do_not_block_other_sites() {
    let queue = memory_queue();
    let fetcher = Arc::new(
        StubFetcher::new()
            .timeout("slow.example")
            .page("acme.example", ACME_PAGE),
    );
    let slow = ingest(&queue, "https://slow.example").unwrap();
    let acme = ingest(&queue, "https://acme.example").unwrap();
    let missing = ingest(&queue, "https://missing.example").unwrap();

    let worker = Worker::new(queue.clone(), fetcher, PageAnalyzer::default());
    let summary = WorkerPool::run_until_idle(3, worker).await;
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 2);

    let storage = queue.storage();
    assert_eq!(
        storage.get_archive(acme.archive_id).unwrap().status,
        ArchiveStatus::Completed
    );
    assert_eq!(
        storage.get_archive(slow.archive_id).unwrap().status,
        ArchiveStatus::Failed
    );
    let missing = storage.get_archive(missing.archive_id).unwrap();
    assert_eq!(missing.status, ArchiveStatus::Failed);
    assert!(missing.last_error.unwrap().contains("ERR_NAME_NOT_RESOLVED"));
}

#[tokio::test]
async fn test_custom_rule_kind_is_stored_as_unknown() {
    let queue = memory_queue();
    let fetcher = Arc::new(StubFetcher::new().page(
        "acme.example",
        r#"<section class="pricing-table"><h2>Plans</h2><p>From $5</p></section>"#,
    ));
    ingest(&queue, "https://acme.example").unwrap();

    let table = RuleTable::with_extra(&[RuleEntry {
        kind: "PRICING".to_string(),
        rule: HeuristicRule {
            tags: vec!["section".to_string()],
            keywords: vec!["pricing".to_string()],
            ..Default::default()
        },
    }]);
    let worker = Worker::new(queue.clone(), fetcher, PageAnalyzer::new(&table));
    WorkerPool::run_until_idle(1, worker).await;

    let components = queue
        .storage()
        .list_components(&ComponentFilter {
            tag: Some("pricing".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(components.len(), 1);
    assert_eq!(components[0].component_type, ComponentType::Unknown);
    assert_eq!(components[0].name, "PRICING - section0");
    assert_eq!(components[0].complexity_score, 15);
}

#[tokio::test]
async fn test_invalid_url_is_rejected_without_writes() {
    let queue = memory_queue();

    assert!(ingest(&queue, "ftp://acme.example/").is_err());
    assert!(ingest(&queue, "not a url").is_err());

    let storage = queue.storage();
    assert!(storage.list_archives().unwrap().is_empty());
    assert_eq!(storage.count_jobs_by_state(JobState::Queued).unwrap(), 0);
}

#[tokio::test]
async fn test_pool_picks_up_jobs_enqueued_after_start() {
    let queue = memory_queue();
    let fetcher = Arc::new(StubFetcher::new().page("acme.example", ACME_PAGE));
    let worker = Worker::new(queue.clone(), fetcher, PageAnalyzer::default());
    let pool = WorkerPool::start(2, worker, Duration::from_millis(50));
    assert_eq!(pool.size(), 2);

    let receipt = ingest(&queue, "https://acme.example").unwrap();
    let done = eventually(|| {
        queue.storage().get_archive(receipt.archive_id).unwrap().status
            == ArchiveStatus::Completed
    })
    .await;
    assert!(done);

    let summary = pool.shutdown().await;
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn test_second_process_leaves_running_job_alone() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("atlas.db");

    let serving = CrawlQueue::new(open_storage(&path).unwrap());
    ingest(&serving, "https://acme.example").unwrap();
    let running = serving.claim().unwrap().unwrap();

    let one_shot = CrawlQueue::new(open_storage(&path).unwrap());
    let fetcher = Arc::new(StubFetcher::new().page("acme.example", ACME_PAGE));
    let worker = Worker::new(one_shot.clone(), fetcher.clone(), PageAnalyzer::default());
    let summary = WorkerPool::run_until_idle(1, worker).await;

    assert_eq!(summary, RunSummary::default());
    assert_eq!(fetcher.calls(), 0);
    assert_eq!(
        one_shot.storage().get_job(running.id).unwrap().state,
        JobState::Running
    );
}

#[tokio::test]
async fn test_recrawl_keeps_one_row_per_component() {
    let queue = memory_queue();
    let fetcher = Arc::new(StubFetcher::new().page("acme.example", ACME_PAGE));
    let receipt = ingest(&queue, "https://acme.example").unwrap();
    let worker = Worker::new(queue.clone(), fetcher, PageAnalyzer::default());

    let job = queue.claim().unwrap().unwrap();
    worker.process_job(&job).await;
    ingest(&queue, "https://acme.example").unwrap();
    let job = queue.claim().unwrap().unwrap();
    worker.process_job(&job).await;

    let storage = queue.storage();
    assert_eq!(storage.count_snapshots(receipt.archive_id).unwrap(), 2);
    let components = storage
        .list_components(&ComponentFilter::default())
        .unwrap();
    let mut names: Vec<_> = components.iter().map(|c| c.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["FOOTER - footer0", "NAV - nav0"]);
}
