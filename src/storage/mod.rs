//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the atlas, including:
//! - SQLite database initialization and schema management
//! - Site archive, page snapshot and component persistence
//! - Explanation documents produced by enrichment
//! - The persistent crawl job queue

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::{ArchiveStatus, ComponentType, JobState};
use crate::AtlasError;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(AtlasError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, AtlasError> {
    SqliteStorage::new(path)
}

/// Formats a timestamp the way it is stored
///
/// Fixed-width UTC so that lexical order in SQL matches time order.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time in storage format
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Represents a site archive in the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRecord {
    pub id: i64,
    pub root_url: String,
    pub domain: String,
    pub status: ArchiveStatus,
    pub last_crawled_at: Option<String>,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Bookkeeping written together with an archive status change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveStatusUpdate {
    /// Sets `last_crawled_at` when present; the stored value is kept otherwise
    pub last_crawled_at: Option<DateTime<Utc>>,

    /// Replaces `last_error`; `None` clears it
    pub last_error: Option<String>,
}

impl ArchiveStatusUpdate {
    /// Update for a crawl that finished at `at`
    pub fn crawled(at: DateTime<Utc>) -> Self {
        Self {
            last_crawled_at: Some(at),
            last_error: None,
        }
    }

    /// Update for a crawl that failed with `error`
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            last_crawled_at: None,
            last_error: Some(error.into()),
        }
    }
}

/// Represents a fetched page belonging to an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    pub id: i64,
    pub site_archive_id: i64,
    pub url: String,
    pub title: String,
    pub captured_css: String,
    pub captured_at: String,
}

/// Fields of a component about to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComponent {
    pub name: String,
    pub component_type: ComponentType,
    pub selector: String,
    pub html_snippet: String,
    pub complexity_score: u32,
    pub tags: Vec<String>,
    pub is_react: bool,
    pub is_tailwind: bool,
}

/// Represents a stored component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRecord {
    pub id: i64,
    pub page_snapshot_id: i64,
    pub name: String,
    pub component_type: ComponentType,
    pub selector: String,
    pub html_snippet: String,
    pub complexity_score: u32,
    /// Sorted alphabetically
    pub tags: Vec<String>,
    pub is_favorite: bool,
    pub is_react: bool,
    pub is_tailwind: bool,
    pub react_code: Option<String>,
    pub created_at: String,
}

/// Outcome of an idempotent create
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// A new row was written, with its ID
    Created(i64),
    /// A row with the same identity already existed, with its ID
    Duplicate(i64),
}

impl CreateOutcome {
    /// Get the row ID regardless of whether it was created or duplicate
    pub fn id(&self) -> i64 {
        match self {
            Self::Created(id) | Self::Duplicate(id) => *id,
        }
    }

    /// Returns true if this was a newly created row
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Read-side filter over components
///
/// All set criteria must hold. `search` is a case-insensitive substring of
/// the component name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentFilter {
    pub favorite: Option<bool>,
    pub component_type: Option<ComponentType>,
    pub search: Option<String>,
    pub tag: Option<String>,
    pub archive_id: Option<i64>,
    pub limit: Option<u32>,
}

/// Explanation fields produced by enrichment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExplanation {
    pub summary: String,
    pub technical_notes: String,
    pub markdown_content: String,
    pub complexity_rating: String,
    pub tags: Vec<String>,
}

/// Represents a stored explanation document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplanationRecord {
    pub component_id: i64,
    pub summary: String,
    pub technical_notes: String,
    pub markdown_content: String,
    pub complexity_rating: String,
    pub tags: Vec<String>,
    pub created_at: String,
}

/// Represents a crawl job in the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub id: i64,
    pub site_archive_id: i64,
    pub url: String,
    /// Link depth requested at ingest; only the submitted page is fetched
    pub depth: u32,
    pub state: JobState,
    pub attempts: u32,
    pub enqueued_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_create_outcome_id() {
        assert_eq!(CreateOutcome::Created(4).id(), 4);
        assert_eq!(CreateOutcome::Duplicate(9).id(), 9);
        assert!(CreateOutcome::Created(1).is_created());
        assert!(!CreateOutcome::Duplicate(1).is_created());
    }

    #[test]
    fn test_timestamp_is_fixed_width() {
        let whole = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(format_timestamp(whole), "2024-05-01T12:00:00.000000Z");
        assert_eq!(format_timestamp(Utc::now()).len(), format_timestamp(whole).len());
    }

    #[test]
    fn test_status_update_helpers() {
        let failed = ArchiveStatusUpdate::failed("boom");
        assert_eq!(failed.last_error.as_deref(), Some("boom"));
        assert!(failed.last_crawled_at.is_none());

        let crawled = ArchiveStatusUpdate::crawled(Utc::now());
        assert!(crawled.last_crawled_at.is_some());
        assert!(crawled.last_error.is_none());
    }
}
