//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::{ArchiveStatus, ComponentType, JobState};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    format_timestamp, now_timestamp, ArchiveRecord, ArchiveStatusUpdate, ComponentFilter,
    ComponentRecord, CreateOutcome, ExplanationRecord, JobRecord, NewComponent, NewExplanation,
    SnapshotRecord,
};
use crate::AtlasError;
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;

const ARCHIVE_COLUMNS: &str =
    "id, root_url, domain, status, last_crawled_at, last_error, created_at, updated_at";

const SNAPSHOT_COLUMNS: &str = "id, site_archive_id, url, title, captured_css, captured_at";

const COMPONENT_COLUMNS: &str = "c.id, c.page_snapshot_id, c.name, c.type, c.selector, \
     c.html_snippet, c.complexity_score, c.is_favorite, c.is_react, c.is_tailwind, \
     c.react_code, c.created_at";

const JOB_COLUMNS: &str = "id, site_archive_id, url, depth, state, attempts, enqueued_at, \
     started_at, finished_at, error_message";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(AtlasError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, AtlasError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    ///
    /// Used by tests and by one-shot runs that do not need to persist.
    pub fn new_in_memory() -> Result<Self, AtlasError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Raw connection for tests that install failure triggers
    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    fn load_tags(&self, component_id: i64) -> StorageResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT tag FROM component_tags WHERE component_id = ?1 ORDER BY tag")?;
        let tags = stmt
            .query_map(params![component_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(tags)
    }

    fn component_exists(&self, component_id: i64) -> StorageResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM components WHERE id = ?1",
                params![component_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

/// Maps an unknown enum string to a conversion error for the column
fn invalid_column(index: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        Type::Text,
        format!("unrecognized value '{}'", value).into(),
    )
}

fn archive_from_row(row: &Row<'_>) -> rusqlite::Result<ArchiveRecord> {
    let status: String = row.get(3)?;
    Ok(ArchiveRecord {
        id: row.get(0)?,
        root_url: row.get(1)?,
        domain: row.get(2)?,
        status: ArchiveStatus::from_db_string(&status).ok_or_else(|| invalid_column(3, &status))?,
        last_crawled_at: row.get(4)?,
        last_error: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<SnapshotRecord> {
    Ok(SnapshotRecord {
        id: row.get(0)?,
        site_archive_id: row.get(1)?,
        url: row.get(2)?,
        title: row.get(3)?,
        captured_css: row.get(4)?,
        captured_at: row.get(5)?,
    })
}

/// Builds a component without its tags, which live in their own table
fn component_from_row(row: &Row<'_>) -> rusqlite::Result<ComponentRecord> {
    let kind: String = row.get(3)?;
    Ok(ComponentRecord {
        id: row.get(0)?,
        page_snapshot_id: row.get(1)?,
        name: row.get(2)?,
        component_type: ComponentType::from_db_string(&kind)
            .ok_or_else(|| invalid_column(3, &kind))?,
        selector: row.get(4)?,
        html_snippet: row.get(5)?,
        complexity_score: row.get(6)?,
        tags: Vec::new(),
        is_favorite: row.get(7)?,
        is_react: row.get(8)?,
        is_tailwind: row.get(9)?,
        react_code: row.get(10)?,
        created_at: row.get(11)?,
    })
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<JobRecord> {
    let state: String = row.get(4)?;
    Ok(JobRecord {
        id: row.get(0)?,
        site_archive_id: row.get(1)?,
        url: row.get(2)?,
        depth: row.get(3)?,
        state: JobState::from_db_string(&state).ok_or_else(|| invalid_column(4, &state))?,
        attempts: row.get(5)?,
        enqueued_at: row.get(6)?,
        started_at: row.get(7)?,
        finished_at: row.get(8)?,
        error_message: row.get(9)?,
    })
}

/// Escapes LIKE wildcards so a search term matches literally
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

impl Storage for SqliteStorage {
    // ===== Archives =====

    fn upsert_archive(&mut self, root_url: &str, domain: &str) -> StorageResult<i64> {
        let now = now_timestamp();
        self.conn.execute(
            "INSERT INTO site_archives (root_url, domain, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(root_url) DO UPDATE SET
                 status = excluded.status,
                 domain = excluded.domain,
                 last_error = NULL,
                 updated_at = excluded.updated_at",
            params![root_url, domain, ArchiveStatus::Pending.to_db_string(), now],
        )?;

        let id = self.conn.query_row(
            "SELECT id FROM site_archives WHERE root_url = ?1",
            params![root_url],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn get_archive(&self, archive_id: i64) -> StorageResult<ArchiveRecord> {
        let sql = format!("SELECT {} FROM site_archives WHERE id = ?1", ARCHIVE_COLUMNS);
        self.conn
            .query_row(&sql, params![archive_id], archive_from_row)
            .optional()?
            .ok_or_else(|| StorageError::ArchiveNotFound(archive_id.to_string()))
    }

    fn get_archive_by_url(&self, root_url: &str) -> StorageResult<Option<ArchiveRecord>> {
        let sql = format!(
            "SELECT {} FROM site_archives WHERE root_url = ?1",
            ARCHIVE_COLUMNS
        );
        let archive = self
            .conn
            .query_row(&sql, params![root_url], archive_from_row)
            .optional()?;
        Ok(archive)
    }

    fn list_archives(&self) -> StorageResult<Vec<ArchiveRecord>> {
        let sql = format!(
            "SELECT {} FROM site_archives ORDER BY updated_at DESC, id DESC",
            ARCHIVE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let archives = stmt
            .query_map([], archive_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(archives)
    }

    fn update_archive_status(
        &mut self,
        archive_id: i64,
        status: ArchiveStatus,
        update: ArchiveStatusUpdate,
    ) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE site_archives
             SET status = ?1,
                 updated_at = ?2,
                 last_crawled_at = COALESCE(?3, last_crawled_at),
                 last_error = ?4
             WHERE id = ?5",
            params![
                status.to_db_string(),
                now_timestamp(),
                update.last_crawled_at.map(format_timestamp),
                update.last_error,
                archive_id
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::ArchiveNotFound(archive_id.to_string()));
        }
        Ok(())
    }

    fn count_archives_by_status(&self, status: ArchiveStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM site_archives WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Snapshots =====

    fn create_snapshot(
        &mut self,
        archive_id: i64,
        url: &str,
        title: &str,
        css: &str,
    ) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO page_snapshots (site_archive_id, url, title, captured_css, captured_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![archive_id, url, title, css, now_timestamp()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_snapshot(&self, snapshot_id: i64) -> StorageResult<SnapshotRecord> {
        let sql = format!("SELECT {} FROM page_snapshots WHERE id = ?1", SNAPSHOT_COLUMNS);
        self.conn
            .query_row(&sql, params![snapshot_id], snapshot_from_row)
            .optional()?
            .ok_or(StorageError::SnapshotNotFound(snapshot_id))
    }

    fn list_snapshots(&self, archive_id: i64) -> StorageResult<Vec<SnapshotRecord>> {
        let sql = format!(
            "SELECT {} FROM page_snapshots WHERE site_archive_id = ?1
             ORDER BY captured_at DESC, id DESC",
            SNAPSHOT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let snapshots = stmt
            .query_map(params![archive_id], snapshot_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(snapshots)
    }

    fn count_snapshots(&self, archive_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM page_snapshots WHERE site_archive_id = ?1",
            params![archive_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Components =====

    fn create_component(
        &mut self,
        snapshot_id: i64,
        component: &NewComponent,
    ) -> StorageResult<CreateOutcome> {
        let tx = self.conn.transaction()?;

        let page_url: String = tx
            .query_row(
                "SELECT url FROM page_snapshots WHERE id = ?1",
                params![snapshot_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StorageError::SnapshotNotFound(snapshot_id))?;

        let inserted = tx.execute(
            "INSERT INTO components (
                 page_snapshot_id, page_url, name, type, selector, html_snippet,
                 complexity_score, is_react, is_tailwind, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(page_url, type, selector) DO NOTHING",
            params![
                snapshot_id,
                page_url,
                component.name,
                component.component_type.to_db_string(),
                component.selector,
                component.html_snippet,
                component.complexity_score,
                component.is_react,
                component.is_tailwind,
                now_timestamp()
            ],
        )?;

        if inserted == 0 {
            let existing: i64 = tx.query_row(
                "SELECT id FROM components
                 WHERE page_url = ?1 AND type = ?2 AND selector = ?3",
                params![
                    page_url,
                    component.component_type.to_db_string(),
                    component.selector
                ],
                |row| row.get(0),
            )?;
            tx.commit()?;
            return Ok(CreateOutcome::Duplicate(existing));
        }

        let id = tx.last_insert_rowid();
        for tag in &component.tags {
            tx.execute(
                "INSERT OR IGNORE INTO component_tags (component_id, tag) VALUES (?1, ?2)",
                params![id, tag],
            )?;
        }
        tx.commit()?;

        Ok(CreateOutcome::Created(id))
    }

    fn get_component(&self, component_id: i64) -> StorageResult<ComponentRecord> {
        let sql = format!("SELECT {} FROM components c WHERE c.id = ?1", COMPONENT_COLUMNS);
        let mut component = self
            .conn
            .query_row(&sql, params![component_id], component_from_row)
            .optional()?
            .ok_or(StorageError::ComponentNotFound(component_id))?;
        component.tags = self.load_tags(component_id)?;
        Ok(component)
    }

    fn list_components(&self, filter: &ComponentFilter) -> StorageResult<Vec<ComponentRecord>> {
        let mut sql = format!("SELECT {} FROM components c", COMPONENT_COLUMNS);
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(archive_id) = filter.archive_id {
            sql.push_str(" JOIN page_snapshots s ON s.id = c.page_snapshot_id");
            clauses.push("s.site_archive_id = ?");
            values.push(Value::Integer(archive_id));
        }
        if let Some(favorite) = filter.favorite {
            clauses.push("c.is_favorite = ?");
            values.push(Value::Integer(i64::from(favorite)));
        }
        if let Some(kind) = filter.component_type {
            clauses.push("c.type = ?");
            values.push(Value::Text(kind.to_db_string().to_string()));
        }
        if let Some(search) = filter.search.as_deref().map(str::trim) {
            if !search.is_empty() {
                clauses.push("LOWER(c.name) LIKE ? ESCAPE '\\'");
                values.push(Value::Text(format!(
                    "%{}%",
                    escape_like(&search.to_lowercase())
                )));
            }
        }
        if let Some(tag) = filter.tag.as_deref() {
            clauses.push(
                "EXISTS (SELECT 1 FROM component_tags t
                         WHERE t.component_id = c.id AND LOWER(t.tag) = LOWER(?))",
            );
            values.push(Value::Text(tag.to_string()));
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY c.created_at DESC, c.id DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            values.push(Value::Integer(i64::from(limit)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut components = stmt
            .query_map(params_from_iter(values), component_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        for component in &mut components {
            component.tags = self.load_tags(component.id)?;
        }

        Ok(components)
    }

    fn count_components_by_type(&self, component_type: ComponentType) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM components WHERE type = ?1",
            params![component_type.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn set_favorite(&mut self, component_id: i64, favorite: bool) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE components SET is_favorite = ?1 WHERE id = ?2",
            params![favorite, component_id],
        )?;
        if changed == 0 {
            return Err(StorageError::ComponentNotFound(component_id));
        }
        Ok(())
    }

    fn set_react_code(&mut self, component_id: i64, code: &str) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE components SET react_code = ?1 WHERE id = ?2",
            params![code, component_id],
        )?;
        if changed == 0 {
            return Err(StorageError::ComponentNotFound(component_id));
        }
        Ok(())
    }

    fn add_component_tags(&mut self, component_id: i64, tags: &[String]) -> StorageResult<()> {
        if !self.component_exists(component_id)? {
            return Err(StorageError::ComponentNotFound(component_id));
        }

        let tx = self.conn.transaction()?;
        for tag in tags {
            let tag = tag.trim();
            if tag.is_empty() {
                continue;
            }
            tx.execute(
                "INSERT OR IGNORE INTO component_tags (component_id, tag) VALUES (?1, ?2)",
                params![component_id, tag],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    // ===== Explanations =====

    fn upsert_explanation(
        &mut self,
        component_id: i64,
        explanation: &NewExplanation,
    ) -> StorageResult<()> {
        if !self.component_exists(component_id)? {
            return Err(StorageError::ComponentNotFound(component_id));
        }

        let tags = serde_json::to_string(&explanation.tags)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        self.conn.execute(
            "INSERT INTO explanation_docs (
                 component_id, summary, technical_notes, markdown_content,
                 complexity_rating, tags, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(component_id) DO UPDATE SET
                 summary = excluded.summary,
                 technical_notes = excluded.technical_notes,
                 markdown_content = excluded.markdown_content,
                 complexity_rating = excluded.complexity_rating,
                 tags = excluded.tags,
                 created_at = excluded.created_at",
            params![
                component_id,
                explanation.summary,
                explanation.technical_notes,
                explanation.markdown_content,
                explanation.complexity_rating,
                tags,
                now_timestamp()
            ],
        )?;
        Ok(())
    }

    fn get_explanation(&self, component_id: i64) -> StorageResult<Option<ExplanationRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT component_id, summary, technical_notes, markdown_content,
                        complexity_rating, tags, created_at
                 FROM explanation_docs WHERE component_id = ?1",
                params![component_id],
                |row| {
                    Ok((
                        ExplanationRecord {
                            component_id: row.get(0)?,
                            summary: row.get(1)?,
                            technical_notes: row.get(2)?,
                            markdown_content: row.get(3)?,
                            complexity_rating: row.get(4)?,
                            tags: Vec::new(),
                            created_at: row.get(6)?,
                        },
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((mut record, tags)) => {
                record.tags = serde_json::from_str(&tags)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    // ===== Job Queue =====

    fn enqueue_job(&mut self, archive_id: i64, url: &str, depth: u32) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO crawl_jobs (site_archive_id, url, depth, state, enqueued_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                archive_id,
                url,
                depth,
                JobState::Queued.to_db_string(),
                now_timestamp()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn claim_next_job(&mut self) -> StorageResult<Option<JobRecord>> {
        let sql = format!(
            "UPDATE crawl_jobs
             SET state = ?1, started_at = ?2, attempts = attempts + 1
             WHERE id = (SELECT id FROM crawl_jobs WHERE state = ?3 ORDER BY id LIMIT 1)
             RETURNING {}",
            JOB_COLUMNS
        );
        let job = self
            .conn
            .query_row(
                &sql,
                params![
                    JobState::Running.to_db_string(),
                    now_timestamp(),
                    JobState::Queued.to_db_string()
                ],
                job_from_row,
            )
            .optional()?;
        Ok(job)
    }

    fn finish_job(&mut self, job_id: i64) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE crawl_jobs SET state = ?1, finished_at = ?2, error_message = NULL
             WHERE id = ?3",
            params![JobState::Done.to_db_string(), now_timestamp(), job_id],
        )?;
        if changed == 0 {
            return Err(StorageError::JobNotFound(job_id));
        }
        Ok(())
    }

    fn fail_job(&mut self, job_id: i64, error_message: &str) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE crawl_jobs SET state = ?1, finished_at = ?2, error_message = ?3
             WHERE id = ?4",
            params![
                JobState::Failed.to_db_string(),
                now_timestamp(),
                error_message,
                job_id
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::JobNotFound(job_id));
        }
        Ok(())
    }

    fn get_job(&self, job_id: i64) -> StorageResult<JobRecord> {
        let sql = format!("SELECT {} FROM crawl_jobs WHERE id = ?1", JOB_COLUMNS);
        self.conn
            .query_row(&sql, params![job_id], job_from_row)
            .optional()?
            .ok_or(StorageError::JobNotFound(job_id))
    }

    fn requeue_interrupted_jobs(&mut self, claimed_before: DateTime<Utc>) -> StorageResult<usize> {
        let requeued = self.conn.execute(
            "UPDATE crawl_jobs SET state = ?1, started_at = NULL
             WHERE state = ?2 AND (started_at IS NULL OR started_at < ?3)",
            params![
                JobState::Queued.to_db_string(),
                JobState::Running.to_db_string(),
                format_timestamp(claimed_before)
            ],
        )?;
        Ok(requeued)
    }

    fn count_jobs_by_state(&self, state: JobState) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM crawl_jobs WHERE state = ?1",
            params![state.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
