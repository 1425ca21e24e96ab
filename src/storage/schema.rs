//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Sumi-Atlas database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per root URL under crawl
CREATE TABLE IF NOT EXISTS site_archives (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    root_url TEXT NOT NULL UNIQUE,
    domain TEXT NOT NULL,
    status TEXT NOT NULL,
    last_crawled_at TEXT,
    last_error TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_site_archives_status ON site_archives(status);

-- One fetched page per successful crawl
CREATE TABLE IF NOT EXISTS page_snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_archive_id INTEGER NOT NULL REFERENCES site_archives(id) ON DELETE CASCADE,
    url TEXT NOT NULL,
    title TEXT NOT NULL,
    captured_css TEXT NOT NULL,
    captured_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_page_snapshots_archive ON page_snapshots(site_archive_id);

-- Extracted UI fragments; a page URL holds one component per type and selector
CREATE TABLE IF NOT EXISTS components (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    page_snapshot_id INTEGER NOT NULL REFERENCES page_snapshots(id) ON DELETE CASCADE,
    page_url TEXT NOT NULL,
    name TEXT NOT NULL,
    type TEXT NOT NULL,
    selector TEXT NOT NULL,
    html_snippet TEXT NOT NULL,
    complexity_score INTEGER NOT NULL CHECK (complexity_score >= 0),
    is_favorite INTEGER NOT NULL DEFAULT 0,
    is_react INTEGER NOT NULL DEFAULT 0,
    is_tailwind INTEGER NOT NULL DEFAULT 0,
    react_code TEXT,
    created_at TEXT NOT NULL,
    UNIQUE(page_url, type, selector)
);

CREATE INDEX IF NOT EXISTS idx_components_snapshot ON components(page_snapshot_id);
CREATE INDEX IF NOT EXISTS idx_components_type ON components(type);
CREATE INDEX IF NOT EXISTS idx_components_favorite ON components(is_favorite);

CREATE TABLE IF NOT EXISTS component_tags (
    component_id INTEGER NOT NULL REFERENCES components(id) ON DELETE CASCADE,
    tag TEXT NOT NULL,
    PRIMARY KEY (component_id, tag)
);

CREATE INDEX IF NOT EXISTS idx_component_tags_tag ON component_tags(tag);

-- Enrichment output, one per component
CREATE TABLE IF NOT EXISTS explanation_docs (
    component_id INTEGER PRIMARY KEY REFERENCES components(id) ON DELETE CASCADE,
    summary TEXT NOT NULL,
    technical_notes TEXT NOT NULL,
    markdown_content TEXT NOT NULL,
    complexity_rating TEXT NOT NULL,
    tags TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Persistent crawl job queue
CREATE TABLE IF NOT EXISTS crawl_jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_archive_id INTEGER NOT NULL REFERENCES site_archives(id) ON DELETE CASCADE,
    url TEXT NOT NULL,
    depth INTEGER NOT NULL DEFAULT 0,
    state TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    enqueued_at TEXT NOT NULL,
    started_at TEXT,
    finished_at TEXT,
    error_message TEXT
);

CREATE INDEX IF NOT EXISTS idx_crawl_jobs_state ON crawl_jobs(state, id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.pragma_update(None, "user_version", get_schema_version())?;
    Ok(())
}

/// Gets the current schema version
///
/// Stored in `PRAGMA user_version` for future migrations.
pub fn get_schema_version() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize_schema(&conn).unwrap();
        let result = initialize_schema(&conn);

        assert!(result.is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let tables = vec![
            "site_archives",
            "page_snapshots",
            "components",
            "component_tags",
            "explanation_docs",
            "crawl_jobs",
        ];

        for table in tables {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_user_version_recorded() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        let version: u32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, get_schema_version());
    }
}
