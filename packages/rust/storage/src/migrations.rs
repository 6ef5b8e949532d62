//! SQL migration definitions for the local document database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: store_meta, documents",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Store identity (project_id) and other key/value metadata
CREATE TABLE IF NOT EXISTS store_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- One row per document, full JSON body
CREATE TABLE IF NOT EXISTS documents (
    collection   TEXT NOT NULL,
    id           TEXT NOT NULL,
    body         TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    updated_at   TEXT NOT NULL,
    PRIMARY KEY (collection, id)
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
