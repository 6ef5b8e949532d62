//! Document store abstraction and its implementations.
//!
//! The [`DocumentStore`] trait is the only way pipelines touch persistence:
//! read-all per collection, full-document set, and bounded batch commits,
//! plus the project identity used by the environment guard.
//!
//! Implementations:
//! - [`Storage`], a libSQL database file (one `documents` table)
//! - [`MemoryStore`], an in-process double that counts calls

mod memory;
mod migrations;

use std::path::Path;

use chrono::Utc;
use classement_shared::{ClassementError, Result};
use libsql::{Connection, Database, params};
use serde_json::Value;
use sha2::{Digest, Sha256};

pub use memory::MemoryStore;

/// Maximum number of operations accepted in a single batch commit.
pub const MAX_BATCH_OPS: usize = 500;

/// `store_meta` key holding the project identity.
const PROJECT_KEY: &str = "project_id";

// ---------------------------------------------------------------------------
// Store contract
// ---------------------------------------------------------------------------

/// A stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub body: Value,
}

/// What a full-document set did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Updated,
    /// The stored body was already byte-identical.
    Unchanged,
}

/// One operation inside a batch commit.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    Set { id: String, body: Value },
    Delete { id: String },
}

/// Opaque document-store collaborator.
///
/// Writes are last-write-wins full replaces; there is no merge and no
/// concurrency token.
#[allow(async_fn_in_trait)]
pub trait DocumentStore {
    /// Identity of the project this store is bound to.
    async fn project_id(&self) -> Result<String>;

    /// All documents of a collection, ordered by id.
    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>>;

    /// One document, if present.
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Create or fully replace a document.
    async fn set_document(&self, collection: &str, id: &str, body: &Value) -> Result<WriteOutcome>;

    /// Apply up to [`MAX_BATCH_OPS`] operations atomically.
    async fn commit_batch(&self, collection: &str, ops: &[BatchOp]) -> Result<()>;
}

/// Serialize a body deterministically (object keys sorted).
pub fn canonical_body(body: &Value) -> Result<String> {
    serde_json::to_string(body).map_err(|e| ClassementError::store(e.to_string()))
}

/// SHA-256 of a canonical body.
pub fn content_hash(canonical: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Reject ids the store cannot address.
pub(crate) fn check_id(id: &str) -> Result<()> {
    if id.is_empty() || id.contains('/') || id == "." || id == ".." {
        return Err(ClassementError::validation(format!(
            "invalid document id '{id}'"
        )));
    }
    Ok(())
}

pub(crate) fn check_batch(ops: &[BatchOp]) -> Result<()> {
    if ops.len() > MAX_BATCH_OPS {
        return Err(ClassementError::validation(format!(
            "batch of {} operations exceeds the limit of {MAX_BATCH_OPS}",
            ops.len()
        )));
    }
    for op in ops {
        match op {
            BatchOp::Set { id, .. } | BatchOp::Delete { id } => check_id(id)?,
        }
    }
    Ok(())
}

fn store_err(e: impl std::fmt::Display) -> ClassementError {
    ClassementError::store(e.to_string())
}

// ---------------------------------------------------------------------------
// libSQL-backed store
// ---------------------------------------------------------------------------

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Create (or reopen) a database bound to `project_id`.
    ///
    /// Fails if the file is already bound to a different project.
    pub async fn create(path: &Path, project_id: &str) -> Result<Self> {
        if project_id.trim().is_empty() {
            return Err(ClassementError::validation("project id must not be empty"));
        }
        let storage = Self::connect(path, false).await?;
        storage.run_migrations().await?;

        match storage.meta_value(PROJECT_KEY).await? {
            Some(existing) if existing != project_id => {
                return Err(ClassementError::validation(format!(
                    "database {} is already bound to project '{existing}'",
                    path.display()
                )));
            }
            Some(_) => {}
            None => {
                storage
                    .conn
                    .execute(
                        "INSERT INTO store_meta (key, value) VALUES (?1, ?2)",
                        params![PROJECT_KEY, project_id],
                    )
                    .await
                    .map_err(store_err)?;
                tracing::info!(project_id, path = %path.display(), "bound database to project");
            }
        }
        Ok(storage)
    }

    /// Open an existing database in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        Self::require_file(path)?;
        let storage = Self::connect(path, false).await?;
        storage.run_migrations().await?;
        storage.project_id().await?;
        Ok(storage)
    }

    /// Open an existing database in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        Self::require_file(path)?;
        Self::connect(path, true).await
    }

    fn require_file(path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(ClassementError::config(format!(
                "no database at {}. Run `classement store init --project <id>` first",
                path.display()
            )));
        }
        Ok(())
    }

    async fn connect(path: &Path, readonly: bool) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ClassementError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(store_err)?;
        let conn = db.connect().map_err(store_err)?;

        Ok(Self { db, conn, readonly })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        ClassementError::store(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(ClassementError::store(
                "database is opened in read-only mode",
            ));
        }
        Ok(())
    }

    async fn meta_value(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM store_meta WHERE key = ?1", params![key])
            .await
            .map_err(store_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row.get::<String>(0).map_err(store_err)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(store_err(e)),
        }
    }

    async fn stored_hash(&self, collection: &str, id: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT content_hash FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
            )
            .await
            .map_err(store_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row.get::<String>(0).map_err(store_err)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(store_err(e)),
        }
    }
}

/// Upsert statement shared by single sets and batch sets.
const UPSERT_SQL: &str = "INSERT INTO documents (collection, id, body, content_hash, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5)
     ON CONFLICT(collection, id) DO UPDATE SET
       body = excluded.body,
       content_hash = excluded.content_hash,
       updated_at = excluded.updated_at";

impl DocumentStore for Storage {
    async fn project_id(&self) -> Result<String> {
        self.meta_value(PROJECT_KEY).await?.ok_or_else(|| {
            ClassementError::config("database has no project identity; run `classement store init`")
        })
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, body FROM documents WHERE collection = ?1 ORDER BY id",
                params![collection],
            )
            .await
            .map_err(store_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(store_err)? {
            results.push(row_to_document(&row)?);
        }
        Ok(results)
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, body FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
            )
            .await
            .map_err(store_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_document(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(store_err(e)),
        }
    }

    async fn set_document(&self, collection: &str, id: &str, body: &Value) -> Result<WriteOutcome> {
        self.check_writable()?;
        check_id(id)?;

        let canonical = canonical_body(body)?;
        let hash = content_hash(&canonical);
        let outcome = match self.stored_hash(collection, id).await? {
            None => WriteOutcome::Created,
            Some(existing) if existing == hash => return Ok(WriteOutcome::Unchanged),
            Some(_) => WriteOutcome::Updated,
        };

        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                UPSERT_SQL,
                params![collection, id, canonical.as_str(), hash.as_str(), now.as_str()],
            )
            .await
            .map_err(store_err)?;
        Ok(outcome)
    }

    async fn commit_batch(&self, collection: &str, ops: &[BatchOp]) -> Result<()> {
        self.check_writable()?;
        check_batch(ops)?;

        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction().await.map_err(store_err)?;
        for op in ops {
            match op {
                BatchOp::Set { id, body } => {
                    let canonical = canonical_body(body)?;
                    let hash = content_hash(&canonical);
                    tx.execute(
                        UPSERT_SQL,
                        params![
                            collection,
                            id.as_str(),
                            canonical.as_str(),
                            hash.as_str(),
                            now.as_str()
                        ],
                    )
                    .await
                    .map_err(store_err)?;
                }
                BatchOp::Delete { id } => {
                    tx.execute(
                        "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                        params![collection, id.as_str()],
                    )
                    .await
                    .map_err(store_err)?;
                }
            }
        }
        tx.commit().await.map_err(store_err)?;
        tracing::debug!(collection, ops = ops.len(), "batch committed");
        Ok(())
    }
}

/// Convert a database row (`id`, `body`) to a [`Document`].
fn row_to_document(row: &libsql::Row) -> Result<Document> {
    let id: String = row.get(0).map_err(store_err)?;
    let raw: String = row.get(1).map_err(store_err)?;
    let body = serde_json::from_str(&raw)
        .map_err(|e| ClassementError::store(format!("corrupt document '{id}': {e}")))?;
    Ok(Document { id, body })
}
