//! In-process [`DocumentStore`] used for dry runs and tests.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use classement_shared::{ClassementError, Result};
use serde_json::Value;

use crate::{
    BatchOp, Document, DocumentStore, WriteOutcome, canonical_body, check_batch, check_id,
};

#[derive(Default)]
struct Inner {
    /// `(collection, id)` to canonical body.
    docs: BTreeMap<(String, String), String>,
    set_calls: usize,
    batch_sizes: Vec<usize>,
    fail_after_sets: Option<usize>,
}

/// Memory-backed store that records how it was called.
pub struct MemoryStore {
    project_id: String,
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Make every `set_document` call after the first `n` fail.
    pub fn fail_after_sets(self, n: usize) -> Self {
        self.lock().fail_after_sets = Some(n);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of `set_document` calls, including unchanged ones.
    pub fn set_calls(&self) -> usize {
        self.lock().set_calls
    }

    /// Size of each committed batch, in commit order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.lock().batch_sizes.clone()
    }

    /// Total write calls of any kind.
    pub fn write_calls(&self) -> usize {
        let inner = self.lock();
        inner.set_calls + inner.batch_sizes.len()
    }

    /// Number of documents currently in `collection`.
    pub fn len(&self, collection: &str) -> usize {
        self.lock()
            .docs
            .keys()
            .filter(|(c, _)| c == collection)
            .count()
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Canonical stored body, for byte-level comparisons.
    pub fn raw(&self, collection: &str, id: &str) -> Option<String> {
        self.lock()
            .docs
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
    }

    /// Seed documents without counting them as writes.
    pub fn seed(&self, collection: &str, docs: impl IntoIterator<Item = (String, Value)>) {
        let mut inner = self.lock();
        for (id, body) in docs {
            let canonical = body.to_string();
            inner.docs.insert((collection.to_string(), id), canonical);
        }
    }
}

impl DocumentStore for MemoryStore {
    async fn project_id(&self) -> Result<String> {
        Ok(self.project_id.clone())
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>> {
        let inner = self.lock();
        inner
            .docs
            .iter()
            .filter(|((c, _), _)| c == collection)
            .map(|((_, id), raw)| parse(id, raw))
            .collect()
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let inner = self.lock();
        inner
            .docs
            .get(&(collection.to_string(), id.to_string()))
            .map(|raw| parse(id, raw))
            .transpose()
    }

    async fn set_document(&self, collection: &str, id: &str, body: &Value) -> Result<WriteOutcome> {
        check_id(id)?;
        let canonical = canonical_body(body)?;

        let mut inner = self.lock();
        if inner.fail_after_sets.is_some_and(|n| inner.set_calls >= n) {
            return Err(ClassementError::store("simulated write failure"));
        }
        inner.set_calls += 1;

        let key = (collection.to_string(), id.to_string());
        let outcome = match inner.docs.get(&key) {
            None => WriteOutcome::Created,
            Some(existing) if *existing == canonical => WriteOutcome::Unchanged,
            Some(_) => WriteOutcome::Updated,
        };
        inner.docs.insert(key, canonical);
        Ok(outcome)
    }

    async fn commit_batch(&self, collection: &str, ops: &[BatchOp]) -> Result<()> {
        check_batch(ops)?;

        let mut staged = Vec::with_capacity(ops.len());
        for op in ops {
            match op {
                BatchOp::Set { id, body } => staged.push((id, Some(canonical_body(body)?))),
                BatchOp::Delete { id } => staged.push((id, None)),
            }
        }

        let mut inner = self.lock();
        for (id, body) in staged {
            let key = (collection.to_string(), id.clone());
            match body {
                Some(canonical) => {
                    inner.docs.insert(key, canonical);
                }
                None => {
                    inner.docs.remove(&key);
                }
            }
        }
        inner.batch_sizes.push(ops.len());
        Ok(())
    }
}

fn parse(id: &str, raw: &str) -> Result<Document> {
    let body = serde_json::from_str(raw)
        .map_err(|e| ClassementError::store(format!("corrupt document '{id}': {e}")))?;
    Ok(Document {
        id: id.to_string(),
        body,
    })
}
