//! Environment-guarded upsert writer.
//!
//! An [`UpsertWriter`] can only be obtained through [`UpsertWriter::connect`],
//! which checks the store's project identity against the allow-list first.
//! Every write is a full-document replace; last write wins.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use classement_shared::{
    CHAMPIONSHIPS_COLLECTION, Championship, ClassementError, MATCHES_COLLECTION, MatchRow, Result,
    STANDINGS_COLLECTION, StandingsRow, TargetConfig, validate_target,
};
use classement_storage::{BatchOp, DocumentStore, MAX_BATCH_OPS, WriteOutcome};

use crate::pipeline::ProgressReporter;

// ---------------------------------------------------------------------------
// Keys & environment
// ---------------------------------------------------------------------------

/// Derive a document id from a team name (or championship id).
///
/// `/` is a path separator in the store, so it is replaced with `-`.
pub fn document_key(name: &str) -> Result<String> {
    let key = name.trim().replace('/', "-");
    if key.is_empty() || key == "." || key == ".." {
        return Err(ClassementError::validation(format!(
            "cannot derive a document key from '{name}'"
        )));
    }
    Ok(key)
}

/// Check the connected project against the configured target and allow-list.
///
/// Performs no writes. Returns the verified project id.
pub async fn verify_environment<S: DocumentStore>(
    store: &S,
    target: &TargetConfig,
) -> Result<String> {
    validate_target(target)?;
    let connected = store.project_id().await?;

    let allowed = &target.allowed_projects;
    let ok = connected == target.target_project && allowed.iter().any(|p| *p == connected);
    if !ok {
        return Err(ClassementError::EnvironmentMismatch {
            connected,
            expected: target.target_project.clone(),
            allowed: allowed.clone(),
        });
    }

    info!(project = %connected, "environment verified");
    Ok(connected)
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

/// Tally of a write pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Set calls that completed.
    pub written: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl WriteSummary {
    fn record(&mut self, outcome: WriteOutcome) {
        self.written += 1;
        match outcome {
            WriteOutcome::Created => self.created += 1,
            WriteOutcome::Updated => self.updated += 1,
            WriteOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

/// Tally of a bulk clear.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearSummary {
    pub deleted: usize,
    pub batches: usize,
}

// ---------------------------------------------------------------------------
// UpsertWriter
// ---------------------------------------------------------------------------

/// Writer bound to a store whose environment has been verified.
pub struct UpsertWriter<'a, S> {
    store: &'a S,
    project: String,
}

impl<'a, S: DocumentStore> UpsertWriter<'a, S> {
    /// Verify the environment and return a writer. Zero writes happen on failure.
    pub async fn connect(store: &'a S, target: &TargetConfig) -> Result<Self> {
        let project = verify_environment(store, target).await?;
        Ok(Self { store, project })
    }

    /// Verified project id.
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Replace `classement/{team}` for every row.
    ///
    /// Standings are keyed by team name only, so two championships sharing a
    /// team name overwrite each other's document.
    #[instrument(skip_all, fields(rows = rows.len(), project = %self.project))]
    pub async fn write_standings(
        &self,
        rows: &[StandingsRow],
        progress: &dyn ProgressReporter,
    ) -> Result<WriteSummary> {
        let mut seen = HashSet::new();
        let mut keyed = Vec::with_capacity(rows.len());
        for row in rows {
            let key = document_key(&row.team_name)?;
            if !seen.insert(key.clone()) {
                warn!(key = %key, "two rows map to the same document; the later one wins");
            }
            keyed.push((key, row));
        }
        self.write_all(STANDINGS_COLLECTION, keyed, progress).await
    }

    /// Append every match under a fresh time-sortable id.
    #[instrument(skip_all, fields(rows = rows.len(), project = %self.project))]
    pub async fn append_matches(
        &self,
        rows: &[MatchRow],
        progress: &dyn ProgressReporter,
    ) -> Result<WriteSummary> {
        let keyed = rows
            .iter()
            .map(|row| (Uuid::now_v7().to_string(), row))
            .collect();
        self.write_all(MATCHES_COLLECTION, keyed, progress).await
    }

    /// Replace `championnats/{id}` for every championship.
    #[instrument(skip_all, fields(count = championships.len(), project = %self.project))]
    pub async fn publish_championships(
        &self,
        championships: &[Championship],
        progress: &dyn ProgressReporter,
    ) -> Result<WriteSummary> {
        let keyed = championships
            .iter()
            .map(|c| Ok((document_key(&c.id)?, c)))
            .collect::<Result<Vec<_>>>()?;
        self.write_all(CHAMPIONSHIPS_COLLECTION, keyed, progress).await
    }

    /// Delete every document of `collection` in batches of at most [`MAX_BATCH_OPS`].
    #[instrument(skip_all, fields(collection = %collection, project = %self.project))]
    pub async fn clear_collection(&self, collection: &str) -> Result<ClearSummary> {
        let docs = self.store.list_documents(collection).await?;
        let mut summary = ClearSummary::default();

        for chunk in docs.chunks(MAX_BATCH_OPS) {
            let ops: Vec<BatchOp> = chunk
                .iter()
                .map(|d| BatchOp::Delete { id: d.id.clone() })
                .collect();
            self.store
                .commit_batch(collection, &ops)
                .await
                .map_err(|e| e.with_written(summary.deleted))?;
            summary.deleted += ops.len();
            summary.batches += 1;
            debug!(collection, deleted = summary.deleted, "batch deleted");
        }

        info!(
            collection,
            deleted = summary.deleted,
            batches = summary.batches,
            "collection cleared"
        );
        Ok(summary)
    }

    async fn write_all<T: Serialize>(
        &self,
        collection: &str,
        keyed: Vec<(String, &T)>,
        progress: &dyn ProgressReporter,
    ) -> Result<WriteSummary> {
        let total = keyed.len();
        let mut summary = WriteSummary::default();

        for (i, (key, item)) in keyed.into_iter().enumerate() {
            let body = serde_json::to_value(item).map_err(|e| {
                ClassementError::validation(format!("cannot serialize document '{key}': {e}"))
            })?;
            let outcome = self
                .store
                .set_document(collection, &key, &body)
                .await
                .map_err(|e| e.with_written(summary.written))?;
            summary.record(outcome);
            debug!(collection, key = %key, ?outcome, "document written");
            progress.row_written(&key, i + 1, total);
        }

        info!(
            collection,
            written = summary.written,
            created = summary.created,
            updated = summary.updated,
            unchanged = summary.unchanged,
            "write pass finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::SilentProgress;
    use classement_storage::MemoryStore;
    use serde_json::json;

    fn target(project: &str, allowed: &[&str]) -> TargetConfig {
        TargetConfig {
            target_project: project.into(),
            allowed_projects: allowed.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn row(rank: u32, team: &str) -> StandingsRow {
        StandingsRow {
            rank,
            team_name: team.into(),
            points: 10 - rank as i32,
            played: 3,
            wins: 1,
            draws: 1,
            losses: 1,
            goals_for: 4,
            goals_against: 4,
            goal_diff: 0,
            forfeited: false,
            championship_id: Some("r1".into()),
        }
    }

    #[test]
    fn key_replaces_slashes() {
        assert_eq!(document_key("AS Volley / Nord").unwrap(), "AS Volley - Nord");
        assert_eq!(document_key("  Club  ").unwrap(), "Club");
        assert!(document_key("  ").is_err());
        assert!(document_key("..").is_err());
    }

    #[tokio::test]
    async fn mismatch_aborts_with_zero_writes() {
        let store = MemoryStore::new("scratch-project");
        let err = UpsertWriter::connect(&store, &target("classement-prod", &["classement-prod"]))
            .await
            .err()
            .expect("must refuse");
        assert!(matches!(err, ClassementError::EnvironmentMismatch { .. }));
        assert_eq!(store.write_calls(), 0);
    }

    #[tokio::test]
    async fn target_not_on_allow_list_is_refused() {
        let store = MemoryStore::new("classement-dev");
        let err = verify_environment(&store, &target("classement-dev", &["classement-prod"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClassementError::EnvironmentMismatch { ref connected, .. }
                if connected == "classement-dev"
        ));
    }

    #[tokio::test]
    async fn allowed_project_is_verified() {
        let store = MemoryStore::new("classement-staging");
        let writer = UpsertWriter::connect(
            &store,
            &target("classement-staging", &["classement-prod", "classement-staging"]),
        )
        .await
        .expect("verified");
        assert_eq!(writer.project(), "classement-staging");
    }

    #[tokio::test]
    async fn writes_are_idempotent() {
        let store = MemoryStore::new("p");
        let writer = UpsertWriter::connect(&store, &target("p", &["p"])).await.unwrap();
        let rows = vec![row(1, "A"), row(2, "B/C")];

        let first = writer.write_standings(&rows, &SilentProgress).await.unwrap();
        assert_eq!(first.created, 2);
        let before_a = store.raw(STANDINGS_COLLECTION, "A").unwrap();
        let before_bc = store.raw(STANDINGS_COLLECTION, "B-C").unwrap();

        let second = writer.write_standings(&rows, &SilentProgress).await.unwrap();
        assert_eq!(second.unchanged, 2);
        assert_eq!(second.created + second.updated, 0);
        assert_eq!(store.raw(STANDINGS_COLLECTION, "A").unwrap(), before_a);
        assert_eq!(store.raw(STANDINGS_COLLECTION, "B-C").unwrap(), before_bc);
        assert_eq!(store.len(STANDINGS_COLLECTION), 2);
    }

    #[tokio::test]
    async fn store_failure_reports_partial_progress() {
        let store = MemoryStore::new("p").fail_after_sets(2);
        let writer = UpsertWriter::connect(&store, &target("p", &["p"])).await.unwrap();
        let rows = vec![row(1, "A"), row(2, "B"), row(3, "C")];

        let err = writer.write_standings(&rows, &SilentProgress).await.unwrap_err();
        assert!(matches!(err, ClassementError::Store { written: 2, .. }));
    }

    #[tokio::test]
    async fn clearing_1200_documents_takes_three_commits() {
        let store = MemoryStore::new("p");
        store.seed(
            MATCHES_COLLECTION,
            (0..1200).map(|i| (format!("m{i:04}"), json!({ "n": i }))),
        );
        let writer = UpsertWriter::connect(&store, &target("p", &["p"])).await.unwrap();

        let summary = writer.clear_collection(MATCHES_COLLECTION).await.unwrap();
        assert_eq!(summary, ClearSummary { deleted: 1200, batches: 3 });
        assert_eq!(store.batch_sizes(), vec![500, 500, 200]);
        assert!(store.is_empty(MATCHES_COLLECTION));
    }

    #[tokio::test]
    async fn clearing_empty_collection_commits_nothing() {
        let store = MemoryStore::new("p");
        let writer = UpsertWriter::connect(&store, &target("p", &["p"])).await.unwrap();
        let summary = writer.clear_collection(MATCHES_COLLECTION).await.unwrap();
        assert_eq!(summary.batches, 0);
        assert!(store.batch_sizes().is_empty());
    }

    #[tokio::test]
    async fn matches_get_distinct_ids() {
        let store = MemoryStore::new("p");
        let writer = UpsertWriter::connect(&store, &target("p", &["p"])).await.unwrap();
        let m = MatchRow {
            date: None,
            match_day: 1,
            kind: "championnat".into(),
            home_team: "A".into(),
            away_team: "B".into(),
            score: classement_shared::Score::Pending,
            forfeited: false,
            championship_id: None,
        };
        let summary = writer
            .append_matches(&[m.clone(), m], &SilentProgress)
            .await
            .unwrap();
        assert_eq!(summary.created, 2);
        assert_eq!(store.len(MATCHES_COLLECTION), 2);
    }

    #[tokio::test]
    async fn championships_keyed_by_id() {
        let store = MemoryStore::new("p");
        let writer = UpsertWriter::connect(&store, &target("p", &["p"])).await.unwrap();
        let c = Championship {
            id: "r1-m".into(),
            name: "Régionale 1".into(),
            label: "R1M".into(),
            order: 1,
            source_url: "https://api.example.com/r1".into(),
            matches_url: None,
        };
        writer.publish_championships(&[c], &SilentProgress).await.unwrap();
        let doc = store
            .get_document(CHAMPIONSHIPS_COLLECTION, "r1-m")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.body["label"], "R1M");
        assert_eq!(doc.body["sourceUrl"], "https://api.example.com/r1");
    }
}
