//! End-to-end sync pipelines: verify environment → fetch → normalize → sort → write.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use classement_fetcher::{FetchOutcome, PageFetcher, StopReason};
use classement_normalizer::Normalizer;
use classement_shared::{
    Championship, ClassementError, MATCHES_COLLECTION, Result, TargetConfig,
    validate_championships,
};
use classement_storage::DocumentStore;

use crate::ranking::{RankingReport, inspect_ranking, sort_by_rank};
use crate::writer::{ClearSummary, UpsertWriter, WriteSummary};

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

/// Phase of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    VerifyingEnvironment,
    Fetching,
    Normalizing,
    Sorting,
    Writing,
    Done,
    Failed,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::VerifyingEnvironment => "verifying-environment",
            Self::Fetching => "fetching",
            Self::Normalizing => "normalizing",
            Self::Sorting => "sorting",
            Self::Writing => "writing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sync run and the states it went through.
#[derive(Debug, Clone)]
pub struct SyncRun {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    history: Vec<SyncState>,
}

impl SyncRun {
    pub fn new() -> Self {
        Self {
            id: Uuid::now_v7(),
            started_at: Utc::now(),
            history: vec![SyncState::Idle],
        }
    }

    /// Current state.
    pub fn state(&self) -> SyncState {
        self.history
            .last()
            .copied()
            .unwrap_or(SyncState::Idle)
    }

    /// Every state entered, in order.
    pub fn history(&self) -> &[SyncState] {
        &self.history
    }

    fn advance(&mut self, next: SyncState) {
        debug!(run_id = %self.id, from = %self.state(), to = %next, "sync state change");
        self.history.push(next);
    }

    fn fail(&mut self, err: &ClassementError) {
        error!(run_id = %self.id, at = %self.state(), error = %err, "sync run failed");
        self.history.push(SyncState::Failed);
    }
}

impl Default for SyncRun {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Config / report
// ---------------------------------------------------------------------------

/// Configuration for one sync run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Paginated endpoint to read.
    pub source_url: Url,
    /// Championship stamped onto every row.
    pub championship_id: Option<String>,
    /// Write target and allow-list.
    pub target: TargetConfig,
    /// Bulk-clear the collection before appending (matches only).
    pub clear_first: bool,
}

/// Result of a completed sync run.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub rows_fetched: usize,
    pub pages_fetched: u32,
    /// Why pagination ended. A failure here means the rows are partial.
    pub stop: StopReason,
    /// Standings only.
    pub ranking: Option<RankingReport>,
    pub writes: WriteSummary,
    pub cleared: Option<ClearSummary>,
    pub states: Vec<SyncState>,
    pub elapsed: Duration,
}

impl SyncReport {
    /// `true` when pagination ended on an upstream or transport failure.
    pub fn is_partial(&self) -> bool {
        self.stop.is_failure()
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each non-empty page.
    fn page_fetched(&self, page: u32, rows: usize);
    /// Called after each document write.
    fn row_written(&self, key: &str, current: usize, total: usize);
    /// Called when a run completes.
    fn done(&self, report: &SyncReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn page_fetched(&self, _page: u32, _rows: usize) {}
    fn row_written(&self, _key: &str, _current: usize, _total: usize) {}
    fn done(&self, _report: &SyncReport) {}
}

// ---------------------------------------------------------------------------
// Pipelines
// ---------------------------------------------------------------------------

/// Sync one championship's standings into `classement`.
///
/// The environment is verified before anything is fetched. A fetch failure
/// on the first page fails the run; a later one keeps the partial rows.
#[instrument(skip_all, fields(run_id = %run.id, source = %config.source_url))]
pub async fn sync_standings<S: DocumentStore>(
    store: &S,
    fetcher: &PageFetcher,
    config: &SyncConfig,
    run: &mut SyncRun,
    progress: &dyn ProgressReporter,
) -> Result<SyncReport> {
    let start = Instant::now();
    let result = standings_steps(store, fetcher, config, run, progress).await;
    finish(run, result, start, progress)
}

async fn standings_steps<S: DocumentStore>(
    store: &S,
    fetcher: &PageFetcher,
    config: &SyncConfig,
    run: &mut SyncRun,
    progress: &dyn ProgressReporter,
) -> Result<SyncReport> {
    let writer = connect(store, &config.target, run, progress).await?;
    let fetched = fetch(fetcher, &config.source_url, run, progress).await?;

    run.advance(SyncState::Normalizing);
    progress.phase("Normalizing rows");
    let rows = normalizer(config).standings(&fetched.rows)?;

    run.advance(SyncState::Sorting);
    progress.phase("Sorting by rank");
    let rows = sort_by_rank(rows);
    let ranking = inspect_ranking(&rows);
    log_ranking(&ranking);

    run.advance(SyncState::Writing);
    progress.phase("Writing standings");
    let writes = writer.write_standings(&rows, progress).await?;

    Ok(report(run, fetched, Some(ranking), writes, None))
}

/// Sync one championship's fixtures into `matchs`.
///
/// Matches are appended; `clear_first` empties the collection beforehand.
#[instrument(skip_all, fields(run_id = %run.id, source = %config.source_url))]
pub async fn sync_matches<S: DocumentStore>(
    store: &S,
    fetcher: &PageFetcher,
    config: &SyncConfig,
    run: &mut SyncRun,
    progress: &dyn ProgressReporter,
) -> Result<SyncReport> {
    let start = Instant::now();
    let result = matches_steps(store, fetcher, config, run, progress).await;
    finish(run, result, start, progress)
}

async fn matches_steps<S: DocumentStore>(
    store: &S,
    fetcher: &PageFetcher,
    config: &SyncConfig,
    run: &mut SyncRun,
    progress: &dyn ProgressReporter,
) -> Result<SyncReport> {
    let writer = connect(store, &config.target, run, progress).await?;
    let fetched = fetch(fetcher, &config.source_url, run, progress).await?;

    run.advance(SyncState::Normalizing);
    progress.phase("Normalizing rows");
    let rows = normalizer(config).matches(&fetched.rows)?;

    run.advance(SyncState::Writing);
    let cleared = if config.clear_first {
        progress.phase("Clearing matches");
        Some(writer.clear_collection(MATCHES_COLLECTION).await?)
    } else {
        None
    };
    progress.phase("Writing matches");
    let writes = writer.append_matches(&rows, progress).await?;

    Ok(report(run, fetched, None, writes, cleared))
}

/// Publish championship metadata into `championnats`.
#[instrument(skip_all, fields(count = championships.len()))]
pub async fn publish<S: DocumentStore>(
    store: &S,
    target: &TargetConfig,
    championships: &[Championship],
    progress: &dyn ProgressReporter,
) -> Result<WriteSummary> {
    validate_championships(championships)?;
    progress.phase("Verifying environment");
    let writer = UpsertWriter::connect(store, target).await?;
    progress.phase("Publishing championships");
    writer.publish_championships(championships, progress).await
}

/// Delete every document of `collection` after verifying the environment.
#[instrument(skip_all, fields(collection = %collection))]
pub async fn clear<S: DocumentStore>(
    store: &S,
    target: &TargetConfig,
    collection: &str,
    progress: &dyn ProgressReporter,
) -> Result<ClearSummary> {
    progress.phase("Verifying environment");
    let writer = UpsertWriter::connect(store, target).await?;
    progress.phase("Clearing collection");
    writer.clear_collection(collection).await
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

async fn connect<'a, S: DocumentStore>(
    store: &'a S,
    target: &TargetConfig,
    run: &mut SyncRun,
    progress: &dyn ProgressReporter,
) -> Result<UpsertWriter<'a, S>> {
    run.advance(SyncState::VerifyingEnvironment);
    progress.phase("Verifying environment");
    UpsertWriter::connect(store, target).await
}

async fn fetch(
    fetcher: &PageFetcher,
    source: &Url,
    run: &mut SyncRun,
    progress: &dyn ProgressReporter,
) -> Result<FetchOutcome> {
    run.advance(SyncState::Fetching);
    progress.phase("Fetching pages");

    let outcome = fetcher
        .fetch_all_with(source, fetcher.config().start_page, |page| {
            progress.page_fetched(page.number, page.rows.len());
        })
        .await;

    if outcome.pages_fetched == 0 {
        if let Some(err) = outcome.stop.to_error() {
            return Err(err);
        }
    } else if outcome.stop.is_failure() {
        warn!(
            rows = outcome.rows.len(),
            stopped_at = outcome.stop.page(),
            "pagination failed after some pages; writing partial rows"
        );
    }

    Ok(outcome)
}

fn normalizer(config: &SyncConfig) -> Normalizer {
    match &config.championship_id {
        Some(id) => Normalizer::new().with_championship(id.clone()),
        None => Normalizer::new(),
    }
}

fn log_ranking(report: &RankingReport) {
    if !report.gaps.is_empty() {
        warn!(
            gaps = ?report.gaps,
            missing = report.missing_ranks(),
            "ranks missing from standings"
        );
    }
    for (rank, teams) in &report.ties {
        warn!(rank, teams = ?teams, "rank shared by several teams");
    }
    if !report.unranked.is_empty() {
        warn!(teams = ?report.unranked, "rows without a rank, sorted last");
    }
    if !report.inconsistent.is_empty() {
        warn!(teams = ?report.inconsistent, "rows with inconsistent counters");
    }
}

fn report(
    run: &SyncRun,
    fetched: FetchOutcome,
    ranking: Option<RankingReport>,
    writes: WriteSummary,
    cleared: Option<ClearSummary>,
) -> SyncReport {
    SyncReport {
        run_id: run.id,
        started_at: run.started_at,
        rows_fetched: fetched.rows.len(),
        pages_fetched: fetched.pages_fetched,
        stop: fetched.stop,
        ranking,
        writes,
        cleared,
        states: Vec::new(),
        elapsed: Duration::ZERO,
    }
}

fn finish(
    run: &mut SyncRun,
    result: Result<SyncReport>,
    start: Instant,
    progress: &dyn ProgressReporter,
) -> Result<SyncReport> {
    match result {
        Ok(mut report) => {
            run.advance(SyncState::Done);
            report.states = run.history().to_vec();
            report.elapsed = start.elapsed();
            progress.done(&report);

            info!(
                run_id = %report.run_id,
                rows = report.rows_fetched,
                pages = report.pages_fetched,
                written = report.writes.written,
                partial = report.is_partial(),
                elapsed_ms = report.elapsed.as_millis(),
                "sync complete"
            );
            Ok(report)
        }
        Err(e) => {
            run.fail(&e);
            Err(e)
        }
    }
}
