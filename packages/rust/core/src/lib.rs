//! Sync orchestration and domain logic for classement.
//!
//! This crate ties fetching, normalization, rank ordering, and guarded
//! writes into end-to-end runs (e.g., `sync_standings`).

pub mod pipeline;
pub mod ranking;
pub mod writer;

pub use pipeline::{
    ProgressReporter, SilentProgress, SyncConfig, SyncReport, SyncRun, SyncState, clear, publish,
    sync_matches, sync_standings,
};
pub use ranking::{RankingReport, inspect_ranking, sort_by_rank};
pub use writer::{ClearSummary, UpsertWriter, WriteSummary, document_key, verify_environment};
