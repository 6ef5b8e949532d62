//! Shared types, error model, and configuration for the classement sync tool.
//!
//! This crate is the foundation depended on by all other classement crates.
//! It provides:
//! - [`ClassementError`], the unified error type
//! - Domain types ([`StandingsRow`], [`MatchRow`], [`Championship`])
//! - Configuration ([`AppConfig`], [`FetchConfig`], [`TargetConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, FetchConfig, SourceConfig, TargetConfig, TargetSection, config_dir,
    config_file_path, database_path, expand_home, init_config, load_config, load_config_from,
    validate_championships, validate_target,
};
pub use error::{ClassementError, Result};
pub use types::{
    CHAMPIONSHIPS_COLLECTION, Championship, MATCHES_COLLECTION, MatchRow, STANDINGS_COLLECTION,
    Score, StandingsRow, UNKNOWN_TEAM, UNRANKED,
};
