//! Paginated JSON fetcher for the external standings/fixtures API.
//!
//! This crate provides:
//! - [`PageFetcher`], a reqwest client with timeout and an opt-in insecure TLS mode
//! - [`PageCursor`], a lazy, finite sequence of pages
//! - [`FetchOutcome`] / [`StopReason`], the concatenated result of a run

pub mod engine;

pub use engine::{
    FetchOutcome, Page, PageCursor, PageFetcher, StopReason, extract_members, page_url,
};
