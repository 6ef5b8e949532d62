//! Source shape trait and built-in shapes for record normalization.
//!
//! Shapes recognize one upstream JSON layout and map its records onto the
//! canonical [`StandingsRow`] / [`MatchRow`].

mod dofa;
mod flat;

use serde_json::Value;

use classement_shared::{MatchRow, Result, StandingsRow, UNRANKED};

pub use dofa::DofaShape;
pub use flat::FlatShape;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Trait for a source-specific record layout.
///
/// Shapes are tried in priority order; `FlatShape` is the always-last fallback.
pub trait SourceShape: Send + Sync {
    /// Whether this shape should handle the record.
    fn detect(&self, record: &Value) -> bool;

    /// Map one standings record. Fails only when team identity is absent.
    fn standings_row(&self, record: &Value) -> Result<StandingsRow>;

    /// Map one fixture record. Fails only when a side's team identity is absent.
    fn match_row(&self, record: &Value) -> Result<MatchRow>;

    /// Human-readable shape name for tracing.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Draft
// ---------------------------------------------------------------------------

/// Standings fields as found in the source, before defaults are applied.
#[derive(Debug, Default)]
pub(crate) struct StandingsDraft {
    pub rank: Option<u32>,
    pub team_name: String,
    pub points: Option<i32>,
    pub played: Option<u32>,
    pub wins: Option<u32>,
    pub draws: Option<u32>,
    pub losses: Option<u32>,
    pub goals_for: Option<u32>,
    pub goals_against: Option<u32>,
    pub goal_diff: Option<i32>,
    pub forfeited: Option<bool>,
}

impl StandingsDraft {
    /// Apply sentinels and derive `played` / `goal_diff` when the source omits them.
    pub(crate) fn finish(self) -> StandingsRow {
        let wins = self.wins.unwrap_or(0);
        let draws = self.draws.unwrap_or(0);
        let losses = self.losses.unwrap_or(0);
        let goals_for = self.goals_for.unwrap_or(0);
        let goals_against = self.goals_against.unwrap_or(0);

        let played = self
            .played
            .unwrap_or_else(|| wins.saturating_add(draws).saturating_add(losses));
        let goal_diff = self.goal_diff.unwrap_or_else(|| {
            let diff = i64::from(goals_for) - i64::from(goals_against);
            i32::try_from(diff).unwrap_or(if diff < 0 { i32::MIN } else { i32::MAX })
        });

        StandingsRow {
            rank: self.rank.filter(|r| *r >= 1).unwrap_or(UNRANKED),
            team_name: self.team_name,
            points: self.points.unwrap_or(0),
            played,
            wins,
            draws,
            losses,
            goals_for,
            goals_against,
            goal_diff,
            forfeited: self.forfeited.unwrap_or(false),
            championship_id: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds registered shapes in priority order.
pub struct ShapeRegistry {
    shapes: Vec<Box<dyn SourceShape>>,
}

impl ShapeRegistry {
    /// Create a registry with all built-in shapes (specific first, flat last).
    pub fn new() -> Self {
        Self {
            shapes: vec![Box::new(DofaShape), Box::new(FlatShape)],
        }
    }

    /// Detect the shape for a record. Always returns one (`FlatShape` is the fallback).
    pub fn detect(&self, record: &Value) -> &dyn SourceShape {
        self.shapes
            .iter()
            .find(|s| s.detect(record))
            .map(|s| s.as_ref())
            .unwrap_or(&FlatShape)
    }
}

impl Default for ShapeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
