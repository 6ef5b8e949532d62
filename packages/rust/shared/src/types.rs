//! Core domain types: standings rows, match rows, championships.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Collection holding one standings document per team.
pub const STANDINGS_COLLECTION: &str = "classement";

/// Collection holding appended match documents.
pub const MATCHES_COLLECTION: &str = "matchs";

/// Collection holding championship reference documents.
pub const CHAMPIONSHIPS_COLLECTION: &str = "championnats";

/// Placeholder used when a team object carries no usable name.
pub const UNKNOWN_TEAM: &str = "Équipe inconnue";

/// Rank given to a record whose source omits it. Sorts after every real rank.
pub const UNRANKED: u32 = u32::MAX;

// ---------------------------------------------------------------------------
// StandingsRow
// ---------------------------------------------------------------------------

/// One team's aggregated record within a championship.
///
/// Recomputed wholesale on every sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandingsRow {
    pub rank: u32,
    pub team_name: String,
    pub points: i32,
    pub played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub goals_for: u32,
    pub goals_against: u32,
    pub goal_diff: i32,
    pub forfeited: bool,
    /// Owning championship. Stored in the body only, the document key is the team name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub championship_id: Option<String>,
}

impl StandingsRow {
    /// `played == wins + draws + losses`.
    pub fn played_is_consistent(&self) -> bool {
        u64::from(self.played)
            == u64::from(self.wins) + u64::from(self.draws) + u64::from(self.losses)
    }

    /// `goal_diff == goals_for - goals_against`.
    pub fn goal_diff_is_consistent(&self) -> bool {
        i64::from(self.goal_diff) == i64::from(self.goals_for) - i64::from(self.goals_against)
    }
}

// ---------------------------------------------------------------------------
// MatchRow
// ---------------------------------------------------------------------------

/// Final score of a match, or the "no score yet" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Score {
    Final { home: u32, away: u32 },
    Pending,
}

impl Score {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// A single fixture or result. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    pub match_day: u32,
    #[serde(rename = "type")]
    pub kind: String,
    pub home_team: String,
    pub away_team: String,
    pub score: Score,
    pub forfeited: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub championship_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Championship
// ---------------------------------------------------------------------------

/// A named competition grouping teams, matches, and standings.
///
/// Published in camelCase like the row documents; the snake_case spellings
/// used in `classement.toml` are accepted on input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Championship {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub order: u32,
    /// Paginated standings endpoint.
    #[serde(alias = "source_url")]
    pub source_url: String,
    /// Paginated fixtures endpoint, if the championship publishes one.
    #[serde(default, alias = "matches_url", skip_serializing_if = "Option::is_none")]
    pub matches_url: Option<String>,
}
