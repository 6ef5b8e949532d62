//! Row normalization: raw upstream JSON records to canonical rows.
//!
//! This crate provides:
//! - [`shapes`], per-source record layouts ([`DofaShape`], [`FlatShape`])
//! - [`ShapeRegistry`], which picks the layout for a record
//! - [`Normalizer`], batch mapping with championship tagging

mod fields;
pub mod shapes;

use serde_json::Value;
use tracing::debug;

use classement_shared::{ClassementError, MatchRow, Result, StandingsRow};

pub use fields::clean_name;
pub use shapes::{DofaShape, FlatShape, ShapeRegistry, SourceShape};

/// Maps raw records onto canonical rows, tagging them with a championship.
pub struct Normalizer {
    registry: ShapeRegistry,
    championship_id: Option<String>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self {
            registry: ShapeRegistry::new(),
            championship_id: None,
        }
    }

    /// Stamp every produced row with `id`.
    pub fn with_championship(mut self, id: impl Into<String>) -> Self {
        self.championship_id = Some(id.into());
        self
    }

    /// Normalize one standings record.
    pub fn standings_row(&self, record: &Value) -> Result<StandingsRow> {
        let shape = self.registry.detect(record);
        let mut row = shape.standings_row(record)?;
        row.championship_id = self.championship_id.clone();
        Ok(row)
    }

    /// Normalize one fixture record.
    pub fn match_row(&self, record: &Value) -> Result<MatchRow> {
        let shape = self.registry.detect(record);
        let mut row = shape.match_row(record)?;
        row.championship_id = self.championship_id.clone();
        Ok(row)
    }

    /// Normalize a batch of standings records. Fails on the first malformed record.
    pub fn standings(&self, records: &[Value]) -> Result<Vec<StandingsRow>> {
        records
            .iter()
            .enumerate()
            .map(|(i, r)| self.standings_row(r).map_err(|e| at_index(i, e)))
            .inspect(|r| {
                if let Ok(row) = r {
                    debug!(team = %row.team_name, rank = row.rank, "normalized standings row");
                }
            })
            .collect()
    }

    /// Normalize a batch of fixture records. Fails on the first malformed record.
    pub fn matches(&self, records: &[Value]) -> Result<Vec<MatchRow>> {
        records
            .iter()
            .enumerate()
            .map(|(i, r)| self.match_row(r).map_err(|e| at_index(i, e)))
            .collect()
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Prefix a malformed-record message with the record's position.
fn at_index(index: usize, err: ClassementError) -> ClassementError {
    match err {
        ClassementError::MalformedRecord { message } => {
            ClassementError::malformed(format!("record #{index}: {message}"))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classement_shared::Score;
    use serde_json::json;

    #[test]
    fn registry_picks_dofa_for_nested_team() {
        let registry = ShapeRegistry::new();
        let record = json!({ "rank": 1, "equipe": { "short_name": "A" } });
        assert_eq!(registry.detect(&record).name(), "dofa");
    }

    #[test]
    fn registry_falls_back_to_flat() {
        let registry = ShapeRegistry::new();
        let record = json!({ "rank": 1, "teamName": "A" });
        assert_eq!(registry.detect(&record).name(), "flat");
    }

    #[test]
    fn federation_counters_with_flat_team_fields() {
        let normalizer = Normalizer::new();
        let row = normalizer
            .standings_row(&json!({ "rank": 1, "teamName": "AS Volley", "point_count": 9 }))
            .expect("team is present");
        assert_eq!(row.team_name, "AS Volley");
        assert_eq!(row.points, 9);

        let m = normalizer
            .match_row(&json!({
                "poule_journee": { "number": 2 },
                "homeTeam": "A",
                "awayTeam": "B"
            }))
            .expect("both teams are present");
        assert_eq!((m.home_team.as_str(), m.away_team.as_str()), ("A", "B"));
        assert_eq!(m.match_day, 2);
        assert_eq!(m.score, Score::Pending);
    }

    #[test]
    fn batch_tags_championship() {
        let records = vec![
            json!({ "rank": 1, "equipe": { "short_name": "A" }, "point_count": 9 }),
            json!({ "rank": 2, "teamName": "B", "points": 6 }),
        ];
        let rows = Normalizer::new()
            .with_championship("pre-nat-m")
            .standings(&records)
            .expect("normalize");
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.championship_id.as_deref() == Some("pre-nat-m")));
        assert_eq!(rows[1].team_name, "B");
    }

    #[test]
    fn batch_reports_malformed_index() {
        let records = vec![
            json!({ "rank": 1, "teamName": "A" }),
            json!({ "rank": 2, "points": 6 }),
        ];
        let err = Normalizer::new().standings(&records).unwrap_err();
        assert!(err.to_string().contains("record #1"));
    }

    #[test]
    fn null_scores_become_pending_never_null() {
        let records = vec![json!({
            "poule_journee": { "number": 2 },
            "home": { "short_name": "A" },
            "away": { "short_name": "B" },
            "home_score": null,
            "away_score": null
        })];
        let rows = Normalizer::new().matches(&records).expect("normalize");
        assert_eq!(rows[0].score, Score::Pending);
        let json = serde_json::to_value(&rows[0]).unwrap();
        assert_eq!(json["score"], "pending");
        assert!(!json["score"].is_null());
    }
}
