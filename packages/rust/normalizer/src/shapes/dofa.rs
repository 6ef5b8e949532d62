//! Federation API layout (JSON-LD pages, nested team objects, snake_case counters).

use serde_json::Value;

use classement_shared::{ClassementError, MatchRow, Result, Score, StandingsRow};

use super::{SourceShape, StandingsDraft};
use crate::fields::{first, get_bool, get_i32, get_str, get_u32, parse_date, team_name};

/// Default competition type when the record does not say.
const DEFAULT_KIND: &str = "championnat";

/// Records published by the federation competitions API.
pub struct DofaShape;

impl SourceShape for DofaShape {
    /// Keyed on the nested team objects only; counters alone also appear on flat records.
    fn detect(&self, record: &Value) -> bool {
        let is_obj = |k: &str| record.get(k).is_some_and(Value::is_object);
        is_obj("equipe") || (is_obj("home") && is_obj("away"))
    }

    fn standings_row(&self, record: &Value) -> Result<StandingsRow> {
        let team_name = team_name(record.get("equipe"))
            .ok_or_else(|| ClassementError::malformed("standings record has no 'equipe'"))?;

        let forfeits = get_u32(record, &["forfeits_games_count", "forfeit_count"]);
        let forfeited = get_bool(record, &["is_forfeit", "forfeited"])
            .or(forfeits.map(|n| n > 0));

        Ok(StandingsDraft {
            rank: get_u32(record, &["rank", "position"]),
            team_name,
            points: get_i32(record, &["point_count", "points"]),
            played: get_u32(record, &["total_games_count", "games_count"]),
            wins: get_u32(record, &["won_games_count"]),
            draws: get_u32(record, &["draw_games_count"]),
            losses: get_u32(record, &["lost_games_count"]),
            goals_for: get_u32(record, &["goals_for_count"]),
            goals_against: get_u32(record, &["goals_against_count"]),
            goal_diff: get_i32(record, &["goals_diff"]),
            forfeited,
        }
        .finish())
    }

    fn match_row(&self, record: &Value) -> Result<MatchRow> {
        let home_team = team_name(record.get("home"))
            .ok_or_else(|| ClassementError::malformed("match record has no 'home' team"))?;
        let away_team = team_name(record.get("away"))
            .ok_or_else(|| ClassementError::malformed("match record has no 'away' team"))?;

        let score = match (
            get_u32(record, &["home_score"]),
            get_u32(record, &["away_score"]),
        ) {
            (Some(home), Some(away)) => Score::Final { home, away },
            _ => Score::Pending,
        };

        let match_day = record
            .get("poule_journee")
            .and_then(|pj| get_u32(pj, &["number"]))
            .or_else(|| get_u32(record, &["journee", "match_day"]))
            .unwrap_or(0);

        let kind = get_str(record, &["type"])
            .or_else(|| record.get("competition").and_then(|c| get_str(c, &["type"])))
            .unwrap_or(DEFAULT_KIND)
            .to_string();

        let forfeited = get_bool(record, &["home_is_forfeit"]).unwrap_or(false)
            || get_bool(record, &["away_is_forfeit"]).unwrap_or(false);

        Ok(MatchRow {
            date: first(record, &["date"])
                .and_then(Value::as_str)
                .and_then(parse_date),
            match_day,
            kind,
            home_team,
            away_team,
            score,
            forfeited,
            championship_id: None,
        })
    }

    fn name(&self) -> &str {
        "dofa"
    }
}
