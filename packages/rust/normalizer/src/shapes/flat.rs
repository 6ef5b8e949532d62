//! Flat records: one object per row with scalar fields, camelCase or snake_case.

use serde_json::Value;

use classement_shared::{ClassementError, MatchRow, Result, Score, StandingsRow};

use super::{SourceShape, StandingsDraft};
use crate::fields::{first, get_bool, get_i32, get_str, get_u32, parse_date, team_name};

/// Fallback shape; always matches.
pub struct FlatShape;

impl SourceShape for FlatShape {
    fn detect(&self, _record: &Value) -> bool {
        true
    }

    fn standings_row(&self, record: &Value) -> Result<StandingsRow> {
        let team = first(record, &["teamName", "team_name", "team", "equipe", "club"]);
        let team_name = team_name(team)
            .ok_or_else(|| ClassementError::malformed("standings record has no team field"))?;

        Ok(StandingsDraft {
            rank: get_u32(record, &["rank", "position", "rang"]),
            team_name,
            points: get_i32(record, &["points", "pts", "point_count"]),
            played: get_u32(
                record,
                &["played", "matchesPlayed", "matches_played", "joues", "total_games_count"],
            ),
            wins: get_u32(record, &["wins", "won", "victoires", "won_games_count"]),
            draws: get_u32(record, &["draws", "drawn", "nuls", "draw_games_count"]),
            losses: get_u32(record, &["losses", "lost", "defaites", "lost_games_count"]),
            goals_for: get_u32(
                record,
                &["goalsFor", "goals_for", "pointsFor", "bp", "goals_for_count"],
            ),
            goals_against: get_u32(
                record,
                &["goalsAgainst", "goals_against", "pointsAgainst", "bc", "goals_against_count"],
            ),
            goal_diff: get_i32(record, &["goalDiff", "goal_diff", "diff", "goals_diff"]),
            forfeited: get_bool(record, &["forfeited", "forfait"]),
        }
        .finish())
    }

    fn match_row(&self, record: &Value) -> Result<MatchRow> {
        let home_team = team_name(first(record, &["homeTeam", "home_team", "home"]))
            .ok_or_else(|| ClassementError::malformed("match record has no home team"))?;
        let away_team = team_name(first(record, &["awayTeam", "away_team", "away"]))
            .ok_or_else(|| ClassementError::malformed("match record has no away team"))?;

        let nested = record.get("score").filter(|s| s.is_object());
        let home = nested
            .and_then(|s| get_u32(s, &["home"]))
            .or_else(|| get_u32(record, &["homeScore", "home_score"]));
        let away = nested
            .and_then(|s| get_u32(s, &["away"]))
            .or_else(|| get_u32(record, &["awayScore", "away_score"]));
        let score = match (home, away) {
            (Some(home), Some(away)) => Score::Final { home, away },
            _ => Score::Pending,
        };

        Ok(MatchRow {
            date: get_str(record, &["date", "datetime"]).and_then(parse_date),
            match_day: get_u32(record, &["matchDay", "match_day", "journee", "round"])
                .or_else(|| {
                    record
                        .get("poule_journee")
                        .and_then(|day| get_u32(day, &["number"]))
                })
                .unwrap_or(0),
            kind: get_str(record, &["type", "kind"])
                .unwrap_or("championnat")
                .to_string(),
            home_team,
            away_team,
            score,
            forfeited: get_bool(record, &["forfeited", "forfait"]).unwrap_or(false),
            championship_id: None,
        })
    }

    fn name(&self) -> &str {
        "flat"
    }
}
