//! Rank ordering and ranking diagnostics.
//!
//! The source's rank field is trusted: rows are sorted by it, never
//! re-ranked from points. [`inspect_ranking`] only reports anomalies.

use std::collections::BTreeMap;

use classement_shared::{StandingsRow, UNRANKED};

/// Order rows ascending by rank. Stable: tied rows keep source order.
pub fn sort_by_rank(mut rows: Vec<StandingsRow>) -> Vec<StandingsRow> {
    rows.sort_by_key(|r| r.rank);
    rows
}

/// Anomalies found in one championship's standings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankingReport {
    /// Inclusive `(first, last)` runs of ranks between 1 and the highest
    /// rank that no team holds.
    pub gaps: Vec<(u32, u32)>,
    /// Ranks held by more than one team, with the teams in source order.
    pub ties: Vec<(u32, Vec<String>)>,
    /// Teams whose source record had no usable rank.
    pub unranked: Vec<String>,
    /// Teams whose counters break `played = W + D + L` or `diff = for - against`.
    pub inconsistent: Vec<String>,
}

impl RankingReport {
    pub fn is_clean(&self) -> bool {
        self.gaps.is_empty()
            && self.ties.is_empty()
            && self.unranked.is_empty()
            && self.inconsistent.is_empty()
    }

    /// Total number of ranks covered by [`gaps`](Self::gaps).
    pub fn missing_ranks(&self) -> u64 {
        self.gaps
            .iter()
            .map(|&(first, last)| u64::from(last - first) + 1)
            .sum()
    }
}

/// Inspect rows for gaps, ties, missing ranks, and counter inconsistencies.
pub fn inspect_ranking(rows: &[StandingsRow]) -> RankingReport {
    let mut by_rank: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    let mut report = RankingReport::default();

    for row in rows {
        if row.rank == UNRANKED {
            report.unranked.push(row.team_name.clone());
        } else {
            by_rank
                .entry(row.rank)
                .or_default()
                .push(row.team_name.clone());
        }
        if !row.played_is_consistent() || !row.goal_diff_is_consistent() {
            report.inconsistent.push(row.team_name.clone());
        }
    }

    let mut expected = 1u32;
    for &rank in by_rank.keys() {
        if rank > expected {
            report.gaps.push((expected, rank - 1));
        }
        expected = rank.saturating_add(1);
    }
    report.ties = by_rank
        .into_iter()
        .filter(|(_, teams)| teams.len() > 1)
        .collect();

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(rank: u32, team: &str) -> StandingsRow {
        StandingsRow {
            rank,
            team_name: team.into(),
            points: 0,
            played: 0,
            wins: 0,
            draws: 0,
            losses: 0,
            goals_for: 0,
            goals_against: 0,
            goal_diff: 0,
            forfeited: false,
            championship_id: None,
        }
    }

    fn ranks(rows: &[StandingsRow]) -> Vec<u32> {
        rows.iter().map(|r| r.rank).collect()
    }

    #[test]
    fn sorts_ascending() {
        let sorted = sort_by_rank(vec![row(3, "C"), row(1, "A"), row(2, "B")]);
        assert_eq!(ranks(&sorted), vec![1, 2, 3]);
    }

    #[test]
    fn ties_keep_source_order() {
        let sorted = sort_by_rank(vec![
            row(2, "Second-a"),
            row(1, "First"),
            row(2, "Second-b"),
            row(2, "Second-c"),
        ]);
        let teams: Vec<&str> = sorted.iter().map(|r| r.team_name.as_str()).collect();
        assert_eq!(teams, vec!["First", "Second-a", "Second-b", "Second-c"]);
    }

    #[test]
    fn unranked_rows_sort_last() {
        let sorted = sort_by_rank(vec![row(UNRANKED, "X"), row(1, "A")]);
        assert_eq!(sorted[1].team_name, "X");
    }

    #[test]
    fn does_not_rerank_from_points() {
        let mut leader = row(1, "A");
        leader.points = 3;
        let mut chaser = row(2, "B");
        chaser.points = 30;
        let sorted = sort_by_rank(vec![chaser, leader]);
        assert_eq!(sorted[0].team_name, "A");
    }

    #[test]
    fn report_finds_gaps_and_ties() {
        let rows = vec![row(1, "A"), row(1, "B"), row(4, "C"), row(UNRANKED, "D")];
        let report = inspect_ranking(&rows);
        assert_eq!(report.gaps, vec![(2, 3)]);
        assert_eq!(report.missing_ranks(), 2);
        assert_eq!(report.ties, vec![(1, vec!["A".to_string(), "B".to_string()])]);
        assert_eq!(report.unranked, vec!["D".to_string()]);
        assert!(!report.is_clean());
    }

    #[test]
    fn huge_rank_yields_one_gap_range() {
        let rows = vec![row(1, "A"), row(4_000_000_000, "B"), row(UNRANKED - 1, "C")];
        let report = inspect_ranking(&rows);
        assert_eq!(
            report.gaps,
            vec![(2, 3_999_999_999), (4_000_000_001, UNRANKED - 2)]
        );
        assert_eq!(report.missing_ranks(), u64::from(UNRANKED) - 4);
    }

    #[test]
    fn gap_before_first_rank() {
        let report = inspect_ranking(&[row(3, "A"), row(4, "B")]);
        assert_eq!(report.gaps, vec![(1, 2)]);
    }

    #[test]
    fn report_flags_inconsistent_counters() {
        let mut bad = row(1, "A");
        bad.wins = 2;
        bad.played = 3;
        let report = inspect_ranking(&[bad, row(2, "B")]);
        assert_eq!(report.inconsistent, vec!["A".to_string()]);
        assert!(report.gaps.is_empty());
    }

    #[test]
    fn clean_table() {
        let report = inspect_ranking(&[row(1, "A"), row(2, "B"), row(3, "C")]);
        assert!(report.is_clean());
        assert_eq!(inspect_ranking(&[]), RankingReport::default());
    }
}
