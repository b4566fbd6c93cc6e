//! Team-perspective view of a match table.
//!
//! Every match is pivoted into two rows, one per participant, and the rows are
//! grouped per team in chronological order. Rolling and context builders scan
//! these per-team sequences independently of each other.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

use crate::models::{BoxScore, MatchRecord, Side, TeamId};

/// One match seen from one participant.
#[derive(Debug, Clone, Copy)]
pub struct TeamGame<'a> {
    /// Position of the match in the sorted match table
    pub match_index: usize,
    pub side: Side,
    pub team: &'a TeamId,
    pub season: &'a str,
    pub date: NaiveDate,
    pub box_score: &'a BoxScore,
    pub won: bool,
}

impl TeamGame<'_> {
    pub fn key(&self) -> (usize, Side) {
        (self.match_index, self.side)
    }
}

pub struct TeamTimelines<'a> {
    timelines: BTreeMap<&'a TeamId, Vec<TeamGame<'a>>>,
}

impl<'a> TeamTimelines<'a> {
    /// `matches` must already be in chronological order.
    pub fn from_matches(matches: &'a [MatchRecord]) -> Self {
        let mut timelines: BTreeMap<&'a TeamId, Vec<TeamGame<'a>>> = BTreeMap::new();

        for (match_index, record) in matches.iter().enumerate() {
            for side in Side::BOTH {
                let team = record.team(side);
                timelines.entry(team).or_default().push(TeamGame {
                    match_index,
                    side,
                    team,
                    season: &record.season,
                    date: record.game_date,
                    box_score: record.box_score(side),
                    won: record.won(side),
                });
            }
        }

        Self { timelines }
    }

    pub fn teams(&self) -> usize {
        self.timelines.len()
    }

    pub fn get(&self, team: &TeamId) -> Option<&[TeamGame<'a>]> {
        self.timelines.get(team).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a TeamId, &[TeamGame<'a>])> + '_ {
        self.timelines.iter().map(|(team, games)| (*team, games.as_slice()))
    }

    /// Runs `scan` over each team's sequence and gathers the emitted values by
    /// (match, side). Each sequence is scanned with its own fresh state.
    pub fn scan<T, F>(&self, mut scan: F) -> HashMap<(usize, Side), T>
    where
        F: FnMut(&[TeamGame<'a>]) -> Vec<T>,
    {
        let mut out = HashMap::new();
        for games in self.timelines.values() {
            let values = scan(games.as_slice());
            debug_assert_eq!(values.len(), games.len());
            out.extend(games.iter().map(TeamGame::key).zip(values));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_match(id: &str, day: u32, home: &str, away: &str) -> MatchRecord {
        MatchRecord {
            game_id: id.to_string(),
            game_date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            season: "2023-24".to_string(),
            home_team_id: TeamId::new(home),
            away_team_id: TeamId::new(away),
            home_team_name: None,
            away_team_name: None,
            home: BoxScore::default(),
            away: BoxScore::default(),
            home_win: true,
        }
    }

    #[test]
    fn test_two_rows_per_match() {
        let matches = vec![
            make_match("1", 1, "A", "B"),
            make_match("2", 2, "B", "C"),
            make_match("3", 4, "C", "A"),
        ];
        let timelines = TeamTimelines::from_matches(&matches);
        assert_eq!(timelines.teams(), 3);

        let b = timelines.get(&TeamId::new("B")).unwrap();
        assert_eq!(b.len(), 2);
        assert_eq!(b[0].side, Side::Away);
        assert!(!b[0].won);
        assert_eq!(b[1].side, Side::Home);
        assert!(b[1].won);

        let total: usize = timelines.iter().map(|(_, games)| games.len()).sum();
        assert_eq!(total, matches.len() * 2);
    }

    #[test]
    fn test_scan_keys_by_match_and_side() {
        let matches = vec![make_match("1", 1, "A", "B"), make_match("2", 2, "A", "B")];
        let timelines = TeamTimelines::from_matches(&matches);
        let counts = timelines.scan(|games| (0..games.len()).collect());
        assert_eq!(counts[&(0, Side::Home)], 0);
        assert_eq!(counts[&(1, Side::Home)], 1);
        assert_eq!(counts[&(1, Side::Away)], 1);
    }
}
