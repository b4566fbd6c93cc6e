//! Schedule and form context derived purely from match ordering.
//!
//! Each tracker follows the same shape: read the value entering a game, then
//! apply that game's outcome. A team's trackers are scanned forward once over
//! its chronological games.

use chrono::NaiveDate;
use std::collections::HashMap;

use crate::config::FeatureConfig;
use crate::models::{Side, SideContext};
use crate::services::team_timeline::{TeamGame, TeamTimelines};
use crate::utils::{days_between, win_percentage};

/// Fewer rest days than this marks a back-to-back.
pub const BACK_TO_BACK_THRESHOLD: i64 = 2;

#[derive(Debug, Clone, Default)]
pub struct RestTracker {
    last_date: Option<NaiveDate>,
}

impl RestTracker {
    pub fn entering(&self, date: NaiveDate, default_rest_days: i64) -> i64 {
        self.last_date
            .map(|last| days_between(last, date))
            .unwrap_or(default_rest_days)
    }

    pub fn apply(&mut self, date: NaiveDate) {
        self.last_date = Some(date);
    }
}

pub fn is_back_to_back(rest_days: i64) -> bool {
    rest_days < BACK_TO_BACK_THRESHOLD
}

/// Signed run of results: positive for consecutive wins, negative for losses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreakTracker {
    streak: i32,
}

impl StreakTracker {
    pub fn entering(&self) -> i32 {
        self.streak
    }

    pub fn apply(&mut self, won: bool) {
        self.streak = if won {
            self.streak.max(0) + 1
        } else {
            self.streak.min(0) - 1
        };
    }
}

/// Wins and games per season, counted before the current game.
#[derive(Debug, Clone, Default)]
pub struct SeasonRecordTracker {
    seasons: HashMap<String, (u32, u32)>,
}

impl SeasonRecordTracker {
    /// (wins, games) entering a game of `season`.
    pub fn entering(&self, season: &str) -> (u32, u32) {
        self.seasons.get(season).copied().unwrap_or((0, 0))
    }

    pub fn apply(&mut self, season: &str, won: bool) {
        let entry = self.seasons.entry(season.to_string()).or_insert((0, 0));
        if won {
            entry.0 += 1;
        }
        entry.1 += 1;
    }
}

#[derive(Debug, Clone, Default)]
struct TeamContextState {
    rest: RestTracker,
    streak: StreakTracker,
    season: SeasonRecordTracker,
}

#[derive(Debug, Clone)]
pub struct ContextFeatureBuilder {
    default_rest_days: i64,
    default_win_pct: f64,
}

impl Default for ContextFeatureBuilder {
    fn default() -> Self {
        Self::from(&FeatureConfig::default())
    }
}

impl From<&FeatureConfig> for ContextFeatureBuilder {
    fn from(config: &FeatureConfig) -> Self {
        Self::new(config.default_rest_days, config.default_win_pct)
    }
}

impl ContextFeatureBuilder {
    pub fn new(default_rest_days: i64, default_win_pct: f64) -> Self {
        Self {
            default_rest_days,
            default_win_pct,
        }
    }

    /// Context entering each of one team's chronological games.
    pub fn team_context(&self, games: &[TeamGame<'_>]) -> Vec<SideContext> {
        let mut state = TeamContextState::default();

        games
            .iter()
            .map(|game| {
                let rest_days = state.rest.entering(game.date, self.default_rest_days);
                let (season_wins, season_games) = state.season.entering(game.season);
                let context = SideContext {
                    rest_days,
                    back_to_back: is_back_to_back(rest_days),
                    win_streak: state.streak.entering(),
                    season_wins,
                    season_games,
                    win_pct: win_percentage(season_wins, season_games, self.default_win_pct),
                };

                state.rest.apply(game.date);
                state.streak.apply(game.won);
                state.season.apply(game.season, game.won);

                context
            })
            .collect()
    }

    pub fn build(&self, timelines: &TeamTimelines<'_>) -> HashMap<(usize, Side), SideContext> {
        let context = timelines.scan(|games| self.team_context(games));
        tracing::debug!("Context features computed for {} team-games", context.len());
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoxScore, MatchRecord, TeamId};

    fn make_match(
        id: &str,
        date: (i32, u32, u32),
        season: &str,
        home: &str,
        away: &str,
        home_win: bool,
    ) -> MatchRecord {
        MatchRecord {
            game_id: id.to_string(),
            game_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            season: season.to_string(),
            home_team_id: TeamId::new(home),
            away_team_id: TeamId::new(away),
            home_team_name: None,
            away_team_name: None,
            home: BoxScore::default(),
            away: BoxScore::default(),
            home_win,
        }
    }

    fn context_of(matches: &[MatchRecord], team: &str) -> Vec<SideContext> {
        let timelines = TeamTimelines::from_matches(matches);
        let games = timelines.get(&TeamId::new(team)).unwrap();
        ContextFeatureBuilder::default().team_context(games)
    }

    #[test]
    fn test_streak_sign_entering_values() {
        // A: L, W, W, W
        let matches = vec![
            make_match("1", (2023, 11, 1), "2023-24", "A", "B", false),
            make_match("2", (2023, 11, 3), "2023-24", "C", "A", false),
            make_match("3", (2023, 11, 5), "2023-24", "A", "D", true),
            make_match("4", (2023, 11, 7), "2023-24", "B", "A", false),
        ];
        let streaks: Vec<i32> = context_of(&matches, "A").iter().map(|c| c.win_streak).collect();
        assert_eq!(streaks, vec![0, -1, 1, 2]);
    }

    #[test]
    fn test_streak_tracker_flips() {
        let mut tracker = StreakTracker::default();
        for won in [true, true, false, false, false, true] {
            tracker.apply(won);
        }
        assert_eq!(tracker.entering(), 1);
        tracker.apply(false);
        assert_eq!(tracker.entering(), -1);
    }

    #[test]
    fn test_rest_days_and_back_to_back() {
        let matches = vec![
            make_match("1", (2023, 11, 1), "2023-24", "A", "B", true),
            make_match("2", (2023, 11, 2), "2023-24", "C", "A", true),
            make_match("3", (2023, 11, 6), "2023-24", "A", "B", true),
        ];
        let a = context_of(&matches, "A");
        assert_eq!(a[0].rest_days, 3);
        assert!(!a[0].back_to_back);
        assert_eq!(a[1].rest_days, 1);
        assert!(a[1].back_to_back);
        assert_eq!(a[2].rest_days, 4);
        assert!(!a[2].back_to_back);

        // B's rest spans A's middle game, which B did not play
        let b = context_of(&matches, "B");
        assert_eq!(b[1].rest_days, 5);
    }

    #[test]
    fn test_season_win_pct_excludes_current_and_resets() {
        let matches = vec![
            make_match("1", (2023, 11, 1), "2023-24", "A", "B", true),
            make_match("2", (2023, 11, 3), "2023-24", "A", "B", true),
            make_match("3", (2023, 11, 5), "2023-24", "B", "A", true),
            make_match("4", (2024, 10, 25), "2024-25", "A", "B", false),
            make_match("5", (2024, 10, 27), "2024-25", "B", "A", false),
        ];
        let a = context_of(&matches, "A");
        let pct: Vec<f64> = a.iter().map(|c| c.win_pct).collect();
        assert_eq!(pct[0], 0.5);
        assert_eq!(pct[1], 1.0);
        assert_eq!(pct[2], 1.0);
        // New season: back to the default despite 2-1 last season
        assert_eq!(pct[3], 0.5);
        assert_eq!(pct[4], 0.0);
        assert_eq!((a[2].season_wins, a[2].season_games), (2, 2));
        assert_eq!((a[4].season_wins, a[4].season_games), (0, 1));

        // Streak carries across seasons
        assert_eq!(a[3].win_streak, -1);
    }

    #[test]
    fn test_configured_defaults() {
        let matches = vec![make_match("1", (2023, 11, 1), "2023-24", "A", "B", true)];
        let timelines = TeamTimelines::from_matches(&matches);
        let builder = ContextFeatureBuilder::new(7, 0.0);
        let context = builder.build(&timelines);
        let home = context[&(0, Side::Home)];
        assert_eq!(home.rest_days, 7);
        assert_eq!(home.win_pct, 0.0);
        assert_eq!(home.win_streak, 0);
    }
}
