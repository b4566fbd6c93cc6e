use std::collections::{HashMap, VecDeque};

use crate::models::{BoxScore, RollingFeatures, RollingMean, Side, Stat};
use crate::services::team_timeline::{TeamGame, TeamTimelines};
use crate::utils::mean_of_present;

/// Steals and blocks are only rolled over this window.
pub const DEFENSIVE_WINDOW: usize = 5;

/// Trailing per-team means of box-score statistics. The game being described
/// never contributes to its own average.
#[derive(Debug, Clone)]
pub struct RollingFeatureBuilder {
    windows: Vec<usize>,
    defensive: Vec<Stat>,
}

impl RollingFeatureBuilder {
    pub fn new(windows: Vec<usize>) -> Self {
        Self {
            windows,
            defensive: Vec::new(),
        }
    }

    /// Enables the given defensive statistics for the short window. Pass only
    /// the ones the input actually carries.
    pub fn with_defensive_stats(mut self, stats: &[Stat]) -> Self {
        self.defensive = stats
            .iter()
            .copied()
            .filter(|s| Stat::DEFENSIVE.contains(s))
            .collect();
        self
    }

    pub fn windows(&self) -> &[usize] {
        &self.windows
    }

    /// Statistics rolled for a window, in column order.
    pub fn stats_for(&self, window: usize) -> Vec<Stat> {
        let mut stats = Stat::CORE.to_vec();
        if window == DEFENSIVE_WINDOW {
            stats.extend(self.defensive.iter().copied());
        }
        stats
    }

    fn max_window(&self) -> usize {
        self.windows.iter().copied().max().unwrap_or(0)
    }

    /// Rolling features for one team's chronological games, one entry per game.
    pub fn team_rolling(&self, games: &[TeamGame<'_>]) -> Vec<RollingFeatures> {
        let capacity = self.max_window();
        let mut history: VecDeque<&BoxScore> = VecDeque::with_capacity(capacity + 1);
        let mut out = Vec::with_capacity(games.len());

        for game in games {
            let mut means = Vec::new();
            for &window in &self.windows {
                for stat in self.stats_for(window) {
                    let mean = mean_of_present(
                        history.iter().rev().take(window).map(|b| stat.value(b)),
                    );
                    means.push(RollingMean { window, stat, mean });
                }
            }
            out.push(RollingFeatures { means });

            history.push_back(game.box_score);
            if history.len() > capacity {
                history.pop_front();
            }
        }

        out
    }

    pub fn build(&self, timelines: &TeamTimelines<'_>) -> HashMap<(usize, Side), RollingFeatures> {
        let features = timelines.scan(|games| self.team_rolling(games));
        tracing::debug!(
            "Rolling stats computed for {} team-games over windows {:?}",
            features.len(),
            self.windows
        );
        features
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MatchRecord, TeamId};
    use chrono::{Duration, NaiveDate};

    fn box_score(pts: f64) -> BoxScore {
        BoxScore {
            pts,
            fg_pct: 0.45,
            fg3_pct: 0.35,
            reb: 40.0,
            ast: 25.0,
            tov: 12.0,
            ..BoxScore::default()
        }
    }

    /// Team "A" plays `n` games, alternating home and away, scoring its game index.
    fn indexed_history(n: usize) -> Vec<MatchRecord> {
        let start = NaiveDate::from_ymd_opt(2023, 10, 24).unwrap();
        (0..n)
            .map(|i| {
                let opponent = TeamId::new(format!("OPP{}", i % 4));
                let (home_team_id, away_team_id, home, away) = if i % 2 == 0 {
                    (TeamId::new("A"), opponent, box_score(i as f64), box_score(100.0))
                } else {
                    (opponent, TeamId::new("A"), box_score(100.0), box_score(i as f64))
                };
                MatchRecord {
                    game_id: format!("{:04}", i),
                    game_date: start + Duration::days(2 * i as i64),
                    season: "2023-24".to_string(),
                    home_team_id,
                    away_team_id,
                    home_team_name: None,
                    away_team_name: None,
                    home,
                    away,
                    home_win: true,
                }
            })
            .collect()
    }

    fn side_of_a(record: &MatchRecord) -> Side {
        if record.home_team_id == TeamId::new("A") {
            Side::Home
        } else {
            Side::Away
        }
    }

    #[test]
    fn test_current_game_excluded() {
        let matches = indexed_history(25);
        let timelines = TeamTimelines::from_matches(&matches);
        let builder = RollingFeatureBuilder::new(vec![5, 10, 20]);
        let rolling = builder.build(&timelines);

        for (i, record) in matches.iter().enumerate() {
            let features = &rolling[&(i, side_of_a(record))];
            for window in [5usize, 10, 20] {
                let lo = i.saturating_sub(window);
                let expected = if i == 0 {
                    None
                } else {
                    let sum: usize = (lo..i).sum();
                    Some(sum as f64 / (i - lo) as f64)
                };
                assert_eq!(features.get(Stat::Pts, window), expected, "game {i} window {window}");
            }
        }
    }

    #[test]
    fn test_first_game_is_null_not_zero() {
        let matches = indexed_history(2);
        let timelines = TeamTimelines::from_matches(&matches);
        let rolling = RollingFeatureBuilder::new(vec![5, 10]).build(&timelines);

        let first = &rolling[&(0, Side::Home)];
        assert!(first.means.iter().all(|m| m.mean.is_none()));
        assert_eq!(first.means.len(), 12);

        // Second game sees exactly the first game's line
        let second = &rolling[&(1, Side::Away)];
        assert_eq!(second.get(Stat::Pts, 5), Some(0.0));
        assert_eq!(second.get(Stat::Reb, 10), Some(40.0));
    }

    #[test]
    fn test_defensive_stats_only_for_short_window() {
        let mut matches = indexed_history(3);
        for (i, m) in matches.iter_mut().enumerate() {
            m.home.stl = Some(i as f64);
            m.away.stl = Some(i as f64);
            // Block counts missing for the second game
            if i != 1 {
                m.home.blk = Some(4.0);
                m.away.blk = Some(4.0);
            }
        }
        let timelines = TeamTimelines::from_matches(&matches);
        let builder =
            RollingFeatureBuilder::new(vec![5, 10]).with_defensive_stats(&[Stat::Stl, Stat::Blk]);
        assert_eq!(builder.stats_for(5).len(), 8);
        assert_eq!(builder.stats_for(10).len(), 6);

        let rolling = builder.build(&timelines);
        let third = &rolling[&(2, Side::Home)];
        assert_eq!(third.get(Stat::Stl, 5), Some(0.5));
        assert_eq!(third.get(Stat::Blk, 5), Some(4.0));
        assert_eq!(third.get(Stat::Stl, 10), None);
        assert!(third.means.iter().all(|m| m.window != 10 || !Stat::DEFENSIVE.contains(&m.stat)));
    }

    #[test]
    fn test_defensive_stats_absent_tolerated() {
        let matches = indexed_history(3);
        let timelines = TeamTimelines::from_matches(&matches);
        let rolling = RollingFeatureBuilder::new(vec![5]).build(&timelines);
        assert!(rolling.values().all(|f| f.means.len() == Stat::CORE.len()));
    }
}
