use std::collections::HashMap;

use crate::config::FeatureConfig;
use crate::models::{EloFeatures, EloHistoryPoint, MatchRecord, TeamId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EloConfig {
    /// Rating for a team the engine has not seen yet
    pub initial_rating: f64,
    /// Maximum rating swing in one match
    pub k_factor: f64,
    /// Added to the home rating inside the expectation only, never stored
    pub home_advantage: f64,
}

impl Default for EloConfig {
    fn default() -> Self {
        Self::from(&FeatureConfig::default())
    }
}

impl From<&FeatureConfig> for EloConfig {
    fn from(config: &FeatureConfig) -> Self {
        Self {
            initial_rating: config.initial_elo,
            k_factor: config.k_factor,
            home_advantage: config.home_advantage,
        }
    }
}

/// Current rating of every team seen so far in a pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamRatings {
    ratings: HashMap<TeamId, f64>,
}

impl TeamRatings {
    pub fn get(&self, team: &TeamId) -> Option<f64> {
        self.ratings.get(team).copied()
    }

    pub fn get_or(&self, team: &TeamId, initial: f64) -> f64 {
        self.get(team).unwrap_or(initial)
    }

    fn set(&mut self, team: &TeamId, rating: f64) {
        self.ratings.insert(team.clone(), rating);
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    /// Highest rating first, team id breaks ties.
    pub fn ranked(&self) -> Vec<(TeamId, f64)> {
        let mut table: Vec<(TeamId, f64)> = self
            .ratings
            .iter()
            .map(|(team, rating)| (team.clone(), *rating))
            .collect();
        table.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        table
    }
}

/// Output of one chronological pass.
#[derive(Debug, Clone, Default)]
pub struct EloRun {
    /// One entry per input match, same order as the input
    pub features: Vec<EloFeatures>,
    pub ratings: TeamRatings,
    /// Rating of each participant right after each match
    pub history: Vec<EloHistoryPoint>,
}

pub struct EloEngine {
    config: EloConfig,
}

impl Default for EloEngine {
    fn default() -> Self {
        Self::new(EloConfig::default())
    }
}

impl EloEngine {
    pub fn new(config: EloConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EloConfig {
        &self.config
    }

    /// Calculate expected score of A against B
    pub fn expected_score(rating_a: f64, rating_b: f64) -> f64 {
        1.0 / (1.0 + 10f64.powf((rating_b - rating_a) / 400.0))
    }

    /// Pre-match home win probability for the given current ratings
    pub fn win_probability(&self, home_rating: f64, away_rating: f64) -> f64 {
        Self::expected_score(home_rating + self.config.home_advantage, away_rating)
    }

    /// New (home, away) ratings after one match. The swing is zero-sum.
    pub fn update_ratings(&self, home_rating: f64, away_rating: f64, home_win: bool) -> (f64, f64) {
        let expected_home = self.win_probability(home_rating, away_rating);
        let actual_home = if home_win { 1.0 } else { 0.0 };
        let delta = self.config.k_factor * (actual_home - expected_home);

        (home_rating + delta, away_rating - delta)
    }

    /// Rates one match against the running state and returns the advanced state.
    pub fn rate_match(
        &self,
        mut ratings: TeamRatings,
        record: &MatchRecord,
    ) -> (TeamRatings, EloFeatures) {
        let home_before = ratings.get_or(&record.home_team_id, self.config.initial_rating);
        let away_before = ratings.get_or(&record.away_team_id, self.config.initial_rating);

        let (home_after, away_after) =
            self.update_ratings(home_before, away_before, record.home_win);

        ratings.set(&record.home_team_id, home_after);
        ratings.set(&record.away_team_id, away_after);

        let features = EloFeatures {
            home_elo_before: home_before,
            away_elo_before: away_before,
            home_elo_after: home_after,
            away_elo_after: away_after,
            elo_diff: home_before - away_before,
        };
        (ratings, features)
    }

    /// Folds the matches, in the order given, through a fresh rating state.
    /// Callers must supply a chronologically sorted sequence.
    pub fn process<'a, I>(&self, matches: I) -> EloRun
    where
        I: IntoIterator<Item = &'a MatchRecord>,
    {
        let run = matches.into_iter().fold(EloRun::default(), |run, record| {
            let EloRun {
                mut features,
                ratings,
                mut history,
            } = run;
            let (ratings, elo) = self.rate_match(ratings, record);

            history.push(EloHistoryPoint {
                team_id: record.home_team_id.clone(),
                date: record.game_date,
                game_id: record.game_id.clone(),
                elo_rating: elo.home_elo_after,
            });
            history.push(EloHistoryPoint {
                team_id: record.away_team_id.clone(),
                date: record.game_date,
                game_id: record.game_id.clone(),
                elo_rating: elo.away_elo_after,
            });
            features.push(elo);

            EloRun {
                features,
                ratings,
                history,
            }
        });

        tracing::debug!(
            "Rated {} matches across {} teams",
            run.features.len(),
            run.ratings.len()
        );
        run
    }
}
