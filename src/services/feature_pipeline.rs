use std::collections::{BTreeMap, HashSet};

use crate::config::FeatureConfig;
use crate::error::MalformedKind;
use crate::models::{
    AugmentedMatchRecord, ContextFeatures, EloHistoryPoint, MatchRecord, Side, Stat,
};
use crate::services::context_features::ContextFeatureBuilder;
use crate::services::elo_calculator::{EloConfig, EloEngine, TeamRatings};
use crate::services::rolling_stats::RollingFeatureBuilder;
use crate::services::team_timeline::TeamTimelines;

/// Counts for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub input_matches: usize,
    pub excluded: BTreeMap<MalformedKind, usize>,
    pub teams: usize,
}

impl RunReport {
    pub fn excluded_total(&self) -> usize {
        self.excluded.values().sum()
    }
}

/// Augmented table produced by one run, one row per accepted match in
/// chronological order.
#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    pub records: Vec<AugmentedMatchRecord>,
    /// Ratings after the last match
    pub final_ratings: TeamRatings,
    /// Post-match rating of both teams, match by match
    pub history: Vec<EloHistoryPoint>,
    pub report: RunReport,
}

impl FeatureTable {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Derived column names, in output order.
    pub fn feature_names(&self) -> Vec<String> {
        self.records
            .first()
            .map(|r| r.feature_columns().into_iter().map(|(name, _)| name).collect())
            .unwrap_or_default()
    }
}

pub struct FeaturePipeline {
    config: FeatureConfig,
}

impl Default for FeaturePipeline {
    fn default() -> Self {
        Self::new(FeatureConfig::default())
    }
}

impl FeaturePipeline {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Sort, rate, roll and contextualise a match table in one ordered pass.
    pub fn run(&self, matches: Vec<MatchRecord>) -> FeatureTable {
        let input_matches = matches.len();
        let (mut matches, excluded) = screen_matches(matches);
        for (kind, count) in &excluded {
            tracing::warn!("Excluded {} matches: {}", count, kind);
        }

        if matches.is_empty() {
            tracing::info!("No matches to process");
            return FeatureTable {
                report: RunReport {
                    input_matches,
                    excluded,
                    teams: 0,
                },
                ..FeatureTable::default()
            };
        }

        matches.sort_by(|a, b| a.chronological_key().cmp(&b.chronological_key()));
        tracing::info!("Generating features for {} matches", matches.len());

        tracing::info!("Calculating ELO ratings...");
        let elo = EloEngine::new(EloConfig::from(&self.config)).process(&matches);

        let (mut rolling, context, teams) = {
            let timelines = TeamTimelines::from_matches(&matches);

            tracing::info!(
                "Adding rolling statistics for windows {:?}...",
                self.config.rolling_windows
            );
            let defensive = defensive_stats_present(&matches);
            if defensive.len() < Stat::DEFENSIVE.len() {
                tracing::warn!("Defensive stats missing from input, rolling only {:?}", defensive);
            }
            let rolling = RollingFeatureBuilder::new(self.config.rolling_windows.clone())
                .with_defensive_stats(&defensive)
                .build(&timelines);

            tracing::info!("Calculating rest days, streaks and season records...");
            let context = ContextFeatureBuilder::from(&self.config).build(&timelines);

            (rolling, context, timelines.teams())
        };

        let records = matches
            .into_iter()
            .zip(elo.features)
            .enumerate()
            .map(|(i, (record, elo))| {
                let side_context = |side: Side| context[&(i, side)];
                AugmentedMatchRecord {
                    elo,
                    home_rolling: rolling.remove(&(i, Side::Home)).unwrap_or_default(),
                    away_rolling: rolling.remove(&(i, Side::Away)).unwrap_or_default(),
                    context: ContextFeatures {
                        home: side_context(Side::Home),
                        away: side_context(Side::Away),
                    },
                    record,
                }
            })
            .collect::<Vec<_>>();

        tracing::info!("Features generated for {} matches across {} teams", records.len(), teams);

        FeatureTable {
            records,
            final_ratings: elo.ratings,
            history: elo.history,
            report: RunReport {
                input_matches,
                excluded,
                teams,
            },
        }
    }
}

/// Drops matches that would corrupt the scan, counting them per kind.
fn screen_matches(
    matches: Vec<MatchRecord>,
) -> (Vec<MatchRecord>, BTreeMap<MalformedKind, usize>) {
    let mut excluded = BTreeMap::new();
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(matches.len());

    for record in matches {
        let problem = if record.game_id.trim().is_empty() {
            Some(MalformedKind::MissingGameId)
        } else if record.home_team_id.as_str().trim().is_empty()
            || record.away_team_id.as_str().trim().is_empty()
        {
            Some(MalformedKind::MissingTeamId)
        } else if record.home_team_id == record.away_team_id {
            Some(MalformedKind::SameTeamBothSides)
        } else if has_negative_stat(&record) {
            Some(MalformedKind::NegativeValue)
        } else if !seen.insert(record.game_id.clone()) {
            Some(MalformedKind::DuplicateGame)
        } else {
            None
        };

        match problem {
            Some(kind) => {
                tracing::debug!("Skipping game {}: {}", record.game_id, kind);
                *excluded.entry(kind).or_insert(0) += 1;
            }
            None => kept.push(record),
        }
    }

    (kept, excluded)
}

fn has_negative_stat(record: &MatchRecord) -> bool {
    Side::BOTH.iter().any(|side| {
        record
            .box_score(*side)
            .fields()
            .iter()
            .any(|(_, value)| value.is_some_and(|v| v < 0.0))
    })
}

/// Defensive stats the table carries; a stat counts when any side of any match has it.
fn defensive_stats_present(matches: &[MatchRecord]) -> Vec<Stat> {
    Stat::DEFENSIVE
        .iter()
        .copied()
        .filter(|stat| {
            matches.iter().any(|m| {
                Side::BOTH
                    .iter()
                    .any(|side| stat.value(m.box_score(*side)).is_some())
            })
        })
        .collect()
}
