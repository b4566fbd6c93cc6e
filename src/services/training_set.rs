//! Prediction-input contract: the feature matrix and targets a downstream
//! win/margin/total model is trained on.

use std::collections::BTreeMap;
use std::io::Write;

use crate::error::{FeatureError, Result};
use crate::models::AugmentedMatchRecord;

/// Columns the predictor consumes, in matrix order.
pub const PREDICTOR_FEATURES: [&str; 29] = [
    "HOME_ELO_BEFORE",
    "AWAY_ELO_BEFORE",
    "ELO_DIFF",
    "HOME_PTS_ROLL_5",
    "AWAY_PTS_ROLL_5",
    "HOME_FG_PCT_ROLL_5",
    "AWAY_FG_PCT_ROLL_5",
    "HOME_FG3_PCT_ROLL_5",
    "AWAY_FG3_PCT_ROLL_5",
    "HOME_REB_ROLL_5",
    "AWAY_REB_ROLL_5",
    "HOME_AST_ROLL_5",
    "AWAY_AST_ROLL_5",
    "HOME_TOV_ROLL_5",
    "AWAY_TOV_ROLL_5",
    "HOME_PTS_ROLL_10",
    "AWAY_PTS_ROLL_10",
    "HOME_REST_DAYS",
    "AWAY_REST_DAYS",
    "HOME_BACK_TO_BACK",
    "AWAY_BACK_TO_BACK",
    "HOME_WIN_STREAK",
    "AWAY_WIN_STREAK",
    "HOME_WIN_PCT",
    "AWAY_WIN_PCT",
    "HOME_STL_ROLL_5",
    "AWAY_STL_ROLL_5",
    "HOME_BLK_ROLL_5",
    "AWAY_BLK_ROLL_5",
];

/// A column computed from selected predictor columns.
#[derive(Debug, Clone, Copy)]
pub struct Interaction {
    pub name: &'static str,
    pub inputs: &'static [&'static str],
    combine: fn(&[f64]) -> f64,
}

impl Interaction {
    fn evaluate(&self, features: &BTreeMap<String, Option<f64>>) -> Option<f64> {
        let values: Option<Vec<f64>> = self
            .inputs
            .iter()
            .map(|name| features.get(*name).copied().flatten())
            .collect();
        values.map(|v| (self.combine)(&v))
    }
}

/// Appended after the predictor columns whenever all of their inputs were selected.
pub const INTERACTIONS: [Interaction; 4] = [
    Interaction {
        name: "ELO_DIFF_X_REST",
        inputs: &["ELO_DIFF", "HOME_REST_DAYS", "AWAY_REST_DAYS"],
        combine: |v| v[0] * (v[1] - v[2]),
    },
    Interaction {
        name: "WIN_PCT_DIFF",
        inputs: &["HOME_WIN_PCT", "AWAY_WIN_PCT"],
        combine: |v| v[0] - v[1],
    },
    Interaction {
        name: "PTS_DIFF_ROLL_5",
        inputs: &["HOME_PTS_ROLL_5", "AWAY_PTS_ROLL_5"],
        combine: |v| v[0] - v[1],
    },
    Interaction {
        name: "FG_PCT_DIFF_ROLL_5",
        inputs: &["HOME_FG_PCT_ROLL_5", "AWAY_FG_PCT_ROLL_5"],
        combine: |v| v[0] - v[1],
    },
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSet {
    pub feature_names: Vec<String>,
    pub game_ids: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    /// Home win (1) or loss (0)
    pub y_win: Vec<u8>,
    /// Home minus away points
    pub y_margin: Vec<f64>,
    pub y_total: Vec<f64>,
    /// Matches left out because a feature was missing
    pub dropped: usize,
}

impl TrainingSet {
    /// Builds the matrix from augmented records in chronological order.
    /// Requested columns that no record carries are left out with a warning,
    /// interaction columns follow, and rows missing any value are dropped.
    pub fn from_records(records: &[AugmentedMatchRecord], columns: &[&str]) -> Self {
        let maps: Vec<_> = records.iter().map(AugmentedMatchRecord::feature_map).collect();

        let selected: Vec<&str> = columns
            .iter()
            .copied()
            .filter(|c| maps.iter().any(|m| m.contains_key(*c)))
            .collect();
        if selected.len() < columns.len() && !records.is_empty() {
            let missing: Vec<&str> = columns
                .iter()
                .copied()
                .filter(|c| !selected.contains(c))
                .collect();
            tracing::warn!("Features not available: {:?}", missing);
        }

        let interactions: Vec<&Interaction> = INTERACTIONS
            .iter()
            .filter(|ix| ix.inputs.iter().all(|input| selected.contains(input)))
            .collect();

        let mut set = TrainingSet {
            feature_names: selected
                .iter()
                .map(|c| c.to_string())
                .chain(interactions.iter().map(|ix| ix.name.to_string()))
                .collect(),
            ..TrainingSet::default()
        };

        for (record, map) in records.iter().zip(&maps) {
            let row: Option<Vec<f64>> = selected
                .iter()
                .map(|name| map.get(*name).copied().flatten())
                .chain(interactions.iter().map(|ix| ix.evaluate(map)))
                .collect();

            match row {
                Some(row) => {
                    set.rows.push(row);
                    set.game_ids.push(record.record.game_id.clone());
                    set.y_win.push(u8::from(record.record.home_win));
                    set.y_margin.push(record.record.point_diff());
                    set.y_total.push(record.record.total_points());
                }
                None => set.dropped += 1,
            }
        }

        tracing::info!(
            "Training set: {} rows x {} features ({} dropped for missing values)",
            set.rows.len(),
            set.feature_names.len(),
            set.dropped
        );
        set
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn slice(&self, range: std::ops::Range<usize>) -> Self {
        TrainingSet {
            feature_names: self.feature_names.clone(),
            game_ids: self.game_ids[range.clone()].to_vec(),
            rows: self.rows[range.clone()].to_vec(),
            y_win: self.y_win[range.clone()].to_vec(),
            y_margin: self.y_margin[range.clone()].to_vec(),
            y_total: self.y_total[range].to_vec(),
            dropped: 0,
        }
    }

    /// Chronological split: the last `test_fraction` of rows form the test set.
    /// Rows are never shuffled, so every test match is later than every training match.
    pub fn temporal_split(&self, test_fraction: f64) -> Result<(Self, Self)> {
        if !(0.0..1.0).contains(&test_fraction) {
            return Err(FeatureError::InvalidConfig(format!(
                "test fraction must be within [0, 1), got {test_fraction}"
            )));
        }
        let split = ((self.len() as f64) * (1.0 - test_fraction)) as usize;
        Ok((self.slice(0..split), self.slice(split..self.len())))
    }

    /// Features followed by the three targets, one row per match.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);

        let mut header = vec!["GAME_ID".to_string()];
        header.extend(self.feature_names.iter().cloned());
        header.extend(["HOME_WL", "POINT_DIFF", "TOTAL_PTS"].map(String::from));
        writer.write_record(&header)?;

        for i in 0..self.len() {
            let mut row = vec![self.game_ids[i].clone()];
            row.extend(self.rows[i].iter().map(f64::to_string));
            row.push(self.y_win[i].to_string());
            row.push(self.y_margin[i].to_string());
            row.push(self.y_total[i].to_string());
            writer.write_record(&row)?;
        }

        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoxScore, MatchRecord, TeamId};
    use crate::services::FeaturePipeline;
    use chrono::{Duration, NaiveDate};

    fn season_of_games(n: usize) -> Vec<AugmentedMatchRecord> {
        let start = NaiveDate::from_ymd_opt(2023, 10, 24).unwrap();
        let matches = (0..n)
            .map(|i| {
                let (home, away) = if i % 2 == 0 { ("A", "B") } else { ("B", "A") };
                let home_pts = 100.0 + i as f64;
                MatchRecord {
                    game_id: format!("{:03}", i),
                    game_date: start + Duration::days(i as i64 * 2),
                    season: "2023-24".to_string(),
                    home_team_id: TeamId::new(home),
                    away_team_id: TeamId::new(away),
                    home_team_name: None,
                    away_team_name: None,
                    home: BoxScore { pts: home_pts, ..BoxScore::default() },
                    away: BoxScore { pts: 100.0, ..BoxScore::default() },
                    home_win: home_pts > 100.0,
                }
            })
            .collect();
        FeaturePipeline::default().run(matches).records
    }

    #[test]
    fn test_rows_with_missing_features_dropped() {
        let records = season_of_games(6);
        let set = TrainingSet::from_records(&records, &PREDICTOR_FEATURES);
        // No steals or blocks in the input: 25 base columns plus every interaction
        assert_eq!(set.feature_names.len(), 25 + INTERACTIONS.len());
        assert!(!set.feature_names.iter().any(|n| n.contains("STL")));
        // Both teams play every match, so only the first lacks rolling history
        assert_eq!(set.dropped, 1);
        assert_eq!(set.len(), 5);
        assert_eq!(set.game_ids[0], "001");
        assert_eq!(set.y_margin[0], 1.0);
        assert_eq!(set.y_total[0], 201.0);
        assert_eq!(set.y_win[0], 1);
        assert!(set.rows.iter().all(|r| r.len() == set.feature_names.len()));
    }

    fn make_match(id: &str, day: u32, home: &str, away: &str, pts: (f64, f64)) -> MatchRecord {
        let box_score = |pts: f64| BoxScore {
            pts,
            fg_pct: pts / 200.0,
            stl: Some(8.0),
            blk: Some(5.0),
            ..BoxScore::default()
        };
        MatchRecord {
            game_id: id.to_string(),
            game_date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            season: "2023-24".to_string(),
            home_team_id: TeamId::new(home),
            away_team_id: TeamId::new(away),
            home_team_name: None,
            away_team_name: None,
            home: box_score(pts.0),
            away: box_score(pts.1),
            home_win: pts.0 > pts.1,
        }
    }

    #[test]
    fn test_defensive_and_interaction_columns() {
        let records = FeaturePipeline::default()
            .run(vec![
                make_match("1", 1, "A", "B", (110.0, 100.0)),
                make_match("2", 2, "C", "A", (100.0, 105.0)),
                make_match("3", 5, "A", "B", (98.0, 97.0)),
            ])
            .records;
        let set = TrainingSet::from_records(&records, &PREDICTOR_FEATURES);
        assert_eq!(set.feature_names.len(), PREDICTOR_FEATURES.len() + INTERACTIONS.len());
        assert!(set.feature_names.contains(&"AWAY_BLK_ROLL_5".to_string()));

        // Only game 3 has history for both sides
        assert_eq!(set.game_ids, vec!["3".to_string()]);
        let row = &set.rows[0];
        let value = |name: &str| row[set.feature_names.iter().position(|n| n == name).unwrap()];

        assert_eq!(value("HOME_STL_ROLL_5"), 8.0);
        // A scored 110 and 105, B scored 100
        assert_eq!(value("PTS_DIFF_ROLL_5"), 7.5);
        assert!((value("FG_PCT_DIFF_ROLL_5") - (0.5375 - 0.5)).abs() < 1e-12);
        // A is 2-0, B is 0-1
        assert_eq!(value("WIN_PCT_DIFF"), 1.0);
        // A rested 3 days, B rested 4
        assert_eq!(value("HOME_REST_DAYS"), 3.0);
        assert_eq!(value("AWAY_REST_DAYS"), 4.0);
        assert_eq!(value("ELO_DIFF_X_REST"), -value("ELO_DIFF"));
        assert!(value("ELO_DIFF") > 0.0);
    }

    #[test]
    fn test_interactions_need_every_input() {
        let records = season_of_games(3);
        let names = ["ELO_DIFF", "HOME_REST_DAYS", "HOME_WIN_PCT"];
        let set = TrainingSet::from_records(&records, &names);
        assert_eq!(set.feature_names.len(), 3);
    }

    #[test]
    fn test_unknown_columns_are_skipped() {
        let records = season_of_games(3);
        let set = TrainingSet::from_records(&records, &["ELO_DIFF", "HOME_STL_ROLL_5"]);
        assert_eq!(set.feature_names, vec!["ELO_DIFF".to_string()]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_temporal_split_keeps_order() {
        let records = season_of_games(11);
        let set = TrainingSet::from_records(&records, &PREDICTOR_FEATURES);
        let (train, test) = set.temporal_split(0.2).unwrap();
        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);
        assert!(train.game_ids.last().unwrap() < test.game_ids.first().unwrap());
        assert!(set.temporal_split(1.0).is_err());
    }

    #[test]
    fn test_write_csv() {
        let records = season_of_games(3);
        let set = TrainingSet::from_records(&records, &["ELO_DIFF", "HOME_WIN_PCT"]);
        let mut buffer = Vec::new();
        set.write_csv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("GAME_ID,ELO_DIFF,HOME_WIN_PCT,HOME_WL,POINT_DIFF,TOTAL_PTS")
        );
        assert_eq!(lines.next(), Some("000,0,0.5,0,0,200"));
    }
}
