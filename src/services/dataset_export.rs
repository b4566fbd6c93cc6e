use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use crate::error::{FeatureError, Result};
use crate::models::{AugmentedMatchRecord, BoxScore, Side};
use crate::services::feature_pipeline::FeatureTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl FromStr for ExportFormat {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(FeatureError::InvalidConfig(format!("Unsupported format: {other}"))),
        }
    }
}

/// Identity columns written ahead of the derived features.
const BASE_COLUMNS: [&str; 7] = [
    "GAME_ID",
    "GAME_DATE",
    "SEASON",
    "HOME_TEAM_ID",
    "HOME_TEAM_NAME",
    "AWAY_TEAM_ID",
    "AWAY_TEAM_NAME",
];

fn format_value(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Raw box-score columns carried by at least one record, home side first.
/// Optional inputs the table never had (makes/attempts, STL, BLK) are left out.
fn box_score_columns(table: &FeatureTable) -> Vec<(Side, usize, String)> {
    let mut columns = Vec::new();
    for side in Side::BOTH {
        for (i, (name, _)) in BoxScore::default().fields().iter().enumerate() {
            let present = table
                .records
                .iter()
                .any(|r| r.record.box_score(side).fields()[i].1.is_some());
            if present {
                columns.push((side, i, format!("{}_{}", side.prefix(), name)));
            }
        }
    }
    columns
}

fn base_fields(record: &AugmentedMatchRecord) -> Vec<String> {
    let r = &record.record;
    vec![
        r.game_id.clone(),
        r.game_date.format("%Y-%m-%d").to_string(),
        r.season.clone(),
        r.home_team_id.to_string(),
        r.home_team_name.clone().unwrap_or_default(),
        r.away_team_id.to_string(),
        r.away_team_name.clone().unwrap_or_default(),
    ]
}

/// One row per match: identity columns, the raw box scores under their input
/// names, then the derived features. Missing values are written as empty cells.
pub fn write_csv<W: Write>(table: &FeatureTable, writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    let feature_names = table.feature_names();
    if feature_names.is_empty() {
        writer.write_record(BASE_COLUMNS)?;
        writer.flush()?;
        return Ok(());
    }

    let box_columns = box_score_columns(table);
    let mut header: Vec<&str> = BASE_COLUMNS.to_vec();
    header.extend(box_columns.iter().map(|(_, _, name)| name.as_str()));
    header.extend(feature_names.iter().map(String::as_str));
    writer.write_record(&header)?;

    for record in &table.records {
        let mut row = base_fields(record);
        row.extend(box_columns.iter().map(|(side, i, _)| {
            format_value(record.record.box_score(*side).fields()[*i].1)
        }));
        row.extend(
            record
                .feature_columns()
                .into_iter()
                .map(|(_, v)| format_value(v)),
        );
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct JsonRow<'a> {
    game_id: &'a str,
    game_date: String,
    season: &'a str,
    home_team_id: &'a str,
    home_team_name: Option<&'a str>,
    away_team_id: &'a str,
    away_team_name: Option<&'a str>,
    home: &'a BoxScore,
    away: &'a BoxScore,
    features: Vec<(String, Option<f64>)>,
}

pub fn write_json<W: Write>(table: &FeatureTable, writer: W) -> Result<()> {
    let rows: Vec<JsonRow<'_>> = table
        .records
        .iter()
        .map(|record| {
            let r = &record.record;
            JsonRow {
                game_id: &r.game_id,
                game_date: r.game_date.format("%Y-%m-%d").to_string(),
                season: &r.season,
                home_team_id: r.home_team_id.as_str(),
                home_team_name: r.home_team_name.as_deref(),
                away_team_id: r.away_team_id.as_str(),
                away_team_name: r.away_team_name.as_deref(),
                home: &r.home,
                away: &r.away,
                features: record.feature_columns(),
            }
        })
        .collect();

    serde_json::to_writer_pretty(writer, &rows)?;
    Ok(())
}

pub fn export_to_path(
    table: &FeatureTable,
    path: impl AsRef<Path>,
    format: ExportFormat,
) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = BufWriter::new(File::create(path)?);
    match format {
        ExportFormat::Csv => write_csv(table, &mut writer)?,
        ExportFormat::Json => write_json(table, &mut writer)?,
    }
    writer.flush()?;

    tracing::info!("Wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MatchRecord, TeamId};
    use crate::services::{load_matches, FeaturePipeline};
    use chrono::NaiveDate;

    fn make_match(id: &str, day: u32, home: &str, away: &str, home_win: bool) -> MatchRecord {
        MatchRecord {
            game_id: id.to_string(),
            game_date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            season: "2023-24".to_string(),
            home_team_id: TeamId::new(home),
            away_team_id: TeamId::new(away),
            home_team_name: Some(format!("{home} City")),
            away_team_name: None,
            home: BoxScore { pts: 100.0, ..BoxScore::default() },
            away: BoxScore { pts: 95.0, ..BoxScore::default() },
            home_win,
        }
    }

    #[test]
    fn test_csv_has_one_row_per_match() {
        let table = FeaturePipeline::default().run(vec![
            make_match("1", 1, "A", "B", true),
            make_match("2", 3, "B", "A", false),
        ]);
        let mut buffer = Vec::new();
        write_csv(&table, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("GAME_ID,GAME_DATE,SEASON,HOME_TEAM_ID"));
        assert!(lines[0].contains("HOME_ELO_BEFORE"));
        assert!(lines[0].contains("AWAY_PTS_ROLL_20"));
        assert!(lines[1].starts_with("1,2024-03-01,2023-24,A,A City,B,,"));

        // Rolling cells are empty on a team's first game
        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let headers = reader.headers().unwrap().clone();
        let roll = headers.iter().position(|h| h == "HOME_PTS_ROLL_5").unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(&rows[0][roll], "");
        assert_eq!(&rows[1][roll], "95");
    }

    #[test]
    fn test_input_box_scores_carried_into_output() {
        let input = "\
GAME_ID,GAME_DATE,HOME_TEAM_ID,AWAY_TEAM_ID,HOME_WL,\
HOME_PTS,HOME_FGM,HOME_FGA,HOME_FG3_PCT,HOME_REB,HOME_AST,HOME_TOV,\
AWAY_PTS,AWAY_FGM,AWAY_FGA,AWAY_FG3_PCT,AWAY_REB,AWAY_AST,AWAY_TOV
g1,2024-01-05,BOS,NYK,W,112,42,88,0.375,45,27,11,104,39,90,0.333,41,22,15
";
        let loaded = load_matches(input.as_bytes()).unwrap();
        let table = FeaturePipeline::default().run(loaded.matches);
        let mut buffer = Vec::new();
        write_csv(&table, &mut buffer).unwrap();

        let mut reader = csv::Reader::from_reader(buffer.as_slice());
        let headers = reader.headers().unwrap().clone();
        let row = reader.records().next().unwrap().unwrap();
        let cell = |name: &str| {
            let i = headers
                .iter()
                .position(|h| h == name)
                .unwrap_or_else(|| panic!("missing column {name}"));
            row[i].to_string()
        };

        assert_eq!(cell("HOME_PTS"), "112");
        assert_eq!(cell("HOME_FGM"), "42");
        assert_eq!(cell("HOME_FGA"), "88");
        assert_eq!(cell("HOME_FG_PCT"), (42.0f64 / 88.0).to_string());
        assert_eq!(cell("HOME_FG3_PCT"), "0.375");
        assert_eq!(cell("AWAY_REB"), "41");
        assert_eq!(cell("AWAY_AST"), "22");
        assert_eq!(cell("AWAY_TOV"), "15");
        assert_eq!(cell("TOTAL_PTS"), "216");

        // Inputs without steals, blocks or three-point makes keep those columns out
        assert!(!headers.iter().any(|h| h == "HOME_STL" || h == "AWAY_BLK"));
        assert!(!headers.iter().any(|h| h == "HOME_FG3M"));

        // Raw columns sit between the identity columns and the derived ones
        let pts = headers.iter().position(|h| h == "HOME_PTS").unwrap();
        let wl = headers.iter().position(|h| h == "HOME_WL").unwrap();
        assert_eq!(pts, BASE_COLUMNS.len());
        assert!(pts < wl);
    }

    #[test]
    fn test_json_export() {
        let table = FeaturePipeline::default().run(vec![make_match("1", 1, "A", "B", true)]);
        let mut buffer = Vec::new();
        write_json(&table, &mut buffer).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(value[0]["game_id"], "1");
        assert_eq!(value[0]["home_team_id"], "A");
        assert_eq!(value[0]["home_team_name"], "A City");
        assert_eq!(value[0]["home"]["pts"], 100.0);
        assert_eq!(value[0]["away"]["pts"], 95.0);
        assert!(value[0]["features"].as_array().unwrap().len() > 10);
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("parquet".parse::<ExportFormat>().is_err());
    }
}
