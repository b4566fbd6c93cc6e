use csv::StringRecord;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{FeatureError, MalformedKind, Result};
use crate::models::{BoxScore, MatchRecord, Side, TeamId};
use crate::utils::{parse_game_date, season_for_date};

/// Outcome of reading a match table.
#[derive(Debug, Clone, Default)]
pub struct LoadedMatches {
    pub matches: Vec<MatchRecord>,
    pub rows_read: usize,
    pub skipped: BTreeMap<MalformedKind, usize>,
}

impl LoadedMatches {
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }
}

/// Header lookup for a match table. Column names are case-sensitive.
#[derive(Debug)]
struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    fn new(headers: &StringRecord) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();
        Self { index }
    }

    fn optional(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    fn required(&self, name: &str) -> Result<usize> {
        self.optional(name)
            .ok_or_else(|| FeatureError::MissingColumn(name.to_string()))
    }
}

/// Where a percentage comes from: its own column, or makes over attempts.
#[derive(Debug, Clone, Copy)]
enum PctSource {
    Column(usize),
    Derived,
}

#[derive(Debug)]
struct SideColumns {
    team_id: usize,
    team_name: Option<usize>,
    pts: usize,
    fgm: Option<usize>,
    fga: Option<usize>,
    fg_pct: PctSource,
    fg3m: Option<usize>,
    fg3a: Option<usize>,
    fg3_pct: PctSource,
    reb: usize,
    ast: usize,
    tov: usize,
    stl: Option<usize>,
    blk: Option<usize>,
}

impl SideColumns {
    fn resolve(columns: &Columns, side: Side) -> Result<Self> {
        let name = |stat: &str| format!("{}_{}", side.prefix(), stat);
        let fgm = columns.optional(&name("FGM"));
        let fga = columns.optional(&name("FGA"));
        let fg3m = columns.optional(&name("FG3M"));
        let fg3a = columns.optional(&name("FG3A"));

        let pct =
            |pct_col: &str, makes: Option<usize>, attempts: Option<usize>| -> Result<PctSource> {
                match (columns.optional(&name(pct_col)), makes, attempts) {
                    (Some(i), _, _) => Ok(PctSource::Column(i)),
                    (None, Some(_), Some(_)) => Ok(PctSource::Derived),
                    (None, _, _) => Err(FeatureError::MissingColumn(name(pct_col))),
                }
            };

        Ok(Self {
            team_id: columns.required(&name("TEAM_ID"))?,
            team_name: columns.optional(&name("TEAM_NAME")),
            pts: columns.required(&name("PTS"))?,
            fgm,
            fga,
            fg_pct: pct("FG_PCT", fgm, fga)?,
            fg3m,
            fg3a,
            fg3_pct: pct("FG3_PCT", fg3m, fg3a)?,
            reb: columns.required(&name("REB"))?,
            ast: columns.required(&name("AST"))?,
            tov: columns.required(&name("TOV"))?,
            stl: columns.optional(&name("STL")),
            blk: columns.optional(&name("BLK")),
        })
    }

    fn has_defensive(&self) -> bool {
        self.stl.is_some() && self.blk.is_some()
    }
}

#[derive(Debug)]
struct MatchColumns {
    game_id: usize,
    game_date: usize,
    season: Option<usize>,
    home_wl: usize,
    home: SideColumns,
    away: SideColumns,
}

impl MatchColumns {
    fn resolve(headers: &StringRecord) -> Result<Self> {
        let columns = Columns::new(headers);
        Ok(Self {
            game_id: columns.required("GAME_ID")?,
            game_date: columns.required("GAME_DATE")?,
            season: columns.optional("SEASON"),
            home_wl: columns.required("HOME_WL")?,
            home: SideColumns::resolve(&columns, Side::Home)?,
            away: SideColumns::resolve(&columns, Side::Away)?,
        })
    }
}

fn field<'r>(row: &'r StringRecord, index: usize) -> &'r str {
    row.get(index).map(str::trim).unwrap_or("")
}

fn number(row: &StringRecord, index: usize, column: &str, line: usize) -> Result<f64> {
    let raw = field(row, index);
    let value = raw
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            FeatureError::malformed(line, MalformedKind::InvalidNumber, format!("{column}='{raw}'"))
        })?;
    non_negative(value, column, line)
}

/// Box-score counts and rates are never negative.
fn non_negative(value: f64, column: &str, line: usize) -> Result<f64> {
    if value < 0.0 {
        return Err(FeatureError::malformed(
            line,
            MalformedKind::NegativeValue,
            format!("{column}={value}"),
        ));
    }
    Ok(value)
}

/// Optional cells that are blank or unparsable read as absent.
fn optional_number(
    row: &StringRecord,
    index: Option<usize>,
    column: &str,
    line: usize,
) -> Result<Option<f64>> {
    index
        .and_then(|i| field(row, i).parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map(|v| non_negative(v, column, line))
        .transpose()
}

fn percentage(
    row: &StringRecord,
    source: PctSource,
    (makes, attempts): (Option<f64>, Option<f64>),
    column: &str,
    line: usize,
) -> Result<f64> {
    match source {
        PctSource::Column(i) => number(row, i, column, line),
        PctSource::Derived => match (makes, attempts) {
            (Some(_), Some(a)) if a == 0.0 => Ok(0.0),
            (Some(m), Some(a)) => Ok(m / a),
            _ => Err(FeatureError::malformed(
                line,
                MalformedKind::InvalidNumber,
                format!("{column} not derivable"),
            )),
        },
    }
}

fn parse_outcome(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "1" | "1.0" | "W" | "TRUE" => Some(true),
        "0" | "0.0" | "L" | "FALSE" => Some(false),
        _ => None,
    }
}

fn parse_box_score(
    row: &StringRecord,
    cols: &SideColumns,
    side: Side,
    line: usize,
) -> Result<BoxScore> {
    let col = |stat: &str| format!("{}_{}", side.prefix(), stat);
    let optional = |index: Option<usize>, stat: &str| optional_number(row, index, &col(stat), line);
    let fgm = optional(cols.fgm, "FGM")?;
    let fga = optional(cols.fga, "FGA")?;
    let fg3m = optional(cols.fg3m, "FG3M")?;
    let fg3a = optional(cols.fg3a, "FG3A")?;

    Ok(BoxScore {
        pts: number(row, cols.pts, &col("PTS"), line)?,
        fgm,
        fga,
        fg_pct: percentage(row, cols.fg_pct, (fgm, fga), &col("FG_PCT"), line)?,
        fg3m,
        fg3a,
        fg3_pct: percentage(row, cols.fg3_pct, (fg3m, fg3a), &col("FG3_PCT"), line)?,
        reb: number(row, cols.reb, &col("REB"), line)?,
        ast: number(row, cols.ast, &col("AST"), line)?,
        tov: number(row, cols.tov, &col("TOV"), line)?,
        stl: optional(cols.stl, "STL")?,
        blk: optional(cols.blk, "BLK")?,
    })
}

fn team_name(row: &StringRecord, index: Option<usize>) -> Option<String> {
    index
        .map(|i| field(row, i))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

fn parse_row(row: &StringRecord, cols: &MatchColumns, line: usize) -> Result<MatchRecord> {
    let game_id = field(row, cols.game_id);
    if game_id.is_empty() {
        return Err(FeatureError::malformed(line, MalformedKind::MissingGameId, "empty game id"));
    }

    let raw_date = field(row, cols.game_date);
    let game_date = parse_game_date(raw_date)
        .ok_or_else(|| FeatureError::malformed(line, MalformedKind::UnparsableDate, raw_date))?;

    let home_team_id = field(row, cols.home.team_id);
    let away_team_id = field(row, cols.away.team_id);
    if home_team_id.is_empty() || away_team_id.is_empty() {
        return Err(FeatureError::malformed(line, MalformedKind::MissingTeamId, "empty team id"));
    }
    if home_team_id == away_team_id {
        return Err(FeatureError::malformed(line, MalformedKind::SameTeamBothSides, home_team_id));
    }

    let raw_wl = field(row, cols.home_wl);
    let home_win = parse_outcome(raw_wl)
        .ok_or_else(|| FeatureError::malformed(line, MalformedKind::InvalidOutcome, raw_wl))?;

    let season = cols
        .season
        .map(|i| field(row, i))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| season_for_date(game_date));

    Ok(MatchRecord {
        game_id: game_id.to_string(),
        game_date,
        season,
        home_team_id: TeamId::new(home_team_id),
        away_team_id: TeamId::new(away_team_id),
        home_team_name: team_name(row, cols.home.team_name),
        away_team_name: team_name(row, cols.away.team_name),
        home: parse_box_score(row, &cols.home, Side::Home, line)?,
        away: parse_box_score(row, &cols.away, Side::Away, line)?,
        home_win,
    })
}

/// Reads a match table. Missing mandatory columns abort the read; rows that
/// cannot be parsed are skipped and counted per kind.
pub fn load_matches<R: Read>(reader: R) -> Result<LoadedMatches> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let cols = MatchColumns::resolve(&headers)?;

    if !cols.home.has_defensive() || !cols.away.has_defensive() {
        tracing::warn!("Steal/block columns not found, defensive rolling stats will be limited");
    }
    if cols.season.is_none() {
        tracing::info!("No SEASON column, deriving seasons from game dates");
    }

    let mut loaded = LoadedMatches::default();
    for (i, row) in csv_reader.byte_records().enumerate() {
        // Header is line 1
        let line = i + 2;
        loaded.rows_read += 1;
        let row = match StringRecord::from_byte_record(row?) {
            Ok(row) => row,
            Err(e) => {
                tracing::debug!("Skipping row {}: {}", line, e.utf8_error());
                *loaded.skipped.entry(MalformedKind::InvalidEncoding).or_insert(0) += 1;
                continue;
            }
        };

        match parse_row(&row, &cols, line) {
            Ok(record) => loaded.matches.push(record),
            Err(FeatureError::MalformedRecord { row, kind, detail }) => {
                tracing::debug!("Skipping row {}: {} ({})", row, kind, detail);
                *loaded.skipped.entry(kind).or_insert(0) += 1;
            }
            Err(e) => return Err(e),
        }
    }

    if loaded.skipped_total() > 0 {
        tracing::warn!(
            "Skipped {} of {} rows: {:?}",
            loaded.skipped_total(),
            loaded.rows_read,
            loaded.skipped
        );
    }
    tracing::info!("Loaded {} matches", loaded.matches.len());
    Ok(loaded)
}

pub fn load_matches_from_path(path: impl AsRef<Path>) -> Result<LoadedMatches> {
    let path = path.as_ref();
    tracing::info!("Loading matches from {}", path.display());
    load_matches(File::open(path)?)
}
