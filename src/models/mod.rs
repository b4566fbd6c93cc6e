use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(pub String);

impl TeamId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which side of a match a team played on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Home, Side::Away];

    /// Column prefix used in the tabular format ("HOME" / "AWAY").
    pub fn prefix(self) -> &'static str {
        match self {
            Side::Home => "HOME",
            Side::Away => "AWAY",
        }
    }
}

/// Single-game box score for one side. Values never accumulate across games.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoxScore {
    pub pts: f64,
    pub fgm: Option<f64>,
    pub fga: Option<f64>,
    pub fg_pct: f64,
    pub fg3m: Option<f64>,
    pub fg3a: Option<f64>,
    pub fg3_pct: f64,
    pub reb: f64,
    pub ast: f64,
    pub tov: f64,
    pub stl: Option<f64>,
    pub blk: Option<f64>,
}

impl BoxScore {
    /// Raw fields under their tabular column suffix, in input order.
    pub fn fields(&self) -> [(&'static str, Option<f64>); 12] {
        [
            ("PTS", Some(self.pts)),
            ("FGM", self.fgm),
            ("FGA", self.fga),
            ("FG_PCT", Some(self.fg_pct)),
            ("FG3M", self.fg3m),
            ("FG3A", self.fg3a),
            ("FG3_PCT", Some(self.fg3_pct)),
            ("REB", Some(self.reb)),
            ("AST", Some(self.ast)),
            ("TOV", Some(self.tov)),
            ("STL", self.stl),
            ("BLK", self.blk),
        ]
    }
}

/// Box-score statistic tracked by the rolling builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stat {
    Pts,
    FgPct,
    Fg3Pct,
    Reb,
    Ast,
    Tov,
    Stl,
    Blk,
}

impl Stat {
    /// Statistics rolled for every window.
    pub const CORE: [Stat; 6] = [
        Stat::Pts,
        Stat::FgPct,
        Stat::Fg3Pct,
        Stat::Reb,
        Stat::Ast,
        Stat::Tov,
    ];
    /// Defensive statistics, rolled only for the short window and only when the input carries them.
    pub const DEFENSIVE: [Stat; 2] = [Stat::Stl, Stat::Blk];

    pub fn column(self) -> &'static str {
        match self {
            Stat::Pts => "PTS",
            Stat::FgPct => "FG_PCT",
            Stat::Fg3Pct => "FG3_PCT",
            Stat::Reb => "REB",
            Stat::Ast => "AST",
            Stat::Tov => "TOV",
            Stat::Stl => "STL",
            Stat::Blk => "BLK",
        }
    }

    pub fn value(self, box_score: &BoxScore) -> Option<f64> {
        match self {
            Stat::Pts => Some(box_score.pts),
            Stat::FgPct => Some(box_score.fg_pct),
            Stat::Fg3Pct => Some(box_score.fg3_pct),
            Stat::Reb => Some(box_score.reb),
            Stat::Ast => Some(box_score.ast),
            Stat::Tov => Some(box_score.tov),
            Stat::Stl => box_score.stl,
            Stat::Blk => box_score.blk,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub game_id: String,
    pub game_date: NaiveDate,
    pub season: String,
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    pub home_team_name: Option<String>,
    pub away_team_name: Option<String>,
    pub home: BoxScore,
    pub away: BoxScore,
    pub home_win: bool,
}

impl MatchRecord {
    pub fn total_points(&self) -> f64 {
        self.home.pts + self.away.pts
    }

    /// Home minus away.
    pub fn point_diff(&self) -> f64 {
        self.home.pts - self.away.pts
    }

    pub fn team(&self, side: Side) -> &TeamId {
        match side {
            Side::Home => &self.home_team_id,
            Side::Away => &self.away_team_id,
        }
    }

    pub fn box_score(&self, side: Side) -> &BoxScore {
        match side {
            Side::Home => &self.home,
            Side::Away => &self.away,
        }
    }

    pub fn won(&self, side: Side) -> bool {
        match side {
            Side::Home => self.home_win,
            Side::Away => !self.home_win,
        }
    }

    /// Chronological key: date first, game id breaks ties.
    pub fn chronological_key(&self) -> (NaiveDate, &str) {
        (self.game_date, self.game_id.as_str())
    }
}

/// Ratings around one match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EloFeatures {
    pub home_elo_before: f64,
    pub away_elo_before: f64,
    pub home_elo_after: f64,
    pub away_elo_after: f64,
    pub elo_diff: f64,
}

impl EloFeatures {
    pub fn home_delta(&self) -> f64 {
        self.home_elo_after - self.home_elo_before
    }

    pub fn away_delta(&self) -> f64 {
        self.away_elo_after - self.away_elo_before
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EloHistoryPoint {
    pub team_id: TeamId,
    pub date: NaiveDate,
    pub game_id: String,
    pub elo_rating: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RollingMean {
    pub window: usize,
    pub stat: Stat,
    /// `None` when the team has no prior game with this statistic.
    pub mean: Option<f64>,
}

/// Trailing means for one side of one match, in column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollingFeatures {
    pub means: Vec<RollingMean>,
}

impl RollingFeatures {
    pub fn get(&self, stat: Stat, window: usize) -> Option<f64> {
        self.means
            .iter()
            .find(|m| m.stat == stat && m.window == window)
            .and_then(|m| m.mean)
    }
}

/// Schedule and form context for one side of one match, as of tip-off.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SideContext {
    pub rest_days: i64,
    pub back_to_back: bool,
    pub win_streak: i32,
    pub season_wins: u32,
    pub season_games: u32,
    pub win_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContextFeatures {
    pub home: SideContext,
    pub away: SideContext,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugmentedMatchRecord {
    pub record: MatchRecord,
    pub elo: EloFeatures,
    pub home_rolling: RollingFeatures,
    pub away_rolling: RollingFeatures,
    pub context: ContextFeatures,
}

impl AugmentedMatchRecord {
    pub fn rolling(&self, side: Side) -> &RollingFeatures {
        match side {
            Side::Home => &self.home_rolling,
            Side::Away => &self.away_rolling,
        }
    }

    pub fn context(&self, side: Side) -> &SideContext {
        match side {
            Side::Home => &self.context.home,
            Side::Away => &self.context.away,
        }
    }

    /// Derived columns in output order. Rolling columns follow the window order
    /// of the run: home core, away core, then defensive stats per side.
    pub fn feature_columns(&self) -> Vec<(String, Option<f64>)> {
        let mut columns = vec![
            ("HOME_WL".to_string(), Some(if self.record.home_win { 1.0 } else { 0.0 })),
            ("TOTAL_PTS".to_string(), Some(self.record.total_points())),
            ("POINT_DIFF".to_string(), Some(self.record.point_diff())),
            ("HOME_ELO_BEFORE".to_string(), Some(self.elo.home_elo_before)),
            ("AWAY_ELO_BEFORE".to_string(), Some(self.elo.away_elo_before)),
            ("HOME_ELO_AFTER".to_string(), Some(self.elo.home_elo_after)),
            ("AWAY_ELO_AFTER".to_string(), Some(self.elo.away_elo_after)),
            ("ELO_DIFF".to_string(), Some(self.elo.elo_diff)),
        ];

        let mut windows: Vec<usize> = Vec::new();
        for m in &self.home_rolling.means {
            if !windows.contains(&m.window) {
                windows.push(m.window);
            }
        }
        for window in windows {
            for stats in [&Stat::CORE[..], &Stat::DEFENSIVE[..]] {
                for side in Side::BOTH {
                    for m in self.rolling(side).means.iter() {
                        if m.window == window && stats.contains(&m.stat) {
                            columns.push((
                                format!("{}_{}_ROLL_{}", side.prefix(), m.stat.column(), window),
                                m.mean,
                            ));
                        }
                    }
                }
            }
        }

        for side in Side::BOTH {
            let ctx = self.context(side);
            let p = side.prefix();
            columns.push((format!("{p}_REST_DAYS"), Some(ctx.rest_days as f64)));
            let back_to_back = if ctx.back_to_back { 1.0 } else { 0.0 };
            columns.push((format!("{p}_BACK_TO_BACK"), Some(back_to_back)));
            columns.push((format!("{p}_WIN_STREAK"), Some(ctx.win_streak as f64)));
            columns.push((format!("{p}_SEASON_WINS"), Some(ctx.season_wins as f64)));
            columns.push((format!("{p}_SEASON_GAMES"), Some(ctx.season_games as f64)));
            columns.push((format!("{p}_WIN_PCT"), Some(ctx.win_pct)));
        }

        columns
    }

    pub fn feature_map(&self) -> BTreeMap<String, Option<f64>> {
        self.feature_columns().into_iter().collect()
    }
}
