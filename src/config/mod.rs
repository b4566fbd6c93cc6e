use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::error::{FeatureError, Result};

pub const DEFAULT_INITIAL_ELO: f64 = 1500.0;
pub const DEFAULT_K_FACTOR: f64 = 20.0;
pub const DEFAULT_HOME_ADVANTAGE: f64 = 100.0;
pub const DEFAULT_ROLLING_WINDOWS: [usize; 3] = [5, 10, 20];
/// Rest assigned to a team's first match, when there is no previous game to measure from.
pub const DEFAULT_REST_DAYS: i64 = 3;
/// Season win percentage before a team's first game of the season.
pub const DEFAULT_WIN_PCT: f64 = 0.5;

const ENV_PREFIX: &str = "ODDSFORGE_";

/// Options for one pipeline run. Passed explicitly, never global.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub initial_elo: f64,
    pub k_factor: f64,
    pub home_advantage: f64,
    pub rolling_windows: Vec<usize>,
    pub default_rest_days: i64,
    pub default_win_pct: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            initial_elo: DEFAULT_INITIAL_ELO,
            k_factor: DEFAULT_K_FACTOR,
            home_advantage: DEFAULT_HOME_ADVANTAGE,
            rolling_windows: DEFAULT_ROLLING_WINDOWS.to_vec(),
            default_rest_days: DEFAULT_REST_DAYS,
            default_win_pct: DEFAULT_WIN_PCT,
        }
    }
}

impl FeatureConfig {
    /// Defaults overlaid with `ODDSFORGE_*` environment variables.
    /// Call `dotenv::dotenv()` first if a `.env` file should be honoured.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut config = Self::default();

        if let Some(v) = get("INITIAL_ELO") {
            config.initial_elo = parse_value("INITIAL_ELO", &v)?;
        }
        if let Some(v) = get("K_FACTOR") {
            config.k_factor = parse_value("K_FACTOR", &v)?;
        }
        if let Some(v) = get("HOME_ADVANTAGE") {
            config.home_advantage = parse_value("HOME_ADVANTAGE", &v)?;
        }
        if let Some(v) = get("ROLLING_WINDOWS") {
            config.rolling_windows = parse_windows(&v)?;
        }
        if let Some(v) = get("DEFAULT_REST_DAYS") {
            config.default_rest_days = parse_value("DEFAULT_REST_DAYS", &v)?;
        }
        if let Some(v) = get("DEFAULT_WIN_PCT") {
            config.default_win_pct = parse_value("DEFAULT_WIN_PCT", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.initial_elo.is_finite() || !self.home_advantage.is_finite() {
            return Err(FeatureError::InvalidConfig(
                "initial_elo and home_advantage must be finite".to_string(),
            ));
        }
        if !self.k_factor.is_finite() || self.k_factor < 0.0 {
            return Err(FeatureError::InvalidConfig(format!(
                "k_factor must be a non-negative number, got {}",
                self.k_factor
            )));
        }
        if self.rolling_windows.is_empty() {
            return Err(FeatureError::InvalidConfig(
                "at least one rolling window is required".to_string(),
            ));
        }
        if self.rolling_windows.contains(&0) {
            return Err(FeatureError::InvalidConfig(
                "rolling windows must be positive".to_string(),
            ));
        }
        if self.default_rest_days < 0 {
            return Err(FeatureError::InvalidConfig(format!(
                "default_rest_days must be >= 0, got {}",
                self.default_rest_days
            )));
        }
        if !(0.0..=1.0).contains(&self.default_win_pct) {
            return Err(FeatureError::InvalidConfig(format!(
                "default_win_pct must be within [0, 1], got {}",
                self.default_win_pct
            )));
        }
        Ok(())
    }
}

fn parse_value<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| {
        FeatureError::InvalidConfig(format!("{ENV_PREFIX}{name}: cannot parse '{raw}'"))
    })
}

/// Parses a window list such as `5,10,20`. Duplicates are dropped, order is kept.
pub fn parse_windows(raw: &str) -> Result<Vec<usize>> {
    let mut windows = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let window: usize = parse_value("ROLLING_WINDOWS", part)?;
        if !windows.contains(&window) {
            windows.push(window);
        }
    }
    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = FeatureConfig::default();
        assert_eq!(config.initial_elo, 1500.0);
        assert_eq!(config.k_factor, 20.0);
        assert_eq!(config.home_advantage, 100.0);
        assert_eq!(config.rolling_windows, vec![5, 10, 20]);
        assert_eq!(config.default_rest_days, 3);
        assert_eq!(config.default_win_pct, 0.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = FeatureConfig::from_lookup(lookup_from(&[
            ("ODDSFORGE_K_FACTOR", "32"),
            ("ODDSFORGE_ROLLING_WINDOWS", "3, 7,3"),
        ]))
        .unwrap();
        assert_eq!(config.k_factor, 32.0);
        assert_eq!(config.rolling_windows, vec![3, 7]);
        assert_eq!(config.initial_elo, 1500.0);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = FeatureConfig::from_lookup(lookup_from(&[("ODDSFORGE_K_FACTOR", "fast")]));
        assert!(matches!(err, Err(FeatureError::InvalidConfig(_))));

        let err = FeatureConfig::from_lookup(lookup_from(&[("ODDSFORGE_ROLLING_WINDOWS", "0,5")]));
        assert!(matches!(err, Err(FeatureError::InvalidConfig(_))));

        let err = FeatureConfig::from_lookup(lookup_from(&[("ODDSFORGE_DEFAULT_WIN_PCT", "1.5")]));
        assert!(matches!(err, Err(FeatureError::InvalidConfig(_))));
    }
}
