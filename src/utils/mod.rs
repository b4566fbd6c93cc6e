use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y%m%d"];
const DATETIME_FORMATS: [&str; 3] =
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

/// Calculate the difference between two dates in days
pub fn days_between(date1: NaiveDate, date2: NaiveDate) -> i64 {
    (date2 - date1).num_days()
}

/// Mean over the values that are present; `None` when nothing is.
pub fn mean_of_present<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let (sum, count) = values
        .into_iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Wins over games, falling back to `default` before the first game
pub fn win_percentage(wins: u32, games: u32, default: f64) -> f64 {
    if games == 0 {
        default
    } else {
        wins as f64 / games as f64
    }
}

/// Accepts plain dates, naive timestamps and RFC 3339 timestamps.
pub fn parse_game_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

/// NBA season label for a game date, e.g. 2023-11-02 -> "2023-24".
/// Seasons roll over in August.
pub fn season_for_date(date: NaiveDate) -> String {
    let start_year = if date.month() >= 8 { date.year() } else { date.year() - 1 };
    let next_year = (start_year + 1).rem_euclid(100);
    format!("{}-{:02}", start_year, next_year)
}
