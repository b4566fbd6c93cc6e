use anyhow::Result;
use chrono::{NaiveDate, Utc};
use sqlx::{sqlite::SqliteConnectOptions, Row, SqlitePool};
use std::env;
use std::str::FromStr;

use crate::models::{AugmentedMatchRecord, EloHistoryPoint, TeamId};
use crate::services::FeatureTable;

pub async fn create_pool() -> Result<SqlitePool> {
    let database_url = env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:data/features.db".to_string());
    create_pool_from_url(&database_url).await
}

pub async fn create_pool_from_url(database_url: &str) -> Result<SqlitePool> {
    // Strip the "sqlite:" prefix to get the file path, create parent dir if needed
    let file_path = database_url
        .strip_prefix("sqlite:///")
        .or_else(|| database_url.strip_prefix("sqlite://"))
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);

    // In-memory databases have no file to place
    if !file_path.starts_with(":memory:") {
        if let Some(parent) = std::path::Path::new(file_path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true);

    let pool = SqlitePool::connect_with(options).await?;
    Ok(pool)
}

/// Called from the CLI where no pool exists yet.
pub async fn init_database() -> Result<()> {
    let pool = create_pool().await?;
    init_database_with_pool(&pool).await
}

pub async fn init_database_with_pool(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS match_features (
            game_id TEXT PRIMARY KEY,
            game_date TEXT NOT NULL,
            season TEXT NOT NULL,
            home_team_id TEXT NOT NULL,
            away_team_id TEXT NOT NULL,
            home_win INTEGER NOT NULL,
            home_pts REAL NOT NULL,
            away_pts REAL NOT NULL,
            home_elo_before REAL NOT NULL,
            away_elo_before REAL NOT NULL,
            home_elo_after REAL NOT NULL,
            away_elo_after REAL NOT NULL,
            elo_diff REAL NOT NULL,
            home_rest_days INTEGER NOT NULL,
            away_rest_days INTEGER NOT NULL,
            home_win_streak INTEGER NOT NULL,
            away_win_streak INTEGER NOT NULL,
            home_win_pct REAL NOT NULL,
            away_win_pct REAL NOT NULL,
            rolling TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS elo_history (
            team_id TEXT NOT NULL,
            game_id TEXT NOT NULL,
            date TEXT NOT NULL,
            elo_rating REAL NOT NULL,
            PRIMARY KEY (team_id, game_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_match_features_date ON match_features(game_date)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_elo_history_team ON elo_history(team_id, date)")
        .execute(pool)
        .await?;

    tracing::info!("Database initialized successfully");
    Ok(())
}

pub async fn clear_features(pool: &SqlitePool) -> Result<()> {
    sqlx::query("DELETE FROM match_features").execute(pool).await?;
    sqlx::query("DELETE FROM elo_history").execute(pool).await?;
    tracing::info!("Feature store cleared");
    Ok(())
}

/// Replaces any stored row with the same game id. All rows land in one transaction.
pub async fn insert_match_features(
    pool: &SqlitePool,
    records: &[AugmentedMatchRecord],
) -> Result<u64> {
    let now = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;
    let mut written = 0;

    for r in records {
        let rolling = serde_json::json!({
            "home": &r.home_rolling,
            "away": &r.away_rolling,
        });

        let result = sqlx::query(
            r#"
            INSERT OR REPLACE INTO match_features (
                game_id, game_date, season, home_team_id, away_team_id, home_win,
                home_pts, away_pts, home_elo_before, away_elo_before, home_elo_after,
                away_elo_after, elo_diff, home_rest_days, away_rest_days,
                home_win_streak, away_win_streak, home_win_pct, away_win_pct,
                rolling, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&r.record.game_id)
        .bind(r.record.game_date.format("%Y-%m-%d").to_string())
        .bind(&r.record.season)
        .bind(r.record.home_team_id.as_str())
        .bind(r.record.away_team_id.as_str())
        .bind(r.record.home_win)
        .bind(r.record.home.pts)
        .bind(r.record.away.pts)
        .bind(r.elo.home_elo_before)
        .bind(r.elo.away_elo_before)
        .bind(r.elo.home_elo_after)
        .bind(r.elo.away_elo_after)
        .bind(r.elo.elo_diff)
        .bind(r.context.home.rest_days)
        .bind(r.context.away.rest_days)
        .bind(r.context.home.win_streak)
        .bind(r.context.away.win_streak)
        .bind(r.context.home.win_pct)
        .bind(r.context.away.win_pct)
        .bind(rolling.to_string())
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        written += result.rows_affected();
    }

    tx.commit().await?;
    tracing::info!("Stored features for {} matches", records.len());
    Ok(written)
}

pub async fn insert_elo_history(pool: &SqlitePool, history: &[EloHistoryPoint]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let mut written = 0;

    for point in history {
        let result = sqlx::query(
            r#"
            INSERT OR REPLACE INTO elo_history (team_id, game_id, date, elo_rating)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(point.team_id.as_str())
        .bind(&point.game_id)
        .bind(point.date.format("%Y-%m-%d").to_string())
        .bind(point.elo_rating)
        .execute(&mut *tx)
        .await?;

        written += result.rows_affected();
    }

    tx.commit().await?;
    Ok(written)
}

/// Persists a whole run: feature rows and the rating history behind them.
pub async fn store_feature_table(pool: &SqlitePool, table: &FeatureTable) -> Result<()> {
    insert_match_features(pool, &table.records).await?;
    insert_elo_history(pool, &table.history).await?;
    Ok(())
}

pub async fn count_match_features(pool: &SqlitePool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM match_features")
        .fetch_one(pool)
        .await?;
    Ok(row.get("count"))
}

pub async fn get_team_elo_history(
    pool: &SqlitePool,
    team_id: &str,
) -> Result<Vec<EloHistoryPoint>> {
    let rows = sqlx::query(
        "SELECT * FROM elo_history WHERE team_id = ? ORDER BY date ASC, game_id ASC"
    )
    .bind(team_id)
    .fetch_all(pool)
    .await?;

    let mut history = Vec::new();
    for row in rows {
        history.push(EloHistoryPoint {
            team_id: TeamId::new(row.get::<String, _>("team_id")),
            date: NaiveDate::parse_from_str(&row.get::<String, _>("date"), "%Y-%m-%d")?,
            game_id: row.get("game_id"),
            elo_rating: row.get("elo_rating"),
        });
    }
    Ok(history)
}
