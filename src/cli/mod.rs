use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use oddsforge_features::config::{parse_windows, FeatureConfig};
use oddsforge_features::db::{
    count_match_features, create_pool, get_team_elo_history, init_database,
    init_database_with_pool, store_feature_table,
};
use oddsforge_features::models::{MatchRecord, TeamId};
use oddsforge_features::services::{
    export_to_path, load_matches_from_path, ExportFormat, FeaturePipeline, FeatureTable,
    TrainingSet, PREDICTOR_FEATURES,
};

/// Command-line overrides layered over the environment configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub initial_elo: Option<f64>,
    pub k_factor: Option<f64>,
    pub home_advantage: Option<f64>,
    pub windows: Option<String>,
}

impl ConfigOverrides {
    pub fn resolve(&self) -> Result<FeatureConfig> {
        let mut config = FeatureConfig::from_env()?;
        if let Some(v) = self.initial_elo {
            config.initial_elo = v;
        }
        if let Some(v) = self.k_factor {
            config.k_factor = v;
        }
        if let Some(v) = self.home_advantage {
            config.home_advantage = v;
        }
        if let Some(raw) = &self.windows {
            config.rolling_windows = parse_windows(raw)?;
        }
        config.validate()?;
        Ok(config)
    }
}

fn build_features(input: &Path, config: FeatureConfig) -> Result<FeatureTable> {
    let loaded = load_matches_from_path(input)
        .with_context(|| format!("failed to load {}", input.display()))?;
    if loaded.skipped_total() > 0 {
        println!("⚠️  Skipped {} malformed rows:", loaded.skipped_total());
        for (kind, count) in &loaded.skipped {
            println!("   • {}: {}", kind, count);
        }
    }

    let table = FeaturePipeline::new(config).run(loaded.matches);
    if table.report.excluded_total() > 0 {
        println!("⚠️  Excluded {} matches:", table.report.excluded_total());
        for (kind, count) in &table.report.excluded {
            println!("   • {}: {}", kind, count);
        }
    }
    Ok(table)
}

pub async fn process_matches(
    input: &Path,
    output: &Path,
    format: ExportFormat,
    store: bool,
    overrides: &ConfigOverrides,
) -> Result<()> {
    let config = overrides.resolve()?;
    println!("⚙️  Generating features from {}...", input.display());
    println!(
        "   K = {} | home advantage = {} | windows = {:?}",
        config.k_factor, config.home_advantage, config.rolling_windows
    );

    let table = build_features(input, config)?;
    if table.is_empty() {
        println!("📭 No valid matches found in {}", input.display());
    }

    export_to_path(&table, output, format)?;
    println!(
        "✅ Wrote {} matches x {} features to {}",
        table.len(),
        table.feature_names().len(),
        output.display()
    );

    if store {
        let pool = create_pool().await?;
        init_database_with_pool(&pool).await?;
        store_feature_table(&pool, &table).await?;
        let stored = count_match_features(&pool).await?;
        println!("💾 Feature store now holds {} matches", stored);
    }

    Ok(())
}

pub async fn show_ratings(
    input: &Path,
    top: usize,
    team: Option<&str>,
    overrides: &ConfigOverrides,
) -> Result<()> {
    let config = overrides.resolve()?;
    let initial_elo = config.initial_elo;
    let table = build_features(input, config)?;

    if let Some(team) = team {
        let team_id = TeamId::new(team);
        let history: Vec<_> = table.history.iter().filter(|p| p.team_id == team_id).collect();
        if history.is_empty() {
            println!("❌ Team '{}' not found in {}", team, input.display());
            return Ok(());
        }

        println!("📈 ELO history for {}:\n", team);
        let mut previous = initial_elo;
        for point in history {
            println!(
                "   {} {:>12}  {:7.1} ({:+.1})",
                point.date.format("%Y-%m-%d"),
                point.game_id,
                point.elo_rating,
                point.elo_rating - previous
            );
            previous = point.elo_rating;
        }
        return Ok(());
    }

    println!("🏆 ELO ratings after {} matches:\n", table.len());
    for (i, (team, rating)) in table.final_ratings.ranked().into_iter().take(top).enumerate() {
        println!("{:>3}. {:<12} {:7.1}", i + 1, team, rating);
    }
    if table.final_ratings.len() > top {
        println!("\n💡 Use --top {} to see every team", table.final_ratings.len());
    }

    Ok(())
}

pub async fn show_summary(input: &Path) -> Result<()> {
    let loaded = load_matches_from_path(input)
        .with_context(|| format!("failed to load {}", input.display()))?;
    let matches = &loaded.matches;

    println!("📊 Match table summary for {}:\n", input.display());
    println!("   Rows read:      {}", loaded.rows_read);
    println!("   Valid matches:  {}", matches.len());
    println!("   Skipped rows:   {}", loaded.skipped_total());

    if matches.is_empty() {
        println!("\n📭 No valid matches to summarise");
        return Ok(());
    }

    let teams: HashSet<&TeamId> = matches
        .iter()
        .flat_map(|m| [&m.home_team_id, &m.away_team_id])
        .collect();
    let seasons: HashSet<&str> = matches.iter().map(|m| m.season.as_str()).collect();
    let first = matches.iter().map(|m| m.game_date).min();
    let last = matches.iter().map(|m| m.game_date).max();
    let home_wins = matches.iter().filter(|m| m.home_win).count();
    let n = matches.len() as f64;
    let avg = |f: fn(&MatchRecord) -> f64| matches.iter().map(f).sum::<f64>() / n;

    println!("   Teams:          {}", teams.len());
    println!("   Seasons:        {}", seasons.len());
    if let (Some(first), Some(last)) = (first, last) {
        println!("   Date range:     {} to {}", first, last);
    }
    println!("   Home win rate:  {:.1}%", home_wins as f64 / n * 100.0);
    println!("   Avg home pts:   {:.1}", avg(|m| m.home.pts));
    println!("   Avg away pts:   {:.1}", avg(|m| m.away.pts));
    println!("   Avg total pts:  {:.1}", avg(MatchRecord::total_points));
    println!("   Avg margin:     {:+.1}", avg(MatchRecord::point_diff));

    Ok(())
}

fn test_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "training".to_string());
    output.with_file_name(format!("{stem}_test.csv"))
}

fn write_training_csv(set: &TrainingSet, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    set.write_csv(BufWriter::new(File::create(path)?))?;
    Ok(())
}

pub async fn export_training(
    input: &Path,
    output: &Path,
    test_fraction: f64,
    overrides: &ConfigOverrides,
) -> Result<()> {
    let table = build_features(input, overrides.resolve()?)?;
    let set = TrainingSet::from_records(&table.records, &PREDICTOR_FEATURES);

    println!(
        "🧮 Training matrix: {} rows x {} features ({} dropped for missing values)",
        set.len(),
        set.feature_names.len(),
        set.dropped
    );

    if test_fraction > 0.0 {
        let (train, test) = set.temporal_split(test_fraction)?;
        let test_output = test_path(output);
        write_training_csv(&train, output)?;
        write_training_csv(&test, &test_output)?;
        println!("✅ Train: {} rows -> {}", train.len(), output.display());
        println!("✅ Test:  {} rows -> {}", test.len(), test_output.display());
    } else {
        write_training_csv(&set, output)?;
        println!("✅ Wrote {} rows to {}", set.len(), output.display());
    }

    Ok(())
}

pub async fn init_db() -> Result<()> {
    init_database().await?;
    println!("✅ Feature store ready");
    Ok(())
}

pub async fn show_history(team: &str) -> Result<()> {
    let pool = create_pool().await?;
    let history = get_team_elo_history(&pool, team).await?;
    if history.is_empty() {
        println!(
            "📭 No stored ELO history for {}. Run: oddsforge-features process --store",
            team
        );
        return Ok(());
    }

    println!("📈 Stored ELO history for {}:\n", team);
    for point in history {
        println!(
            "   {} {:>12}  {:7.1}",
            point.date.format("%Y-%m-%d"),
            point.game_id,
            point.elo_rating
        );
    }
    Ok(())
}
