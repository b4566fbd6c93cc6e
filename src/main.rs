mod cli;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use oddsforge_features::services::ExportFormat;

#[derive(Parser)]
#[command(name = "oddsforge-features")]
#[command(about = "Elo, rolling-form and schedule features for basketball match tables")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
struct ConfigArgs {
    /// Rating every team starts from
    #[arg(long)]
    initial_elo: Option<f64>,
    /// Rating change scale per game
    #[arg(long)]
    k_factor: Option<f64>,
    /// Rating points credited to the home team when computing expectations
    #[arg(long)]
    home_advantage: Option<f64>,
    /// Comma-separated rolling windows, e.g. 5,10,20
    #[arg(long)]
    windows: Option<String>,
}

impl From<ConfigArgs> for cli::ConfigOverrides {
    fn from(args: ConfigArgs) -> Self {
        cli::ConfigOverrides {
            initial_elo: args.initial_elo,
            k_factor: args.k_factor,
            home_advantage: args.home_advantage,
            windows: args.windows,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the augmented feature table from a match CSV
    Process {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// csv or json
        #[arg(short, long, default_value = "csv")]
        format: ExportFormat,
        /// Also write features and rating history to the SQLite store
        #[arg(long)]
        store: bool,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Show the final ELO table, or one team's rating history
    Ratings {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(long, default_value = "30")]
        top: usize,
        #[arg(short, long)]
        team: Option<String>,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Summarise a match CSV
    Summary {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Write the predictor training matrix with targets
    ExportTraining {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Share of the latest matches held out as a test set
        #[arg(long, default_value = "0")]
        test_fraction: f64,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Show a team's rating history from the SQLite store
    History {
        #[arg(short, long)]
        team: String,
    },
    /// Initialize the database
    InitDb,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Process { input, output, format, store, config } => {
            tracing::info!("Processing {}", input.display());
            cli::process_matches(&input, &output, format, store, &config.into()).await?;
        }
        Commands::Ratings { input, top, team, config } => {
            cli::show_ratings(&input, top, team.as_deref(), &config.into()).await?;
        }
        Commands::Summary { input } => {
            cli::show_summary(&input).await?;
        }
        Commands::ExportTraining { input, output, test_fraction, config } => {
            tracing::info!("Exporting training matrix from {}", input.display());
            cli::export_training(&input, &output, test_fraction, &config.into()).await?;
        }
        Commands::History { team } => {
            cli::show_history(&team).await?;
        }
        Commands::InitDb => {
            tracing::info!("Initializing database...");
            cli::init_db().await?;
        }
    }

    Ok(())
}
