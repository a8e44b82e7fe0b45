//! langtrends-data - Programming language popularity data generator
//!
//! Maintains languages.json, scores-full.json and scores.json from the GitHub
//! and Stack Overflow APIs.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use langtrends_common::config::{
    load_config, resolve_api_key, resolve_config_path, TomlConfig, CONFIG_ENV_VAR,
    GITHUB_API_KEY_ENV_VAR, STACKOVERFLOW_API_KEY_ENV_VAR,
};
use langtrends_common::time::{first_day_of_current_month, parse_month};
use langtrends_data::data_populator::{self, DataPopulator};
use langtrends_data::services::frontend_settings::fetch_number_of_dates;
use langtrends_data::services::{
    GitHubClient, GitHubConfig, PopulatorSettings, RetryPolicy, SampleConfig,
    StackOverflowClient, StackOverflowConfig,
};
use langtrends_data::store::read_metadata;
use langtrends_data::DataStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "langtrends-data")]
#[command(about = "Programming language popularity data generator")]
#[command(version)]
struct Args {
    /// Path to langtrends.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the data files (overrides the config file)
    #[arg(short, long, global = true, env = "LANGTRENDS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge the live GitHub language list into languages.json
    UpdateLanguages {
        /// Stop once this many languages are tracked
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Update languages, then scores, then the condensed scores
    UpdateData {
        /// Stop after adding this many scores
        #[arg(long)]
        num_scores: Option<usize>,
    },
    /// Fill every missing monthly score
    UpdateScores {
        /// Stop after adding this many scores
        #[arg(long)]
        num_scores: Option<usize>,
    },
    /// Regenerate scores.json from scores-full.json
    Condense,
    /// Cross-check GitHub, the metadata file and languages.json
    ValidateLanguages,
    /// Remove every score of a language so the next run recomputes them
    RemoveScores {
        language: String,
    },
    /// Remove a language and all its scores
    RemoveLanguage {
        language: String,
    },
    /// List stored month-over-month drops the regression guard would reject
    ScoreDeviations {
        /// Also fetch the full-window provider totals for both months
        #[arg(long)]
        with_counts: bool,
    },
    /// Show raw provider counts behind a language's scores
    GetScores {
        language: String,
        /// First day of the newest month to inspect (YYYY-MM-01)
        date: String,
        /// Number of months to walk back
        #[arg(long, default_value = "5")]
        months: u32,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Credentials may live in a .env file next to the data
    dotenv::dotenv().ok();

    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR);
    let mut config = load_config(config_path.as_deref())?;
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        "Starting langtrends-data v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    if let Some(path) = &config_path {
        info!("Config: {}", path.display());
    }
    info!("Data directory: {}", config.data_dir.display());

    let store = DataStore::new(&config.data_dir);
    let first_day_of_month = first_day_of_current_month();

    match args.command {
        Command::UpdateLanguages { limit } => {
            let mut populator = build_populator(&config, store)?;
            let merge = populator.populate_languages(limit).await?;
            if !merge.unmapped.is_empty() {
                info!("{} GitHub languages have no metadata entry", merge.unmapped.len());
            }
        }
        Command::UpdateData { num_scores } => {
            let mut populator = build_populator(&config, store.clone())?;
            populator.populate_languages(None).await?;
            populator.populate_all_scores(num_scores).await?;
            let sample = sample_config(&config).await?;
            data_populator::populate_condensed_scores(&store, first_day_of_month, &sample)?;
        }
        Command::UpdateScores { num_scores } => {
            let mut populator = build_populator(&config, store)?;
            populator.populate_all_scores(num_scores).await?;
        }
        Command::Condense => {
            let sample = sample_config(&config).await?;
            data_populator::populate_condensed_scores(&store, first_day_of_month, &sample)?;
        }
        Command::ValidateLanguages => {
            let mut populator = build_populator(&config, store)?;
            populator.validate_languages().await?;
            info!("All languages validated");
        }
        Command::RemoveScores { language } => {
            let removed = data_populator::remove_scores(&store, &language)?;
            println!("{} scores removed", removed);
        }
        Command::RemoveLanguage { language } => {
            let (removed, scores) = data_populator::remove_language(&store, &language)?;
            println!(
                "Removed {} (id {}) and {} scores",
                removed.name, removed.id, scores
            );
        }
        Command::ScoreDeviations { with_counts } => {
            let deviations = data_populator::score_deviations(&store, config.minimum_score)?;
            let populator = if with_counts && !deviations.is_empty() {
                Some(build_populator(&config, store)?)
            } else {
                None
            };

            for deviation in &deviations {
                println!("Language: {}", deviation.language);
                println!("  {}  {}", deviation.previous_date, deviation.previous_points);
                println!("  {}  {}", deviation.date, deviation.points);
                println!(
                    "  deviation {} ({:.1}%)",
                    deviation.deviation(),
                    deviation.deviation_percentage()
                );
                if let Some(populator) = &populator {
                    let breakdown = populator
                        .score_breakdown(&deviation.language, deviation.date, 2)
                        .await?;
                    for month in &breakdown {
                        println!("  {} total from APIs: {}", month.date, month.combined_total());
                    }
                }
                println!();
            }
        }
        Command::GetScores {
            language,
            date,
            months,
        } => {
            let date = parse_month(&date)?;
            let populator = build_populator(&config, store)?;
            for month in populator.score_breakdown(&language, date, months).await? {
                println!("{}\t{}", language, month.date);
                println!("  stored points        {}", display_points(month.stored_points));
                println!("  GitHub delta         {}", month.repositories_delta);
                println!("  Stack Overflow delta {}", month.questions_delta);
                println!("  Combined delta       {}", month.combined_delta());
                println!("  GitHub total         {}", month.repositories_total);
                println!("  Stack Overflow total {}", month.questions_total);
                println!("  Combined total       {}", month.combined_total());
                println!();
            }
        }
    }

    Ok(())
}

/// Construct both provider clients and the populator from config
fn build_populator(config: &TomlConfig, store: DataStore) -> Result<DataPopulator> {
    let retry = RetryPolicy::from(&config.retry);

    let github_key = resolve_api_key(GITHUB_API_KEY_ENV_VAR, config.github.api_key.as_deref())
        .ok_or_else(|| anyhow!("{} must be set", GITHUB_API_KEY_ENV_VAR))?;
    let github = Arc::new(GitHubClient::new(GitHubConfig {
        api_key: github_key,
        requests_per_second: config.github.requests_per_second,
        retry: retry.clone(),
    })?);

    let stackoverflow = Arc::new(StackOverflowClient::new(StackOverflowConfig {
        api_key: resolve_api_key(
            STACKOVERFLOW_API_KEY_ENV_VAR,
            config.stackoverflow.api_key.as_deref(),
        ),
        requests_per_second: config.stackoverflow.requests_per_second,
        retry,
    })?);

    let metadata_path = config.metadata_path();
    let metadata = read_metadata(&metadata_path)
        .with_context(|| format!("Failed to load metadata from {}", metadata_path.display()))?;
    info!("Loaded {} metadata entries", metadata.len());

    let settings = PopulatorSettings::from_config(config, first_day_of_current_month());
    Ok(DataPopulator::new(
        store,
        metadata,
        settings,
        github.clone(),
        stackoverflow,
        github,
    ))
}

/// Sampling policy, sized from the front end when its settings URL is configured
async fn sample_config(config: &TomlConfig) -> Result<SampleConfig> {
    let sample = SampleConfig::from_settings(&config.condensed, config.minimum_score);
    match &config.condensed.frontend_settings_url {
        Some(url) => {
            let number_of_dates = fetch_number_of_dates(url)
                .await
                .with_context(|| format!("Failed to load front-end settings from {}", url))?;
            Ok(sample.with_number_of_dates(number_of_dates))
        }
        None => Ok(sample),
    }
}

fn display_points(points: Option<u64>) -> String {
    points.map_or_else(|| "-".to_string(), |p| p.to_string())
}
