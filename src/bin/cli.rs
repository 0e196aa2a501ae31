// src/bin/cli.rs

//! RateMyProfessors Crawler CLI
//!
//! Local execution entry point.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rmp_crawler::{
    error::Result,
    models::{Config, SourceVariant, WriteMode},
    pipeline::{self, ScrapeOptions},
    services::{Fetcher, RetryPolicy, build_source},
    storage::LocalStorage,
    utils::http::ReqwestTransport,
};

/// rmp-crawler - RateMyProfessors ratings collector
#[derive(Parser, Debug)]
#[command(
    name = "rmp-crawler",
    version,
    about = "Collects professor ratings for one university into JSONL files"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "rmp-crawler.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape professors into the configured sinks
    Scrape {
        /// Stop after this many written records
        #[arg(long)]
        max: Option<usize>,

        /// Small capped run for checking the setup
        #[arg(long)]
        test: bool,

        /// Skip the per-professor detail requests
        #[arg(long)]
        skip_details: bool,

        /// Source to scrape (default: from config)
        #[arg(long, value_enum)]
        variant: Option<SourceVariant>,

        /// Keep existing sink lines and skip their identifiers
        #[arg(long)]
        accumulate: bool,

        /// Output directory (default: from config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate the configuration file
    Validate,

    /// Show sink locations and the last run
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Load the config file when present; a present but broken file is an error.
fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let config = Config::load(path)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    } else {
        log::info!("No config at {}. Using defaults.", path.display());
        Ok(Config::default())
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("rmp-crawler starting...");

    let mut config = load_config(&cli.config)?;

    match cli.command {
        Command::Scrape {
            max,
            test,
            skip_details,
            variant,
            accumulate,
            output,
        } => {
            if let Some(variant) = variant {
                config.source.variant = variant;
            }
            if let Some(output) = output {
                config.output.dir = output;
            }
            if accumulate {
                config.output.mode = WriteMode::Accumulate;
            }
            config.validate()?;

            let config = Arc::new(config);
            let transport = ReqwestTransport::from_config(&config.crawler, &config.source)?;
            let fetcher = Arc::new(Fetcher::new(
                Arc::new(transport),
                RetryPolicy::from_config(&config.crawler),
            ));
            let source = build_source(config.source.variant, &config.source, fetcher)?;
            let storage = LocalStorage::from_config(&config.output);

            let options = ScrapeOptions {
                max_records: max,
                test_mode: test,
                skip_details,
            };
            if test {
                log::info!("Test mode: capped at {} records", config.run.test_mode_cap);
            }

            let stats = pipeline::run_scraper(&config, &storage, source.as_ref(), &options).await?;

            log::info!(
                "Scrape complete! {} written, {} failed",
                stats.succeeded,
                stats.failed
            );
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "✓ Config OK ({} via {}, school {})",
                config.source.school_name,
                config.source.variant,
                config.source.school_id
            );
        }

        Command::Info => {
            let storage = LocalStorage::from_config(&config.output);
            log::info!("Output directory: {}", storage.root().display());
            log::info!(
                "Professors: {} ({} lines)",
                storage.professors_path().display(),
                storage.professor_count().await?
            );
            log::info!(
                "Courses: {} ({} lines)",
                storage.courses_path().display(),
                storage.course_count().await?
            );

            match storage.load_stats().await? {
                Some(stats) => {
                    log::info!("Last run started {}", stats.started_at);
                    for (label, value) in stats.summary_items() {
                        log::info!("  {}: {}", label, value);
                    }
                }
                None => log::info!("No run recorded yet."),
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
