//! VoteCensus - demographic census for legislative bill votes
//!
//! A CLI tool that combines population counts, vote tallies and a
//! gender-by-age breakdown for a bill in one district, serving repeated
//! queries from a result cache.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Internal aggregation failure or runtime error (config, dataset, I/O)
//!   2 - Invalid request

mod analysis;
mod cache;
mod cli;
mod config;
mod controller;
mod error;
mod models;
mod report;
mod sampler;
mod sources;

#[cfg(test)]
mod testing;

use analysis::{Collaborators, DemographicAggregator};
use anyhow::{Context, Result};
use cli::Args;
use config::{Config, CONFIG_FILE_NAME};
use controller::{BillController, LeagueController};
use error::CensusError;
use models::Query;
use sampler::{CochranSampler, Sampler};
use sources::CensusDataset;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration before logging so its verbosity applies
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(log_level(&args, &config));

    info!("VoteCensus v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args, config).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .votecensus.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!("{} already exists. Remove it first or edit it manually.", CONFIG_FILE_NAME);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("Created {} with default settings.", CONFIG_FILE_NAME);
    Ok(())
}

/// `--quiet` wins, then `--verbose` or `verbose = true` in the config.
fn log_level(args: &Args, config: &Config) -> tracing::Level {
    if !args.quiet && config.general.verbose {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    }
}

/// Initialize logging. Logs go to stderr so stdout carries only the
/// response body.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Serve one request. Returns the process exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();
    config.validate()?;

    info!("Loading census dataset from {}", config.dataset.path.display());
    let dataset = Arc::new(CensusDataset::load(&config.dataset.path)?);
    let sampler: Arc<dyn Sampler> = Arc::new(CochranSampler::from(&config.sampler));
    let cache = cache::from_config(&config.cache);
    let root = info_span!("votecensus");

    let outcome = if args.league {
        let controller = LeagueController::new(dataset, cache, config.cache.ttl()).with_span(root);

        let bill_id = args.bill_id.clone().unwrap_or_default();
        controller
            .handle(&args.league_request())
            .await
            .map(|served| {
                info!(cached = served.is_cached(), "District league ready");
                report::render_league(&served, &bill_id, config.general.format)
            })
    } else {
        let aggregator = DemographicAggregator::new(Collaborators::from_dataset(dataset, sampler));
        let controller =
            BillController::new(aggregator, cache, config.cache.ttl()).with_span(root);

        let request = args.census_request();
        controller.handle(&request).await.and_then(|served| {
            info!(cached = served.is_cached(), "Census ready");
            let query = Query::parse(&request)?;
            Ok(report::render_census(&served, &query, config.general.format))
        })
    };

    debug!("Request served in {:.3}s", start_time.elapsed().as_secs_f64());
    finish(outcome, &args)
}

/// Write the rendered body or the error body, and pick the exit code.
fn finish(outcome: Result<String, CensusError>, args: &Args) -> Result<i32> {
    match outcome {
        Ok(rendered) => {
            report::write_output(&rendered, args.output.as_deref())?;
            Ok(0)
        }
        Err(e) => {
            match e {
                CensusError::InvalidRequest { .. } => {
                    warn!("Request rejected ({}): {}", e.status_code(), e)
                }
                _ => error!("Request failed ({}): {}", e.status_code(), e),
            }
            println!("{}", report::render_error(&e));
            Ok(e.exit_code())
        }
    }
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so the fallback is reported on stderr.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("Warning: failed to load {}, using defaults: {:#}", CONFIG_FILE_NAME, e);
            Ok(Config::default())
        }
    }
}
