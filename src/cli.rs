//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap. The query
//! fields are taken verbatim; validating them is the orchestrator's job.

use crate::config::{CacheBackend, OutputFormat};
use crate::models::{CensusRequest, LeagueRequest};
use clap::Parser;
use std::path::PathBuf;

/// VoteCensus - who voted on a bill, and who lives where they voted
///
/// Combines population counts, vote tallies and a gender-by-age breakdown
/// for a bill in one district, caching the result between runs.
///
/// Examples:
///   votecensus --state CA --district 6 --bill-id hr2
///   votecensus --state CA --district 6 --bill-id hr2 --format text
///   votecensus --bill-id hr2 --league
///   votecensus --state NY --district 2 --bill-id s1 --cache none
///   votecensus --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// State to query (e.g. CA)
    #[arg(short, long, value_name = "STATE")]
    pub state: Option<String>,

    /// Congressional district number
    #[arg(short, long, value_name = "DISTRICT")]
    pub district: Option<String>,

    /// Bill identifier
    #[arg(short, long, value_name = "BILL_ID")]
    pub bill_id: Option<String>,

    /// Show the most engaged district of each state instead of one district
    ///
    /// Only --bill-id is used in this mode.
    #[arg(long)]
    pub league: bool,

    /// Census dataset file (JSON)
    ///
    /// Can also be set via VOTECENSUS_DATASET or .votecensus.toml.
    #[arg(long, value_name = "FILE", env = "VOTECENSUS_DATASET")]
    pub dataset: Option<PathBuf>,

    /// Cache backend
    #[arg(long, value_name = "BACKEND")]
    pub cache: Option<CacheBackend>,

    /// Cache file for the file backend
    #[arg(long, value_name = "FILE")]
    pub cache_file: Option<PathBuf>,

    /// Cache entry time-to-live in seconds
    #[arg(long, value_name = "SECS")]
    pub ttl: Option<u64>,

    /// Output format (json, text)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Write the result to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .votecensus.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .votecensus.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.league && (self.state.is_some() || self.district.is_some()) {
            return Err("--league only takes --bill-id".to_string());
        }

        if let Some(ttl) = self.ttl {
            if ttl == 0 {
                return Err("TTL must be at least 1 second".to_string());
            }
        }

        if let Some(ref dataset) = self.dataset {
            if !dataset.is_file() {
                return Err(format!("Dataset file does not exist: {}", dataset.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    pub fn census_request(&self) -> CensusRequest {
        CensusRequest {
            state: self.state.clone(),
            district: self.district.clone(),
            bill_id: self.bill_id.clone(),
        }
    }

    pub fn league_request(&self) -> LeagueRequest {
        LeagueRequest {
            bill_id: self.bill_id.clone(),
        }
    }
}
