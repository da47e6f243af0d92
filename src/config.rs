//! Configuration file handling.
//!
//! This module handles loading, merging and validating configuration from
//! `.votecensus.toml` files.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".votecensus.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Census dataset settings.
    #[serde(default)]
    pub dataset: DatasetConfig,

    /// Result cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Sample size estimation settings.
    #[serde(default)]
    pub sampler: SamplerConfig,
}

/// Output format for results.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// The response body as JSON (default)
    #[default]
    Json,
    /// Human-readable summary
    Text,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Census dataset settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Path to the census dataset JSON file.
    #[serde(default = "default_dataset_path")]
    pub path: PathBuf,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: default_dataset_path(),
        }
    }
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("census.json")
}

/// Which cache backend to use.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// JSON file shared between runs (default)
    #[default]
    File,
    /// In-process only
    Memory,
    /// No caching
    None,
}

/// Result cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache backend.
    #[serde(default)]
    pub backend: CacheBackend,

    /// Cache file used by the file backend.
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,

    /// Entry time-to-live in seconds.
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            path: default_cache_path(),
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(".votecensus-cache.json")
}

fn default_ttl_seconds() -> u64 {
    10800 // 3 hours
}

/// Sample size estimation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Standard score of the confidence level.
    #[serde(default = "default_z_score")]
    pub z_score: f64,

    /// Margin of error, as a fraction.
    #[serde(default = "default_margin_of_error")]
    pub margin_of_error: f64,

    /// Expected proportion.
    #[serde(default = "default_proportion")]
    pub proportion: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            z_score: default_z_score(),
            margin_of_error: default_margin_of_error(),
            proportion: default_proportion(),
        }
    }
}

fn default_z_score() -> f64 {
    1.96
}

fn default_margin_of_error() -> f64 {
    0.05
}

fn default_proportion() -> f64 {
    0.5
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref dataset) = args.dataset {
            self.dataset.path = dataset.clone();
        }

        if let Some(backend) = args.cache {
            self.cache.backend = backend;
        }
        if let Some(ref cache_file) = args.cache_file {
            self.cache.path = cache_file.clone();
        }
        if let Some(ttl) = args.ttl {
            self.cache.ttl_seconds = ttl;
        }

        if let Some(format) = args.format {
            self.general.format = format;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Reject settings the components cannot be built from.
    pub fn validate(&self) -> Result<()> {
        if self.cache.ttl_seconds == 0 {
            bail!("Cache TTL must be at least 1 second");
        }
        if !(self.sampler.margin_of_error > 0.0 && self.sampler.margin_of_error < 1.0) {
            bail!("Sampler margin of error must be between 0 and 1 (exclusive)");
        }
        if !(0.0..=1.0).contains(&self.sampler.proportion) {
            bail!("Sampler proportion must be between 0.0 and 1.0");
        }
        if self.sampler.z_score <= 0.0 {
            bail!("Sampler z-score must be positive");
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
