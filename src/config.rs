//! Configuration module for the GETFILE conformance client.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use crate::catalog::{Catalog, CatalogError, TestCase, DEFAULT_EXISTING_PATH};
use crate::engine::DEFAULT_READ_LIMIT;
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the conformance client
#[derive(Parser, Debug)]
#[command(name = "getfile-conformance")]
#[command(author = "getfile-conformance authors")]
#[command(version = "0.1.0")]
#[command(about = "Conformance test client for GETFILE servers", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Server under test (e.g., 127.0.0.1:53948)
    #[arg(short = 't', long)]
    pub target: Option<String>,

    /// Per-phase timeout for connect, send and receive, in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Maximum response bytes read per case
    #[arg(long)]
    pub read_limit: Option<usize>,

    /// Number of cases run concurrently (1 = sequential)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Path of a file the server under test is known to have
    #[arg(long)]
    pub existing_path: Option<String>,

    /// Print the catalog and exit without connecting
    #[arg(long)]
    pub list: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Server-under-test configuration
#[derive(Debug, Deserialize)]
pub struct TargetConfig {
    /// Address to connect to
    #[serde(default = "default_address")]
    pub address: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
        }
    }
}

/// Execution configuration
#[derive(Debug, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_read_limit")]
    pub read_limit: usize,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            read_limit: default_read_limit(),
            workers: default_workers(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Catalog configuration
#[derive(Debug, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_existing_path")]
    pub existing_path: String,
    /// Extra cases appended after the standard catalog
    #[serde(default)]
    pub cases: Vec<CaseConfig>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            existing_path: default_existing_path(),
            cases: Vec::new(),
        }
    }
}

/// A supplementary case
#[derive(Debug, Clone, Deserialize)]
pub struct CaseConfig {
    pub request: String,
    pub expected: String,
    pub description: String,
}

fn default_address() -> String {
    "127.0.0.1:53948".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_read_limit() -> usize {
    DEFAULT_READ_LIMIT
}

fn default_workers() -> usize {
    1
}

fn default_existing_path() -> String {
    DEFAULT_EXISTING_PATH.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub target: String,
    pub timeout: Duration,
    pub read_limit: usize,
    pub workers: usize,
    pub existing_path: String,
    pub extra_cases: Vec<CaseConfig>,
    pub list: bool,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Ok(Self::merge(cli, toml_config))
    }

    /// Merge CLI args with TOML config (CLI takes precedence)
    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        Config {
            target: cli.target.unwrap_or(toml_config.target.address),
            timeout: Duration::from_millis(
                cli.timeout_ms.unwrap_or(toml_config.run.timeout_ms),
            ),
            read_limit: cli.read_limit.unwrap_or(toml_config.run.read_limit),
            workers: cli.workers.unwrap_or(toml_config.run.workers),
            existing_path: cli
                .existing_path
                .unwrap_or(toml_config.catalog.existing_path),
            extra_cases: toml_config.catalog.cases,
            list: cli.list,
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        }
    }

    /// Build the catalog: standard cases, then any configured extras.
    pub fn catalog(&self) -> Result<Catalog, CatalogError> {
        if self.extra_cases.is_empty() {
            return Catalog::standard(&self.existing_path);
        }

        let mut builder = Catalog::standard_builder(&self.existing_path)?;
        for extra in &self.extra_cases {
            builder.case(TestCase::new(
                extra.request.clone(),
                &extra.expected,
                extra.description.clone(),
            )?);
        }
        Ok(builder.build())
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
