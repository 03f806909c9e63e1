//! # Configuration Management Module
//!
//! ## Purpose
//! Centralized configuration management for the letters search service,
//! supporting multiple sources (files, environment variables, command line
//! arguments) with validation and type-safe access to all system settings.
//!
//! ## Input/Output Specification
//! - **Input**: Configuration files (TOML), environment variables, CLI arguments
//! - **Output**: Validated configuration structs with defaults and overrides
//! - **Validation**: Type checking, range validation, dependency verification
//!
//! ## Configuration Sources (in order of precedence)
//! 1. Command line arguments (highest priority)
//! 2. Environment variables
//! 3. Configuration files
//! 4. Default values (lowest priority)
//!
//! ## Usage
//! ```rust,no_run
//! use letters_search::config::Config;
//!
//! let config = Config::from_file("config.toml").unwrap();
//! println!("Server port: {}", config.server.port);
//! ```

use crate::errors::{Result, SearchError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure containing all system settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Server and API configuration
    pub server: ServerConfig,
    /// Corpus store settings
    pub corpus: CorpusConfig,
    /// Remote full-text index settings
    pub remote_index: RemoteIndexConfig,
    /// Search engine behavior
    pub search: SearchEngineConfig,
    /// Daily-wisdom and surprise-quote selection
    pub wisdom: WisdomConfig,
    /// Logging and monitoring
    pub logging: LoggingConfig,
}

/// Server and API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Enable CORS for web frontends
    pub enable_cors: bool,
    /// Public base URL used when building citation permalinks
    pub public_base_url: String,
}

/// Corpus store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Directory holding normalized `letters_<year>.jsonl` files
    pub data_dir: PathBuf,
    /// Path to the topic taxonomy file
    pub topics_path: PathBuf,
    /// Section cache TTL in seconds (minutes-scale: the corpus is near-static)
    pub cache_ttl_seconds: u64,
    /// Topic taxonomy cache TTL in seconds
    pub topics_cache_ttl_seconds: u64,
}

/// Remote full-text index configuration (Typesense-shaped contract)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteIndexConfig {
    /// Scheme, `http` or `https`
    pub protocol: String,
    /// Index host
    pub host: String,
    /// Index port
    pub port: u16,
    /// API key sent in the auth header
    pub api_key: String,
    /// Collection holding section documents
    pub collection: String,
    /// Bounded request timeout so a slow remote cannot stall the fallback
    /// decision; a timeout counts as a failure
    pub timeout_ms: u64,
    /// Per-letter fetch page size
    pub letter_page_size: usize,
}

/// Search engine behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchEngineConfig {
    /// Result page size
    pub page_size: usize,
    /// Stop scanning after this many raw matches when no year filter is
    /// active; a year filter disables the early exit
    pub early_exit_quota: usize,
    /// Result cache TTL in seconds
    pub result_cache_ttl_seconds: u64,
    /// Result cache capacity bound before the lazy expiry sweep runs
    pub result_cache_capacity: usize,
    /// Per-letter listing cache TTL in seconds
    pub letter_cache_ttl_seconds: u64,
    /// Per-letter listing cache capacity bound
    pub letter_cache_capacity: usize,
}

/// Daily-wisdom and surprise-quote selection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WisdomConfig {
    /// Minimum quality score a section must clear to enter the daily pool
    pub min_quality_score: f64,
    /// Daily selection draws from this many top-scored candidates
    pub candidate_pool: usize,
    /// Surprise selection draws from this top fraction of candidates
    pub surprise_top_fraction: f64,
    /// Default minimum score for surprise candidates
    pub surprise_min_score: f64,
    /// Daily selections are memoized for this many days
    pub memo_retention_days: u64,
}

/// Logging and monitoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or env-filter directive (trace, debug, info, warn, error)
    pub level: String,
    /// Enable structured JSON logging
    pub json_format: bool,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::from_file("config.toml")
    }

    /// Load configuration from a specific file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!("Configuration file not found: {:?}, using defaults", path);
            let mut config = Self::default();
            config.apply_env_overrides()?;
            config.validate()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).map_err(|e| SearchError::Config {
            message: format!("Failed to read config file {:?}: {}", path, e),
        })?;

        let mut config: Config = toml::from_str(&content).map_err(|e| SearchError::Config {
            message: format!("Failed to parse config file {:?}: {}", path, e),
        })?;

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("LETTERS_SEARCH_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("LETTERS_SEARCH_PORT") {
            self.server.port = port.parse().map_err(|_| SearchError::Config {
                message: "Invalid port number in LETTERS_SEARCH_PORT".to_string(),
            })?;
        }
        if let Ok(data_dir) = std::env::var("LETTERS_SEARCH_DATA_DIR") {
            self.corpus.data_dir = PathBuf::from(data_dir);
        }
        if let Ok(host) = std::env::var("LETTERS_SEARCH_INDEX_HOST") {
            self.remote_index.host = host;
        }
        if let Ok(port) = std::env::var("LETTERS_SEARCH_INDEX_PORT") {
            self.remote_index.port = port.parse().map_err(|_| SearchError::Config {
                message: "Invalid port number in LETTERS_SEARCH_INDEX_PORT".to_string(),
            })?;
        }
        if let Ok(api_key) = std::env::var("LETTERS_SEARCH_INDEX_API_KEY") {
            self.remote_index.api_key = api_key;
        }
        Ok(())
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(SearchError::ValidationFailed {
                field: "server.port".to_string(),
                reason: "Port cannot be zero".to_string(),
            });
        }

        if self.search.page_size == 0 {
            return Err(SearchError::ValidationFailed {
                field: "search.page_size".to_string(),
                reason: "Page size must be greater than zero".to_string(),
            });
        }

        if self.search.early_exit_quota < self.search.page_size {
            return Err(SearchError::ValidationFailed {
                field: "search.early_exit_quota".to_string(),
                reason: "Early-exit quota cannot be smaller than the page size".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.wisdom.surprise_top_fraction) {
            return Err(SearchError::ValidationFailed {
                field: "wisdom.surprise_top_fraction".to_string(),
                reason: "Fraction must lie in [0, 1]".to_string(),
            });
        }

        if self.remote_index.timeout_ms == 0 {
            return Err(SearchError::ValidationFailed {
                field: "remote_index.timeout_ms".to_string(),
                reason: "Remote timeout must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            enable_cors: true,
            public_base_url: "http://localhost:8080".to_string(),
        }
    }
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/normalized"),
            topics_path: PathBuf::from("./data/topics.json"),
            cache_ttl_seconds: 30 * 60,
            topics_cache_ttl_seconds: 5 * 60,
        }
    }
}

impl Default for RemoteIndexConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 8108,
            api_key: "xyz".to_string(),
            collection: "sections".to_string(),
            timeout_ms: 2_000,
            letter_page_size: 200,
        }
    }
}

impl Default for SearchEngineConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            early_exit_quota: 100,
            result_cache_ttl_seconds: 5 * 60,
            result_cache_capacity: 100,
            letter_cache_ttl_seconds: 10 * 60,
            letter_cache_capacity: 20,
        }
    }
}

impl Default for WisdomConfig {
    fn default() -> Self {
        Self {
            min_quality_score: 10.0,
            candidate_pool: 20,
            surprise_top_fraction: 0.3,
            surprise_min_score: 15.0,
            memo_retention_days: 7,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}
