//! Configuration management for the Bike Shop Inventory Platform
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with BSI_ prefix

use chrono::{FixedOffset, Offset, Utc};
use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Transaction store configuration
    pub store: StoreConfig,

    /// Reporting and alert configuration
    pub reporting: ReportingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

/// Which transaction store implementation to use
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Http,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// PostgreSQL connection URL (postgres backend)
    pub database_url: Option<String>,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Base URL of the dashboard API (http backend)
    pub api_base_url: Option<String>,

    /// Bearer token for the dashboard API
    pub api_token: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportingConfig {
    /// Shop local time offset from UTC, used for calendar bucketing
    pub utc_offset_minutes: i32,

    /// Maximum rows in the low-stock alert list
    pub low_stock_limit: usize,

    /// Default page size for movement history
    pub history_page_size: u32,

    /// Longest date range a report may cover, in days
    pub max_range_days: i64,
}

impl ReportingConfig {
    /// Shop time zone as a fixed offset; out-of-range values fall back to UTC
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("BSI_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("store.backend", "postgres")?
            .set_default("store.max_connections", 10)?
            .set_default("store.min_connections", 2)?
            .set_default("reporting.utc_offset_minutes", 480)?
            .set_default("reporting.low_stock_limit", 10)?
            .set_default("reporting.history_page_size", 20)?
            .set_default("reporting.max_range_days", 731)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (BSI_ prefix)
            .add_source(
                Environment::with_prefix("BSI")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 480,
            low_stock_limit: 10,
            history_page_size: 20,
            max_range_days: 731,
        }
    }
}
