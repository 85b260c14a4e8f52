//! Service configuration.
//!
//! Loaded from a TOML file; every section and field is optional. Secrets
//! and per-deployment endpoints may also come from the environment (a
//! `.env` file is honoured via `dotenv`):
//!
//! - `CARTODB_ENDPOINT` overrides `store.endpoint`
//! - `CARTODB_API_KEY`  overrides `store.api_key`

use std::env;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::logging::LogLevel;
use crate::model::ForestChangeError;

/// Public CartoDB SQL API endpoint for the forest-change tables.
pub const DEFAULT_ENDPOINT: &str = "https://wri-01.cartodb.com/api/v2/sql";

/// Seconds before an outbound query is abandoned.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub store: StoreConfig,
    pub defaults: DateDefaults,
    pub logging: LoggingConfig,
}

/// Where and how to reach the remote store.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Dates substituted when a request omits `begin` or `end`.
///
/// Both default to `None`: a template that needs a date the caller did not
/// supply fails with a missing-parameter error.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DateDefaults {
    pub begin: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            timestamps: true,
        }
    }
}

impl LoggingConfig {
    pub fn min_level(&self) -> Result<LogLevel, ForestChangeError> {
        self.level.parse().map_err(ForestChangeError::Config)
    }
}

impl ServiceConfig {
    /// Parses a configuration document.
    pub fn from_toml_str(text: &str) -> Result<Self, ForestChangeError> {
        let config: ServiceConfig =
            toml::from_str(text).map_err(|e| ForestChangeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path`, then applies environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ForestChangeError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| ForestChangeError::Config(format!("{}: {}", path.display(), e)))?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_env();
        Ok(config)
    }

    /// Defaults plus environment overrides, for running without a file.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        dotenv::dotenv().ok();
        if let Ok(endpoint) = env::var("CARTODB_ENDPOINT") {
            self.store.endpoint = endpoint;
        }
        if let Ok(key) = env::var("CARTODB_API_KEY") {
            self.store.api_key = Some(key);
        }
    }

    fn validate(&self) -> Result<(), ForestChangeError> {
        if self.store.timeout_secs == 0 {
            return Err(ForestChangeError::Config("store.timeout_secs must be positive".to_string()));
        }
        if let (Some(begin), Some(end)) = (self.defaults.begin, self.defaults.end) {
            if begin > end {
                return Err(ForestChangeError::Config(format!(
                    "defaults.begin {} is after defaults.end {}",
                    begin, end
                )));
            }
        }
        self.logging.min_level()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
