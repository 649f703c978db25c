//! Configuration module for loyalty-server.
//!
//! Sources in increasing priority: built-in defaults, the optional TOML
//! file, then environment variables and CLI flags (resolved by clap).

pub mod file;

use crate::config::file::FileConfig;
use loyalty_core::config::{AccrualCheckerConfig, FetcherConfig, PipelineConfig};
use loyalty_core::utils::retry::RetrySchedule;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("invalid accrual system address {address:?}: {source}")]
    InvalidAccrualAddress {
        address: String,
        source: url::ParseError,
    },

    #[error("database URI not set (use -d or DATABASE_URI)")]
    MissingDatabaseUri,
}

/// Values given on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub listen: Option<String>,
    pub database_uri: Option<String>,
    pub accrual_address: Option<String>,
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub listen: String,
    pub database_uri: String,
    pub max_connections: u32,
    pub accrual_url: Url,
    pub pipeline: PipelineConfig,
}

pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    overrides: Overrides,
}

impl ConfigLoader {
    pub fn new(config_path: Option<&Path>, overrides: Overrides) -> Self {
        Self {
            config_path: config_path.map(Path::to_path_buf),
            overrides,
        }
    }

    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let file_config = match &self.config_path {
            Some(path) => toml::from_str(&std::fs::read_to_string(path)?)?,
            None => FileConfig::default(),
        };
        self.resolve(file_config)
    }

    fn resolve(&self, file_config: FileConfig) -> Result<LoadedConfig, ConfigError> {
        let FileConfig {
            server,
            database,
            accrual,
            pipeline,
        } = file_config;

        let listen = self.overrides.listen.clone().unwrap_or(server.listen);
        let database_uri = self
            .overrides
            .database_uri
            .clone()
            .or(database.uri)
            .filter(|uri| !uri.trim().is_empty())
            .ok_or(ConfigError::MissingDatabaseUri)?;
        let accrual_address = self
            .overrides
            .accrual_address
            .clone()
            .unwrap_or(accrual.address);
        let accrual_url = normalize_accrual_address(&accrual_address)?;

        if pipeline.queue_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.queue_capacity must be positive".to_string(),
            ));
        }
        if pipeline.request_limit == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.request_limit must be positive".to_string(),
            ));
        }
        if pipeline.scan_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.scan_interval_ms must be positive".to_string(),
            ));
        }
        if accrual.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "accrual.request_timeout_secs must be positive".to_string(),
            ));
        }

        Ok(LoadedConfig {
            listen,
            database_uri,
            max_connections: database.max_connections.max(1),
            accrual_url,
            pipeline: PipelineConfig {
                queue_capacity: pipeline.queue_capacity,
                fetcher: FetcherConfig {
                    scan_interval: Duration::from_millis(pipeline.scan_interval_ms),
                },
                accrual: AccrualCheckerConfig {
                    request_limit: pipeline.request_limit,
                    check_interval: Duration::from_secs(pipeline.check_interval_secs),
                    reset_period: Duration::from_secs(pipeline.reset_period_secs),
                    request_timeout: Duration::from_secs(accrual.request_timeout_secs),
                },
                retry: RetrySchedule::from_secs(&pipeline.retry_delays_secs),
            },
        })
    }
}

/// Parse the accrual service address. A bare `host:port` gets `http://`.
pub fn normalize_accrual_address(address: &str) -> Result<Url, ConfigError> {
    let trimmed = address.trim();
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    Url::parse(&with_scheme).map_err(|source| ConfigError::InvalidAccrualAddress {
        address: address.to_string(),
        source,
    })
}
