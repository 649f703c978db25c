//! TOML file configuration structures.
//!
//! Every section and field is optional; missing values fall back to the
//! defaults below. CLI flags and environment variables override the file.

use serde::{Deserialize, Serialize};

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub accrual: AccrualConfig,
    pub pipeline: PipelineConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// `host:port` to listen on.
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "localhost:8081".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string. Usually given through `DATABASE_URI`.
    pub uri: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            uri: None,
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccrualConfig {
    /// Base address of the accrual service. `host:port` implies `http://`.
    pub address: String,
    pub request_timeout_secs: u64,
}

impl Default for AccrualConfig {
    fn default() -> Self {
        Self {
            address: "http://localhost:8080".to_string(),
            request_timeout_secs: 10,
        }
    }
}

/// Pipeline tuning section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub queue_capacity: usize,
    pub scan_interval_ms: u64,
    pub request_limit: u32,
    /// Accrual window after a 429 without a usable `Retry-After`.
    pub check_interval_secs: u64,
    /// Length of the first accrual window.
    pub reset_period_secs: u64,
    pub retry_delays_secs: Vec<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10,
            scan_interval_ms: 1000,
            request_limit: 100,
            check_interval_secs: 5,
            reset_period_secs: 3,
            retry_delays_secs: vec![1, 2, 5],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[server]
listen = "0.0.0.0:9000"

[database]
uri = "postgres://loyalty@localhost/loyalty"
max_connections = 4

[accrual]
address = "accrual.internal:8080"
request_timeout_secs = 3

[pipeline]
queue_capacity = 32
scan_interval_ms = 250
request_limit = 50
check_interval_secs = 10
reset_period_secs = 2
retry_delays_secs = [1, 1]
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:9000");
        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.accrual.address, "accrual.internal:8080");
        assert_eq!(config.pipeline.queue_capacity, 32);
        assert_eq!(config.pipeline.retry_delays_secs, vec![1, 1]);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: FileConfig = toml::from_str("[pipeline]\nrequest_limit = 7\n").unwrap();
        assert_eq!(config.server, ServerConfig::default());
        assert_eq!(config.database.uri, None);
        assert_eq!(config.pipeline.request_limit, 7);
        assert_eq!(config.pipeline.queue_capacity, 10);

        let empty: FileConfig = toml::from_str("").unwrap();
        assert_eq!(empty, FileConfig::default());
    }
}
