//! Recognized configuration keys (spec §6). Loaded hierarchically by
//! [`crate::infrastructure::config::ConfigLoader`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub queue: QueueConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            queue: QueueConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Fixed key compared against the `X-API-Key` header (spec §6). The
    /// default is a placeholder; operators are expected to override it via
    /// `TASKQUEUE_SERVER__API_KEY` or `queue.yaml` before exposing the
    /// service beyond a local machine.
    #[serde(default = "default_api_key")]
    pub api_key: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_key: default_api_key(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            retention_days: default_retention_days(),
        }
    }
}

/// The recognized options of spec.md §6's Configuration table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Seconds before a claimed task is reclaimable.
    #[serde(default = "default_claim_timeout_secs")]
    pub claim_timeout_secs: i64,
    /// Retry bound before terminal `failed`.
    #[serde(default = "default_max_task_attempts")]
    pub max_task_attempts: i64,
    /// Request body ceiling in bytes.
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,
    /// Write `task_history` rows on transitions.
    #[serde(default = "default_true")]
    pub history_enabled: bool,
    /// Milliseconds above which to log a query as slow.
    #[serde(default = "default_slow_query_threshold_ms")]
    pub slow_query_threshold_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            claim_timeout_secs: default_claim_timeout_secs(),
            max_task_attempts: default_max_task_attempts(),
            max_request_size: default_max_request_size(),
            history_enabled: default_true(),
            slow_query_threshold_ms: default_slow_query_threshold_ms(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_api_key() -> String {
    "change-me".to_string()
}

fn default_database_path() -> String {
    "queue.db".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_retention_days() -> i64 {
    30
}

fn default_claim_timeout_secs() -> i64 {
    300
}

fn default_max_task_attempts() -> i64 {
    3
}

fn default_max_request_size() -> usize {
    1024 * 1024
}

fn default_slow_query_threshold_ms() -> u64 {
    100
}

fn default_true() -> bool {
    true
}
