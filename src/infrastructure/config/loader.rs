//! Hierarchical configuration loading (ambient, SPEC_FULL §4.9).
//!
//! Precedence (lowest to highest): programmatic defaults, `queue.yaml` in
//! the working directory, `TASKQUEUE_`-prefixed environment variables with
//! `__` as the nested-key separator. Validated once at load time so the
//! service fails fast on an out-of-bounds value instead of silently
//! clamping it.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("server.port must be nonzero")]
    InvalidPort,
    #[error("server.api_key must not be empty")]
    EmptyApiKey,
    #[error("database.path must not be empty")]
    EmptyDatabasePath,
    #[error("database.max_connections must be at least 1")]
    InvalidMaxConnections(u32),
    #[error("invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),
    #[error("invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),
    #[error("queue.claim_timeout_secs must be positive")]
    InvalidClaimTimeout(i64),
    #[error("queue.max_task_attempts must be at least 1")]
    InvalidMaxTaskAttempts(i64),
    #[error("queue.max_request_size must be positive")]
    InvalidMaxRequestSize(usize),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. `queue.yaml` in the working directory (optional)
    /// 3. `TASKQUEUE_`-prefixed environment variables (highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file("queue.yaml"))
            .merge(Env::prefixed("TASKQUEUE_").split("__"))
            .extract()
            .context("failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, skipping the working
    /// directory `queue.yaml` and environment overlay. Used by tests and
    /// the `migrate` CLI command when pointed at an explicit config.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.server.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if config.server.api_key.is_empty() {
            return Err(ConfigError::EmptyApiKey);
        }
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.queue.claim_timeout_secs <= 0 {
            return Err(ConfigError::InvalidClaimTimeout(config.queue.claim_timeout_secs));
        }
        if config.queue.max_task_attempts < 1 {
            return Err(ConfigError::InvalidMaxTaskAttempts(config.queue.max_task_attempts));
        }
        if config.queue.max_request_size == 0 {
            return Err(ConfigError::InvalidMaxRequestSize(config.queue.max_request_size));
        }

        Ok(())
    }
}
