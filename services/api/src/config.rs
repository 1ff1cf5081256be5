//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub data_dir: PathBuf,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub grader_model: String,
    /// Connection string of the remote mirror. `None` disables mirroring.
    pub mirror_database_url: Option<String>,
    /// How often a failed mirror upsert is retried before the event is dropped.
    pub mirror_retry_attempts: u32,
    pub mirror_queue_capacity: usize,
    /// Refresh period of the classmates activity feed, in seconds.
    pub activity_poll_seconds: u64,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Storage Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Grading Client Settings ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let grader_model =
            std::env::var("GRADER_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        // --- Load Mirror Settings ---
        let mirror_database_url = std::env::var("MIRROR_DATABASE_URL").ok();
        let mirror_retry_attempts = parse_var("MIRROR_RETRY_ATTEMPTS", 0u32)?;
        let mirror_queue_capacity = parse_var("MIRROR_QUEUE_CAPACITY", 256usize)?;

        let activity_poll_seconds = parse_var("ACTIVITY_POLL_SECONDS", 10u64)?;

        Ok(Self {
            bind_address,
            data_dir,
            log_level,
            openai_api_key,
            grader_model,
            mirror_database_url,
            mirror_retry_attempts,
            mirror_queue_capacity,
            activity_poll_seconds,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(name.to_string(), raw)),
        Err(_) => Ok(default),
    }
}
