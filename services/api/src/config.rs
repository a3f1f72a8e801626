//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use tracing::Level;

/// Longest session lifetime accepted, about ten years.
pub const MAX_SESSION_TTL_DAYS: i64 = 3650;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where documents, users and comments are persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Storage {
    Postgres { database_url: String, max_connections: u32 },
    /// Process memory only; everything is lost on restart.
    Memory,
}

/// Outgoing mail server settings. Absent means notifications are only logged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub storage: Storage,
    pub log_level: Level,
    /// Base of the links mailed to collaborators.
    pub public_base_url: String,
    pub cors_origin: String,
    pub session_ttl_days: i64,
    pub smtp: Option<SmtpConfig>,
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
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, e.g. a map in tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Server Settings ---
        let bind_address = parse("BIND_ADDRESS", &var_or("BIND_ADDRESS", "0.0.0.0:3000"))?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let public_base_url = var_or("PUBLIC_BASE_URL", "http://localhost:3000");
        let cors_origin = var_or("CORS_ORIGIN", "http://localhost:3000");

        let session_ttl_days: i64 = parse("SESSION_TTL_DAYS", &var_or("SESSION_TTL_DAYS", "7"))?;
        if !(1..=MAX_SESSION_TTL_DAYS).contains(&session_ttl_days) {
            return Err(ConfigError::InvalidValue(
                "SESSION_TTL_DAYS".to_string(),
                format!("must be between 1 and {} days", MAX_SESSION_TTL_DAYS),
            ));
        }

        // --- Storage Settings ---
        let storage = match var_or("STORAGE", "postgres").to_lowercase().as_str() {
            "memory" => Storage::Memory,
            "postgres" => Storage::Postgres {
                database_url: lookup("DATABASE_URL")
                    .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?,
                max_connections: parse(
                    "DATABASE_MAX_CONNECTIONS",
                    &var_or("DATABASE_MAX_CONNECTIONS", "5"),
                )?,
            },
            other => {
                return Err(ConfigError::InvalidValue(
                    "STORAGE".to_string(),
                    format!("'{}' is not one of postgres, memory", other),
                ))
            }
        };

        // --- Mail Settings (all or nothing once SMTP_HOST is set) ---
        let smtp = match lookup("SMTP_HOST") {
            None => None,
            Some(host) => {
                let required = |key: &str| {
                    lookup(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()))
                };
                Some(SmtpConfig {
                    host,
                    port: parse("SMTP_PORT", &var_or("SMTP_PORT", "587"))?,
                    username: required("SMTP_USERNAME")?,
                    password: required("SMTP_PASSWORD")?,
                    from: required("SMTP_FROM")?,
                })
            }
        };

        Ok(Self {
            bind_address,
            storage,
            log_level,
            public_base_url,
            cors_origin,
            session_ttl_days,
            smtp,
        })
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}
