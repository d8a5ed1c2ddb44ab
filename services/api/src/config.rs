//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;
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
    pub database_url: String,
    pub log_level: Level,
    /// HMAC secret the bearer tokens are signed with.
    pub token_secret: String,
    pub token_ttl_hours: i64,
    /// How long a confirmed listing may sit unfinalized before the sweeper
    /// deletes it.
    pub listing_grace_hours: i64,
    /// How many days ahead of the due date the reminder fires.
    pub reminder_lead_days: u32,
    pub dedupe_window_hours: i64,
    /// UTC hour (0-23) at which the daily sweeps run.
    pub sweep_hour_utc: u32,
    pub cors_origin: String,
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

        // --- Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Auth Settings ---
        let token_secret = std::env::var("TOKEN_SECRET")
            .map_err(|_| ConfigError::MissingVar("TOKEN_SECRET".to_string()))?;
        let token_ttl_hours = number_var("TOKEN_TTL_HOURS", 720)?;

        // --- Lifecycle and Notification Settings ---
        let listing_grace_hours = number_var("LISTING_GRACE_HOURS", 48)?;
        let reminder_lead_days = number_var("REMINDER_LEAD_DAYS", 2)?;
        let dedupe_window_hours = number_var("DEDUPE_WINDOW_HOURS", 24)?;
        let sweep_hour_utc: u32 = number_var("SWEEP_HOUR_UTC", 6)?;
        if sweep_hour_utc > 23 {
            return Err(ConfigError::InvalidValue(
                "SWEEP_HOUR_UTC".to_string(),
                format!("'{}' is not an hour of day", sweep_hour_utc),
            ));
        }

        let cors_origin = std::env::var("CORS_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            token_secret,
            token_ttl_hours,
            listing_grace_hours,
            reminder_lead_days,
            dedupe_window_hours,
            sweep_hour_utc,
            cors_origin,
        })
    }
}

/// Reads an optional numeric variable, falling back to `default` when unset.
fn number_var<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}
