//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use bbq_core::SmoothingConfig;
use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Without a database URL the server keeps sessions in memory.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub cors_origin: String,
    pub smoothing: SmoothingConfig,
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

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Load Server and Database Settings ---
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        // --- Load Smoothing Time Constants ---
        let defaults = SmoothingConfig::default();
        let smoothing = SmoothingConfig {
            ambient_tau_secs: tau(&lookup, "AMBIENT_TAU_SECS", defaults.ambient_tau_secs)?,
            food_tau_secs: tau(&lookup, "FOOD_TAU_SECS", defaults.food_tau_secs)?,
            rate_tau_secs: tau(&lookup, "RATE_TAU_SECS", defaults.rate_tau_secs)?,
        };

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            cors_origin,
            smoothing,
        })
    }
}

/// A time constant must be a positive, finite number of seconds.
fn tau<F>(lookup: &F, key: &str, default: f64) -> Result<f64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("'{}' is not a positive number of seconds", raw),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.database_url, None);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.smoothing, SmoothingConfig::default());
    }

    #[test]
    fn overrides_are_read() {
        let config = load(&[
            ("BIND_ADDRESS", "127.0.0.1:8080"),
            ("DATABASE_URL", "postgres://bbq@localhost/bbq"),
            ("RUST_LOG", "debug"),
            ("FOOD_TAU_SECS", "250"),
        ])
        .unwrap();
        assert_eq!(config.bind_address.port(), 8080);
        assert_eq!(config.database_url.as_deref(), Some("postgres://bbq@localhost/bbq"));
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.smoothing.food_tau_secs, 250.0);
        assert_eq!(config.smoothing.ambient_tau_secs, 20.0);
    }

    #[test]
    fn blank_database_url_means_in_memory() {
        assert_eq!(load(&[("DATABASE_URL", "  ")]).unwrap().database_url, None);
    }

    #[rstest]
    #[case("AMBIENT_TAU_SECS", "0")]
    #[case("FOOD_TAU_SECS", "-5")]
    #[case("RATE_TAU_SECS", "inf")]
    #[case("RATE_TAU_SECS", "soon")]
    #[case("BIND_ADDRESS", "nowhere")]
    #[case("RUST_LOG", "loud")]
    fn invalid_values_are_rejected(#[case] key: &str, #[case] value: &str) {
        match load(&[(key, value)]) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, key),
            other => panic!("expected InvalidValue for {}, got {:?}", key, other),
        }
    }
}
