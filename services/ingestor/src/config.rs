//! Ingestor configuration loading.
//!
//! Env vars only, no config file: `DATABASE_URL` (required), `BIND_ADDR`
//! (default `0.0.0.0:8080`), `LOG_LEVEL` (default `info`),
//! `DB_MAX_CONNECTIONS` (default 10), plus the `SMTP_*`/`NOTIFICATION_EMAIL`
//! set consumed directly by `cdc_engine::notifier_from_env`.

use std::env;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{0} is not a valid value: {1}")]
    Invalid(&'static str, String),
}

#[derive(Debug, Clone)]
pub struct IngestorConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub log_level: String,
    pub db_max_connections: u32,
}

impl IngestorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned());
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
        let db_max_connections = match env::var("DB_MAX_CONNECTIONS") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid("DB_MAX_CONNECTIONS", raw))?,
            Err(_) => 10,
        };

        Ok(Self {
            database_url,
            bind_addr,
            log_level,
            db_max_connections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_max_connections_is_rejected() {
        // SAFETY: tests run single-threaded within this module's env mutation.
        unsafe {
            env::set_var("DATABASE_URL", "postgres://localhost/test");
            env::set_var("DB_MAX_CONNECTIONS", "not-a-number");
        }
        let result = IngestorConfig::from_env();
        unsafe {
            env::remove_var("DATABASE_URL");
            env::remove_var("DB_MAX_CONNECTIONS");
        }
        assert!(matches!(result, Err(ConfigError::Invalid("DB_MAX_CONNECTIONS", _))));
    }
}
