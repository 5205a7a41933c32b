//! API server configuration, loaded from the environment.
//!
//! Every setting has a development default, so `tally-api` starts with no
//! environment at all and a production deployment overrides what it needs:
//!
//! - `TALLY_PORT`    - listen port (default 3001)
//! - `TALLY_DB_PATH` - SQLite file path (default `tally.db` in the cwd)
//! - `TALLY_DB_MAX_CONNECTIONS` - pool size (default 5)

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

/// Runtime configuration for the API server.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// TCP port the server binds on.
    pub port: u16,
    /// Path to the SQLite database file.
    pub database_path: PathBuf,
    /// Connection pool size.
    pub max_connections: u32,
}

impl ApiConfig {
    /// Loads configuration from the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Ok(ApiConfig {
            port: parse_env("TALLY_PORT", 3001)?,
            database_path: std::env::var("TALLY_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("tally.db")),
            max_connections: parse_env("TALLY_DB_MAX_CONNECTIONS", 5)?,
        })
    }
}

fn parse_env<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        // Scoped to vars this test does not set
        let config = ApiConfig::load().unwrap();
        assert!(config.max_connections > 0);
        assert!(config.port > 0);
    }
}
