//! Configuration for the keytrust provider.

use std::env;
use std::path::PathBuf;

/// Provider service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection URL.
    pub database_url: String,

    /// Port for REST API server.
    pub rest_port: u16,

    /// Maximum pooled database connections.
    pub max_connections: u32,

    /// TOML table mapping calling uids to package names.
    pub packages_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `DATABASE_URL`: SQLite connection string, e.g. `sqlite://keytrust.db`
    ///
    /// Optional:
    /// - `REST_PORT`: REST API port (default: 8080)
    /// - `DB_MAX_CONNECTIONS`: pool size (default: 10)
    /// - `PACKAGES_FILE`: path to the uid/package table
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let rest_port = parse_env("REST_PORT", 8080)?;
        let max_connections = parse_env("DB_MAX_CONNECTIONS", 10)?;
        if max_connections == 0 {
            return Err(ConfigError::InvalidEnv {
                name: "DB_MAX_CONNECTIONS",
                value: "0".to_string(),
            });
        }

        let packages_file = env::var("PACKAGES_FILE").ok().map(PathBuf::from);

        Ok(Self {
            database_url,
            rest_port,
            max_connections,
            packages_file,
        })
    }

    /// REST API bind address.
    pub fn rest_addr(&self) -> std::net::SocketAddr {
        ([0, 0, 0, 0], self.rest_port).into()
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { name, value }),
        Err(_) => Ok(default),
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse package table: {0}")]
    Parse(#[from] toml::de::Error),
}
