//! Runtime configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use crate::defaults;
use crate::error::{Error, Result};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(Error::Config(format!("Invalid LOG_FORMAT: {}", s))),
        }
    }
}

/// Settings for the store connection, search and logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BooruConfig {
    /// sqlx connection URL.
    pub database_url: String,
    /// Maximum number of pooled connections.
    pub max_connections: u32,
    /// Minimum number of pooled connections kept open.
    pub min_connections: u32,
    /// How long to wait for a pooled connection.
    pub connect_timeout: Duration,
    /// How long an idle connection may stay in the pool.
    pub idle_timeout: Duration,
    /// Limit applied by `ImageSearch::search_tags`.
    pub search_limit: usize,
    pub log_format: LogFormat,
}

impl Default for BooruConfig {
    fn default() -> Self {
        Self {
            database_url: defaults::DATABASE_URL.to_string(),
            max_connections: defaults::DB_MAX_CONNECTIONS,
            min_connections: defaults::DB_MIN_CONNECTIONS,
            connect_timeout: Duration::from_secs(defaults::DB_CONNECT_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(defaults::DB_IDLE_TIMEOUT_SECS),
            search_limit: defaults::SEARCH_LIMIT,
            log_format: LogFormat::Text,
        }
    }
}

impl BooruConfig {
    /// Constructs configuration from environment variables.
    ///
    /// Environment variables:
    /// - `DATABASE_URL` (default: `sqlite://pantsu.db?mode=rwc`)
    /// - `DB_MAX_CONNECTIONS` (default: 10)
    /// - `DB_MIN_CONNECTIONS` (default: 1)
    /// - `DB_CONNECT_TIMEOUT_SECS` (default: 30)
    /// - `DB_IDLE_TIMEOUT_SECS` (default: 600)
    /// - `SEARCH_LIMIT` (default: 100)
    /// - `LOG_FORMAT` - "text" or "json" (default: "text")
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Constructs configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = Self::default();
        let config = Self {
            database_url: lookup("DATABASE_URL").unwrap_or(base.database_url),
            max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", base.max_connections)?,
            min_connections: parse_or(&lookup, "DB_MIN_CONNECTIONS", base.min_connections)?,
            connect_timeout: Duration::from_secs(parse_or(
                &lookup,
                "DB_CONNECT_TIMEOUT_SECS",
                defaults::DB_CONNECT_TIMEOUT_SECS,
            )?),
            idle_timeout: Duration::from_secs(parse_or(
                &lookup,
                "DB_IDLE_TIMEOUT_SECS",
                defaults::DB_IDLE_TIMEOUT_SECS,
            )?),
            search_limit: parse_or(&lookup, "SEARCH_LIMIT", base.search_limit)?,
            log_format: parse_or(&lookup, "LOG_FORMAT", base.log_format)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(Error::Config(
                "DB_MAX_CONNECTIONS must be at least 1".to_string(),
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(Error::Config(format!(
                "DB_MIN_CONNECTIONS ({}) exceeds DB_MAX_CONNECTIONS ({})",
                self.min_connections, self.max_connections
            )));
        }
        Ok(())
    }
}

/// Parse an optional variable, falling back to `default` when unset.
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("Invalid value for {}: {:?}", key, raw))),
        None => Ok(default),
    }
}
