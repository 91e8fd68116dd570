//! Engine configuration.
//!
//! Loaded from environment variables with fallback to defaults. Only the
//! engine's own knobs live here; application-level config loading belongs to
//! whoever embeds the engine.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use meridian_core::{PaginationParams, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, NUMBER_RETRY_LIMIT};

use crate::context::RequestContext;
use crate::pool::DbConfig;

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// SQLite file path, or `:memory:`
    pub database_path: PathBuf,

    /// Pool size
    pub max_connections: u32,

    /// Page size when the caller passes none
    pub default_page_size: i64,

    /// Largest page size accepted
    pub max_page_size: i64,

    /// Retries after a document-number conflict
    pub number_retry_limit: u32,

    /// Default deadline for request contexts built by the embedding app
    pub query_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            database_path: PathBuf::from("./meridian.db"),
            max_connections: 5,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            number_retry_limit: NUMBER_RETRY_LIMIT,
            query_timeout_secs: 30,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup (environment, map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = EngineConfig::default();

        let config = EngineConfig {
            database_path: lookup("MERIDIAN_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),

            max_connections: parse_or(&lookup, "MERIDIAN_MAX_CONNECTIONS", defaults.max_connections)?,

            default_page_size: parse_or(&lookup, "MERIDIAN_DEFAULT_PAGE_SIZE", defaults.default_page_size)?,

            max_page_size: parse_or(&lookup, "MERIDIAN_MAX_PAGE_SIZE", defaults.max_page_size)?,

            number_retry_limit: parse_or(&lookup, "MERIDIAN_NUMBER_RETRY_LIMIT", defaults.number_retry_limit)?,

            query_timeout_secs: parse_or(&lookup, "MERIDIAN_QUERY_TIMEOUT_SECS", defaults.query_timeout_secs)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("MERIDIAN_MAX_CONNECTIONS".to_string()));
        }
        if self.max_page_size < 1 {
            return Err(ConfigError::InvalidValue("MERIDIAN_MAX_PAGE_SIZE".to_string()));
        }
        if self.default_page_size < 1 || self.default_page_size > self.max_page_size {
            return Err(ConfigError::InvalidValue("MERIDIAN_DEFAULT_PAGE_SIZE".to_string()));
        }
        Ok(())
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    /// Pool configuration derived from these settings.
    pub fn db_config(&self) -> DbConfig {
        let config = if self.database_path.as_os_str() == ":memory:" {
            DbConfig::in_memory()
        } else {
            DbConfig::new(self.database_path.clone()).max_connections(self.max_connections)
        };
        config
            .max_page_size(self.max_page_size)
            .number_retry_limit(self.number_retry_limit)
    }

    /// First page at the configured default size.
    pub fn first_page(&self) -> PaginationParams {
        PaginationParams::new(1, self.default_page_size)
    }

    /// A fresh context bounded by the configured query timeout.
    pub fn request_context(&self) -> RequestContext {
        RequestContext::with_timeout(self.query_timeout())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.default_page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.max_page_size, MAX_PAGE_SIZE);
        assert_eq!(config.number_retry_limit, NUMBER_RETRY_LIMIT);
        assert_eq!(config.query_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("MERIDIAN_DATABASE_PATH", "/tmp/sales.db"),
            ("MERIDIAN_MAX_CONNECTIONS", "8"),
            ("MERIDIAN_NUMBER_RETRY_LIMIT", " 3 "),
        ]))
        .unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/sales.db"));
        assert_eq!(config.db_config().max_connections, 8);
        assert_eq!(config.db_config().number_retry_limit, 3);
        assert_eq!(config.first_page(), PaginationParams::new(1, DEFAULT_PAGE_SIZE));
    }

    #[test]
    fn test_memory_path_uses_single_connection() {
        let config = EngineConfig::from_lookup(lookup(&[("MERIDIAN_DATABASE_PATH", ":memory:")])).unwrap();
        assert_eq!(config.db_config().max_connections, 1);
    }

    #[test]
    fn test_invalid_number_names_the_key() {
        let err = EngineConfig::from_lookup(lookup(&[("MERIDIAN_MAX_PAGE_SIZE", "lots")])).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for MERIDIAN_MAX_PAGE_SIZE");
    }

    #[test]
    fn test_default_page_size_cannot_exceed_max() {
        let res = EngineConfig::from_lookup(lookup(&[
            ("MERIDIAN_DEFAULT_PAGE_SIZE", "50"),
            ("MERIDIAN_MAX_PAGE_SIZE", "10"),
        ]));
        assert!(matches!(res, Err(ConfigError::InvalidValue(key)) if key == "MERIDIAN_DEFAULT_PAGE_SIZE"));
    }
}
