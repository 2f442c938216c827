use std::str::FromStr;

use whmon_monitor::{DedupStrategy, MonitorConfig};
use whmon_store::FirebaseConfig;

use crate::logging::LogFormat;

/// Invalid or missing configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be set")]
    Missing { var: &'static str },

    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Read `var` through `lookup` and parse it, falling back to `default`.
fn parse_or<T, L>(lookup: &L, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    L: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                var,
                value: raw.clone(),
                reason: e.to_string(),
            })
        }
        _ => Ok(default),
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long the monitor gets to drain on shutdown (default: `5`).
    pub shutdown_timeout_secs: u64,
}

impl ServerConfig {
    fn from_lookup<L>(lookup: &L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(lookup, "PORT", 3000)?,
            request_timeout_secs: parse_or(lookup, "REQUEST_TIMEOUT_SECS", 30)?,
            shutdown_timeout_secs: parse_or(lookup, "SHUTDOWN_TIMEOUT_SECS", 5)?,
        })
    }
}

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

/// Which store backend the service talks to.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    Firebase(FirebaseConfig),
    /// In-process store; nothing survives a restart.
    Memory,
}

impl StoreConfig {
    fn from_lookup<L>(lookup: &L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let backend = lookup("STORE_BACKEND").unwrap_or_else(|| "firebase".into());
        match backend.trim().to_ascii_lowercase().as_str() {
            "firebase" => {
                let database_url = lookup("DATABASE_URL")
                    .filter(|url| !url.trim().is_empty())
                    .ok_or(ConfigError::Missing { var: "DATABASE_URL" })?;
                let auth_token = lookup("DATABASE_AUTH").filter(|t| !t.is_empty());
                Ok(StoreConfig::Firebase(FirebaseConfig {
                    database_url,
                    auth_token,
                }))
            }
            "memory" => Ok(StoreConfig::Memory),
            _ => Err(ConfigError::Invalid {
                var: "STORE_BACKEND",
                value: backend,
                reason: "expected firebase or memory".into(),
            }),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            StoreConfig::Firebase(_) => "firebase",
            StoreConfig::Memory => "memory",
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig
// ---------------------------------------------------------------------------

/// Full service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub monitor: MonitorConfig,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                  |
    /// |-------------------------|--------------------------|
    /// | `HOST`                  | `0.0.0.0`                |
    /// | `PORT`                  | `3000`                   |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                     |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `5`                      |
    /// | `STORE_BACKEND`         | `firebase`               |
    /// | `DATABASE_URL`          | required for `firebase`  |
    /// | `DATABASE_AUTH`         | unset                    |
    /// | `DEDUP_STRATEGY`        | `durable`                |
    /// | `DEDUP_QUERY_LIMIT`     | `50`                     |
    /// | `STALENESS_FILTER`      | `true`                   |
    /// | `LOG_FORMAT`            | `text`                   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let defaults = MonitorConfig::default();
        let monitor = MonitorConfig {
            staleness_filter: parse_or(&lookup, "STALENESS_FILTER", defaults.staleness_filter)?,
            dedup_strategy: parse_or(&lookup, "DEDUP_STRATEGY", defaults.dedup_strategy)?,
            dedup_query_limit: parse_or(&lookup, "DEDUP_QUERY_LIMIT", defaults.dedup_query_limit)?,
            ..defaults
        };
        if monitor.dedup_query_limit == 0 {
            return Err(ConfigError::Invalid {
                var: "DEDUP_QUERY_LIMIT",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(Self {
            server: ServerConfig::from_lookup(&lookup)?,
            store: StoreConfig::from_lookup(&lookup)?,
            monitor,
            log_format: parse_or(&lookup, "LOG_FORMAT", LogFormat::Text)?,
        })
    }
}
