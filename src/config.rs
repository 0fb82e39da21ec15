//! Process- and pool-level configuration.
//!
//! Every knob is optional in the environment and falls back to the documented
//! default. Unparseable values are reported as configuration errors naming
//! the offending key rather than silently replaced.

use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::driver::ConnectTarget;
use crate::error::SqlConduitError;

/// Alias used when a caller does not name a pool.
pub const DEFAULT_POOL_ALIAS: &str = "default";

/// How the client library talks to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientMode {
    /// Pure-protocol client, no native library required.
    Thin,
    /// Native client library; requires `client_lib_dir` to point at it.
    Thick,
}

/// Process-level settings shared by every pool in a registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConduitSettings {
    /// Client mode (default thin). Thick mode fails fast at registry
    /// construction unless `client_lib_dir` is set and exists.
    pub client_mode: ClientMode,
    /// Path to the native client library, thick mode only.
    pub client_lib_dir: Option<PathBuf>,
    /// Environment name; SQL logging is emitted only in `dev*` environments.
    pub environment: String,
    /// Global SQL logging toggle.
    pub log_enable: bool,
    /// Grace period for draining active connections on pool close
    /// (zero forces an immediate close).
    pub closing_grace: Duration,
}

impl Default for ConduitSettings {
    fn default() -> Self {
        Self {
            client_mode: ClientMode::Thin,
            client_lib_dir: None,
            environment: "dev".to_string(),
            log_enable: true,
            closing_grace: Duration::ZERO,
        }
    }
}

impl ConduitSettings {
    /// Build settings from the environment: `CLIENT_MODE`, `CLIENT_LIB_DIR`,
    /// `APP_ENV`, `LOG_ENABLE`, `POOL_CLOSING_TIME` (seconds).
    ///
    /// # Errors
    /// Returns [`SqlConduitError::Config`] when a present value fails to
    /// parse.
    pub fn from_env() -> Result<Self, SqlConduitError> {
        let defaults = Self::default();
        Ok(Self {
            client_mode: match env_str("CLIENT_MODE") {
                Some(raw) => ClientMode::from_str(&raw, true)
                    .map_err(|_| bad_key("CLIENT_MODE", &raw))?,
                None => defaults.client_mode,
            },
            client_lib_dir: env_str("CLIENT_LIB_DIR").map(PathBuf::from),
            environment: env_str("APP_ENV").unwrap_or(defaults.environment),
            log_enable: match env_str("LOG_ENABLE") {
                Some(raw) => parse_bool("LOG_ENABLE", &raw)?,
                None => defaults.log_enable,
            },
            closing_grace: parse_secs("POOL_CLOSING_TIME", defaults.closing_grace)?,
        })
    }
}

/// Configuration for one named connection pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Unique alias this pool registers under.
    pub alias: String,
    pub user: String,
    pub password: String,
    pub connect_string: String,
    /// Connections established at initialize time.
    pub pool_min: usize,
    /// Upper bound on live connections.
    pub pool_max: usize,
    /// Grow step when the pool expands (advisory; the managed pool opens one
    /// connection at a time).
    pub pool_increment: usize,
    /// Idle connections are pinged before reuse once idle at least this long.
    pub ping_interval: Duration,
    /// Maximum number of acquirers allowed to wait in the queue.
    pub queue_max: usize,
    /// How long an acquirer may wait before failing.
    pub queue_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            alias: DEFAULT_POOL_ALIAS.to_string(),
            user: "hr".to_string(),
            password: "hr".to_string(),
            connect_string: "localhost:1521/XEPDB1".to_string(),
            pool_min: 10,
            pool_max: 10,
            pool_increment: 0,
            ping_interval: Duration::from_secs(60),
            queue_max: 500,
            queue_timeout: Duration::from_secs(60),
        }
    }
}

impl PoolConfig {
    /// Build a pool configuration from the environment: `POOL_ALIAS`,
    /// `DB_USER`, `DB_PASSWORD`, `DB_CONNECT_STRING`, `POOL_MIN`, `POOL_MAX`,
    /// `POOL_INCREMENT`, `POOL_PING_INTERVAL` (seconds), `QUEUE_MAX`,
    /// `QUEUE_TIMEOUT` (milliseconds).
    ///
    /// # Errors
    /// Returns [`SqlConduitError::Config`] when a present value fails to
    /// parse.
    pub fn from_env() -> Result<Self, SqlConduitError> {
        let defaults = Self::default();
        Ok(Self {
            alias: env_str("POOL_ALIAS").unwrap_or(defaults.alias),
            user: env_str("DB_USER").unwrap_or(defaults.user),
            password: env_str("DB_PASSWORD").unwrap_or(defaults.password),
            connect_string: env_str("DB_CONNECT_STRING").unwrap_or(defaults.connect_string),
            pool_min: parse_usize("POOL_MIN", defaults.pool_min)?,
            pool_max: parse_usize("POOL_MAX", defaults.pool_max)?,
            pool_increment: parse_usize("POOL_INCREMENT", defaults.pool_increment)?,
            ping_interval: parse_secs("POOL_PING_INTERVAL", defaults.ping_interval)?,
            queue_max: parse_usize("QUEUE_MAX", defaults.queue_max)?,
            queue_timeout: parse_millis("QUEUE_TIMEOUT", defaults.queue_timeout)?,
        })
    }

    /// Connection target derived from this configuration.
    #[must_use]
    pub fn connect_target(&self) -> ConnectTarget {
        ConnectTarget {
            user: self.user.clone(),
            password: self.password.clone(),
            connect_string: self.connect_string.clone(),
        }
    }

    /// Sanity-check the sizing knobs.
    ///
    /// # Errors
    /// Returns [`SqlConduitError::PoolCreation`] when the sizes are
    /// inconsistent or the pool would be unusable.
    pub fn validate(&self) -> Result<(), SqlConduitError> {
        if self.pool_max == 0 {
            return Err(SqlConduitError::PoolCreation(format!(
                "pool '{}': pool_max must be at least 1",
                self.alias
            )));
        }
        if self.pool_min > self.pool_max {
            return Err(SqlConduitError::PoolCreation(format!(
                "pool '{}': pool_min {} exceeds pool_max {}",
                self.alias, self.pool_min, self.pool_max
            )));
        }
        Ok(())
    }
}

fn env_str(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn bad_key(key: &str, raw: &str) -> SqlConduitError {
    SqlConduitError::Config(format!("invalid value for {key}: {raw:?}"))
}

fn parse_usize(key: &str, default: usize) -> Result<usize, SqlConduitError> {
    match env_str(key) {
        Some(raw) => raw.parse().map_err(|_| bad_key(key, &raw)),
        None => Ok(default),
    }
}

fn parse_secs(key: &str, default: Duration) -> Result<Duration, SqlConduitError> {
    match env_str(key) {
        Some(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| bad_key(key, &raw)),
        None => Ok(default),
    }
}

fn parse_millis(key: &str, default: Duration) -> Result<Duration, SqlConduitError> {
    match env_str(key) {
        Some(raw) => raw
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| bad_key(key, &raw)),
        None => Ok(default),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, SqlConduitError> {
    match raw {
        "1" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(bad_key(key, raw)),
    }
}
