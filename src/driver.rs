//! The driver seam.
//!
//! The underlying database driver and its network protocol are external
//! collaborators: the pool and executors only ever talk to these traits.
//! A driver hands out [`DriverConnection`]s; every connection is owned by
//! exactly one in-flight operation until it is released back to its pool.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::results::ExecResult;
use crate::types::BindParams;

/// Error reported by a driver or one of its connections.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct DriverError {
    pub message: String,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Where and as whom to connect.
#[derive(Debug, Clone)]
pub struct ConnectTarget {
    pub user: String,
    pub password: String,
    pub connect_string: String,
}

/// Resolved per-statement options handed to the driver.
///
/// Built by the executors: `auto_commit` comes from the execution mode
/// (single statement vs. transaction), the rest from caller overrides merged
/// over defaults.
#[derive(Debug, Clone, Default)]
pub struct StatementOptions {
    /// Whether the statement implicitly commits after execution.
    pub auto_commit: bool,
    /// Cap on the number of rows fetched.
    pub max_rows: Option<u64>,
    /// Statement-level timeout enforced by the driver.
    pub query_timeout: Option<Duration>,
}

/// Factory for live connections to one database target.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Open a new connection.
    ///
    /// # Errors
    /// Returns a [`DriverError`] when the target is unreachable or refuses
    /// the credentials.
    async fn connect(
        &self,
        target: &ConnectTarget,
    ) -> Result<Box<dyn DriverConnection>, DriverError>;
}

/// A live connection owned by one logical operation at a time.
#[async_trait]
pub trait DriverConnection: Send {
    /// Execute one statement with the given binds and options.
    ///
    /// # Errors
    /// Returns a [`DriverError`] on any statement-level failure; the caller
    /// decides whether to roll back and whether to release or evict the
    /// connection.
    async fn execute(
        &mut self,
        sql: &str,
        params: &BindParams,
        opts: &StatementOptions,
    ) -> Result<ExecResult, DriverError>;

    /// Commit the open transaction, if any.
    async fn commit(&mut self) -> Result<(), DriverError>;

    /// Roll back the open transaction, if any.
    async fn rollback(&mut self) -> Result<(), DriverError>;

    /// Check that the server still answers on this connection.
    async fn ping(&mut self) -> Result<(), DriverError>;

    /// Close the underlying session. Called on eviction, not on release.
    async fn close(&mut self) -> Result<(), DriverError>;
}
