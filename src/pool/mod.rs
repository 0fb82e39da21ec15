//! Bounded connection pools and the per-process pool registry.

mod manager;
mod registry;

pub use manager::ConnManager;
pub use registry::PoolRegistry;

use std::sync::Arc;
use std::time::Duration;

use deadpool::Runtime;
use deadpool::managed::{Object, Pool, Timeouts};
use tracing::debug;

use crate::config::PoolConfig;
use crate::driver::{Driver, DriverError, StatementOptions};
use crate::error::SqlConduitError;
use crate::results::ExecResult;
use crate::types::BindParams;

/// Read-only pool statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Connections currently open (idle + in use).
    pub open: usize,
    /// Connections checked out by in-flight operations.
    pub in_use: usize,
    /// Acquirers waiting in the queue.
    pub waiting: usize,
}

/// A bounded pool of reusable connections to one database target.
pub struct ExecPool {
    pool: Pool<ConnManager>,
    config: PoolConfig,
}

impl ExecPool {
    pub(crate) fn new(driver: Arc<dyn Driver>, config: PoolConfig) -> Result<Self, SqlConduitError> {
        config.validate()?;
        let manager = ConnManager::new(driver, config.connect_target(), config.ping_interval);
        let pool = Pool::builder(manager)
            .max_size(config.pool_max)
            .timeouts(Timeouts {
                wait: Some(config.queue_timeout),
                ..Timeouts::default()
            })
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| {
                SqlConduitError::PoolCreation(format!("pool '{}': {e}", config.alias))
            })?;
        Ok(Self { pool, config })
    }

    /// Establish `pool_min` connections up front. Called once at initialize
    /// time; a failure here fails pool creation.
    pub(crate) async fn warm_up(&self) -> Result<(), SqlConduitError> {
        let target = self.config.pool_min.min(self.config.pool_max);
        let mut held = Vec::with_capacity(target);
        for _ in 0..target {
            let conn = self.pool.get().await.map_err(|e| {
                SqlConduitError::PoolCreation(format!(
                    "pool '{}' warm-up: {e}",
                    self.config.alias
                ))
            })?;
            held.push(conn);
        }
        // Dropping the held objects parks them in the pool as idle.
        Ok(())
    }

    /// Check a connection out of the pool.
    ///
    /// # Errors
    /// Returns [`SqlConduitError::Acquire`] when the wait queue is already at
    /// `queue_max`, when `queue_timeout` elapses while waiting for a free
    /// slot, or when opening a fresh connection fails.
    pub async fn acquire(&self) -> Result<PooledConnection, SqlConduitError> {
        let status = self.pool.status();
        let exhausted = status.available == 0 && status.size >= self.config.pool_max;
        if exhausted && status.waiting >= self.config.queue_max {
            return Err(SqlConduitError::Acquire(format!(
                "pool '{}': acquire queue limit {} exceeded",
                self.config.alias, self.config.queue_max
            )));
        }
        let obj = self.pool.get().await?;
        Ok(PooledConnection { obj })
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let status = self.pool.status();
        PoolStats {
            open: status.size,
            in_use: status.size.saturating_sub(status.available),
            waiting: status.waiting,
        }
    }

    #[must_use]
    pub fn alias(&self) -> &str {
        &self.config.alias
    }

    /// Drain active connections for up to `grace`, then close.
    ///
    /// A zero grace period forces an immediate close. Connections still
    /// checked out when the pool closes are discarded on release instead of
    /// being returned.
    pub async fn close(&self, grace: Duration) {
        if !grace.is_zero() {
            let deadline = tokio::time::Instant::now() + grace;
            loop {
                let status = self.pool.status();
                if status.size <= status.available {
                    break;
                }
                if tokio::time::Instant::now() >= deadline {
                    debug!(
                        alias = %self.config.alias,
                        in_use = status.size - status.available,
                        "grace period elapsed, force-closing pool"
                    );
                    break;
                }
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        }
        self.pool.close();
    }
}

impl std::fmt::Debug for ExecPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecPool")
            .field("alias", &self.config.alias)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// A connection checked out of an [`ExecPool`], exclusively owned by one
/// logical operation.
///
/// Dropping the value releases the connection back to its pool; [`evict`]
/// closes the underlying session instead. Ownership makes the
/// released-exactly-once guarantee structural.
///
/// [`evict`]: PooledConnection::evict
pub struct PooledConnection {
    obj: Object<ConnManager>,
}

impl PooledConnection {
    pub(crate) async fn execute(
        &mut self,
        sql: &str,
        params: &BindParams,
        opts: &StatementOptions,
    ) -> Result<ExecResult, DriverError> {
        self.obj.execute(sql, params, opts).await
    }

    pub(crate) async fn commit(&mut self) -> Result<(), DriverError> {
        self.obj.commit().await
    }

    pub(crate) async fn rollback(&mut self) -> Result<(), DriverError> {
        self.obj.rollback().await
    }

    /// Release the connection back to its pool.
    pub(crate) fn release(self) {
        drop(self.obj);
    }

    /// Close the underlying session instead of returning it to the pool.
    /// Used when the connection's state can no longer be trusted (e.g. a
    /// failed rollback).
    pub(crate) async fn evict(self) {
        let mut conn = Object::take(self.obj);
        if let Err(err) = conn.close().await {
            debug!(error = %err, "closing evicted connection failed");
        }
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection").finish_non_exhaustive()
    }
}
