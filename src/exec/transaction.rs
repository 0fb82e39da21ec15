use tracing::{debug, warn};

use crate::driver::StatementOptions;
use crate::error::SqlConduitError;
use crate::logging::render_bindings;
use crate::pool::{PoolRegistry, PooledConnection};
use crate::results::ExecResult;
use crate::types::BindParams;

/// A caller-held transaction over one pooled connection.
///
/// Valid from [`PoolRegistry::begin`] until exactly one terminal operation:
/// a failed [`execute`], [`commit`], or [`rollback`]. Every later call fails
/// with [`SqlConduitError::InvalidHandle`]. Dropping a live handle rolls the
/// transaction back on the runtime.
///
/// [`execute`]: Transaction::execute
/// [`commit`]: Transaction::commit
/// [`rollback`]: Transaction::rollback
pub struct Transaction {
    conn: Option<PooledConnection>,
    log_sql: bool,
}

impl PoolRegistry {
    /// Acquire a connection and open a caller-driven transaction on it.
    ///
    /// No SQL is executed; the transaction exists as soon as the first
    /// statement runs with auto-commit off.
    ///
    /// # Errors
    /// Returns [`SqlConduitError::Acquire`] when no connection can be
    /// checked out.
    pub async fn begin(&self, alias: Option<&str>) -> Result<Transaction, SqlConduitError> {
        let pool = self.pool(alias)?;
        let conn = pool.acquire().await?;
        let log_sql = self.log_gate().should_log(None);
        if log_sql {
            debug!(target: "sql_conduit::sql", "begin transaction");
        }
        Ok(Transaction {
            conn: Some(conn),
            log_sql,
        })
    }
}

impl Transaction {
    /// Execute one statement inside the transaction.
    ///
    /// On a driver failure the transaction is rolled back, the connection is
    /// released, and the handle becomes invalid.
    ///
    /// # Errors
    /// Returns [`SqlConduitError::InvalidHandle`] after a terminal operation
    /// and [`SqlConduitError::Execution`] for a statement-level failure.
    pub async fn execute(
        &mut self,
        sql: &str,
        params: &BindParams,
    ) -> Result<ExecResult, SqlConduitError> {
        let conn = self.conn.as_mut().ok_or_else(already_completed)?;

        if self.log_sql {
            debug!(target: "sql_conduit::sql", sql = %render_bindings(sql, params));
        }

        let opts = StatementOptions {
            auto_commit: false,
            ..StatementOptions::default()
        };
        match conn.execute(sql, params, &opts).await {
            Ok(result) => Ok(result),
            Err(err) => {
                if self.log_sql {
                    debug!(target: "sql_conduit::sql", "rollback transaction");
                }
                if let Some(conn) = self.conn.take() {
                    rollback_and_release(conn).await;
                }
                Err(SqlConduitError::Execution(err.message))
            }
        }
    }

    /// Commit the transaction and release the connection. Terminal.
    ///
    /// # Errors
    /// Returns [`SqlConduitError::InvalidHandle`] after a terminal operation
    /// and [`SqlConduitError::Execution`] when the commit itself fails (the
    /// connection is evicted in that case, since its state is unknown).
    pub async fn commit(&mut self) -> Result<(), SqlConduitError> {
        let mut conn = self.conn.take().ok_or_else(already_completed)?;
        if self.log_sql {
            debug!(target: "sql_conduit::sql", "commit transaction");
        }
        match conn.commit().await {
            Ok(()) => {
                conn.release();
                Ok(())
            }
            Err(err) => {
                conn.evict().await;
                Err(SqlConduitError::Execution(format!("commit failed: {err}")))
            }
        }
    }

    /// Roll the transaction back and release the connection. Terminal.
    ///
    /// # Errors
    /// Returns [`SqlConduitError::InvalidHandle`] after a terminal operation
    /// and [`SqlConduitError::Execution`] when the rollback itself fails
    /// (the connection is evicted in that case).
    pub async fn rollback(&mut self) -> Result<(), SqlConduitError> {
        let mut conn = self.conn.take().ok_or_else(already_completed)?;
        if self.log_sql {
            debug!(target: "sql_conduit::sql", "rollback transaction");
        }
        match conn.rollback().await {
            Ok(()) => {
                conn.release();
                Ok(())
            }
            Err(err) => {
                conn.evict().await;
                Err(SqlConduitError::Execution(format!(
                    "rollback failed: {err}"
                )))
            }
        }
    }

    /// Whether the handle can still run statements.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.conn.is_some()
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take()
            && let Ok(handle) = tokio::runtime::Handle::try_current()
        {
            debug!("transaction handle dropped while active, rolling back");
            handle.spawn(rollback_and_release(conn));
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

fn already_completed() -> SqlConduitError {
    SqlConduitError::InvalidHandle("transaction already completed".to_string())
}

/// Roll the connection's transaction state back and hand it back to (or out
/// of) the pool. A failed rollback evicts the connection rather than
/// returning it with unknown state.
async fn rollback_and_release(mut conn: PooledConnection) {
    match conn.rollback().await {
        Ok(()) => conn.release(),
        Err(err) => {
            warn!(error = %err, "rollback failed, evicting connection");
            conn.evict().await;
        }
    }
}
