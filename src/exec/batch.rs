use tracing::{debug, warn};

use super::ExecOptions;
use crate::error::SqlConduitError;
use crate::logging::render_bindings;
use crate::pool::PoolRegistry;
use crate::results::ExecResult;
use crate::types::QueryAndParams;

/// One statement's result inside a batch, tagged with its original position.
#[derive(Debug)]
pub struct BatchEntry {
    pub index: usize,
    pub result: ExecResult,
}

impl PoolRegistry {
    /// Execute an ordered batch of statements as one atomic transaction.
    ///
    /// One connection is acquired for the whole batch; statements run
    /// strictly in order with auto-commit off. The first failure rolls the
    /// transaction back and fails the batch with the failing statement's
    /// index; nothing is committed and no partial results are returned. When
    /// every statement succeeds, a single commit follows the last statement
    /// and the results come back in order, tagged with their original
    /// indices.
    ///
    /// An empty batch resolves to an empty vec without acquiring a
    /// connection.
    ///
    /// # Errors
    /// Returns [`SqlConduitError::Acquire`] when no connection can be
    /// checked out, [`SqlConduitError::Transaction`] when a statement fails,
    /// and [`SqlConduitError::Execution`] when the final commit fails.
    pub async fn execute_batch(
        &self,
        batch: &[QueryAndParams],
        alias: Option<&str>,
        opts: &ExecOptions,
    ) -> Result<Vec<BatchEntry>, SqlConduitError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let pool = self.pool(alias)?;
        let mut conn = pool.acquire().await?;
        let stmt_opts = opts.statement_options(false);
        let log_sql = self.log_gate().should_log(opts.log);

        let mut entries = Vec::with_capacity(batch.len());
        for (index, item) in batch.iter().enumerate() {
            if log_sql {
                debug!(target: "sql_conduit::sql", sql = %render_bindings(&item.query, &item.params));
            }
            match conn.execute(&item.query, &item.params, &stmt_opts).await {
                Ok(result) => entries.push(BatchEntry { index, result }),
                Err(err) => {
                    if log_sql {
                        debug!(target: "sql_conduit::sql", "rollback");
                    }
                    match conn.rollback().await {
                        Ok(()) => conn.release(),
                        Err(rb_err) => {
                            // Best-effort: the statement error is what
                            // surfaces, never the rollback's.
                            warn!(error = %rb_err, "rollback failed, evicting connection");
                            conn.evict().await;
                        }
                    }
                    return Err(SqlConduitError::Transaction {
                        message: err.message,
                        failed_index: index,
                    });
                }
            }
        }

        if log_sql {
            debug!(target: "sql_conduit::sql", "commit");
        }
        match conn.commit().await {
            Ok(()) => {
                conn.release();
                Ok(entries)
            }
            Err(err) => {
                match conn.rollback().await {
                    Ok(()) => conn.release(),
                    Err(rb_err) => {
                        warn!(error = %rb_err, "rollback failed, evicting connection");
                        conn.evict().await;
                    }
                }
                Err(SqlConduitError::Execution(format!(
                    "commit failed: {err}"
                )))
            }
        }
    }
}
