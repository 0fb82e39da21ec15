//! Statement execution against registered pools.
//!
//! Three execution shapes share the same acquire/release discipline: single
//! statements with auto-commit ([`PoolRegistry::execute`]), all-or-nothing
//! batches ([`PoolRegistry::execute_batch`]), and caller-driven transactions
//! ([`PoolRegistry::begin`]).

mod batch;
mod transaction;

pub use batch::BatchEntry;
pub use transaction::Transaction;

use std::time::Duration;

use tracing::debug;

use crate::driver::StatementOptions;
use crate::error::SqlConduitError;
use crate::lob::resolve_lob_columns;
use crate::logging::render_bindings;
use crate::pool::PoolRegistry;
use crate::results::ExecResult;
use crate::types::BindParams;

/// Per-call execution options, merged over the defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecOptions {
    /// Cap on the number of rows fetched.
    pub max_rows: Option<u64>,
    /// Statement-level timeout enforced by the driver.
    pub query_timeout: Option<Duration>,
    /// Per-call SQL logging override; `None` follows the gate.
    pub log: Option<bool>,
}

impl ExecOptions {
    #[must_use]
    pub fn with_max_rows(mut self, max_rows: u64) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    #[must_use]
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_log(mut self, log: bool) -> Self {
        self.log = Some(log);
        self
    }

    pub(crate) fn statement_options(&self, auto_commit: bool) -> StatementOptions {
        StatementOptions {
            auto_commit,
            max_rows: self.max_rows,
            query_timeout: self.query_timeout,
        }
    }
}

impl PoolRegistry {
    /// Execute one statement with auto-commit against the named (or default)
    /// pool.
    ///
    /// The connection is acquired for this call only and released exactly
    /// once, on whichever path is taken.
    ///
    /// # Errors
    /// Returns [`SqlConduitError::Acquire`] when no connection can be
    /// checked out and [`SqlConduitError::Execution`] for a statement-level
    /// driver failure.
    pub async fn execute(
        &self,
        sql: &str,
        params: &BindParams,
        alias: Option<&str>,
        opts: &ExecOptions,
    ) -> Result<ExecResult, SqlConduitError> {
        let pool = self.pool(alias)?;
        let mut conn = pool.acquire().await?;

        if self.log_gate().should_log(opts.log) {
            debug!(target: "sql_conduit::sql", sql = %render_bindings(sql, params));
        }

        match conn.execute(sql, params, &opts.statement_options(true)).await {
            Ok(result) => {
                conn.release();
                Ok(result)
            }
            Err(err) => {
                conn.release();
                Err(SqlConduitError::Execution(err.message))
            }
        }
    }

    /// Execute one statement, then materialize the named large-object
    /// columns of the result.
    ///
    /// # Errors
    /// As [`execute`], plus [`SqlConduitError::ColumnNotFound`] when a
    /// requested column is absent from the result set.
    ///
    /// [`execute`]: PoolRegistry::execute
    pub async fn execute_with_lobs(
        &self,
        sql: &str,
        params: &BindParams,
        lob_columns: &[&str],
        alias: Option<&str>,
        opts: &ExecOptions,
    ) -> Result<ExecResult, SqlConduitError> {
        let result = self.execute(sql, params, alias, opts).await?;
        resolve_lob_columns(result, lob_columns).await
    }
}
