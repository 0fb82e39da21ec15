use thiserror::Error;

use crate::driver::DriverError;

/// Error taxonomy for the execution layer.
///
/// Connection-level failures always release (or evict) the connection before
/// one of these surfaces; transaction failures always roll back first.
#[derive(Debug, Error)]
pub enum SqlConduitError {
    /// Pool could not be created: bad configuration, duplicate alias, or a
    /// failed warm-up connection. Raised at startup for thick-mode
    /// misconfiguration and not recoverable there.
    #[error("Pool creation error: {0}")]
    PoolCreation(String),

    /// Connection acquisition failed: pool exhausted, queue limit exceeded,
    /// queue timeout elapsed, or no pool registered under the alias.
    #[error("Connection acquire error: {0}")]
    Acquire(String),

    /// Statement-level driver failure on a single auto-commit execution or
    /// inside an explicit transaction.
    #[error("SQL execution error: {0}")]
    Execution(String),

    /// A transaction batch failed; `failed_index` is the position of the
    /// statement that failed. The batch was rolled back.
    #[error("Transaction failed at statement {failed_index}: {message}")]
    Transaction { message: String, failed_index: usize },

    /// A requested large-object column is absent from the result set.
    #[error("Column {0} not found in result set")]
    ColumnNotFound(String),

    /// Operation on a transaction handle that already committed, rolled
    /// back, or was invalidated by an execution failure.
    #[error("Invalid transaction handle: {0}")]
    InvalidHandle(String),

    /// Configuration error: unparseable environment value, unknown alias on
    /// close, inconsistent pool sizing.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl From<deadpool::managed::PoolError<DriverError>> for SqlConduitError {
    fn from(err: deadpool::managed::PoolError<DriverError>) -> Self {
        use deadpool::managed::PoolError;
        match err {
            PoolError::Timeout(_) => {
                SqlConduitError::Acquire("timed out waiting for a free connection".to_string())
            }
            PoolError::Backend(e) => {
                SqlConduitError::Acquire(format!("failed to open connection: {e}"))
            }
            PoolError::Closed => SqlConduitError::Acquire("pool is closed".to_string()),
            other => SqlConduitError::Acquire(format!("pool error: {other}")),
        }
    }
}
