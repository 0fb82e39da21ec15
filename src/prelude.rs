//! Convenient imports for common functionality.

pub use crate::config::{ClientMode, ConduitSettings, DEFAULT_POOL_ALIAS, PoolConfig};
pub use crate::driver::{
    ConnectTarget, Driver, DriverConnection, DriverError, StatementOptions,
};
pub use crate::error::SqlConduitError;
pub use crate::exec::{BatchEntry, ExecOptions, Transaction};
pub use crate::lob::{LobHandle, resolve_lob_columns};
pub use crate::logging::render_bindings;
pub use crate::pool::{ExecPool, PoolRegistry, PoolStats, PooledConnection};
pub use crate::results::{ColumnInfo, DbRow, ExecResult};
pub use crate::types::{BindParams, QueryAndParams, SqlValue};
