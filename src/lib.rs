//! Pooled async SQL execution.
//!
//! This crate manages bounded pools of database connections keyed by alias
//! and executes SQL against them in three shapes: single auto-commit
//! statements, all-or-nothing transaction batches, and caller-held explicit
//! transactions. Result sets come back structured, with stream-typed
//! large-object columns materializable to text after the fact.
//!
//! The database driver itself is an external collaborator: implement
//! [`driver::Driver`] and [`driver::DriverConnection`] for your client
//! library and hand the driver to a [`pool::PoolRegistry`].

pub mod config;
pub mod driver;
pub mod error;
pub mod exec;
pub mod lob;
pub mod logging;
pub mod pool;
pub mod prelude;
pub mod results;
pub mod types;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use error::SqlConduitError;
