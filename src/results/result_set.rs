use std::collections::BTreeMap;
use std::sync::Arc;

use super::row::DbRow;
use crate::types::SqlValue;

/// Result-set column metadata reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// Driver-reported database type, when known.
    pub db_type: Option<String>,
}

/// The structured result of one statement execution.
#[derive(Debug, Default)]
pub struct ExecResult {
    /// Rows returned by the statement.
    pub rows: Vec<DbRow>,
    /// Rows affected, for DML statements.
    pub rows_affected: u64,
    /// Output bind values, keyed by bind name.
    pub out_binds: BTreeMap<String, SqlValue>,
    /// Column metadata for `rows`.
    pub meta_data: Vec<ColumnInfo>,
    /// Rowid of the last row affected, when the driver reports one.
    pub last_rowid: Option<String>,
    /// Row sets produced by implicit result statements.
    pub implicit_results: Vec<Vec<DbRow>>,
    /// Rows fetched from an implicit cursor, when the statement opened one
    /// instead of returning rows inline.
    pub result_set: Option<Vec<DbRow>>,
    /// Warning reported alongside an otherwise-successful execution.
    pub warning: Option<String>,
}

impl ExecResult {
    /// Create a result set with preallocated row capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ExecResult {
        ExecResult {
            rows: Vec::with_capacity(capacity),
            ..ExecResult::default()
        }
    }

    /// Shared column names of `rows`, if any rows are present.
    #[must_use]
    pub fn column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.rows.first().map(|row| &row.column_names)
    }

    /// Append a row built from shared column names and values.
    pub fn add_row(&mut self, column_names: Arc<Vec<String>>, values: Vec<SqlValue>) {
        self.rows.push(DbRow::new(column_names, values));
    }
}
