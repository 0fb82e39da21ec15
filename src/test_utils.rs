//! In-memory fake driver for integration tests.
//!
//! Not a storage engine: it understands just enough statement shapes to
//! exercise the pool and transaction machinery. `INSERT INTO <table>` stages
//! the bind map as a row, `SELECT ... FROM <table>` returns the table's
//! rows, `DELETE FROM <table>` clears it, anything else is a successful
//! no-op. Statements containing a configured failure marker fail at the
//! driver level. Writes executed with auto-commit off become visible only at
//! commit; rollback discards them.
//!
//! Every connection event is appended to a journal (`connect`, `exec:<sql>`,
//! `commit`, `rollback`, `close`) so tests can assert ordering, not just
//! counts.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::driver::{ConnectTarget, Driver, DriverConnection, DriverError, StatementOptions};
use crate::results::{ColumnInfo, ExecResult};
use crate::types::{BindParams, SqlValue};

type Row = BTreeMap<String, SqlValue>;

#[derive(Debug, Default)]
struct MemoryState {
    tables: HashMap<String, Vec<Row>>,
    journal: Vec<String>,
    connects: u64,
    open_connections: i64,
    commits: u64,
    rollbacks: u64,
    fail_markers: Vec<String>,
}

/// Scriptable in-memory driver; clone handles share state.
#[derive(Clone, Default)]
pub struct MemoryDriver {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Any statement whose text contains `marker` fails at the driver level.
    #[must_use]
    pub fn fail_matching(self, marker: impl Into<String>) -> Self {
        self.lock().fail_markers.push(marker.into());
        self
    }

    /// Committed row count of a table (zero if the table never existed).
    #[must_use]
    pub fn table_rows(&self, table: &str) -> usize {
        self.lock().tables.get(table).map_or(0, Vec::len)
    }

    #[must_use]
    pub fn connect_count(&self) -> u64 {
        self.lock().connects
    }

    #[must_use]
    pub fn open_connections(&self) -> i64 {
        self.lock().open_connections
    }

    #[must_use]
    pub fn commit_count(&self) -> u64 {
        self.lock().commits
    }

    #[must_use]
    pub fn rollback_count(&self) -> u64 {
        self.lock().rollbacks
    }

    /// Snapshot of the event journal.
    #[must_use]
    pub fn journal(&self) -> Vec<String> {
        self.lock().journal.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl std::fmt::Debug for MemoryDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDriver").finish_non_exhaustive()
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    async fn connect(
        &self,
        _target: &ConnectTarget,
    ) -> Result<Box<dyn DriverConnection>, DriverError> {
        let mut state = self.lock();
        state.connects += 1;
        state.open_connections += 1;
        state.journal.push("connect".to_string());
        Ok(Box::new(MemoryConnection {
            state: self.state.clone(),
            staged: Vec::new(),
            in_tx: false,
        }))
    }
}

enum StagedOp {
    Insert(String, Row),
    Delete(String),
}

struct MemoryConnection {
    state: Arc<Mutex<MemoryState>>,
    staged: Vec<StagedOp>,
    in_tx: bool,
}

impl MemoryConnection {
    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl DriverConnection for MemoryConnection {
    async fn execute(
        &mut self,
        sql: &str,
        params: &BindParams,
        opts: &StatementOptions,
    ) -> Result<ExecResult, DriverError> {
        if !opts.auto_commit {
            self.in_tx = true;
        }

        {
            let mut state = self.lock();
            state.journal.push(format!("exec:{sql}"));
            if state.fail_markers.iter().any(|m| sql.contains(m.as_str())) {
                return Err(DriverError::new(format!("simulated failure: {sql}")));
            }
        }

        match keyword(sql).as_deref() {
            Some("INSERT") => {
                let table = table_after(sql, "INTO")
                    .ok_or_else(|| DriverError::new(format!("no table in: {sql}")))?;
                let row: Row = params
                    .iter()
                    .map(|(k, v)| (k.clone(), clone_plain(v)))
                    .collect();
                let mut state = self.lock();
                let rowid = {
                    let existing = state.tables.get(&table).map_or(0, Vec::len);
                    format!("{table}/{}", existing + 1)
                };
                if opts.auto_commit {
                    state.tables.entry(table).or_default().push(row);
                } else {
                    drop(state);
                    self.staged.push(StagedOp::Insert(table, row));
                }
                Ok(ExecResult {
                    rows_affected: 1,
                    last_rowid: Some(rowid),
                    ..ExecResult::default()
                })
            }
            Some("SELECT") => {
                let table = table_after(sql, "FROM")
                    .ok_or_else(|| DriverError::new(format!("no table in: {sql}")))?;
                let state = self.lock();
                let committed = state.tables.get(&table).map(Vec::as_slice).unwrap_or(&[]);
                Ok(build_select_result(committed, &self.staged, &table))
            }
            Some("DELETE") => {
                let table = table_after(sql, "FROM")
                    .ok_or_else(|| DriverError::new(format!("no table in: {sql}")))?;
                if opts.auto_commit {
                    let mut state = self.lock();
                    let removed = state
                        .tables
                        .get_mut(&table)
                        .map_or(0, |rows| std::mem::take(rows).len());
                    Ok(ExecResult {
                        rows_affected: removed as u64,
                        ..ExecResult::default()
                    })
                } else {
                    let pending = self.lock().tables.get(&table).map_or(0, Vec::len);
                    self.staged.push(StagedOp::Delete(table));
                    Ok(ExecResult {
                        rows_affected: pending as u64,
                        ..ExecResult::default()
                    })
                }
            }
            // DDL and everything else: accepted, no effect.
            _ => Ok(ExecResult::default()),
        }
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        if !self.in_tx {
            return Ok(());
        }
        self.in_tx = false;
        let staged = std::mem::take(&mut self.staged);
        let mut state = self.lock();
        for op in staged {
            match op {
                StagedOp::Insert(table, row) => {
                    state.tables.entry(table).or_default().push(row);
                }
                StagedOp::Delete(table) => {
                    state.tables.remove(&table);
                }
            }
        }
        state.commits += 1;
        state.journal.push("commit".to_string());
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        if !self.in_tx {
            // Nothing open; recycling a clean connection lands here.
            return Ok(());
        }
        self.in_tx = false;
        self.staged.clear();
        let mut state = self.lock();
        state.rollbacks += 1;
        state.journal.push("rollback".to_string());
        Ok(())
    }

    async fn ping(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        let mut state = self.lock();
        state.open_connections -= 1;
        state.journal.push("close".to_string());
        Ok(())
    }
}

/// First keyword of the statement, uppercased.
fn keyword(sql: &str) -> Option<String> {
    sql.split_whitespace().next().map(str::to_uppercase)
}

/// Table name following `marker` (e.g. `INTO`, `FROM`), with any parenthesis
/// or trailing punctuation stripped.
fn table_after(sql: &str, marker: &str) -> Option<String> {
    let mut tokens = sql.split_whitespace();
    tokens
        .by_ref()
        .find(|t| t.eq_ignore_ascii_case(marker))?;
    let raw = tokens.next()?;
    let name: String = raw
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if name.is_empty() { None } else { Some(name) }
}

/// Copy a bind value into storage; undrained streams have no storable value.
fn clone_plain(value: &SqlValue) -> SqlValue {
    match value {
        SqlValue::Int(i) => SqlValue::Int(*i),
        SqlValue::Float(f) => SqlValue::Float(*f),
        SqlValue::Text(s) => SqlValue::Text(s.clone()),
        SqlValue::Bool(b) => SqlValue::Bool(*b),
        SqlValue::Timestamp(ts) => SqlValue::Timestamp(*ts),
        SqlValue::Json(j) => SqlValue::Json(j.clone()),
        SqlValue::Blob(b) => SqlValue::Blob(b.clone()),
        SqlValue::Null | SqlValue::Lob(_) => SqlValue::Null,
    }
}

fn build_select_result(committed: &[Row], staged: &[StagedOp], table: &str) -> ExecResult {
    // Read-your-writes: staged operations overlay the committed rows.
    let mut visible: Vec<&Row> = committed.iter().collect();
    for op in staged {
        match op {
            StagedOp::Delete(t) if t == table => visible.clear(),
            StagedOp::Insert(t, row) if t == table => visible.push(row),
            _ => {}
        }
    }

    let columns: BTreeSet<String> = visible
        .iter()
        .flat_map(|row| row.keys().map(|k| k.to_uppercase()))
        .collect();
    let column_names = Arc::new(columns.into_iter().collect::<Vec<_>>());

    let mut result = ExecResult::with_capacity(visible.len());
    result.meta_data = column_names
        .iter()
        .map(|name| ColumnInfo {
            name: name.clone(),
            db_type: None,
        })
        .collect();
    for row in visible {
        let values = column_names
            .iter()
            .map(|col| {
                row.iter()
                    .find(|(k, _)| k.to_uppercase() == *col)
                    .map_or(SqlValue::Null, |(_, v)| clone_plain(v))
            })
            .collect();
        result.add_row(column_names.clone(), values);
    }
    result
}
