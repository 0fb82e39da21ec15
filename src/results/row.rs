use std::collections::HashMap;
use std::sync::Arc;

use crate::types::SqlValue;

/// A row from a database query result.
///
/// Column names are shared across all rows of a result set; an index cache
/// avoids repeated string comparisons on lookup.
#[derive(Debug)]
pub struct DbRow {
    /// The column names for this row (shared across all rows in a result set)
    pub column_names: Arc<Vec<String>>,
    /// The values for this row
    pub values: Vec<SqlValue>,
    #[doc(hidden)]
    column_index_cache: Arc<HashMap<String, usize>>,
}

impl DbRow {
    /// Create a new database row sharing `column_names` with its result set.
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, values: Vec<SqlValue>) -> Self {
        let cache = Arc::new(
            column_names
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), i))
                .collect::<HashMap<_, _>>(),
        );

        Self {
            column_names,
            values,
            column_index_cache: cache,
        }
    }

    /// Get the index of a column by name, or None if not found.
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        if let Some(&idx) = self.column_index_cache.get(column_name) {
            return Some(idx);
        }

        // Fall back to linear search
        self.column_names.iter().position(|col| col == column_name)
    }

    /// Get a value from the row by column name.
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&SqlValue> {
        self.get_column_index(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value from the row by column index.
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name_and_index() {
        let row = DbRow::new(
            Arc::new(vec!["ID".to_string(), "NAME".to_string()]),
            vec![SqlValue::Int(7), SqlValue::Text("alice".into())],
        );
        assert_eq!(row.get("ID").unwrap().as_int(), Some(&7));
        assert_eq!(row.get_by_index(1).unwrap().as_text(), Some("alice"));
        assert!(row.get("MISSING").is_none());
    }
}
