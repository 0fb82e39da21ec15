use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

use crate::lob::LobHandle;

/// Named bind parameters for one statement.
///
/// Bind values are passed to the driver alongside the SQL text and are never
/// concatenated into it.
pub type BindParams = BTreeMap<String, SqlValue>;

/// Values that can appear in a database row or be bound to a query.
///
/// This enum provides a unified representation of database values across
/// drivers. `Lob` wraps a stream-typed column value that has not been
/// materialized yet; see [`crate::lob::resolve_lob_columns`].
#[derive(Debug)]
pub enum SqlValue {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    Json(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
    /// Stream-typed large-object value, not yet drained
    Lob(LobHandle),
}

impl SqlValue {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Check if this value is an undrained large object
    #[must_use]
    pub fn is_lob(&self) -> bool {
        matches!(self, Self::Lob(_))
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let SqlValue::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let SqlValue::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let SqlValue::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let SqlValue::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            // Try "YYYY-MM-DD HH:MM:SS"
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(dt);
            }
            // Try "YYYY-MM-DD HH:MM:SS.SSS"
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S.%3f") {
                return Some(dt);
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let SqlValue::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let SqlValue::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }
}

impl PartialEq for SqlValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            (Self::Null, Self::Null) => true,
            (Self::Json(a), Self::Json(b)) => a == b,
            (Self::Blob(a), Self::Blob(b)) => a == b,
            // An undrained stream has no comparable value.
            _ => false,
        }
    }
}

/// A SQL string and its named bind parameters bundled together.
///
/// The unit of work for the transaction sequencer; immutable once built.
#[derive(Debug)]
pub struct QueryAndParams {
    /// The SQL query string
    pub query: String,
    /// The named parameters to be bound to the query
    pub params: BindParams,
}

impl QueryAndParams {
    /// Create a new `QueryAndParams` with the given query string and parameters
    pub fn new(query: impl Into<String>, params: BindParams) -> Self {
        Self {
            query: query.into(),
            params,
        }
    }

    /// Create a new `QueryAndParams` with no parameters
    pub fn new_without_params(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            params: BindParams::new(),
        }
    }
}
