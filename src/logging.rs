//! SQL logging gate and the bindings renderer.
//!
//! The renderer is a pure function producing a human-readable SQL string for
//! logs only; execution always hands SQL text and binds to the driver
//! separately.

use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};

use regex::{Captures, Regex};

use crate::config::ConduitSettings;
use crate::types::{BindParams, SqlValue};

/// Decides whether a given call may emit SQL to the log.
///
/// Three gates compose: the global enable toggle (mutable at runtime), the
/// environment name (only `dev*` environments log SQL), and the per-call
/// override.
#[derive(Debug)]
pub struct SqlLogGate {
    enabled: AtomicBool,
    env_is_dev: bool,
}

impl SqlLogGate {
    #[must_use]
    pub fn new(settings: &ConduitSettings) -> Self {
        Self {
            enabled: AtomicBool::new(settings.log_enable),
            env_is_dev: settings.environment.starts_with("dev"),
        }
    }

    /// Flip the global toggle at runtime.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Whether this call may log, given its per-call override.
    #[must_use]
    pub fn should_log(&self, per_call: Option<bool>) -> bool {
        per_call.unwrap_or(true) && self.enabled.load(Ordering::Relaxed) && self.env_is_dev
    }
}

static BIND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").expect("bind placeholder pattern is valid")
});

/// Render `:name` placeholders with their bound values for logging.
///
/// Placeholders without a matching bind are left as-is. The output is never
/// sent to the driver.
#[must_use]
pub fn render_bindings(sql: &str, params: &BindParams) -> String {
    if params.is_empty() {
        return sql.to_string();
    }
    BIND_RE
        .replace_all(sql, |caps: &Captures<'_>| match params.get(&caps[1]) {
            Some(value) => literal(value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

fn literal(value: &SqlValue) -> String {
    match value {
        SqlValue::Int(i) => i.to_string(),
        SqlValue::Float(f) => f.to_string(),
        SqlValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
        SqlValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        SqlValue::Timestamp(ts) => format!("'{}'", ts.format("%Y-%m-%d %H:%M:%S")),
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Json(j) => format!("'{}'", j.to_string().replace('\'', "''")),
        SqlValue::Blob(b) => format!("<blob {} bytes>", b.len()),
        SqlValue::Lob(_) => "<lob>".to_string(),
    }
}
