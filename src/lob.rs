//! Large-object (LOB) column materialization.
//!
//! Drivers return stream-typed column values as [`LobHandle`]s; ordinary
//! application code wants text. [`resolve_lob_columns`] drains the requested
//! columns of every row and hands back a result set with the streams replaced
//! by their text, releasing each underlying stream resource after draining.

use futures_util::future::try_join_all;
use futures_util::stream::{self, Stream, StreamExt};

use crate::driver::DriverError;
use crate::error::SqlConduitError;
use crate::results::ExecResult;
use crate::types::SqlValue;

type ChunkStream = Box<dyn Stream<Item = Result<String, DriverError>> + Send + Sync + Unpin>;
type ReleaseHook = Box<dyn FnOnce() + Send + Sync>;

/// A stream-typed column value: text chunks plus a hook that releases the
/// underlying driver resource.
///
/// The hook runs exactly once, after a successful [`drain`](Self::drain) or
/// on drop if the handle was never drained.
pub struct LobHandle {
    chunks: ChunkStream,
    release: Option<ReleaseHook>,
}

impl LobHandle {
    /// Wrap a driver-supplied chunk stream.
    pub fn from_stream<S>(chunks: S) -> Self
    where
        S: Stream<Item = Result<String, DriverError>> + Send + Sync + Unpin + 'static,
    {
        Self {
            chunks: Box::new(chunks),
            release: None,
        }
    }

    /// Build a handle from in-memory chunks. Intended for drivers that
    /// buffer, and for tests.
    #[must_use]
    pub fn from_chunks<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let items: Vec<Result<String, DriverError>> =
            chunks.into_iter().map(Ok).collect();
        Self {
            chunks: Box::new(stream::iter(items)),
            release: None,
        }
    }

    /// Attach a release hook for the underlying stream resource.
    #[must_use]
    pub fn on_release<F>(mut self, hook: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        self.release = Some(Box::new(hook));
        self
    }

    /// Drain the stream fully into text, then release the resource.
    ///
    /// # Errors
    /// Propagates the first [`DriverError`] yielded by the stream. The
    /// release hook still runs in that case (via drop).
    pub async fn drain(mut self) -> Result<String, DriverError> {
        let mut text = String::new();
        while let Some(chunk) = self.chunks.next().await {
            text.push_str(&chunk?);
        }
        if let Some(release) = self.release.take() {
            release();
        }
        Ok(text)
    }
}

impl std::fmt::Debug for LobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LobHandle").finish_non_exhaustive()
    }
}

impl Drop for LobHandle {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Replace stream-typed values in the named columns with their drained text.
///
/// Column names are matched case-insensitively (compared uppercased). Null
/// values stay null and already-materialized text passes through unchanged.
/// Rows resolve concurrently; each drain works on an independent stream.
///
/// The result is taken by value: on failure it is consumed and dropped, so a
/// partially-resolved result set is never published.
///
/// # Errors
/// Returns [`SqlConduitError::ColumnNotFound`] as soon as any requested
/// column is absent from the result set, aborting the whole operation, or an
/// [`SqlConduitError::Driver`] error if a stream fails while draining.
pub async fn resolve_lob_columns(
    mut result: ExecResult,
    columns: &[&str],
) -> Result<ExecResult, SqlConduitError> {
    if columns.is_empty() || result.rows.is_empty() {
        return Ok(result);
    }

    let wanted: Vec<String> = columns.iter().map(|c| c.to_uppercase()).collect();

    let rows = std::mem::take(&mut result.rows);
    let resolved = try_join_all(rows.into_iter().map(|mut row| {
        let wanted = wanted.clone();
        async move {
            for name in &wanted {
                let idx = row
                    .column_names
                    .iter()
                    .position(|col| col.to_uppercase() == *name)
                    .ok_or_else(|| SqlConduitError::ColumnNotFound(name.clone()))?;
                let slot = row
                    .values
                    .get_mut(idx)
                    .ok_or_else(|| SqlConduitError::ColumnNotFound(name.clone()))?;
                // Swap the cell out so the stream can be drained by value.
                let cell = std::mem::replace(slot, SqlValue::Null);
                *slot = match cell {
                    SqlValue::Lob(handle) => SqlValue::Text(handle.drain().await?),
                    other => other,
                };
            }
            Ok::<_, SqlConduitError>(row)
        }
    }))
    .await?;

    result.rows = resolved;
    Ok(result)
}
