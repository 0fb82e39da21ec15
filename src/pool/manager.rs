use std::sync::Arc;
use std::time::Duration;

use deadpool::managed::{Manager, Metrics, RecycleError, RecycleResult};

use crate::driver::{ConnectTarget, Driver, DriverConnection, DriverError};

/// `deadpool` manager that opens and recycles driver connections for one
/// database target.
pub struct ConnManager {
    driver: Arc<dyn Driver>,
    target: ConnectTarget,
    ping_interval: Duration,
}

impl ConnManager {
    pub(crate) fn new(
        driver: Arc<dyn Driver>,
        target: ConnectTarget,
        ping_interval: Duration,
    ) -> Self {
        Self {
            driver,
            target,
            ping_interval,
        }
    }
}

impl std::fmt::Debug for ConnManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnManager")
            .field("target", &self.target.connect_string)
            .field("ping_interval", &self.ping_interval)
            .finish_non_exhaustive()
    }
}

impl Manager for ConnManager {
    type Type = Box<dyn DriverConnection>;
    type Error = DriverError;

    async fn create(&self) -> Result<Self::Type, Self::Error> {
        self.driver.connect(&self.target).await
    }

    async fn recycle(
        &self,
        conn: &mut Self::Type,
        metrics: &Metrics,
    ) -> RecycleResult<Self::Error> {
        // A connection handed back mid-transaction (e.g. a dropped handle)
        // must not leak its open state into the next operation.
        conn.rollback().await.map_err(RecycleError::Backend)?;

        if metrics.last_used() >= self.ping_interval {
            conn.ping().await.map_err(RecycleError::Backend)?;
        }
        Ok(())
    }
}
