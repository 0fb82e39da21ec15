use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::info;

use super::ExecPool;
use crate::config::{ClientMode, ConduitSettings, DEFAULT_POOL_ALIAS, PoolConfig};
use crate::driver::Driver;
use crate::error::SqlConduitError;
use crate::logging::SqlLogGate;
use crate::pool::PoolStats;

/// Explicitly-owned mapping from pool alias to live pool.
///
/// The registry is constructed once, handed to whatever component executes
/// SQL, and torn down with [`close_all`]. At most one live pool exists per
/// alias; re-initializing an alias after closing it is allowed.
///
/// [`close_all`]: PoolRegistry::close_all
pub struct PoolRegistry {
    driver: Arc<dyn Driver>,
    settings: ConduitSettings,
    gate: SqlLogGate,
    pools: Mutex<HashMap<String, Arc<ExecPool>>>,
}

impl PoolRegistry {
    /// Build a registry for the given driver and process settings.
    ///
    /// # Errors
    /// Returns [`SqlConduitError::PoolCreation`] when thick client mode is
    /// configured without a usable client library path. This check runs at
    /// process start and is fatal.
    pub fn new(
        driver: Arc<dyn Driver>,
        settings: ConduitSettings,
    ) -> Result<Self, SqlConduitError> {
        if settings.client_mode == ClientMode::Thick {
            let present = settings
                .client_lib_dir
                .as_ref()
                .is_some_and(|dir| dir.exists());
            if !present {
                return Err(SqlConduitError::PoolCreation(
                    "thick client mode requires CLIENT_LIB_DIR to point at the native \
                     client library"
                        .to_string(),
                ));
            }
        }
        let gate = SqlLogGate::new(&settings);
        Ok(Self {
            driver,
            settings,
            gate,
            pools: Mutex::new(HashMap::new()),
        })
    }

    /// Create and register a pool under its alias, establishing `pool_min`
    /// connections up front.
    ///
    /// # Errors
    /// Returns [`SqlConduitError::PoolCreation`] for invalid sizing, an alias
    /// already in use, or a failed warm-up connection.
    pub async fn initialize(&self, config: PoolConfig) -> Result<(), SqlConduitError> {
        let alias = config.alias.clone();
        info!(alias = %alias, "creating pool");

        let pool = Arc::new(ExecPool::new(self.driver.clone(), config)?);
        {
            let mut pools = self.lock_pools();
            if pools.contains_key(&alias) {
                return Err(SqlConduitError::PoolCreation(format!(
                    "pool alias '{alias}' already in use"
                )));
            }
            pools.insert(alias.clone(), pool.clone());
        }

        // Warm-up happens outside the lock; on failure the half-registered
        // pool must not stay visible.
        if let Err(err) = pool.warm_up().await {
            self.lock_pools().remove(&alias);
            return Err(err);
        }

        info!(alias = %alias, "pool created");
        Ok(())
    }

    /// Create the pool described by the process environment.
    ///
    /// # Errors
    /// Propagates configuration parse errors and [`initialize`] failures.
    ///
    /// [`initialize`]: PoolRegistry::initialize
    pub async fn initialize_from_env(&self) -> Result<(), SqlConduitError> {
        self.initialize(PoolConfig::from_env()?).await
    }

    /// Close one pool and unregister its alias.
    ///
    /// Active connections are drained for the configured grace period, then
    /// the pool force-closes.
    ///
    /// # Errors
    /// Returns [`SqlConduitError::Config`] when no pool is registered under
    /// the alias.
    pub async fn close(&self, alias: &str) -> Result<(), SqlConduitError> {
        let pool = self.lock_pools().remove(alias).ok_or_else(|| {
            SqlConduitError::Config(format!("no pool registered under alias '{alias}'"))
        })?;
        pool.close(self.settings.closing_grace).await;
        info!(alias = %alias, "pool closed");
        Ok(())
    }

    /// Close every registered pool.
    pub async fn close_all(&self) {
        let drained: Vec<(String, Arc<ExecPool>)> = self.lock_pools().drain().collect();
        for (alias, pool) in drained {
            pool.close(self.settings.closing_grace).await;
            info!(alias = %alias, "pool closed");
        }
    }

    /// Read-only statistics for a named (or the default) pool.
    ///
    /// # Errors
    /// Returns [`SqlConduitError::Acquire`] when the alias is not registered.
    pub fn stats(&self, alias: Option<&str>) -> Result<PoolStats, SqlConduitError> {
        Ok(self.pool(alias)?.stats())
    }

    /// Flip the global SQL logging toggle at runtime.
    pub fn set_log_enabled(&self, enabled: bool) {
        self.gate.set_enabled(enabled);
    }

    pub(crate) fn pool(&self, alias: Option<&str>) -> Result<Arc<ExecPool>, SqlConduitError> {
        let alias = alias.unwrap_or(DEFAULT_POOL_ALIAS);
        self.lock_pools().get(alias).cloned().ok_or_else(|| {
            SqlConduitError::Acquire(format!("no pool registered under alias '{alias}'"))
        })
    }

    pub(crate) fn log_gate(&self) -> &SqlLogGate {
        &self.gate
    }

    fn lock_pools(&self) -> MutexGuard<'_, HashMap<String, Arc<ExecPool>>> {
        match self.pools.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl std::fmt::Debug for PoolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let aliases: Vec<String> = self.lock_pools().keys().cloned().collect();
        f.debug_struct("PoolRegistry")
            .field("pools", &aliases)
            .finish_non_exhaustive()
    }
}
