//! Read-Through Cache Module
//!
//! On a miss, loads the value from a backing source and populates the
//! wrapped cache. Synchronous, semi-asynchronous and asynchronous variants.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, warn};

use crate::backing::Loader;
use crate::cache::{Cache, EvictionCallback};
use crate::config::Config;
use crate::error::{CacheError, Result};

// == Read-Through Cache ==
/// Fills misses from a [`Loader`], writing loaded values back with a fixed
/// expiration.
///
/// The [`Cache::get`] implementation is the synchronous variant: it waits for
/// both the load and the write-back and reports either failure.
pub struct ReadThroughCache<C, L> {
    inner: Arc<C>,
    loader: Arc<L>,
    expiration: Duration,
}

impl<C: Cache, L: Loader> ReadThroughCache<C, L> {
    // == Constructors ==
    pub fn new(inner: C, expiration: Duration, loader: L) -> Self {
        Self {
            inner: Arc::new(inner),
            loader: Arc::new(loader),
            expiration,
        }
    }

    /// Uses `config.expiration` for populated entries.
    pub fn from_config(inner: C, config: &Config, loader: L) -> Self {
        Self::new(inner, config.expiration, loader)
    }

    pub fn expiration(&self) -> Duration {
        self.expiration
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    // == Load And Refresh ==
    /// Loads `key` and writes the value back before returning it.
    ///
    /// A failed write-back is reported as `RefreshCacheFailed`; the caller
    /// must not assume the value was cached.
    pub(crate) async fn load_and_refresh(&self, key: &str) -> Result<Vec<u8>> {
        let value = self
            .loader
            .load(key)
            .await
            .map_err(|err| CacheError::load_failed(key, err))?;

        if let Err(err) = self.inner.set(key, value.clone(), self.expiration).await {
            return Err(CacheError::refresh_failed(key, err));
        }
        Ok(value)
    }

    // == Semi-Async Get ==
    /// Loads on a miss but writes the value back in a detached task.
    ///
    /// Returns the loaded value without waiting for the write-back. Load and
    /// write-back failures are logged; a failed load surfaces as the
    /// `KeyNotFound` of the initial lookup.
    pub async fn semi_async_get(&self, key: &str) -> Result<Vec<u8>> {
        match self.inner.get(key).await {
            Err(miss) if miss.is_not_found() => match self.loader.load(key).await {
                Ok(value) => {
                    self.spawn_refresh(key, value.clone());
                    Ok(value)
                }
                Err(err) => {
                    warn!(key, error = %err, "read-through load failed");
                    Err(miss)
                }
            },
            other => other,
        }
    }

    // == Async Get ==
    /// Returns the miss immediately and warms the cache in a detached task.
    ///
    /// The caller that triggered the load never receives the loaded value.
    pub async fn async_get(&self, key: &str) -> Result<Vec<u8>> {
        match self.inner.get(key).await {
            Err(miss) if miss.is_not_found() => {
                let inner = Arc::clone(&self.inner);
                let loader = Arc::clone(&self.loader);
                let expiration = self.expiration;
                let key = key.to_owned();

                tokio::spawn(async move {
                    match loader.load(&key).await {
                        Ok(value) => {
                            if let Err(err) = inner.set(&key, value, expiration).await {
                                error!(key = %key, error = %err, "background cache refresh failed");
                            }
                        }
                        Err(err) => warn!(key = %key, error = %err, "background load failed"),
                    }
                });
                Err(miss)
            }
            other => other,
        }
    }

    fn spawn_refresh(&self, key: &str, value: Vec<u8>) {
        let inner = Arc::clone(&self.inner);
        let expiration = self.expiration;
        let key = key.to_owned();

        tokio::spawn(async move {
            if let Err(err) = inner.set(&key, value, expiration).await {
                error!(key = %key, error = %err, "background cache refresh failed");
            }
        });
    }
}

#[async_trait]
impl<C: Cache, L: Loader> Cache for ReadThroughCache<C, L> {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        match self.inner.get(key).await {
            Err(miss) if miss.is_not_found() => self.load_and_refresh(key).await,
            other => other,
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, expiration: Duration) -> Result<()> {
        self.inner.set(key, value, expiration).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }

    async fn load_and_delete(&self, key: &str) -> Result<Vec<u8>> {
        self.inner.load_and_delete(key).await
    }

    fn on_evicted(&self, callback: EvictionCallback) {
        self.inner.on_evicted(callback);
    }
}
