//! Count-Bounded Cache Module
//!
//! Decorator capping the number of live entries in a base store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::cache::{Cache, EvictionCallback, ExpiringMapCache};
use crate::config::Config;
use crate::error::{CacheError, Result};

// == Count-Bounded Cache ==
/// Rejects new keys once `max` entries are live.
///
/// Wraps the base store directly and performs its check-then-insert under
/// the store's own write lock. The counter is decremented by an eviction
/// listener, so expiry, sweeps and deletes all free a slot.
pub struct CountBoundedCache {
    base: ExpiringMapCache,
    max: usize,
    count: Arc<AtomicUsize>,
}

impl CountBoundedCache {
    // == Constructor ==
    /// Wraps `base`, allowing at most `max` live entries.
    ///
    /// Entries already in `base` count against the limit. The count is
    /// seeded and the listener registered under the base write lock, so a
    /// running sweeper cannot remove an entry in between.
    pub async fn new(base: ExpiringMapCache, max: usize) -> Self {
        let shared = base.shared();
        let entries = shared.entries.write().await;
        let count = Arc::new(AtomicUsize::new(entries.len()));

        let counter = Arc::clone(&count);
        shared.add_listener(Arc::new(move |_: &str, _: &[u8]| {
            // Listeners run under the base write lock, same as increments
            let _ = counter.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(1))
            });
        }));
        drop(entries);

        Self { base, max, count }
    }

    /// Wraps `base` using `config.max_entries`.
    pub async fn from_config(base: ExpiringMapCache, config: &Config) -> Self {
        Self::new(base, config.max_entries).await
    }

    // == Accessors ==
    /// Number of live entries as tracked by the counter.
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn base(&self) -> &ExpiringMapCache {
        &self.base
    }

    /// Stops the base store's sweeper.
    pub fn close(&self) {
        self.base.close();
    }
}

#[async_trait]
impl Cache for CountBoundedCache {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.base.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, expiration: Duration) -> Result<()> {
        let shared = self.base.shared();
        let mut entries = shared.entries.write().await;

        // Overwrites keep their slot
        if !entries.contains_key(key) {
            if self.count.load(Ordering::Acquire) >= self.max {
                return Err(CacheError::CapacityExceeded {
                    key: key.to_owned(),
                    max: self.max,
                });
            }
            self.count.fetch_add(1, Ordering::AcqRel);
        }

        shared.insert_locked(&mut entries, key, value, expiration);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.base.delete(key).await
    }

    async fn load_and_delete(&self, key: &str) -> Result<Vec<u8>> {
        self.base.load_and_delete(key).await
    }

    fn on_evicted(&self, callback: EvictionCallback) {
        self.base.on_evicted(callback);
    }
}
