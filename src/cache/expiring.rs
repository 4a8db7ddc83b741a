//! Expiring Map Cache Module
//!
//! Base store: a HashMap guarded by a reader/writer lock, with lazy expiry on
//! read and a periodic background sweep.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::stats::StatsRecorder;
use crate::cache::{Cache, CacheEntry, CacheStats, EvictionCallback};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_sweep_task, SweepHandle};

pub(crate) type EntryMap = HashMap<String, CacheEntry>;

// == Shared Store State ==
/// State shared between the store handle, the sweeper, and the
/// count-bounded layer.
///
/// Every `*_locked` method expects the caller to hold the `entries` write
/// guard, which is how the count bound makes check-then-insert atomic.
pub(crate) struct StoreShared {
    pub(crate) entries: RwLock<EntryMap>,
    listeners: Mutex<Vec<EvictionCallback>>,
    sweep_cursor: AtomicUsize,
    pub(crate) stats: StatsRecorder,
}

impl StoreShared {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::with_capacity(capacity)),
            listeners: Mutex::new(Vec::new()),
            sweep_cursor: AtomicUsize::new(0),
            stats: StatsRecorder::default(),
        }
    }

    pub(crate) fn add_listener(&self, callback: EvictionCallback) {
        self.listeners.lock().push(callback);
    }

    fn notify(&self, key: &str, value: &[u8]) {
        // Snapshot so a listener may register another listener
        let listeners = self.listeners.lock().clone();
        for listener in &listeners {
            listener(key, value);
        }
    }

    pub(crate) fn insert_locked(
        &self,
        entries: &mut EntryMap,
        key: &str,
        value: Vec<u8>,
        expiration: Duration,
    ) {
        entries.insert(key.to_owned(), CacheEntry::new(value, expiration));
    }

    /// Removes `key` and notifies every listener exactly once.
    pub(crate) fn remove_locked(&self, entries: &mut EntryMap, key: &str) -> Option<CacheEntry> {
        let entry = entries.remove(key)?;
        self.notify(key, &entry.value);
        Some(entry)
    }

    /// Inspects at most `batch` entries, starting where the previous sweep
    /// stopped, and removes the expired ones.
    ///
    /// Returns the number of entries removed.
    pub(crate) fn sweep_locked(&self, entries: &mut EntryMap, batch: usize) -> usize {
        let total = entries.len();
        let mut start = self.sweep_cursor.load(Ordering::Relaxed);
        if start >= total {
            start = 0;
        }

        let now = Instant::now();
        let inspected = batch.min(total - start);
        let expired: Vec<String> = entries
            .iter()
            .skip(start)
            .take(inspected)
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove_locked(entries, key);
        }

        let next = start + inspected - expired.len();
        let next = if next >= entries.len() { 0 } else { next };
        self.sweep_cursor.store(next, Ordering::Relaxed);

        self.stats.record_expirations(expired.len());
        expired.len()
    }
}

// == Expiring Map Cache ==
/// Base key-value store with per-entry deadlines.
///
/// Expired entries are removed lazily when read and proactively by a
/// background sweeper that runs every `sweep_interval` until [`close`] is
/// called or the cache is dropped.
///
/// [`close`]: ExpiringMapCache::close
pub struct ExpiringMapCache {
    shared: Arc<StoreShared>,
    sweeper: SweepHandle,
}

impl ExpiringMapCache {
    // == Constructors ==
    /// Creates a store with the default configuration (hourly sweep).
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime, which hosts the sweeper.
    pub fn new() -> Self {
        Self::from_config(&Config::default())
    }

    /// Creates a store sweeping every `interval`. A zero interval disables
    /// the background sweep and leaves lazy expiry only.
    pub fn with_sweep_interval(interval: Duration) -> Self {
        Self::from_config(&Config {
            sweep_interval: interval,
            ..Config::default()
        })
    }

    /// Creates a store from `sweep_interval`, `sweep_batch_size` and
    /// `initial_capacity`.
    pub fn from_config(config: &Config) -> Self {
        let shared = Arc::new(StoreShared::with_capacity(config.initial_capacity));
        let sweeper = spawn_sweep_task(
            Arc::clone(&shared),
            config.sweep_interval,
            config.sweep_batch_size,
        );

        Self { shared, sweeper }
    }

    pub(crate) fn shared(&self) -> &StoreShared {
        &self.shared
    }

    // == Inspection ==
    /// Number of stored entries, including expired ones not yet removed.
    pub async fn len(&self) -> usize {
        self.shared.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.shared.entries.read().await.is_empty()
    }

    /// Keys of all unexpired entries, in no particular order.
    pub async fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        self.shared
            .entries
            .read()
            .await
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub async fn stats(&self) -> CacheStats {
        let total = self.len().await;
        self.shared.stats.snapshot(total)
    }

    // == Purge Expired ==
    /// Removes every expired entry now, without the per-tick cap.
    ///
    /// Returns the number of entries removed.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.shared.entries.write().await;
        self.shared.sweep_locked(&mut entries, usize::MAX)
    }

    // == Shutdown ==
    /// Stops the background sweeper. Idempotent.
    ///
    /// A sweep already in progress completes; no further sweep starts.
    pub fn close(&self) {
        self.sweeper.shutdown();
    }

    pub fn is_closed(&self) -> bool {
        self.sweeper.is_shutdown()
    }
}

impl Default for ExpiringMapCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for ExpiringMapCache {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        {
            let entries = self.shared.entries.read().await;
            match entries.get(key) {
                None => {
                    self.shared.stats.record_miss();
                    return Err(CacheError::not_found(key));
                }
                Some(entry) if !entry.is_expired() => {
                    self.shared.stats.record_hit();
                    return Ok(entry.value.clone());
                }
                Some(_) => {}
            }
        }

        // Expired under the read lock: escalate and re-check, another task
        // may have removed or replaced the entry in between
        let mut entries = self.shared.entries.write().await;
        match entries.get(key) {
            None => {
                self.shared.stats.record_miss();
                Err(CacheError::not_found(key))
            }
            Some(entry) if !entry.is_expired() => {
                self.shared.stats.record_hit();
                Ok(entry.value.clone())
            }
            Some(_) => {
                self.shared.remove_locked(&mut entries, key);
                self.shared.stats.record_expirations(1);
                self.shared.stats.record_miss();
                debug!(key, "lazily expired cache entry");
                Err(CacheError::not_found(key))
            }
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, expiration: Duration) -> Result<()> {
        let mut entries = self.shared.entries.write().await;
        self.shared.insert_locked(&mut entries, key, value, expiration);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.shared.entries.write().await;
        if self.shared.remove_locked(&mut entries, key).is_some() {
            self.shared.stats.record_removal();
        }
        Ok(())
    }

    async fn load_and_delete(&self, key: &str) -> Result<Vec<u8>> {
        let mut entries = self.shared.entries.write().await;
        match self.shared.remove_locked(&mut entries, key) {
            Some(entry) if entry.is_expired() => {
                self.shared.stats.record_expirations(1);
                Err(CacheError::not_found(key))
            }
            Some(entry) => {
                self.shared.stats.record_removal();
                Ok(entry.value)
            }
            None => Err(CacheError::not_found(key)),
        }
    }

    fn on_evicted(&self, callback: EvictionCallback) {
        self.shared.add_listener(callback);
    }
}
