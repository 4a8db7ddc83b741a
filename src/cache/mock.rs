//! Test double for the `Cache` contract, with failure injection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::cache::{Cache, EvictionCallback};
use crate::error::{CacheError, Result};

/// In-memory cache ignoring expirations.
#[derive(Default)]
pub(crate) struct MockCache {
    data: Mutex<HashMap<String, Vec<u8>>>,
    listeners: Mutex<Vec<EvictionCallback>>,
    fail_sets: AtomicBool,
    fail_deletes: AtomicBool,
    mute_evictions: AtomicBool,
    sets: AtomicUsize,
}

impl MockCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_data<'a>(data: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let cache = Self::new();
        cache.data.lock().extend(
            data.into_iter()
                .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec())),
        );
        cache
    }

    /// Makes every following `set` fail.
    pub(crate) fn fail_sets(&self, fail: bool) {
        self.fail_sets.store(fail, Ordering::SeqCst);
    }

    /// Makes every following `delete` and `load_and_delete` fail.
    pub(crate) fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Stops notifying listeners on removal.
    pub(crate) fn mute_evictions(&self, mute: bool) {
        self.mute_evictions.store(mute, Ordering::SeqCst);
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.data.lock().contains_key(key)
    }

    pub(crate) fn snapshot(&self) -> HashMap<String, Vec<u8>> {
        self.data.lock().clone()
    }

    /// Number of successful `set` calls.
    pub(crate) fn set_calls(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    fn check_delete(&self, key: &str) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(CacheError::delete_failed(key, anyhow::anyhow!("backend unavailable")));
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Option<Vec<u8>> {
        let value = self.data.lock().remove(key)?;
        if !self.mute_evictions.load(Ordering::SeqCst) {
            let listeners = self.listeners.lock().clone();
            for listener in &listeners {
                listener(key, &value);
            }
        }
        Some(value)
    }
}

#[async_trait]
impl Cache for MockCache {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.data
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| CacheError::not_found(key))
    }

    async fn set(&self, key: &str, value: Vec<u8>, _expiration: Duration) -> Result<()> {
        if self.fail_sets.load(Ordering::SeqCst) {
            return Err(CacheError::CapacityExceeded {
                key: key.to_string(),
                max: 0,
            });
        }
        self.data.lock().insert(key.to_string(), value);
        self.sets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check_delete(key)?;
        self.remove(key);
        Ok(())
    }

    async fn load_and_delete(&self, key: &str) -> Result<Vec<u8>> {
        self.check_delete(key)?;
        self.remove(key).ok_or_else(|| CacheError::not_found(key))
    }

    fn on_evicted(&self, callback: EvictionCallback) {
        self.listeners.lock().push(callback);
    }
}
