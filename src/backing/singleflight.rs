//! Singleflight Module
//!
//! Per-key call deduplication, and a read-through cache that uses it so a
//! burst of misses for one key triggers a single load.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::backing::{Loader, ReadThroughCache};
use crate::cache::{Cache, EvictionCallback};
use crate::config::Config;
use crate::error::Result;

// == Singleflight Group ==
/// Collapses concurrent calls for the same key into one execution.
///
/// The first caller for a key becomes the leader and runs the work; callers
/// arriving while it runs wait and receive a clone of its result. Once the
/// leader finishes, the key is free and the next call starts fresh work.
/// If the leader is dropped mid-flight, one of the waiters takes over.
pub struct SingleflightGroup<T> {
    calls: Mutex<HashMap<String, watch::Receiver<Option<T>>>>,
}

impl<T> Default for SingleflightGroup<T> {
    fn default() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone> SingleflightGroup<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with work currently running.
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }

    /// Runs `work` for `key` unless a call for `key` is already running, in
    /// which case its result is shared.
    pub async fn work<F, Fut>(&self, key: &str, work: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let sender = loop {
            let mut waiter = {
                let mut calls = self.calls.lock();
                match calls.get(key) {
                    Some(rx) => rx.clone(),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        calls.insert(key.to_owned(), rx);
                        break tx;
                    }
                }
            };

            match waiter.wait_for(Option::is_some).await {
                Ok(outcome) => {
                    if let Some(result) = &*outcome {
                        return result.clone();
                    }
                }
                // Leader dropped without a result; contend for the key again
                Err(_) => continue,
            };
        };

        let slot = InFlightSlot {
            calls: &self.calls,
            key,
            sender,
        };
        let result = work().await;
        slot.sender.send_replace(Some(result.clone()));
        result
    }
}

/// Frees the key when the leader finishes or is dropped.
///
/// The entry is removed before the sender closes, so a waiter woken by a
/// dropped leader always finds the key free.
struct InFlightSlot<'a, T> {
    calls: &'a Mutex<HashMap<String, watch::Receiver<Option<T>>>>,
    key: &'a str,
    sender: watch::Sender<Option<T>>,
}

impl<T> Drop for InFlightSlot<'_, T> {
    fn drop(&mut self) {
        self.calls.lock().remove(self.key);
    }
}

// == Singleflight Read-Through Cache ==
/// Read-through cache whose misses are deduplicated per key.
///
/// All concurrent misses for a key share one load and one write-back, and
/// observe the same outcome.
pub struct SingleflightReadThroughCache<C, L> {
    read_through: ReadThroughCache<C, L>,
    group: SingleflightGroup<Result<Vec<u8>>>,
}

impl<C: Cache, L: Loader> SingleflightReadThroughCache<C, L> {
    pub fn new(inner: C, expiration: Duration, loader: L) -> Self {
        Self::from_read_through(ReadThroughCache::new(inner, expiration, loader))
    }

    pub fn from_config(inner: C, config: &Config, loader: L) -> Self {
        Self::new(inner, config.expiration, loader)
    }

    pub fn from_read_through(read_through: ReadThroughCache<C, L>) -> Self {
        Self {
            read_through,
            group: SingleflightGroup::new(),
        }
    }

    pub fn inner(&self) -> &C {
        self.read_through.inner()
    }

    pub fn expiration(&self) -> Duration {
        self.read_through.expiration()
    }

    /// Keys with a load currently running.
    pub fn loads_in_flight(&self) -> usize {
        self.group.in_flight()
    }
}

#[async_trait]
impl<C: Cache, L: Loader> Cache for SingleflightReadThroughCache<C, L> {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        match self.inner().get(key).await {
            Err(miss) if miss.is_not_found() => {
                self.group
                    .work(key, || async {
                        // A previous leader may have refreshed the key already
                        match self.inner().get(key).await {
                            Err(miss) if miss.is_not_found() => {
                                self.read_through.load_and_refresh(key).await
                            }
                            other => other,
                        }
                    })
                    .await
            }
            other => other,
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, expiration: Duration) -> Result<()> {
        self.read_through.set(key, value, expiration).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.read_through.delete(key).await
    }

    async fn load_and_delete(&self, key: &str) -> Result<Vec<u8>> {
        self.read_through.load_and_delete(key).await
    }

    fn on_evicted(&self, callback: EvictionCallback) {
        self.read_through.on_evicted(callback);
    }
}
