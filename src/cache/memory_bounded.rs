//! Memory-Bounded Cache Module
//!
//! Decorator keeping the total size of stored values under a byte budget by
//! evicting the least recently touched keys.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::cache::{Cache, EvictionCallback, RecencyList};
use crate::config::Config;
use crate::error::{CacheError, Result};

// == Ledger ==
/// Byte accounting and recency order for the keys this layer admitted.
#[derive(Debug, Default)]
struct Ledger {
    used: usize,
    sizes: HashMap<String, usize>,
    keys: RecencyList,
}

impl Ledger {
    fn admit(&mut self, key: &str, size: usize) {
        if let Some(previous) = self.sizes.insert(key.to_owned(), size) {
            self.used -= previous;
            self.keys.remove(key);
        }
        self.used += size;
        self.keys.append(key);
    }

    /// Drops `key` from the books. Keys never admitted are ignored.
    fn forget(&mut self, key: &str) -> bool {
        match self.sizes.remove(key) {
            Some(size) => {
                self.used -= size;
                self.keys.remove(key);
                true
            }
            None => false,
        }
    }

    fn touch(&mut self, key: &str) {
        if self.sizes.contains_key(key) {
            self.keys.touch(key);
        }
    }
}

// == Memory-Bounded Cache ==
/// Evicts least recently touched entries to stay within `max` bytes.
///
/// `used` and the recency order are updated only from the wrapped cache's
/// eviction notifications (plus admission on `set`), so explicit deletes,
/// expiry and sweeps below this layer are all accounted for the same way.
pub struct MemoryBoundedCache<C> {
    inner: C,
    max: usize,
    ledger: Arc<Mutex<Ledger>>,
    // Serializes operations; the ledger lock is never held across an await
    op_lock: tokio::sync::Mutex<()>,
}

impl<C: Cache> MemoryBoundedCache<C> {
    // == Constructor ==
    /// Wraps `inner` with a budget of `max` bytes.
    pub fn new(inner: C, max: usize) -> Self {
        let ledger = Arc::new(Mutex::new(Ledger::default()));

        let books = Arc::clone(&ledger);
        inner.on_evicted(Arc::new(move |key: &str, _: &[u8]| {
            // May run from a sweep with no operation in flight, so it takes
            // the ledger lock itself
            books.lock().forget(key);
        }));

        Self {
            inner,
            max,
            ledger,
            op_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Wraps `inner` using `config.max_bytes`.
    pub fn from_config(inner: C, config: &Config) -> Self {
        Self::new(inner, config.max_bytes)
    }

    // == Accessors ==
    /// Total bytes of the values currently tracked.
    pub fn used(&self) -> usize {
        self.ledger.lock().used
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Tracked keys, least recently touched first.
    pub fn keys(&self) -> Vec<String> {
        self.ledger.lock().keys.to_vec()
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Evicts oldest keys until `incoming` more bytes fit in the budget.
    async fn make_room(&self, key: &str, incoming: usize) -> Result<()> {
        loop {
            let victim = {
                let ledger = self.ledger.lock();
                if ledger.used + incoming <= self.max {
                    return Ok(());
                }
                match ledger.keys.oldest() {
                    Some(victim) => victim.to_owned(),
                    None => {
                        return Err(CacheError::EvictionExhausted {
                            key: key.to_owned(),
                            size: incoming,
                            budget: self.max,
                        })
                    }
                }
            };

            debug!(victim = %victim, incoming, "evicting to fit memory budget");
            self.inner.delete(&victim).await?;

            // Wrapped caches that do not report deletes leave the victim on the books
            if self.ledger.lock().forget(&victim) {
                warn!(victim = %victim, "evicted key was not reported by the wrapped cache");
            }
        }
    }
}

#[async_trait]
impl<C: Cache> Cache for MemoryBoundedCache<C> {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let _guard = self.op_lock.lock().await;
        let value = self.inner.get(key).await?;
        self.ledger.lock().touch(key);
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, expiration: Duration) -> Result<()> {
        let _guard = self.op_lock.lock().await;

        // Drop the old entry first so the key re-enters at the tail
        match self.inner.load_and_delete(key).await {
            Err(err) if !err.is_not_found() => return Err(err),
            _ => {}
        }

        let size = value.len();
        self.make_room(key, size).await?;

        // Admit before the write so a sweep racing the write finds it
        self.ledger.lock().admit(key, size);
        if let Err(err) = self.inner.set(key, value, expiration).await {
            self.ledger.lock().forget(key);
            return Err(err);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        self.inner.delete(key).await
    }

    async fn load_and_delete(&self, key: &str) -> Result<Vec<u8>> {
        let _guard = self.op_lock.lock().await;
        self.inner.load_and_delete(key).await
    }

    fn on_evicted(&self, callback: EvictionCallback) {
        // Our own listener was registered first and runs before this one
        self.inner.on_evicted(callback);
    }
}
