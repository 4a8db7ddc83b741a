//! Write-Through Cache Module
//!
//! Keeps a durable store in step with the cache on every write.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::error;

use crate::backing::BackingStore;
use crate::cache::{Cache, EvictionCallback};
use crate::error::{CacheError, Result};

// == Write-Through Cache ==
/// Writes to a [`BackingStore`] alongside the wrapped cache.
///
/// [`Cache::set`] writes the store first and only then the cache, so a
/// store failure leaves the cache untouched. Deletes go to the store first
/// as well.
pub struct WriteThroughCache<C, S> {
    inner: Arc<C>,
    store: Arc<S>,
}

impl<C: Cache, S: BackingStore> WriteThroughCache<C, S> {
    pub fn new(inner: C, store: S) -> Self {
        Self {
            inner: Arc::new(inner),
            store: Arc::new(store),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn write_store(&self, key: &str, value: &[u8]) -> Result<()> {
        self.store
            .store(key, value)
            .await
            .map_err(|err| CacheError::store_failed(key, err))
    }

    /// Writes the cache first, then the store.
    ///
    /// A cache failure skips the store. A store failure is returned but the
    /// cache keeps the new value.
    pub async fn set_cache_first(&self, key: &str, value: Vec<u8>, expiration: Duration) -> Result<()> {
        self.inner.set(key, value.clone(), expiration).await?;
        self.write_store(key, &value).await
    }

    // == Semi-Async Set ==
    /// Waits for the store write, then updates the cache in a detached task.
    ///
    /// Cache failures are logged, not returned.
    pub async fn semi_async_set(&self, key: &str, value: Vec<u8>, expiration: Duration) -> Result<()> {
        self.write_store(key, &value).await?;

        let inner = Arc::clone(&self.inner);
        let key = key.to_owned();
        tokio::spawn(async move {
            if let Err(err) = inner.set(&key, value, expiration).await {
                error!(key = %key, error = %err, "background cache write failed");
            }
        });
        Ok(())
    }

    // == Async Set ==
    /// Returns immediately; the store write and then the cache write run in
    /// a detached task.
    ///
    /// The cache is only written if the store accepted the value. Failures
    /// are logged, never returned.
    pub async fn async_set(&self, key: &str, value: Vec<u8>, expiration: Duration) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        let store = Arc::clone(&self.store);
        let key = key.to_owned();

        tokio::spawn(async move {
            if let Err(err) = store.store(&key, &value).await {
                error!(key = %key, error = %err, "background store write failed");
                return;
            }
            if let Err(err) = inner.set(&key, value, expiration).await {
                error!(key = %key, error = %err, "background cache write failed");
            }
        });
        Ok(())
    }

    async fn delete_store(&self, key: &str) -> Result<()> {
        self.store
            .delete(key)
            .await
            .map_err(|err| CacheError::delete_failed(key, err))
    }
}

#[async_trait]
impl<C: Cache, S: BackingStore> Cache for WriteThroughCache<C, S> {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, expiration: Duration) -> Result<()> {
        self.write_store(key, &value).await?;
        self.inner.set(key, value, expiration).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.delete_store(key).await?;
        self.inner.delete(key).await
    }

    async fn load_and_delete(&self, key: &str) -> Result<Vec<u8>> {
        self.delete_store(key).await?;
        self.inner.load_and_delete(key).await
    }

    fn on_evicted(&self, callback: EvictionCallback) {
        self.inner.on_evicted(callback);
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::mock::MockCache;
    use crate::error::ErrorKind;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::time::sleep;

    #[derive(Default)]
    struct MockStore {
        data: Mutex<HashMap<String, Vec<u8>>>,
        fail: AtomicBool,
        calls: AtomicUsize,
    }

    impl MockStore {
        fn failing() -> Self {
            let store = Self::default();
            store.fail.store(true, Ordering::SeqCst);
            store
        }

        fn value(&self, key: &str) -> Option<Vec<u8>> {
            self.data.lock().get(key).cloned()
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BackingStore for MockStore {
        async fn store(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("disk full");
            }
            self.data.lock().insert(key.to_owned(), value.to_vec());
            Ok(())
        }

        async fn delete(&self, key: &str) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("connection reset");
            }
            self.data.lock().remove(key);
            Ok(())
        }
    }

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_set_writes_store_and_cache() {
        let cache = WriteThroughCache::new(MockCache::new(), MockStore::default());

        cache.set("k1", b"v1".to_vec(), TTL).await.unwrap();

        assert_eq!(cache.store().value("k1"), Some(b"v1".to_vec()));
        assert_eq!(cache.get("k1").await.unwrap(), b"v1");
    }

    #[tokio::test]
    async fn test_store_failure_leaves_cache_unchanged() {
        let cache = WriteThroughCache::new(MockCache::with_data([("k1", "old")]), MockStore::failing());

        let err = cache.set("k1", b"new".to_vec(), TTL).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StoreFailed);
        assert_eq!(err.key(), "k1");
        assert_eq!(cache.get("k1").await.unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_cache_failure_after_store_write() {
        let mock = MockCache::new();
        mock.fail_sets(true);
        let cache = WriteThroughCache::new(mock, MockStore::default());

        let err = cache.set("k1", b"v1".to_vec(), TTL).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::CapacityExceeded);
        assert_eq!(cache.store().value("k1"), Some(b"v1".to_vec()));
    }

    #[tokio::test]
    async fn test_cache_first_skips_store_on_cache_failure() {
        let mock = MockCache::new();
        mock.fail_sets(true);
        let cache = WriteThroughCache::new(mock, MockStore::default());

        assert!(cache.set_cache_first("k1", b"v1".to_vec(), TTL).await.is_err());
        assert_eq!(cache.store().calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_first_keeps_value_on_store_failure() {
        let cache = WriteThroughCache::new(MockCache::new(), MockStore::failing());

        let err = cache.set_cache_first("k1", b"v1".to_vec(), TTL).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StoreFailed);
        assert_eq!(cache.get("k1").await.unwrap(), b"v1");
    }

    #[tokio::test]
    async fn test_semi_async_set() {
        let cache = WriteThroughCache::new(MockCache::new(), MockStore::default());

        cache.semi_async_set("k1", b"v1".to_vec(), TTL).await.unwrap();
        assert_eq!(cache.store().value("k1"), Some(b"v1".to_vec()));

        sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.get("k1").await.unwrap(), b"v1");
    }

    #[tokio::test]
    async fn test_semi_async_store_failure() {
        let cache = WriteThroughCache::new(MockCache::new(), MockStore::failing());

        let err = cache.semi_async_set("k1", b"v1".to_vec(), TTL).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreFailed);

        sleep(Duration::from_millis(50)).await;
        assert!(cache.inner().snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_semi_async_hides_cache_failure() {
        let mock = MockCache::new();
        mock.fail_sets(true);
        let cache = WriteThroughCache::new(mock, MockStore::default());

        cache.semi_async_set("k1", b"v1".to_vec(), TTL).await.unwrap();

        sleep(Duration::from_millis(50)).await;
        assert!(!cache.inner().contains("k1"));
    }

    #[tokio::test]
    async fn test_async_set_writes_in_background() {
        let cache = WriteThroughCache::new(MockCache::new(), MockStore::default());

        cache.async_set("k1", b"v1".to_vec(), TTL).await.unwrap();

        sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.store().value("k1"), Some(b"v1".to_vec()));
        assert_eq!(cache.get("k1").await.unwrap(), b"v1");
    }

    #[tokio::test]
    async fn test_async_set_store_failure_skips_cache() {
        let cache = WriteThroughCache::new(MockCache::new(), MockStore::failing());

        cache.async_set("k1", b"v1".to_vec(), TTL).await.unwrap();

        sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.store().calls(), 1);
        assert!(cache.inner().snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_delete_goes_through_store() {
        let cache = WriteThroughCache::new(MockCache::new(), MockStore::default());
        cache.set("k1", b"v1".to_vec(), TTL).await.unwrap();

        cache.delete("k1").await.unwrap();

        assert_eq!(cache.store().value("k1"), None);
        assert!(cache.get("k1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_failure_keeps_cache_entry() {
        let cache = WriteThroughCache::new(MockCache::with_data([("k1", "v1")]), MockStore::failing());

        let err = cache.delete("k1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeleteFailed);

        let err = cache.load_and_delete("k1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeleteFailed);

        assert_eq!(cache.get("k1").await.unwrap(), b"v1");
    }

    #[tokio::test]
    async fn test_load_and_delete_returns_cached_value() {
        let cache = WriteThroughCache::new(MockCache::new(), MockStore::default());
        cache.set("k1", b"v1".to_vec(), TTL).await.unwrap();

        assert_eq!(cache.load_and_delete("k1").await.unwrap(), b"v1");
        assert_eq!(cache.store().value("k1"), None);
    }
}
