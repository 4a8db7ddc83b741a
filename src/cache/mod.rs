//! Cache Module
//!
//! Defines the [`Cache`] contract shared by every layer, the base expiring
//! store, and the count- and memory-bounded decorators.

mod count_bounded;
mod entry;
mod expiring;
mod memory_bounded;
mod recency;
mod stats;

#[cfg(test)]
pub(crate) mod mock;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

// Re-export public types
pub use count_bounded::CountBoundedCache;
pub use entry::CacheEntry;
pub use expiring::ExpiringMapCache;
pub use memory_bounded::MemoryBoundedCache;
pub use recency::RecencyList;
pub use stats::CacheStats;

pub(crate) use expiring::StoreShared;

// == Public Constants ==
/// Expiration value meaning "never expires".
pub const NO_EXPIRATION: Duration = Duration::ZERO;

/// Listener invoked with the key and value of every entry leaving a store.
pub type EvictionCallback = Arc<dyn Fn(&str, &[u8]) + Send + Sync>;

// == Cache Contract ==
/// Capability implemented by the base store and by every decorator.
///
/// Decorators hold the layer they wrap and forward the operations they do
/// not change, so callers only ever talk to the outermost layer.
#[async_trait]
pub trait Cache: Send + Sync + 'static {
    /// Returns a copy of the value, or `KeyNotFound` if absent or expired.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Stores `value`, replacing any existing entry. A zero `expiration`
    /// means the entry never expires.
    async fn set(&self, key: &str, value: Vec<u8>, expiration: Duration) -> Result<()>;

    /// Removes the entry if present. Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Atomically reads and removes the entry.
    async fn load_and_delete(&self, key: &str) -> Result<Vec<u8>>;

    /// Registers a listener for entries leaving the store.
    ///
    /// Listeners compose: each registration adds to the ones before it and
    /// they run in registration order.
    fn on_evicted(&self, callback: EvictionCallback);
}

#[async_trait]
impl<C> Cache for Arc<C>
where
    C: Cache + ?Sized,
{
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, expiration: Duration) -> Result<()> {
        (**self).set(key, value, expiration).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key).await
    }

    async fn load_and_delete(&self, key: &str) -> Result<Vec<u8>> {
        (**self).load_and_delete(key).await
    }

    fn on_evicted(&self, callback: EvictionCallback) {
        (**self).on_evicted(callback)
    }
}
