//! Backing Source Module
//!
//! Caller-supplied collaborators behind the read-through and write-through
//! layers: a loader for misses and a store for writes and deletes.

use std::future::Future;

use async_trait::async_trait;

// == Loader ==
/// Fetches the authoritative value for a key on a cache miss.
///
/// Implemented for any `Fn(String) -> impl Future<Output = anyhow::Result<Vec<u8>>>`,
/// so a closure wrapping a database query can be passed directly.
#[async_trait]
pub trait Loader: Send + Sync + 'static {
    async fn load(&self, key: &str) -> anyhow::Result<Vec<u8>>;
}

#[async_trait]
impl<F, Fut> Loader for F
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Vec<u8>>> + Send + 'static,
{
    async fn load(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        (self)(key.to_owned()).await
    }
}

// == Backing Store ==
/// Durable store kept consistent by a write-through layer.
#[async_trait]
pub trait BackingStore: Send + Sync + 'static {
    async fn store(&self, key: &str, value: &[u8]) -> anyhow::Result<()>;

    async fn delete(&self, key: &str) -> anyhow::Result<()>;
}
