//! Cache Stack - Composable in-process caching
//!
//! An expiring key-value store with a background sweeper, plus decorators
//! that bound it by entry count or value bytes and connect it to a backing
//! data source through read-through and write-through layers.

pub mod backing;
pub mod cache;
pub mod config;
pub mod error;
mod tasks;

pub use backing::{
    BackingStore, Loader, ReadThroughCache, SingleflightGroup, SingleflightReadThroughCache,
    WriteThroughCache,
};
pub use cache::{
    Cache, CacheStats, CountBoundedCache, EvictionCallback, ExpiringMapCache, MemoryBoundedCache,
    NO_EXPIRATION,
};
pub use config::Config;
pub use error::{CacheError, ErrorKind, Result};
