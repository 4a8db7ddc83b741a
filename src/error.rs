//! Error types for the cache layers
//!
//! Provides unified error handling using thiserror. Every error carries the
//! offending key so callers compare by [`ErrorKind`] instead of by identity.

use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

/// Opaque error raised by a caller-supplied loader or backing store.
pub type SourceError = Arc<dyn StdError + Send + Sync + 'static>;

// == Error Kind ==
/// Discriminant of a [`CacheError`], used for comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    KeyNotFound,
    CapacityExceeded,
    EvictionExhausted,
    RefreshCacheFailed,
    LoadFailed,
    StoreFailed,
    DeleteFailed,
}

// == Cache Error Enum ==
/// Unified error type for every cache layer.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Key is absent or its entry has expired
    #[error("cache: key not found, key: {key}")]
    KeyNotFound { key: String },

    /// Count-bounded cache refused a new key
    #[error("cache: entry limit of {max} reached, key: {key}")]
    CapacityExceeded { key: String, max: usize },

    /// A single value is larger than the whole memory budget
    #[error("cache: value of {size} bytes exceeds budget of {budget} bytes, key: {key}")]
    EvictionExhausted {
        key: String,
        size: usize,
        budget: usize,
    },

    /// Load succeeded but writing the value back into the cache failed
    #[error("cache: refresh cache failed, key: {key}")]
    RefreshCacheFailed {
        key: String,
        #[source]
        source: Box<CacheError>,
    },

    /// Caller-supplied loader failed
    #[error("cache: load failed, key: {key}")]
    LoadFailed {
        key: String,
        #[source]
        source: SourceError,
    },

    /// Backing-store write failed in a write-through layer
    #[error("cache: store failed, key: {key}")]
    StoreFailed {
        key: String,
        #[source]
        source: SourceError,
    },

    /// Backing-store delete failed in a write-through layer
    #[error("cache: delete failed, key: {key}")]
    DeleteFailed {
        key: String,
        #[source]
        source: SourceError,
    },
}

impl CacheError {
    // == Constructors ==
    pub fn not_found(key: impl Into<String>) -> Self {
        CacheError::KeyNotFound { key: key.into() }
    }

    pub fn refresh_failed(key: impl Into<String>, cause: CacheError) -> Self {
        CacheError::RefreshCacheFailed {
            key: key.into(),
            source: Box::new(cause),
        }
    }

    pub fn load_failed(key: impl Into<String>, err: anyhow::Error) -> Self {
        CacheError::LoadFailed {
            key: key.into(),
            source: into_source(err),
        }
    }

    pub fn store_failed(key: impl Into<String>, err: anyhow::Error) -> Self {
        CacheError::StoreFailed {
            key: key.into(),
            source: into_source(err),
        }
    }

    pub fn delete_failed(key: impl Into<String>, err: anyhow::Error) -> Self {
        CacheError::DeleteFailed {
            key: key.into(),
            source: into_source(err),
        }
    }

    // == Accessors ==
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CacheError::KeyNotFound { .. } => ErrorKind::KeyNotFound,
            CacheError::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            CacheError::EvictionExhausted { .. } => ErrorKind::EvictionExhausted,
            CacheError::RefreshCacheFailed { .. } => ErrorKind::RefreshCacheFailed,
            CacheError::LoadFailed { .. } => ErrorKind::LoadFailed,
            CacheError::StoreFailed { .. } => ErrorKind::StoreFailed,
            CacheError::DeleteFailed { .. } => ErrorKind::DeleteFailed,
        }
    }

    /// Returns the key the failing operation was working on.
    pub fn key(&self) -> &str {
        match self {
            CacheError::KeyNotFound { key }
            | CacheError::CapacityExceeded { key, .. }
            | CacheError::EvictionExhausted { key, .. }
            | CacheError::RefreshCacheFailed { key, .. }
            | CacheError::LoadFailed { key, .. }
            | CacheError::StoreFailed { key, .. }
            | CacheError::DeleteFailed { key, .. } => key,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::KeyNotFound
    }
}

fn into_source(err: anyhow::Error) -> SourceError {
    Arc::from(Box::<dyn StdError + Send + Sync + 'static>::from(err))
}

// == Result Type Alias ==
/// Convenience Result type for the cache layers.
pub type Result<T> = std::result::Result<T, CacheError>;
