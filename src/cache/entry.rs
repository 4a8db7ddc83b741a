//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with deadline support.

use std::time::{Duration, Instant};

// == Cache Entry ==
/// Represents a single stored value and its optional deadline.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored value
    pub value: Vec<u8>,
    /// Instant after which the entry is expired, None = no expiration
    pub deadline: Option<Instant>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry expiring `expiration` from now.
    ///
    /// A zero expiration means the entry never expires. A deadline that does
    /// not fit in an `Instant` is treated the same way.
    pub fn new(value: Vec<u8>, expiration: Duration) -> Self {
        let deadline = if expiration.is_zero() {
            None
        } else {
            Instant::now().checked_add(expiration)
        };

        Self { value, deadline }
    }

    // == Is Expired ==
    /// Checks if the entry has expired relative to `now`.
    ///
    /// An entry is expired iff it has a deadline and that deadline is at or
    /// before `now`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) => deadline <= now,
            None => false,
        }
    }

    /// Checks if the entry has expired as of the current instant.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    // == Time To Live ==
    /// Returns the remaining lifetime, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(Duration::ZERO)` if the entry has expired
    /// - `Some(remaining)` if the entry has a deadline in the future
    /// - `None` if the entry never expires
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}
