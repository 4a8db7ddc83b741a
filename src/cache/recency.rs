//! Recency List Module
//!
//! Ordered sequence of keys used by the memory-bounded layer to pick
//! eviction victims.

use std::collections::VecDeque;

// == Recency List ==
/// Tracks keys from least to most recently touched.
///
/// Keys are stored in a VecDeque where:
/// - Front (index 0) = least recently touched
/// - Back = most recently written or read
#[derive(Debug, Default, Clone)]
pub struct RecencyList {
    order: VecDeque<String>,
}

impl RecencyList {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
        }
    }

    /// Builds a list from keys given oldest first.
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            order: keys.into_iter().map(Into::into).collect(),
        }
    }

    // == Append ==
    /// Adds a key at the tail (most recent position).
    pub fn append(&mut self, key: impl Into<String>) {
        self.order.push_back(key.into());
    }

    // == Positional Access ==
    /// Removes and returns the key at `index`.
    pub fn remove_at(&mut self, index: usize) -> Option<String> {
        self.order.remove(index)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.order.get(index).map(String::as_str)
    }

    /// Returns the position of `key`, scanning from the oldest end.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.order.iter().position(|k| k == key)
    }

    // == Key-Based Helpers ==
    /// Removes `key` wherever it is. Returns whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.position(key) {
            Some(index) => self.remove_at(index).is_some(),
            None => false,
        }
    }

    /// Moves `key` to the tail, appending it if it was not tracked.
    pub fn touch(&mut self, key: &str) {
        self.remove(key);
        self.append(key);
    }

    /// Returns the least recently touched key.
    pub fn oldest(&self) -> Option<&str> {
        self.get(0)
    }

    // == Snapshot ==
    /// Renders the full sequence, oldest first.
    pub fn to_vec(&self) -> Vec<String> {
        self.order.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }
}
