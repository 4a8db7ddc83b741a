//! Configuration Module
//!
//! Collects every constructor option of the cache layers, with optional
//! loading from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Period between background sweeps of the base store
    pub sweep_interval: Duration,
    /// Maximum number of entries inspected by one sweep tick
    pub sweep_batch_size: usize,
    /// Pre-allocated capacity of the base store's map
    pub initial_capacity: usize,
    /// Maximum number of live entries for the count-bounded layer
    pub max_entries: usize,
    /// Byte budget for the memory-bounded layer
    pub max_bytes: usize,
    /// Expiration applied by read-through layers on (re)population, zero = never
    pub expiration: Duration,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_SWEEP_INTERVAL_SECS` - Sweep period in seconds (default: 3600)
    /// - `CACHE_SWEEP_BATCH_SIZE` - Entries inspected per sweep (default: 1000)
    /// - `CACHE_INITIAL_CAPACITY` - Initial map capacity (default: 0)
    /// - `CACHE_MAX_ENTRIES` - Entry limit (default: 1000)
    /// - `CACHE_MAX_BYTES` - Byte budget (default: 64 MiB)
    /// - `CACHE_EXPIRATION_SECS` - Read-through expiration in seconds (default: 0)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sweep_interval: env_var::<u64>("CACHE_SWEEP_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            sweep_batch_size: env_var("CACHE_SWEEP_BATCH_SIZE")
                .unwrap_or(defaults.sweep_batch_size),
            initial_capacity: env_var("CACHE_INITIAL_CAPACITY")
                .unwrap_or(defaults.initial_capacity),
            max_entries: env_var("CACHE_MAX_ENTRIES").unwrap_or(defaults.max_entries),
            max_bytes: env_var("CACHE_MAX_BYTES").unwrap_or(defaults.max_bytes),
            expiration: env_var::<u64>("CACHE_EXPIRATION_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.expiration),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60 * 60),
            sweep_batch_size: 1000,
            initial_capacity: 0,
            max_entries: 1000,
            max_bytes: 64 * 1024 * 1024,
            expiration: Duration::ZERO,
        }
    }
}

fn env_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.sweep_interval, Duration::from_secs(3600));
        assert_eq!(config.sweep_batch_size, 1000);
        assert_eq!(config.max_entries, 1000);
        assert_eq!(config.max_bytes, 64 * 1024 * 1024);
        assert!(config.expiration.is_zero());
    }

    #[test]
    fn test_config_from_env() {
        // Single test touches the environment so parallel tests do not race
        env::remove_var("CACHE_SWEEP_INTERVAL_SECS");
        env::remove_var("CACHE_SWEEP_BATCH_SIZE");
        env::remove_var("CACHE_INITIAL_CAPACITY");
        env::remove_var("CACHE_EXPIRATION_SECS");
        env::set_var("CACHE_MAX_ENTRIES", "25");
        env::set_var("CACHE_MAX_BYTES", "not-a-number");

        let config = Config::from_env();
        assert_eq!(config.max_entries, 25);
        assert_eq!(config.max_bytes, Config::default().max_bytes);
        assert_eq!(config.sweep_interval, Duration::from_secs(3600));
        assert_eq!(config.sweep_batch_size, 1000);

        env::remove_var("CACHE_MAX_ENTRIES");
        env::remove_var("CACHE_MAX_BYTES");
    }
}
