//! Expiry Sweep Task
//!
//! Background task that periodically removes expired entries from a base
//! store, inspecting a bounded batch per tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::cache::StoreShared;

// == Sweep Handle ==
/// Shutdown switch for a spawned sweeper.
///
/// Dropping the handle aborts the task, so a store that is dropped
/// without calling `close` does not leak its sweeper, even one waiting
/// on the store lock.
pub(crate) struct SweepHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SweepHandle {
    /// Signals the task to stop before its next tick. Idempotent.
    pub(crate) fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }

    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Spawns a task sweeping `shared` every `interval`.
///
/// Each tick takes the store's write lock and inspects at most `batch_size`
/// entries. A zero interval spawns nothing and leaves expiry to reads.
///
/// # Panics
/// Panics if called outside of a Tokio runtime.
pub(crate) fn spawn_sweep_task(
    shared: Arc<StoreShared>,
    interval: Duration,
    batch_size: usize,
) -> SweepHandle {
    let (shutdown, mut stop) = watch::channel(false);

    if interval.is_zero() {
        debug!("Background sweep disabled, relying on lazy expiry");
        return SweepHandle {
            shutdown,
            task: None,
        };
    }

    let task = tokio::spawn(async move {
        info!(
            "Starting expiry sweep task with interval of {:?}, batch of {}",
            interval, batch_size
        );

        // First tick one full interval from now, not immediately
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                // Fires on shutdown and when the handle is dropped
                _ = stop.changed() => break,
                _ = ticker.tick() => {
                    let removed = {
                        let mut entries = shared.entries.write().await;
                        shared.sweep_locked(&mut entries, batch_size)
                    };

                    if removed > 0 {
                        info!("Expiry sweep: removed {} expired entries", removed);
                    } else {
                        debug!("Expiry sweep: no expired entries found");
                    }
                }
            }
        }

        info!("Expiry sweep task stopped");
    });

    SweepHandle {
        shutdown,
        task: Some(task),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn insert(shared: &StoreShared, key: &str, expiration: Duration) {
        let mut entries = shared.entries.write().await;
        shared.insert_locked(&mut entries, key, b"value".to_vec(), expiration);
    }

    #[tokio::test]
    async fn test_sweep_task_removes_expired_entries() {
        let shared = Arc::new(StoreShared::with_capacity(4));
        insert(&shared, "expire_soon", Duration::from_millis(10)).await;

        let handle = spawn_sweep_task(Arc::clone(&shared), Duration::from_millis(50), 1000);

        time::sleep(Duration::from_millis(200)).await;

        assert!(
            shared.entries.read().await.is_empty(),
            "Expired entry should have been swept"
        );
        handle.shutdown();
    }

    #[tokio::test]
    async fn test_sweep_task_preserves_valid_entries() {
        let shared = Arc::new(StoreShared::with_capacity(4));
        insert(&shared, "long_lived", Duration::from_secs(3600)).await;

        let handle = spawn_sweep_task(Arc::clone(&shared), Duration::from_millis(30), 1000);

        time::sleep(Duration::from_millis(120)).await;

        assert!(shared.entries.read().await.contains_key("long_lived"));
        handle.shutdown();
    }

    #[tokio::test]
    async fn test_sweep_task_stops_on_shutdown() {
        let shared = Arc::new(StoreShared::with_capacity(4));
        let handle = spawn_sweep_task(Arc::clone(&shared), Duration::from_millis(20), 1000);

        handle.shutdown();
        handle.shutdown();
        time::sleep(Duration::from_millis(60)).await;

        assert!(handle.is_shutdown());
        assert!(handle.is_finished(), "Task should exit after shutdown");
    }

    #[tokio::test]
    async fn test_zero_interval_spawns_nothing() {
        let shared = Arc::new(StoreShared::with_capacity(4));
        insert(&shared, "key", Duration::from_millis(1)).await;

        let handle = spawn_sweep_task(Arc::clone(&shared), Duration::ZERO, 1000);
        time::sleep(Duration::from_millis(20)).await;

        assert!(handle.is_finished());
        assert_eq!(shared.entries.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_dropping_handle_stops_task() {
        let shared = Arc::new(StoreShared::with_capacity(4));
        let handle = spawn_sweep_task(Arc::clone(&shared), Duration::from_millis(20), 1000);
        assert_eq!(Arc::strong_count(&shared), 2);

        drop(handle);
        time::sleep(Duration::from_millis(60)).await;

        // The task released its clone of the store
        assert_eq!(Arc::strong_count(&shared), 1);
    }
}
