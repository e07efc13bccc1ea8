//! Expiry Sweep Task
//!
//! Background task that periodically removes expired L1 entries through the
//! engine, so swept keys are also detached from the tag index. Lazy expiry
//! on access covers keys between sweep runs.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheEngine;

/// Spawns a background task that periodically sweeps expired entries.
///
/// The task runs in an infinite loop, sleeping for the specified interval
/// between sweep runs.
///
/// # Arguments
/// * `engine` - Shared cache engine
/// * `sweep_interval_secs` - Interval in seconds between sweep runs
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
pub fn spawn_sweep_task(engine: Arc<CacheEngine>, sweep_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(sweep_interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting expiry sweep task with interval of {} seconds",
            sweep_interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = engine.sweep_expired().await;

            if removed > 0 {
                info!("Expiry sweep: removed {} expired entries", removed);
            } else {
                debug!("Expiry sweep: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheValue, SetOptions};
    use crate::config::Config;

    fn engine() -> Arc<CacheEngine> {
        Arc::new(CacheEngine::new(&Config::default(), None))
    }

    #[tokio::test]
    async fn test_sweep_task_removes_expired_entries() {
        let engine = engine();

        engine
            .set(
                "cache:expire_soon",
                CacheValue::Json(serde_json::json!("value")),
                SetOptions {
                    l1_ttl: Some(1),
                    ..SetOptions::default()
                },
            )
            .await
            .unwrap();

        let handle = spawn_sweep_task(engine.clone(), 1);

        // Wait for the entry to expire and the sweep to run
        tokio::time::sleep(Duration::from_millis(2500)).await;

        let stats = engine.stats().await;
        assert_eq!(stats.l1.entries, 0, "expired entry should have been swept");

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweep_task_preserves_valid_entries() {
        let engine = engine();

        engine
            .set(
                "cache:long_lived",
                CacheValue::Json(serde_json::json!("value")),
                SetOptions {
                    l1_ttl: Some(3600),
                    ..SetOptions::default()
                },
            )
            .await
            .unwrap();

        let handle = spawn_sweep_task(engine.clone(), 1);

        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(engine.get("cache:long_lived").await.unwrap().is_some());

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweep_task_can_be_aborted() {
        let handle = spawn_sweep_task(engine(), 1);

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
