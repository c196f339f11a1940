//! Idle Connection Reaper Task
//!
//! Background task that periodically closes pooled connections left unused
//! for longer than the configured idle timeout.

use std::time::Duration;

use deadpool_redis::Pool;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Spawns a background task that drops idle connections from `pool`.
///
/// Every `check_interval` the task removes connections whose last use was
/// more than `idle_timeout` ago. The returned handle is aborted by the
/// provider when it is dropped.
///
/// # Example
/// ```ignore
/// let handle = spawn_idle_reaper(store.pool().clone(), Duration::from_secs(300), Duration::from_secs(60));
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_idle_reaper(
    pool: Pool,
    idle_timeout: Duration,
    check_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Starting idle connection reaper: idle timeout {:?}, check interval {:?}",
            idle_timeout, check_interval
        );

        let mut ticker = tokio::time::interval(check_interval);
        // First tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let removed = reap_idle(&pool, idle_timeout);
            if removed > 0 {
                info!("Idle reaper: closed {} idle connections", removed);
            } else {
                debug!("Idle reaper: no idle connections found");
            }
        }
    })
}

/// Drops connections idle for longer than `idle_timeout`, returning how many.
pub fn reap_idle(pool: &Pool, idle_timeout: Duration) -> usize {
    pool.retain(|_, metrics| metrics.last_used() < idle_timeout)
        .removed
        .len()
}
