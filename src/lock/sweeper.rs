//! Background lease reclamation.
//!
//! Holders can vanish without releasing (closed tab, crash, lost
//! connection). The sweeper clears their locks on a fixed schedule,
//! independent of any explicit release.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::LockManager;

/// Sweep interval for a lease: half the lease, at least one second.
pub fn interval_for_lease(lease: Duration) -> Duration {
    (lease / 2).max(Duration::from_secs(1))
}

/// Spawn a task that calls [`LockManager::sweep_expired`] every `interval`
/// until `shutdown` is notified.
pub fn spawn_sweeper(
    manager: Arc<LockManager>,
    interval: Duration,
    shutdown: Arc<Notify>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "lock sweeper started");
        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    info!("lock sweeper shutting down");
                    return;
                }
                _ = tokio::time::sleep(interval) => {
                    let now = manager.now();
                    let removed = manager.sweep_expired(now);
                    debug!(removed, tracked = manager.tracked(), "sweep pass");
                }
            }
        }
    })
}
