//! Background tasks for the relay server.

use crate::registry::SessionRegistry;
use tokio::time::{sleep, Duration};

/// Starts the idle-session expiry task.
///
/// Runs indefinitely, periodically removing sessions that have had no
/// connection attached and no activity for `idle_ttl_secs`.
pub async fn start_expiry_task(registry: SessionRegistry, idle_ttl_secs: u64) {
    if idle_ttl_secs == 0 {
        tracing::warn!("session expiry disabled (idle_ttl_secs=0)");
        return;
    }

    let interval_seconds = (idle_ttl_secs / 2).clamp(1, 60);
    let interval = Duration::from_secs(interval_seconds);
    let ttl = Duration::from_secs(idle_ttl_secs);

    tracing::info!(idle_ttl_secs, interval_seconds, "starting session expiry task");

    loop {
        sleep(interval).await;

        let expired = registry.prune_idle(ttl);
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), sessions = ?expired, "expired idle sessions");
        }
    }
}
