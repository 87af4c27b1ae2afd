// src/stats/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::stats::StatsCache;

/// Periodically re-run the start-up check (`maybe_refresh`) for long-running
/// processes. Only stale records trigger a fetch, so the interval can be
/// much shorter than the TTL. Wire this from your app startup.
pub fn spawn_refresh_scheduler(cache: Arc<StatsCache>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately; start-up already ran its check.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let outcome = cache.on_startup(chrono::Utc::now()).await;
            tracing::debug!(target: "stats", ?outcome, "scheduled refresh check");
        }
    })
}
