//! # Stats cache
//! Locally persisted style catalog with a TTL-gated refresh policy.
//!
//! - `refresh()` fetches, validates and overwrites the record in one store
//!   write. Failures keep the previous record and are only logged.
//! - `maybe_refresh(now)` refreshes when the record is missing or older
//!   than the TTL (strictly greater).
//! - Only one refresh runs at a time; overlapping calls return `InFlight`.

pub mod fetch;
pub mod scheduler;
pub mod store;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::catalog::{CacheRecord, Catalog};
use fetch::CatalogFetcher;
use store::{KeyValueStore, ENABLED_KEY, LAST_FETCHED_KEY, STYLE_DATA_KEY};

pub const DEFAULT_TTL_SECS: u64 = 24 * 60 * 60;

pub(crate) fn describe_metrics() {
    describe_counter!("catalog_refresh_total", "Successful catalog refreshes.");
    describe_counter!(
        "catalog_refresh_errors_total",
        "Catalog refreshes abandoned (transport, status, body, store)."
    );
    describe_counter!(
        "catalog_refresh_skipped_total",
        "Refresh calls skipped because another refresh was in flight."
    );
    describe_histogram!("catalog_refresh_ms", "Refresh duration in milliseconds.");
    describe_gauge!(
        "catalog_last_fetched_ts",
        "Unix ts of the last successful catalog fetch."
    );
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(describe_metrics);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RefreshOutcome {
    Refreshed { updated_at: String, styles: usize },
    /// Record younger than the TTL; nothing fetched.
    Fresh,
    /// Another refresh was already running.
    InFlight,
    Failed { reason: String },
}

pub struct StatsCache {
    fetcher: Arc<dyn CatalogFetcher>,
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
    in_flight: AtomicBool,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl StatsCache {
    pub fn new(fetcher: Arc<dyn CatalogFetcher>, store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_ttl_secs(fetcher, store, DEFAULT_TTL_SECS)
    }

    pub fn with_ttl_secs(
        fetcher: Arc<dyn CatalogFetcher>,
        store: Arc<dyn KeyValueStore>,
        ttl_secs: u64,
    ) -> Self {
        let secs = i64::try_from(ttl_secs)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 1_000);
        Self {
            fetcher,
            store,
            ttl: Duration::seconds(secs),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.store)
    }

    /// First-install trigger: always fetch.
    pub async fn on_install(&self) -> RefreshOutcome {
        self.refresh().await
    }

    /// Start-up trigger: fetch only when stale.
    pub async fn on_startup(&self, now: DateTime<Utc>) -> RefreshOutcome {
        self.maybe_refresh(now).await
    }

    pub async fn refresh(&self) -> RefreshOutcome {
        ensure_metrics_described();

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(target: "stats", "refresh already in flight; skipping");
            counter!("catalog_refresh_skipped_total").increment(1);
            return RefreshOutcome::InFlight;
        }
        let _guard = InFlightGuard(&self.in_flight);

        let t0 = std::time::Instant::now();
        let outcome = match self.fetch_and_store().await {
            Ok(record) => {
                info!(
                    target: "stats",
                    updated_at = %record.catalog.updated_at,
                    styles = record.catalog.styles.len(),
                    "style data refreshed"
                );
                counter!("catalog_refresh_total").increment(1);
                gauge!("catalog_last_fetched_ts").set(record.fetched_at.timestamp() as f64);
                RefreshOutcome::Refreshed {
                    updated_at: record.catalog.updated_at,
                    styles: record.catalog.styles.len(),
                }
            }
            Err(e) => {
                warn!(
                    target: "stats",
                    error = ?e,
                    fetcher = self.fetcher.name(),
                    "failed to refresh style data"
                );
                counter!("catalog_refresh_errors_total").increment(1);
                RefreshOutcome::Failed {
                    reason: format!("{e:#}"),
                }
            }
        };
        histogram!("catalog_refresh_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        outcome
    }

    pub async fn maybe_refresh(&self, now: DateTime<Utc>) -> RefreshOutcome {
        // A timestamp without a readable catalog counts as no record.
        match self.cache_record().await.map(|r| r.fetched_at) {
            Some(at) if !self.is_stale(at, now) => {
                debug!(target: "stats", fetched_at = %at, "style data still fresh");
                RefreshOutcome::Fresh
            }
            _ => self.refresh().await,
        }
    }

    pub fn is_stale(&self, fetched_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - fetched_at > self.ttl
    }

    pub async fn last_fetched(&self) -> Option<DateTime<Utc>> {
        read_last_fetched(self.store.as_ref()).await
    }

    pub async fn load_catalog(&self) -> Option<Catalog> {
        read_catalog(self.store.as_ref()).await
    }

    pub async fn cache_record(&self) -> Option<CacheRecord> {
        let fetched_at = self.last_fetched().await?;
        let catalog = self.load_catalog().await?;
        Some(CacheRecord {
            catalog,
            fetched_at,
        })
    }

    async fn fetch_and_store(&self) -> Result<CacheRecord> {
        let catalog = self.fetcher.fetch_catalog().await?;
        let fetched_at = Utc::now();
        let value = serde_json::to_value(&catalog).context("serializing catalog")?;
        self.store
            .set_many(vec![
                (STYLE_DATA_KEY.to_string(), value),
                (
                    LAST_FETCHED_KEY.to_string(),
                    json!(fetched_at.timestamp_millis()),
                ),
            ])
            .await
            .context("persisting style data")?;
        Ok(CacheRecord {
            catalog,
            fetched_at,
        })
    }
}

/// Cached catalog, if any. Unreadable values are logged and treated as absent.
pub async fn read_catalog(store: &dyn KeyValueStore) -> Option<Catalog> {
    let value = match store.get(STYLE_DATA_KEY).await {
        Ok(v) => v?,
        Err(e) => {
            warn!(target: "stats", error = ?e, "reading cached style data");
            return None;
        }
    };
    match serde_json::from_value::<Catalog>(value) {
        Ok(c) => Some(c),
        Err(e) => {
            warn!(target: "stats", error = %e, "cached style data is malformed");
            None
        }
    }
}

pub async fn read_last_fetched(store: &dyn KeyValueStore) -> Option<DateTime<Utc>> {
    match store.get(LAST_FETCHED_KEY).await {
        Ok(v) => v
            .and_then(|v| v.as_i64())
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        Err(e) => {
            warn!(target: "stats", error = ?e, "reading lastFetched");
            None
        }
    }
}

/// Only an explicit `false` disables annotation.
pub async fn read_enabled(store: &dyn KeyValueStore) -> bool {
    match store.get(ENABLED_KEY).await {
        Ok(Some(v)) => v.as_bool() != Some(false),
        Ok(None) => true,
        Err(e) => {
            warn!(target: "stats", error = ?e, "reading enabled flag; assuming enabled");
            true
        }
    }
}
