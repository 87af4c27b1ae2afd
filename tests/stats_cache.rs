// tests/stats_cache.rs
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use style_adjust::catalog::Catalog;
use style_adjust::stats::fetch::{CatalogFetcher, FixtureFetcher};
use style_adjust::stats::store::{
    JsonFileStore, KeyValueStore, MemoryStore, LAST_FETCHED_KEY, STYLE_DATA_KEY,
};
use style_adjust::stats::{read_catalog, RefreshOutcome, StatsCache};
use tokio::sync::Notify;

const CATALOG: &str = include_str!("fixtures/style-averages.json");

#[tokio::test]
async fn refresh_persists_catalog_and_timestamp() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(FixtureFetcher::from_body(CATALOG));
    let cache = StatsCache::new(fetcher.clone(), store.clone());

    let before = Utc::now();
    let out = cache.on_install().await;
    assert_eq!(
        out,
        RefreshOutcome::Refreshed {
            updated_at: "2026-02-27".into(),
            styles: 4
        }
    );
    assert_eq!(fetcher.calls(), 1);

    let rec = cache.cache_record().await.expect("record persisted");
    assert_eq!(rec.catalog, Catalog::from_json(CATALOG).unwrap());
    assert!(rec.fetched_at >= before - Duration::milliseconds(1));
}

#[tokio::test]
async fn failed_refresh_keeps_previous_record() {
    let store = Arc::new(MemoryStore::new());
    let ok = StatsCache::new(Arc::new(FixtureFetcher::from_body(CATALOG)), store.clone());
    ok.refresh().await;
    let kept = ok.cache_record().await.unwrap();

    for fetcher in [
        FixtureFetcher::failing("connection refused"),
        FixtureFetcher::from_body("<html>not json</html>"),
        FixtureFetcher::from_body(r#"{"updated_at":"x","global":{"mean":3.7},"styles":{}}"#),
    ] {
        let cache = StatsCache::new(Arc::new(fetcher), store.clone());
        assert!(matches!(cache.refresh().await, RefreshOutcome::Failed { .. }));
        assert_eq!(cache.cache_record().await.unwrap(), kept);
    }
}

#[tokio::test]
async fn startup_check_honours_ttl_boundary() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(FixtureFetcher::from_body(CATALOG));
    let cache = StatsCache::new(fetcher.clone(), store.clone());

    let fetched_at = Utc::now() - Duration::days(3);
    let catalog: serde_json::Value = serde_json::from_str(CATALOG).unwrap();
    store
        .set_many(vec![
            (STYLE_DATA_KEY.to_string(), catalog),
            (LAST_FETCHED_KEY.to_string(), json!(fetched_at.timestamp_millis())),
        ])
        .await
        .unwrap();
    let fetched_at = cache.last_fetched().await.unwrap();

    // exactly 24h old: still fresh
    let out = cache.on_startup(fetched_at + Duration::hours(24)).await;
    assert_eq!(out, RefreshOutcome::Fresh);
    assert_eq!(fetcher.calls(), 0);

    // one millisecond past: refetch
    let out = cache
        .on_startup(fetched_at + Duration::hours(24) + Duration::milliseconds(1))
        .await;
    assert!(matches!(out, RefreshOutcome::Refreshed { .. }));
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn timestamp_without_catalog_counts_as_no_record() {
    let store = Arc::new(MemoryStore::new());
    store
        .set(LAST_FETCHED_KEY, json!(Utc::now().timestamp_millis()))
        .await
        .unwrap();
    let fetcher = Arc::new(FixtureFetcher::from_body(CATALOG));
    let cache = StatsCache::new(fetcher.clone(), store);
    assert!(matches!(
        cache.on_startup(Utc::now()).await,
        RefreshOutcome::Refreshed { .. }
    ));
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn startup_without_record_fetches() {
    let fetcher = Arc::new(FixtureFetcher::from_body(CATALOG));
    let cache = StatsCache::new(fetcher.clone(), Arc::new(MemoryStore::new()));
    assert!(matches!(
        cache.on_startup(Utc::now()).await,
        RefreshOutcome::Refreshed { .. }
    ));
    assert_eq!(cache.on_startup(Utc::now()).await, RefreshOutcome::Fresh);
    assert_eq!(fetcher.calls(), 1);
}

/// Blocks inside `fetch_catalog` until released.
struct GatedFetcher {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl CatalogFetcher for GatedFetcher {
    async fn fetch_catalog(&self) -> Result<Catalog> {
        self.entered.notify_one();
        self.release.notified().await;
        Catalog::from_json(CATALOG)
    }

    fn name(&self) -> &'static str {
        "gated"
    }
}

#[tokio::test]
async fn concurrent_refresh_is_skipped_while_in_flight() {
    let fetcher = Arc::new(GatedFetcher {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let cache = Arc::new(StatsCache::new(fetcher.clone(), Arc::new(MemoryStore::new())));

    let first = {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move { cache.refresh().await })
    };
    fetcher.entered.notified().await;

    assert_eq!(cache.refresh().await, RefreshOutcome::InFlight);

    fetcher.release.notify_one();
    assert!(matches!(
        first.await.unwrap(),
        RefreshOutcome::Refreshed { .. }
    ));
    // guard released
    fetcher.release.notify_one();
    assert!(matches!(cache.refresh().await, RefreshOutcome::Refreshed { .. }));
}

#[tokio::test]
async fn file_store_round_trips_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("store.json");

    {
        let store = Arc::new(JsonFileStore::new(&path));
        let cache = StatsCache::new(Arc::new(FixtureFetcher::from_body(CATALOG)), store);
        cache.refresh().await;
    }

    let reopened = JsonFileStore::new(&path);
    let catalog = read_catalog(&reopened).await.expect("catalog on disk");
    assert_eq!(catalog, Catalog::from_json(CATALOG).unwrap());
    assert_eq!(catalog.style("Imperial Stout").unwrap().sample_size, 480);
}

#[tokio::test]
async fn truncated_store_file_does_not_block_refresh() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    std::fs::write(&path, r#"{"styleData": {trunc"#).unwrap();

    let store = Arc::new(JsonFileStore::new(&path));
    let cache = StatsCache::new(Arc::new(FixtureFetcher::from_body(CATALOG)), store.clone());
    assert!(cache.cache_record().await.is_none());

    assert!(matches!(
        cache.on_startup(Utc::now()).await,
        RefreshOutcome::Refreshed { .. }
    ));
    assert!(cache.cache_record().await.is_some());
    assert!(store.corrupt_path().exists());
}
