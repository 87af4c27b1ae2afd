// tests/http_fetch.rs
//! HttpFetcher against a throwaway local server.

use std::sync::Arc;

use axum::{http::StatusCode, routing::get, Router};
use style_adjust::config::HttpSettings;
use style_adjust::stats::fetch::{CatalogFetcher, HttpFetcher};
use style_adjust::stats::store::MemoryStore;
use style_adjust::stats::{RefreshOutcome, StatsCache};

const CATALOG: &str = include_str!("fixtures/style-averages.json");

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn settings() -> HttpSettings {
    HttpSettings {
        timeout_ms: 2_000,
        ..HttpSettings::default()
    }
}

#[tokio::test]
async fn fetches_and_validates_catalog() {
    let base = serve(Router::new().route("/style-averages.json", get(|| async { CATALOG }))).await;
    let f = HttpFetcher::new(format!("{base}/style-averages.json"), &settings()).unwrap();
    assert_eq!(f.url(), format!("{base}/style-averages.json"));
    let c = f.fetch_catalog().await.unwrap();
    assert_eq!(c.updated_at, "2026-02-27");
    assert!((c.global.mean - 3.72).abs() < 1e-9);
    assert_eq!(c.styles.len(), 4);
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let base = serve(Router::new().route(
        "/gone.json",
        get(|| async { (StatusCode::NOT_FOUND, "404: Not Found") }),
    ))
    .await;
    let f = HttpFetcher::new(format!("{base}/gone.json"), &settings()).unwrap();
    let err = f.fetch_catalog().await.unwrap_err();
    assert!(format!("{err:#}").contains("404"), "{err:#}");
}

#[tokio::test]
async fn malformed_body_fails_refresh_without_writing() {
    let base = serve(Router::new().route("/bad.json", get(|| async { "{\"updated_at\":" }))).await;
    let f = HttpFetcher::new(format!("{base}/bad.json"), &settings()).unwrap();
    let cache = StatsCache::new(Arc::new(f), Arc::new(MemoryStore::new()));
    assert!(matches!(cache.refresh().await, RefreshOutcome::Failed { .. }));
    assert!(cache.cache_record().await.is_none());
    assert!(cache.last_fetched().await.is_none());
}

#[tokio::test]
async fn unreachable_host_fails_refresh() {
    let f = HttpFetcher::new("http://127.0.0.1:9/style-averages.json", &settings()).unwrap();
    let cache = StatsCache::new(Arc::new(f), Arc::new(MemoryStore::new()));
    let out = cache.refresh().await;
    assert!(matches!(out, RefreshOutcome::Failed { .. }), "{out:?}");
}
