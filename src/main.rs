//! Style-adjusted ratings service — binary entrypoint.
//! Loads config, warms the catalog cache, then serves the HTTP API.
//!
//! See `README.md` for quickstart.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use style_adjust::api::{create_router, AppState};
use style_adjust::config::AppConfig;
use style_adjust::metrics::Metrics;
use style_adjust::stats::fetch::HttpFetcher;
use style_adjust::stats::scheduler::spawn_refresh_scheduler;
use style_adjust::stats::store::JsonFileStore;
use style_adjust::stats::{RefreshOutcome, StatsCache};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("style_adjust=info,warn"));

    let json = std::env::var("STYLE_ADJUST_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load_default()?;
    let first_install = !cfg.store_path.exists();
    let store = Arc::new(JsonFileStore::new(&cfg.store_path));
    let fetcher = Arc::new(HttpFetcher::new(cfg.data_url.clone(), &cfg.http)?);
    info!(
        data_url = %fetcher.url(),
        store = %store.path().display(),
        ttl_secs = cfg.ttl_secs,
        first_install,
        "config loaded"
    );
    let cache = Arc::new(StatsCache::with_ttl_secs(fetcher, store, cfg.ttl_secs));

    let metrics = Metrics::init(cfg.ttl_secs)?;

    let outcome = if first_install {
        cache.on_install().await
    } else {
        cache.on_startup(chrono::Utc::now()).await
    };
    match &outcome {
        RefreshOutcome::Failed { reason } => {
            warn!(%reason, "initial catalog refresh failed; serving cached data")
        }
        other => info!(outcome = ?other, first_install, "initial catalog check done"),
    }

    if cfg.refresh_check_interval_secs > 0 {
        spawn_refresh_scheduler(
            Arc::clone(&cache),
            Duration::from_secs(cfg.refresh_check_interval_secs),
        );
    }

    let state = AppState::new(cache, cfg.contract.clone());
    let app = create_router(state).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr))?;
    info!(addr = %cfg.bind_addr, "listening");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
