//! Prometheus exposition for the catalog cache and the annotator.
//!
//! Descriptions only reach the exporter once a recorder is installed, so
//! `init` describes every series itself and registers the unlabelled
//! counters at zero. `/metrics` then lists them before the first refresh.

use anyhow::{Context, Result};
use axum::{extract::State, http::header, response::IntoResponse, routing::get, Router};
use metrics::{counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Buckets for the `*_ms` histograms: scans take well under a millisecond,
/// remote fetches up to the HTTP timeout.
const MS_BUCKETS: &[f64] = &[
    0.1, 0.5, 1.0, 5.0, 10.0, 50.0, 100.0, 250.0, 500.0, 1_000.0, 2_500.0, 5_000.0, 10_000.0,
];

const ZEROED_COUNTERS: &[&str] = &[
    "catalog_refresh_total",
    "catalog_refresh_errors_total",
    "catalog_refresh_skipped_total",
    "annotate_badges_total",
];

const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and publish the configured cache TTL.
    /// Only one recorder may be installed per process.
    pub fn init(ttl_secs: u64) -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .set_buckets_for_metric(Matcher::Suffix("_ms".to_string()), MS_BUCKETS)
            .context("prometheus: histogram buckets")?
            .install_recorder()
            .context("prometheus: install recorder")?;

        crate::stats::describe_metrics();
        crate::annotate::describe_metrics();
        describe_gauge!("catalog_ttl_secs", "Maximum catalog age before a refetch.");

        for name in ZEROED_COUNTERS {
            counter!(*name).absolute(0);
        }
        gauge!("catalog_ttl_secs").set(ttl_secs as f64);

        Ok(Self { handle })
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// `/metrics` in the Prometheus text format.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(scrape))
            .with_state(self.clone())
    }
}

async fn scrape(State(metrics): State<Metrics>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], metrics.render())
}
