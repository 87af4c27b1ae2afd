use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::annotate::Annotator;
use crate::page::contract::PageContract;
use crate::page::{page_digest, Document};
use crate::stats::store::KeyValueStore;
use crate::stats::{read_catalog, read_enabled, read_last_fetched, RefreshOutcome, StatsCache};

pub const HEADER_BADGES: &str = "x-badges";
pub const HEADER_ANNOTATOR: &str = "x-annotator";

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<StatsCache>,
    pub contract: Arc<PageContract>,
}

impl AppState {
    pub fn new(cache: Arc<StatsCache>, contract: PageContract) -> Self {
        Self {
            cache,
            contract: Arc::new(contract),
        }
    }

    fn store(&self) -> Arc<dyn KeyValueStore> {
        self.cache.store()
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(status))
        .route("/annotate", post(annotate))
        .route("/admin/refresh", post(admin_refresh))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct StatusOut {
    pub enabled: bool,
    pub updated_at: Option<String>,
    /// RFC 3339.
    pub fetched_at: Option<String>,
    pub styles: usize,
}

async fn status(State(state): State<AppState>) -> Json<StatusOut> {
    let store = state.store();
    let enabled = read_enabled(store.as_ref()).await;
    let catalog = read_catalog(store.as_ref()).await;
    let fetched_at = read_last_fetched(store.as_ref()).await;
    Json(StatusOut {
        enabled,
        updated_at: catalog.as_ref().map(|c| c.updated_at.clone()),
        fetched_at: fetched_at.map(|t| t.to_rfc3339()),
        styles: catalog.map(|c| c.styles.len()).unwrap_or(0),
    })
}

async fn annotate(State(state): State<AppState>, body: String) -> Response {
    let mut doc = match Document::parse_html(&body) {
        Ok(d) => d,
        Err(e) => {
            warn!(target: "api", error = ?e, "annotate: unparsable page");
            return (StatusCode::UNPROCESSABLE_ENTITY, format!("{e:#}")).into_response();
        }
    };

    let store = state.store();
    let (html, badges, mode) =
        match Annotator::start(store.as_ref(), (*state.contract).clone()).await {
            Some(annotator) => {
                let report = annotator.scan(&mut doc);
                info!(
                    target: "api",
                    page = %page_digest(&body),
                    candidates = report.candidates,
                    badges = report.badges,
                    "page annotated"
                );
                (doc.to_html(), report.badges, "active")
            }
            None => (body, 0, "disabled"),
        };

    let mut resp = html.into_response();
    let headers = resp.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    headers.insert(HEADER_BADGES, HeaderValue::from(badges));
    headers.insert(HEADER_ANNOTATOR, HeaderValue::from_static(mode));
    resp
}

async fn admin_refresh(State(state): State<AppState>) -> Json<RefreshOutcome> {
    Json(state.cache.refresh().await)
}
