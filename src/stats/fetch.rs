// src/stats/fetch.rs
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::catalog::Catalog;
use crate::config::HttpSettings;

/// "Fetch the remote catalog" capability injected into the stats cache.
#[async_trait]
pub trait CatalogFetcher: Send + Sync {
    /// Fetch and validate the remote document.
    async fn fetch_catalog(&self) -> Result<Catalog>;
    fn name(&self) -> &'static str;
}

/// Fetches `style-averages.json` over HTTP(S).
pub struct HttpFetcher {
    url: String,
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(url: impl Into<String>, http: &HttpSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(http.user_agent.clone())
            .connect_timeout(Duration::from_millis(http.connect_timeout_ms))
            .timeout(Duration::from_millis(http.timeout_ms))
            .build()
            .context("building catalog http client")?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl CatalogFetcher for HttpFetcher {
    async fn fetch_catalog(&self) -> Result<Catalog> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("catalog http get")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("catalog http status {status}");
        }
        let body = resp.text().await.context("catalog http .text()")?;
        Catalog::from_json(&body)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Serves a fixed body (or a fixed failure). Counts calls.
pub struct FixtureFetcher {
    body: std::result::Result<String, String>,
    calls: AtomicUsize,
}

impl FixtureFetcher {
    pub fn from_body(body: &str) -> Self {
        Self {
            body: Ok(body.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            body: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogFetcher for FixtureFetcher {
    async fn fetch_catalog(&self) -> Result<Catalog> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.body {
            Ok(s) => Catalog::from_json(s),
            Err(msg) => bail!("{msg}"),
        }
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
