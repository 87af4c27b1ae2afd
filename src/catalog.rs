//! # Catalog
//! Per-style and global rating statistics, as published in the remote
//! `style-averages.json` document.
//!
//! The wire shape is:
//! ```json
//! { "updated_at": "2026-02-27",
//!   "global": { "mean": 3.72, "std": 0.41 },
//!   "styles": { "Imperial Stout": { "mean": 4.05, "std": 0.32, "sample": 480 } } }
//! ```

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Summary statistics for one named style.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StyleStatistics {
    pub mean: f64,
    pub std: f64,
    #[serde(rename = "sample")]
    pub sample_size: u64,
}

/// Summary statistics across all styles combined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalStatistics {
    pub mean: f64,
    pub std: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub updated_at: String,
    pub global: GlobalStatistics,
    /// Exact, case-sensitive style names.
    pub styles: BTreeMap<String, StyleStatistics>,
}

impl Catalog {
    /// Parse and validate a remote catalog document. Nothing is returned
    /// unless the whole document is usable.
    pub fn from_json(body: &str) -> Result<Self> {
        let catalog: Catalog =
            serde_json::from_str(body.trim()).context("parsing catalog json")?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Numeric sanity: finite means, finite non-negative deviations.
    pub fn validate(&self) -> Result<()> {
        if !self.global.mean.is_finite() || !is_valid_std(self.global.std) {
            bail!(
                "invalid global statistics: mean={} std={}",
                self.global.mean,
                self.global.std
            );
        }
        for (name, st) in &self.styles {
            if !st.mean.is_finite() || !is_valid_std(st.std) {
                bail!("invalid statistics for style '{name}': mean={} std={}", st.mean, st.std);
            }
        }
        Ok(())
    }

    pub fn style(&self, name: &str) -> Option<&StyleStatistics> {
        self.styles.get(name)
    }
}

fn is_valid_std(std: f64) -> bool {
    std.is_finite() && std >= 0.0
}

/// The persisted pair. At most one exists at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord {
    pub catalog: Catalog,
    pub fetched_at: DateTime<Utc>,
}
