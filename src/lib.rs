// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod annotate;
pub mod api;
pub mod catalog;
pub mod config;
pub mod metrics;
pub mod normalize;
pub mod page;
pub mod stats;
pub mod summary;

// ---- Re-exports for stable public API ----
pub use crate::annotate::{Annotator, ScanReport};
pub use crate::api::{create_router, AppState};
pub use crate::catalog::Catalog;
pub use crate::normalize::compute_adjusted;
pub use crate::stats::{RefreshOutcome, StatsCache};
