//! # Annotator
//! Decorates every rated item on a page with its style-adjusted score.
//!
//! Each score element moves `Unseen -> Processed` exactly once: the marker
//! attribute is set before anything else is computed, so repeated or
//! re-entrant scans never produce a second badge. Elements that cannot be
//! annotated (bad score, no label, unknown style) stay processed and are
//! never retried.
//!
//! The catalog is captured once at start; badges are never recomputed.

pub mod badge;
pub mod extract;
pub mod reconcile;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::normalize::compute_adjusted;
use crate::page::contract::PageContract;
use crate::page::{Document, NodeId};
use crate::stats::store::KeyValueStore;
use crate::stats::{read_catalog, read_enabled};

pub(crate) fn describe_metrics() {
    describe_counter!("annotate_badges_total", "Badges inserted.");
    describe_counter!(
        "annotate_skipped_total",
        "Score elements processed without a badge, by reason."
    );
    describe_histogram!("annotate_scan_ms", "Reconciliation pass duration in milliseconds.");
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(describe_metrics);
}

/// Why a processed element got no badge. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SkipReason {
    UnparsableScore,
    NoCatalog,
    MissingCard,
    MissingStyleLabel,
    UnknownStyle,
    InsertFailed,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::UnparsableScore => "unparsable_score",
            SkipReason::NoCatalog => "no_catalog",
            SkipReason::MissingCard => "missing_card",
            SkipReason::MissingStyleLabel => "missing_style_label",
            SkipReason::UnknownStyle => "unknown_style",
            SkipReason::InsertFailed => "insert_failed",
        }
    }
}

/// Transient per-scan view of one score element.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingItem {
    pub element: NodeId,
    pub raw_score: f64,
    pub style_name: Option<String>,
    pub processed: bool,
}

/// Outcome of one or more reconciliation passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub passes: usize,
    pub candidates: usize,
    pub badges: usize,
    pub skipped: BTreeMap<SkipReason, usize>,
}

impl ScanReport {
    pub fn skipped(&self, reason: SkipReason) -> usize {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }

    pub fn merge(&mut self, other: &ScanReport) {
        self.passes += other.passes;
        self.candidates += other.candidates;
        self.badges += other.badges;
        for (reason, n) in &other.skipped {
            *self.skipped.entry(*reason).or_insert(0) += n;
        }
    }
}

#[derive(Debug, Clone)]
pub struct Annotator {
    catalog: Option<Arc<Catalog>>,
    contract: PageContract,
}

impl Annotator {
    pub fn new(catalog: Option<Catalog>, contract: PageContract) -> Self {
        Self {
            catalog: catalog.map(Arc::new),
            contract,
        }
    }

    /// Read `enabled` and the cached catalog once. `None` when annotation is
    /// switched off. A missing catalog still yields an annotator; it marks
    /// elements but inserts no badges.
    pub async fn start(store: &dyn KeyValueStore, contract: PageContract) -> Option<Self> {
        if !read_enabled(store).await {
            info!(target: "annotate", "annotation disabled; not starting");
            return None;
        }
        let catalog = read_catalog(store).await;
        match &catalog {
            Some(c) => debug!(
                target: "annotate",
                updated_at = %c.updated_at,
                styles = c.styles.len(),
                "annotator started"
            ),
            None => info!(target: "annotate", "annotator started without style data"),
        }
        Some(Self::new(catalog, contract))
    }

    pub fn catalog(&self) -> Option<&Catalog> {
        self.catalog.as_deref()
    }

    /// Every score element with a parsable score, processed or not, in
    /// document order. Read-only; nothing is marked.
    pub fn items(&self, doc: &Document) -> Vec<RatingItem> {
        let contract = &self.contract;
        doc.find_elements(doc.root(), |el| contract.is_score_element(el))
            .into_iter()
            .filter_map(|el| {
                let raw_score = extract::raw_score(doc, el, contract)?;
                let style_name = extract::find_card(doc, el, contract)
                    .and_then(|card| extract::style_label(doc, card, contract));
                let processed = doc
                    .element(el)
                    .is_some_and(|e| !contract.is_candidate(e));
                Some(RatingItem {
                    element: el,
                    raw_score,
                    style_name,
                    processed,
                })
            })
            .collect()
    }

    /// Unprocessed score elements, in document order.
    pub fn candidates(&self, doc: &Document) -> Vec<NodeId> {
        doc.find_elements(doc.root(), |el| self.contract.is_candidate(el))
    }

    /// One reconciliation pass over the current document.
    pub fn scan(&self, doc: &mut Document) -> ScanReport {
        ensure_metrics_described();
        let t0 = std::time::Instant::now();

        let candidates = self.candidates(doc);
        let mut report = ScanReport {
            passes: 1,
            candidates: candidates.len(),
            ..ScanReport::default()
        };

        for el in candidates {
            match self.process(doc, el) {
                Ok(_) => {
                    report.badges += 1;
                    counter!("annotate_badges_total").increment(1);
                }
                Err(reason) => {
                    debug!(target: "annotate", node = ?el, reason = reason.as_str(), "no badge");
                    *report.skipped.entry(reason).or_insert(0) += 1;
                    counter!("annotate_skipped_total", "reason" => reason.as_str()).increment(1);
                }
            }
        }

        histogram!("annotate_scan_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        if report.candidates > 0 {
            debug!(
                target: "annotate",
                candidates = report.candidates,
                badges = report.badges,
                "scan finished"
            );
        }
        report
    }

    fn process(&self, doc: &mut Document, el: NodeId) -> Result<NodeId, SkipReason> {
        let contract = &self.contract;
        doc.set_attr(el, &contract.marker_attr, "1");

        let raw_score =
            extract::raw_score(doc, el, contract).ok_or(SkipReason::UnparsableScore)?;
        let mut item = RatingItem {
            element: el,
            raw_score,
            style_name: None,
            processed: true,
        };

        let catalog = self.catalog.as_deref().ok_or(SkipReason::NoCatalog)?;
        let card = extract::find_card(doc, el, contract).ok_or(SkipReason::MissingCard)?;
        item.style_name = extract::style_label(doc, card, contract);
        let style = item
            .style_name
            .as_deref()
            .ok_or(SkipReason::MissingStyleLabel)?;

        let adjusted =
            compute_adjusted(item.raw_score, style, catalog).ok_or(SkipReason::UnknownStyle)?;
        badge::insert_badge(doc, item.element, adjusted, style, contract)
            .map_err(|_| SkipReason::InsertFailed)
    }
}
