// src/annotate/reconcile.rs
//! Keeps a live page annotated while it changes.
//!
//! `LivePage` is the mutation source: every `mutate()` call notifies
//! subscribers. The reconciler scans once at start and once per observed
//! batch of notifications; notifications that arrive while a scan runs are
//! folded into the next batch. Badge insertions made by the reconciler do
//! not notify.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{Annotator, ScanReport};
use crate::page::Document;

pub struct LivePage {
    doc: Arc<Mutex<Document>>,
    revision: watch::Sender<u64>,
}

impl LivePage {
    pub fn new(doc: Document) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            doc: Arc::new(Mutex::new(doc)),
            revision,
        }
    }

    /// Apply a change and notify subscribers.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        let out = {
            let mut g = self.doc.lock().expect("page mutex poisoned");
            f(&mut g)
        };
        self.revision.send_modify(|r| *r += 1);
        out
    }

    pub fn read<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        let g = self.doc.lock().expect("page mutex poisoned");
        f(&g)
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    pub fn document(&self) -> Arc<Mutex<Document>> {
        Arc::clone(&self.doc)
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

/// Runs scans against a shared document on request.
pub struct Reconciler {
    annotator: Arc<Annotator>,
    doc: Arc<Mutex<Document>>,
    total: ScanReport,
}

impl Reconciler {
    pub fn new(annotator: Arc<Annotator>, doc: Arc<Mutex<Document>>) -> Self {
        Self {
            annotator,
            doc,
            total: ScanReport::default(),
        }
    }

    pub fn reconcile(&mut self) -> ScanReport {
        let report = {
            let mut g = self.doc.lock().expect("page mutex poisoned");
            self.annotator.scan(&mut g)
        };
        self.total.merge(&report);
        report
    }

    pub fn total(&self) -> &ScanReport {
        &self.total
    }
}

/// Scan now, then after every batch of mutations until `page` is dropped.
/// Resolves to the combined report of all passes.
pub fn spawn_reconciler(annotator: Arc<Annotator>, page: &LivePage) -> JoinHandle<ScanReport> {
    let mut rx = page.subscribe();
    let mut reconciler = Reconciler::new(annotator, page.document());
    tokio::spawn(async move {
        reconciler.reconcile();
        while rx.changed().await.is_ok() {
            let rev = *rx.borrow_and_update();
            let r = reconciler.reconcile();
            tracing::trace!(target: "annotate", revision = rev, badges = r.badges, "mutation batch reconciled");
        }
        reconciler.total().clone()
    })
}
