//! Annotate a saved page offline.
//!
//! Usage: `annotate_page [--catalog FILE] PAGE.html [FRAGMENT.html ...]`
//!
//! Without `--catalog` the cached catalog from the configured store is used
//! (and the `enabled` flag honoured). Every FRAGMENT is appended to the page
//! body as a separate mutation, the way infinite scroll loads more items.
//! The annotated page goes to stdout.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use style_adjust::annotate::reconcile::{spawn_reconciler, LivePage};
use style_adjust::annotate::Annotator;
use style_adjust::catalog::Catalog;
use style_adjust::config::AppConfig;
use style_adjust::page::Document;
use style_adjust::stats::store::JsonFileStore;

#[derive(Parser, Debug)]
#[command(about = "Annotate a saved listing page with style-adjusted badges")]
struct Args {
    /// Catalog JSON to use instead of the cached one.
    #[arg(long)]
    catalog: Option<PathBuf>,
    /// Saved page.
    page: PathBuf,
    /// Fragments appended to the body one mutation at a time.
    fragments: Vec<PathBuf>,
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let cfg = AppConfig::load_default()?;

    let annotator = match &args.catalog {
        Some(path) => {
            let catalog = Catalog::from_json(&read(path)?)
                .with_context(|| format!("parsing catalog {}", path.display()))?;
            Some(Annotator::new(Some(catalog), cfg.contract.clone()))
        }
        None => {
            let store = JsonFileStore::new(&cfg.store_path);
            Annotator::start(&store, cfg.contract.clone()).await
        }
    };

    let html = read(&args.page)?;
    let Some(annotator) = annotator else {
        print!("{html}");
        return Ok(());
    };

    let doc = Document::parse_html(&html)
        .with_context(|| format!("parsing {}", args.page.display()))?;
    let page = LivePage::new(doc);
    let annotator = Arc::new(annotator);
    let handle = spawn_reconciler(Arc::clone(&annotator), &page);

    for path in &args.fragments {
        let fragment = read(path)?;
        page.mutate(|d| {
            let target = d
                .find_elements(d.root(), |e| e.name == "body")
                .into_iter()
                .next()
                .unwrap_or_else(|| d.root());
            d.append_html(target, &fragment)
        })
        .with_context(|| format!("parsing fragment {}", path.display()))?;
        tokio::task::yield_now().await;
    }

    let doc = page.document();
    drop(page);
    let report = handle.await.context("reconciler task")?;
    let doc = doc.lock().expect("page mutex poisoned");
    let unprocessed = annotator
        .items(&doc)
        .iter()
        .filter(|item| !item.processed)
        .count();
    eprintln!(
        "passes={} candidates={} badges={} unprocessed={}",
        report.passes, report.candidates, report.badges, unprocessed
    );
    let out = doc.to_html();
    print!("{out}");
    Ok(())
}
