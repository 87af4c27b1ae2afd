//! Build a `style-averages.json` catalog.
//!
//! Usage: `build_catalog [--updated-at YYYY-MM-DD] OUT.json INPUT...`
//!
//! Inputs ending in `.json` hold raw scores (`{"<style>": [score, ...]}`);
//! `.html` inputs are saved listing pages whose cards are harvested for
//! `(score, style)` pairs. All inputs are merged before the statistics are
//! computed.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use style_adjust::annotate::extract::collect_card_ratings;
use style_adjust::config::AppConfig;
use style_adjust::page::Document;
use style_adjust::summary::{build_catalog, group_by_style, RawScores};
use tracing::info;

#[derive(Parser, Debug)]
#[command(about = "Build a style statistics catalog from raw scores or saved pages")]
struct Args {
    /// Value for `updated_at`; defaults to today.
    #[arg(long, value_name = "YYYY-MM-DD")]
    updated_at: Option<String>,
    /// Catalog file to write.
    out: PathBuf,
    /// Raw-score `.json` files or saved `.html` pages.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

fn load_input(path: &Path, cfg: &AppConfig, into: &mut RawScores) -> Result<()> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let scores = match ext.as_deref() {
        Some("json") => serde_json::from_str::<RawScores>(&body)
            .with_context(|| format!("parsing raw scores {}", path.display()))?,
        Some("html") | Some("htm") => {
            let doc = Document::parse_html(&body)
                .with_context(|| format!("parsing page {}", path.display()))?;
            group_by_style(collect_card_ratings(&doc, &cfg.contract))
        }
        _ => bail!("unsupported input {} (expected .json or .html)", path.display()),
    };
    let n: usize = scores.values().map(Vec::len).sum();
    info!(input = %path.display(), styles = scores.len(), scores = n, "input loaded");
    for (style, mut s) in scores {
        into.entry(style).or_default().append(&mut s);
    }
    Ok(())
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let args = Args::parse();

    let cfg = AppConfig::load_default()?;
    let mut raw = RawScores::new();
    for p in &args.inputs {
        load_input(p, &cfg, &mut raw)?;
    }

    let catalog = build_catalog(&raw, args.updated_at.as_deref())?;
    let out = &args.out;
    let json = serde_json::to_string_pretty(&catalog)?;
    if let Some(dir) = out.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    std::fs::write(out, json).with_context(|| format!("writing {}", out.display()))?;
    info!(
        out = %out.display(),
        styles = catalog.styles.len(),
        updated_at = %catalog.updated_at,
        "catalog written"
    );
    Ok(())
}
