//! Builds the published catalog from raw per-style scores.
//!
//! Input is `{ "<style>": [score, ...] }`. Means and sample standard
//! deviations (N-1) are rounded to 4 decimals. Styles with fewer than two
//! scores are left out.

use anyhow::{bail, Result};
use std::collections::BTreeMap;

use crate::catalog::{Catalog, GlobalStatistics, StyleStatistics};

pub type RawScores = BTreeMap<String, Vec<f64>>;

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

/// Mean and sample standard deviation; `None` below two values.
fn mean_and_stdev(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some((mean, var.sqrt()))
}

pub fn compute_style_stats(scores: &[f64]) -> Option<StyleStatistics> {
    let (mean, std) = mean_and_stdev(scores)?;
    Some(StyleStatistics {
        mean: round4(mean),
        std: round4(std),
        sample_size: scores.len() as u64,
    })
}

pub fn compute_global_stats(raw: &RawScores) -> Option<GlobalStatistics> {
    let all: Vec<f64> = raw.values().flatten().copied().collect();
    let (mean, std) = mean_and_stdev(&all)?;
    Some(GlobalStatistics {
        mean: round4(mean),
        std: round4(std),
    })
}

/// `updated_at` defaults to today's UTC date (`YYYY-MM-DD`).
pub fn build_catalog(raw: &RawScores, updated_at: Option<&str>) -> Result<Catalog> {
    let clean: RawScores = raw
        .iter()
        .map(|(style, scores)| {
            let kept = scores.iter().copied().filter(|s| s.is_finite()).collect();
            (style.trim().to_string(), kept)
        })
        .filter(|(style, _)| !style.is_empty())
        .collect();

    let Some(global) = compute_global_stats(&clean) else {
        bail!("need at least two scores to build a catalog");
    };
    let styles = clean
        .iter()
        .filter_map(|(style, scores)| compute_style_stats(scores).map(|s| (style.clone(), s)))
        .collect();

    let catalog = Catalog {
        updated_at: updated_at
            .map(str::to_string)
            .unwrap_or_else(|| chrono::Utc::now().date_naive().to_string()),
        global,
        styles,
    };
    catalog.validate()?;
    Ok(catalog)
}

/// Group harvested `(score, style)` pairs by style.
pub fn group_by_style<I>(pairs: I) -> RawScores
where
    I: IntoIterator<Item = (f64, String)>,
{
    let mut out = RawScores::new();
    for (score, style) in pairs {
        out.entry(style).or_default().push(score);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawScores {
        let mut r = RawScores::new();
        r.insert("American Adjunct Lager".into(), vec![3.0, 3.2, 3.4, 3.6, 3.8]);
        r.insert("Imperial Stout".into(), vec![3.8, 4.0, 4.2, 4.4, 4.6]);
        r
    }

    #[test]
    fn style_stats_use_sample_stdev() {
        let s = compute_style_stats(&raw()["American Adjunct Lager"]).unwrap();
        assert!((s.mean - 3.4).abs() < 0.01);
        assert!((s.std - 0.3162).abs() < 0.01);
        assert_eq!(s.sample_size, 5);
    }

    #[test]
    fn global_stats_use_all_scores() {
        let g = compute_global_stats(&raw()).unwrap();
        assert!((g.mean - 3.8).abs() < 1e-9);
        // stdev of the ten values combined
        assert!((g.std - 0.4899).abs() < 0.001, "got {}", g.std);
    }

    #[test]
    fn output_structure() {
        let c = build_catalog(&raw(), Some("2026-02-27")).unwrap();
        assert_eq!(c.updated_at, "2026-02-27");
        assert_eq!(c.styles["American Adjunct Lager"].sample_size, 5);
        assert_eq!(c.styles.len(), 2);
    }

    #[test]
    fn default_updated_at_is_a_date() {
        let c = build_catalog(&raw(), None).unwrap();
        assert!(chrono::NaiveDate::parse_from_str(&c.updated_at, "%Y-%m-%d").is_ok());
    }

    #[test]
    fn rounded_to_four_decimals() {
        let s = compute_style_stats(&[3.123456789, 3.987654321]).unwrap();
        for v in [s.mean, s.std] {
            assert!(((v * 10_000.0).round() - v * 10_000.0).abs() < 1e-6);
        }
    }

    #[test]
    fn single_score_styles_are_dropped() {
        let mut r = raw();
        r.insert("Gruit".into(), vec![3.3]);
        let c = build_catalog(&r, Some("x")).unwrap();
        assert!(!c.styles.contains_key("Gruit"));
    }

    #[test]
    fn too_few_scores_is_an_error() {
        let mut r = RawScores::new();
        r.insert("Gruit".into(), vec![3.3]);
        assert!(build_catalog(&r, None).is_err());
    }

    #[test]
    fn groups_pairs() {
        let g = group_by_style(vec![(3.0, "A".to_string()), (4.0, "B".into()), (3.5, "A".into())]);
        assert_eq!(g["A"], vec![3.0, 3.5]);
        assert_eq!(g["B"], vec![4.0]);
    }
}
