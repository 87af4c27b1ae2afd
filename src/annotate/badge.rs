// src/annotate/badge.rs
use anyhow::Result;

use crate::page::contract::PageContract;
use crate::page::{Document, NodeId};

pub fn badge_text(adjusted: f64) -> String {
    format!("★ {:.2}", round_half_away(adjusted))
}

/// `{:.2}` rounds exact ties to even; displayed scores round them away
/// from zero. Only multiples of 1/8 with an odd numerator tie exactly.
fn round_half_away(x: f64) -> f64 {
    let eighths = x * 8.0;
    if eighths.is_finite() && eighths.fract() == 0.0 && eighths.abs() % 2.0 == 1.0 {
        (x.abs() * 100.0).ceil() / 100.0 * x.signum()
    } else {
        x
    }
}

/// Insert the badge after the score's text sibling (`span.num`) when there
/// is one, else right after the score element.
pub fn insert_badge(
    doc: &mut Document,
    score_el: NodeId,
    adjusted: f64,
    style_name: &str,
    contract: &PageContract,
) -> Result<NodeId> {
    let title = format!("Style-adjusted score ({style_name})");
    let badge = doc.create_element(
        "span",
        &[("class", contract.badge_class.as_str()), ("title", title.as_str())],
    );
    let text = doc.create_text(&badge_text(adjusted));
    doc.append_child(badge, text);

    let target = doc
        .next_element_sibling(score_el)
        .filter(|&n| doc.element(n).is_some_and(|e| contract.is_score_text(e)))
        .unwrap_or(score_el);
    doc.insert_after(target, badge)?;
    Ok(badge)
}
