// src/annotate/extract.rs
use once_cell::sync::Lazy;
use regex::Regex;

use crate::page::contract::PageContract;
use crate::page::{Document, NodeId};

// Leading decimal number, like JavaScript's parseFloat.
static RE_LEADING_FLOAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?)").expect("float regex")
});

/// Parse the leading number of an attribute value (`"4.5"`, `" 3.21 "`,
/// `"4.5 of 5"`). Non-finite results are rejected.
pub fn parse_score(raw: &str) -> Option<f64> {
    let caps = RE_LEADING_FLOAT.captures(raw)?;
    let v: f64 = caps.get(1)?.as_str().parse().ok()?;
    v.is_finite().then_some(v)
}

/// Raw rating of a score element.
pub fn raw_score(doc: &Document, score_el: NodeId, contract: &PageContract) -> Option<f64> {
    doc.attr(score_el, &contract.score_attr).and_then(parse_score)
}

/// Nearest item card containing (or being) `el`.
pub fn find_card(doc: &Document, el: NodeId, contract: &PageContract) -> Option<NodeId> {
    doc.closest(el, |e| contract.is_card(e))
}

/// Text of the first plain style label in `card`. A card whose first plain
/// label is blank has no style.
pub fn style_label(doc: &Document, card: NodeId, contract: &PageContract) -> Option<String> {
    let label = doc
        .find_elements(card, |e| contract.is_label(e))
        .into_iter()
        .find(|&p| contract.is_plain_label(doc, p))?;
    let text = doc.text_content(label).trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// `(score, style)` for every card with a parsable rating and a plain style
/// label, in document order. Used to harvest raw scores from saved pages.
pub fn collect_card_ratings(doc: &Document, contract: &PageContract) -> Vec<(f64, String)> {
    let mut out = Vec::new();
    for card in doc.find_elements(doc.root(), |e| contract.is_card(e)) {
        let Some(score_el) = doc
            .find_elements(card, |e| contract.is_score_element(e))
            .into_iter()
            .next()
        else {
            continue;
        };
        let Some(score) = raw_score(doc, score_el, contract) else {
            continue;
        };
        let Some(style) = style_label(doc, card, contract) else {
            continue;
        };
        out.push((score, style));
    }
    out
}
