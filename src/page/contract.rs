//! Markup contract of the host ratings page.
//!
//! ```html
//! <div class="beer-item">
//!   <p class="style"><a href="/Brewery">Side Project Brewing</a></p>
//!   <p class="style">Barleywine - English</p>
//!   <div class="caps" data-rating="4.783"></div>
//!   <span class="num">(4.78)</span>
//! </div>
//! ```

use serde::{Deserialize, Serialize};

use super::{Document, ElementData, NodeId};

fn default_card_class() -> String {
    "beer-item".into()
}
fn default_score_tag() -> String {
    "div".into()
}
fn default_score_class() -> String {
    "caps".into()
}
fn default_score_attr() -> String {
    "data-rating".into()
}
fn default_label_tag() -> String {
    "p".into()
}
fn default_label_class() -> String {
    "style".into()
}
fn default_label_excluded() -> Vec<String> {
    vec!["a".into(), "strong".into()]
}
fn default_score_text_class() -> String {
    "num".into()
}
fn default_badge_class() -> String {
    "unorm-badge".into()
}
fn default_marker_attr() -> String {
    "data-unorm".into()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageContract {
    /// Class of the item card wrapping one rated item.
    #[serde(default = "default_card_class")]
    pub card_class: String,
    #[serde(default = "default_score_tag")]
    pub score_tag: String,
    #[serde(default = "default_score_class")]
    pub score_class: String,
    /// Attribute carrying the raw numeric rating.
    #[serde(default = "default_score_attr")]
    pub score_attr: String,
    #[serde(default = "default_label_tag")]
    pub label_tag: String,
    #[serde(default = "default_label_class")]
    pub label_class: String,
    /// A label containing any of these tags is a link-bearing variant, not
    /// the plain style name.
    #[serde(default = "default_label_excluded")]
    pub label_excluded_children: Vec<String>,
    /// Class of the sibling showing the score as text, e.g. `(4.78)`.
    #[serde(default = "default_score_text_class")]
    pub score_text_class: String,
    #[serde(default = "default_badge_class")]
    pub badge_class: String,
    /// Set on every score element once processed.
    #[serde(default = "default_marker_attr")]
    pub marker_attr: String,
}

impl Default for PageContract {
    fn default() -> Self {
        Self {
            card_class: default_card_class(),
            score_tag: default_score_tag(),
            score_class: default_score_class(),
            score_attr: default_score_attr(),
            label_tag: default_label_tag(),
            label_class: default_label_class(),
            label_excluded_children: default_label_excluded(),
            score_text_class: default_score_text_class(),
            badge_class: default_badge_class(),
            marker_attr: default_marker_attr(),
        }
    }
}

impl PageContract {
    /// Lowercase tag/attribute names (the parser lowercases them) and
    /// restore empty fields to their defaults.
    pub fn sanitize(&mut self) {
        fn fix(v: &mut String, lower: bool, default: fn() -> String) {
            let t = v.trim();
            *v = if t.is_empty() {
                default()
            } else if lower {
                t.to_ascii_lowercase()
            } else {
                t.to_string()
            };
        }
        fix(&mut self.card_class, false, default_card_class);
        fix(&mut self.score_tag, true, default_score_tag);
        fix(&mut self.score_class, false, default_score_class);
        fix(&mut self.score_attr, true, default_score_attr);
        fix(&mut self.label_tag, true, default_label_tag);
        fix(&mut self.label_class, false, default_label_class);
        fix(&mut self.score_text_class, false, default_score_text_class);
        fix(&mut self.badge_class, false, default_badge_class);
        fix(&mut self.marker_attr, true, default_marker_attr);
        self.label_excluded_children = self
            .label_excluded_children
            .iter()
            .map(|t| t.trim().to_ascii_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
    }

    pub fn is_card(&self, el: &ElementData) -> bool {
        el.has_class(&self.card_class)
    }

    /// `div.caps[data-rating]`, regardless of processing state.
    pub fn is_score_element(&self, el: &ElementData) -> bool {
        el.name == self.score_tag
            && el.has_class(&self.score_class)
            && el.attr(&self.score_attr).is_some()
    }

    /// Score element not yet marked as processed.
    pub fn is_candidate(&self, el: &ElementData) -> bool {
        self.is_score_element(el) && el.attr(&self.marker_attr).is_none()
    }

    pub fn is_label(&self, el: &ElementData) -> bool {
        el.name == self.label_tag && el.has_class(&self.label_class)
    }

    pub fn is_score_text(&self, el: &ElementData) -> bool {
        el.has_class(&self.score_text_class)
    }

    /// A label is plain when no descendant is one of the excluded tags.
    pub fn is_plain_label(&self, doc: &Document, label: NodeId) -> bool {
        doc.find_elements(label, |el| {
            self.label_excluded_children.iter().any(|t| *t == el.name)
        })
        .is_empty()
    }
}
