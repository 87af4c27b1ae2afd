//! # Page model
//! Arena-backed element tree for a ratings page.
//!
//! Nodes are never freed: detaching a node removes it from its parent but
//! keeps its `NodeId` valid, and ids are never reused. A `NodeId` is
//! therefore a stable element identity for the lifetime of the document;
//! re-inserting equivalent markup creates new ids.

pub mod contract;
pub mod parse;

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};

/// Elements that never have children or an end tag.
pub(crate) const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

pub(crate) fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    /// Lowercase tag name.
    pub name: String,
    /// Lowercase names, decoded values, source order.
    pub attrs: Vec<(String, String)>,
}

impl ElementData {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            attrs: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|c| c.split_ascii_whitespace().any(|t| t == class))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Root,
    Element(ElementData),
    Text(String),
    Comment(String),
    /// `<!DOCTYPE ...>` content, kept for serialization.
    Doctype(String),
    /// Body of a `<script>` or `<style>` element, kept byte for byte.
    RawText(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                data: NodeData::Root,
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[0].children.is_empty()
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            data,
        });
        NodeId(self.nodes.len() - 1)
    }

    /// New detached element.
    pub fn create_element(&mut self, name: &str, attrs: &[(&str, &str)]) -> NodeId {
        let mut el = ElementData::new(name);
        for (k, v) in attrs {
            el.attrs.push((k.to_ascii_lowercase(), v.to_string()));
        }
        self.push(NodeData::Element(el))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    pub(crate) fn create_node(&mut self, data: NodeData) -> NodeId {
        self.push(data)
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes[id.0].data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes[id.0].data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.name.as_str())
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|e| e.attr(name))
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id).map(|e| e.has_class(class)).unwrap_or(false)
    }

    /// Set or replace an attribute. No-op on non-elements.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        if let Some(el) = self.element_mut(id) {
            match el.attrs.iter_mut().find(|(k, _)| *k == name) {
                Some((_, v)) => *v = value.to_string(),
                None => el.attrs.push((name, value.to_string())),
            }
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Attach `child` as the last child of `parent`, detaching it first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Insert `new` as the next sibling of `reference`.
    pub fn insert_after(&mut self, reference: NodeId, new: NodeId) -> Result<()> {
        if reference == new {
            bail!("cannot insert a node after itself");
        }
        let Some(parent) = self.parent(reference) else {
            bail!("reference node is detached");
        };
        self.detach(new);
        let siblings = &mut self.nodes[parent.0].children;
        let pos = siblings
            .iter()
            .position(|&c| c == reference)
            .map(|p| p + 1)
            .unwrap_or(siblings.len());
        siblings.insert(pos, new);
        self.nodes[new.0].parent = Some(parent);
        Ok(())
    }

    /// Remove `id` from its parent. The subtree stays addressable.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    pub fn next_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&c| c == id)?;
        siblings[pos + 1..]
            .iter()
            .copied()
            .find(|&c| self.element(c).is_some())
    }

    /// All nodes below `id` in document order (pre-order), excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children(n).iter().rev().copied());
        }
        out
    }

    /// Element descendants of `id` accepted by `pred`, in document order.
    pub fn find_elements<F>(&self, id: NodeId, mut pred: F) -> Vec<NodeId>
    where
        F: FnMut(&ElementData) -> bool,
    {
        self.descendants(id)
            .into_iter()
            .filter(|&n| self.element(n).map(&mut pred).unwrap_or(false))
            .collect()
    }

    /// Nearest inclusive ancestor element accepted by `pred`.
    pub fn closest<F>(&self, id: NodeId, pred: F) -> Option<NodeId>
    where
        F: Fn(&ElementData) -> bool,
    {
        let mut cur = Some(id);
        while let Some(n) = cur {
            if let Some(el) = self.element(n) {
                if pred(el) {
                    return Some(n);
                }
            }
            cur = self.parent(n);
        }
        None
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for n in std::iter::once(id).chain(self.descendants(id)) {
            if let NodeData::Text(t) | NodeData::RawText(t) = self.data(n) {
                out.push_str(t);
            }
        }
        out
    }

    /// Serialize the whole document.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for &c in self.children(self.root()) {
            self.write_node(c, &mut out);
        }
        out
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match self.data(id) {
            NodeData::Root => {
                for &c in self.children(id) {
                    self.write_node(c, out);
                }
            }
            NodeData::Text(t) => out.push_str(&html_escape::encode_text(t)),
            NodeData::RawText(t) => out.push_str(t),
            NodeData::Comment(c) => {
                out.push_str("<!--");
                out.push_str(c);
                out.push_str("-->");
            }
            NodeData::Doctype(d) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(d.trim());
                out.push('>');
            }
            NodeData::Element(el) => {
                out.push('<');
                out.push_str(&el.name);
                for (k, v) in &el.attrs {
                    out.push(' ');
                    out.push_str(k);
                    out.push_str("=\"");
                    out.push_str(&html_escape::encode_double_quoted_attribute(v));
                    out.push('"');
                }
                out.push('>');
                if is_void(&el.name) {
                    return;
                }
                for &c in self.children(id) {
                    self.write_node(c, out);
                }
                out.push_str("</");
                out.push_str(&el.name);
                out.push('>');
            }
        }
    }
}

/// Short, anonymized page id for logs. Never log page content.
pub fn page_digest(html: &str) -> String {
    let digest = Sha256::digest(html.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        let root = doc.root();
        let div = doc.create_element("div", &[("class", "beer-item big")]);
        doc.append_child(root, div);
        let a = doc.create_element("span", &[("id", "a")]);
        let b = doc.create_element("span", &[("id", "b")]);
        doc.append_child(div, a);
        let t = doc.create_text("between");
        doc.append_child(div, t);
        doc.append_child(div, b);
        (doc, div, a, b)
    }

    #[test]
    fn class_tokens_match_exactly() {
        let (doc, div, ..) = sample();
        assert!(doc.has_class(div, "beer-item"));
        assert!(doc.has_class(div, "big"));
        assert!(!doc.has_class(div, "beer"));
    }

    #[test]
    fn next_element_sibling_skips_text() {
        let (doc, _, a, b) = sample();
        assert_eq!(doc.next_element_sibling(a), Some(b));
        assert_eq!(doc.next_element_sibling(b), None);
    }

    #[test]
    fn insert_after_places_node_as_next_sibling() {
        let (mut doc, div, a, _) = sample();
        let badge = doc.create_element("em", &[]);
        doc.insert_after(a, badge).unwrap();
        assert_eq!(doc.children(div)[1], badge);
        assert_eq!(doc.next_element_sibling(a), Some(badge));
    }

    #[test]
    fn insert_after_detached_reference_fails() {
        let mut doc = Document::new();
        let a = doc.create_element("p", &[]);
        let b = doc.create_element("p", &[]);
        assert!(doc.insert_after(a, b).is_err());
    }

    #[test]
    fn detach_keeps_identity_but_disconnects() {
        let (mut doc, div, a, _) = sample();
        doc.detach(div);
        assert!(doc.children(doc.root()).is_empty());
        assert_eq!(doc.parent(div), None);
        assert_eq!(doc.closest(a, |e| e.has_class("beer-item")), Some(div));
        assert_eq!(doc.attr(a, "id"), Some("a"));
    }

    #[test]
    fn closest_includes_self() {
        let (doc, div, a, _) = sample();
        assert_eq!(doc.closest(a, |e| e.name == "span"), Some(a));
        assert_eq!(doc.closest(a, |e| e.has_class("beer-item")), Some(div));
        assert_eq!(doc.closest(a, |e| e.name == "table"), None);
    }

    #[test]
    fn serializes_with_escaping() {
        let mut doc = Document::new();
        let root = doc.root();
        let p = doc.create_element("p", &[("title", "a \"b\" & c")]);
        doc.append_child(root, p);
        let t = doc.create_text("1 < 2 & 3");
        doc.append_child(p, t);
        let br = doc.create_element("br", &[]);
        doc.append_child(root, br);
        assert_eq!(
            doc.to_html(),
            r#"<p title="a &quot;b&quot; &amp; c">1 &lt; 2 &amp; 3</p><br>"#
        );
    }

    #[test]
    fn digest_is_short_and_stable() {
        assert_eq!(page_digest("abc"), page_digest("abc"));
        assert_eq!(page_digest("abc").len(), 12);
        assert_ne!(page_digest("abc"), page_digest("abd"));
    }
}
