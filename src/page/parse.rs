// src/page/parse.rs
//! Lenient HTML tokenizing on top of quick-xml.
//!
//! Handles what ratings pages actually contain: void elements without a
//! closing slash, unquoted/valueless attributes, HTML entities such as
//! `&nbsp;`, and stray or mismatched end tags. `<script>` and `<style>`
//! bodies bypass the tokenizer and are kept verbatim.

use anyhow::{anyhow, Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{is_void, Document, ElementData, NodeData, NodeId};

/// Elements whose content is not markup.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Byte offset of the first `</name` (any case) in `hay`.
fn find_close_tag(hay: &str, name: &str) -> Option<usize> {
    let pat = format!("</{name}");
    hay.as_bytes()
        .windows(pat.len())
        .position(|w| w.eq_ignore_ascii_case(pat.as_bytes()))
}

fn decode(raw: &[u8]) -> Result<String> {
    let s = std::str::from_utf8(raw).context("page is not valid utf-8")?;
    Ok(html_escape::decode_html_entities(s).into_owned())
}

fn element_from(start: &BytesStart<'_>) -> Result<ElementData> {
    let name = std::str::from_utf8(start.name().as_ref())
        .context("tag name is not valid utf-8")?
        .to_ascii_lowercase();
    let mut el = ElementData::new(&name);
    for attr in start.html_attributes().flatten() {
        let key = std::str::from_utf8(attr.key.as_ref())
            .context("attribute name is not valid utf-8")?
            .to_ascii_lowercase();
        if el.attrs.iter().any(|(k, _)| *k == key) {
            // First occurrence wins, as in browsers.
            continue;
        }
        let value = decode(&attr.value)?;
        el.attrs.push((key, value));
    }
    Ok(el)
}

impl Document {
    /// Parse a full page or a fragment into a new document.
    pub fn parse_html(html: &str) -> Result<Self> {
        let mut doc = Document::new();
        let root = doc.root();
        doc.append_html(root, html)?;
        Ok(doc)
    }

    /// Parse `html` and append the resulting nodes under `parent`.
    /// Returns the new top-level nodes in order.
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> Result<Vec<NodeId>> {
        let mut added = Vec::new();
        // Open elements; the bottom entry is `parent` itself.
        let mut stack: Vec<NodeId> = vec![parent];
        let mut pos = 0;
        while pos < html.len() {
            pos = self.parse_segment(html, pos, &mut stack, &mut added)?;
        }
        Ok(added)
    }

    /// Tokenize `html[start..]` until the input ends or a raw-text element
    /// has been consumed. Returns the offset to resume from.
    fn parse_segment(
        &mut self,
        html: &str,
        start: usize,
        stack: &mut Vec<NodeId>,
        added: &mut Vec<NodeId>,
    ) -> Result<usize> {
        let parent = stack[0];
        let mut reader = Reader::from_str(&html[start..]);
        {
            let cfg = reader.config_mut();
            cfg.check_end_names = false;
            cfg.allow_unmatched_ends = true;
            cfg.check_comments = false;
        }

        loop {
            let event = reader.read_event().map_err(|e| {
                anyhow!(
                    "html parse error at byte {}: {e}",
                    start + reader.buffer_position() as usize
                )
            })?;
            let current = *stack.last().unwrap_or(&parent);

            let new_node = match event {
                Event::Start(tag) => {
                    let el = element_from(&tag)?;
                    if RAW_TEXT_ELEMENTS.contains(&el.name.as_str()) {
                        let name = el.name.clone();
                        let id = self.create_node(NodeData::Element(el));
                        self.append_child(current, id);
                        if current == parent {
                            added.push(id);
                        }

                        let body_start = start + reader.buffer_position() as usize;
                        let rest = &html[body_start..];
                        // An unclosed raw-text element runs to the end of input.
                        let (body, resume) = match find_close_tag(rest, &name) {
                            Some(i) => {
                                let end = rest[i..].find('>').map_or(rest.len(), |j| i + j + 1);
                                (&rest[..i], body_start + end)
                            }
                            None => (rest, html.len()),
                        };
                        if !body.is_empty() {
                            let t = self.create_node(NodeData::RawText(body.to_string()));
                            self.append_child(id, t);
                        }
                        return Ok(resume);
                    }
                    let void = is_void(&el.name);
                    let id = self.create_node(NodeData::Element(el));
                    self.append_child(current, id);
                    if !void {
                        stack.push(id);
                    }
                    Some(id)
                }
                Event::Empty(tag) => {
                    let el = element_from(&tag)?;
                    let id = self.create_node(NodeData::Element(el));
                    self.append_child(current, id);
                    Some(id)
                }
                Event::End(end) => {
                    let name = std::str::from_utf8(end.name().as_ref())
                        .context("end tag name is not valid utf-8")?
                        .to_ascii_lowercase();
                    // Close up to the nearest matching open element; ignore strays.
                    if let Some(pos) = stack
                        .iter()
                        .skip(1)
                        .rposition(|&n| self.tag_name(n) == Some(name.as_str()))
                    {
                        stack.truncate(pos + 1);
                    }
                    None
                }
                Event::Text(text) => {
                    let t = decode(&text)?;
                    if t.is_empty() {
                        None
                    } else {
                        let id = self.create_node(NodeData::Text(t));
                        self.append_child(current, id);
                        Some(id)
                    }
                }
                Event::CData(data) => {
                    let t = String::from_utf8_lossy(&data).into_owned();
                    let id = self.create_node(NodeData::Text(t));
                    self.append_child(current, id);
                    Some(id)
                }
                Event::Comment(c) => {
                    let t = String::from_utf8_lossy(&c).into_owned();
                    let id = self.create_node(NodeData::Comment(t));
                    self.append_child(current, id);
                    Some(id)
                }
                Event::DocType(d) => {
                    let t = String::from_utf8_lossy(&d).into_owned();
                    let id = self.create_node(NodeData::Doctype(t));
                    self.append_child(current, id);
                    Some(id)
                }
                Event::Eof => return Ok(html.len()),
                _ => None,
            };

            if let Some(id) = new_node {
                if current == parent {
                    added.push(id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_markup_and_attributes() {
        let doc = Document::parse_html(
            r#"<div class="beer-item" data-bid="1"><div class="caps" data-rating="4.783"></div><span class="num">(4.78)</span></div>"#,
        )
        .unwrap();
        let root = doc.root();
        let item = doc.children(root)[0];
        assert_eq!(doc.tag_name(item), Some("div"));
        assert_eq!(doc.attr(item, "data-bid"), Some("1"));
        let caps = doc.children(item)[0];
        assert_eq!(doc.attr(caps, "data-rating"), Some("4.783"));
        assert_eq!(doc.text_content(item), "(4.78)");
    }

    #[test]
    fn void_elements_do_not_swallow_siblings() {
        let doc = Document::parse_html("<p>a<br>b<img src=x.png>c</p><p>d</p>").unwrap();
        let root = doc.root();
        assert_eq!(doc.children(root).len(), 2);
        let p = doc.children(root)[0];
        assert_eq!(doc.text_content(p), "abc");
    }

    #[test]
    fn decodes_entities_in_text_and_attributes() {
        let doc = Document::parse_html(r#"<p title="Fish &amp; Chips">K&ouml;lsch&nbsp;!</p>"#)
            .unwrap();
        let p = doc.children(doc.root())[0];
        assert_eq!(doc.attr(p, "title"), Some("Fish & Chips"));
        assert_eq!(doc.text_content(p), "Kölsch\u{a0}!");
    }

    #[test]
    fn valueless_and_uppercase_attributes() {
        let doc = Document::parse_html("<INPUT Disabled Type=checkbox>").unwrap();
        let input = doc.children(doc.root())[0];
        assert_eq!(doc.tag_name(input), Some("input"));
        assert!(doc.has_attr(input, "disabled"));
        assert_eq!(doc.attr(input, "type"), Some("checkbox"));
    }

    #[test]
    fn stray_end_tags_are_ignored() {
        let doc = Document::parse_html("<div><p>x</span></p></div></div><i>y</i>").unwrap();
        let root = doc.root();
        assert_eq!(doc.children(root).len(), 2);
        assert_eq!(doc.tag_name(doc.children(root)[1]), Some("i"));
    }

    #[test]
    fn append_html_returns_top_level_nodes() {
        let mut doc = Document::parse_html("<main></main>").unwrap();
        let main = doc.children(doc.root())[0];
        let added = doc.append_html(main, "<p>1</p><p>2</p>").unwrap();
        assert_eq!(added.len(), 2);
        assert_eq!(doc.children(main), added.as_slice());
    }

    #[test]
    fn script_and_style_bodies_are_verbatim() {
        let html = "<head><style>div > p { color: red }</style></head>\
            <body><script>if (a && b) { x = a < b; }</script><p class=\"style\">Porter</p></body>";
        let doc = Document::parse_html(html).unwrap();
        assert_eq!(doc.to_html(), html);

        let body = doc.children(doc.root())[1];
        let tags: Vec<_> = doc
            .children(body)
            .iter()
            .map(|&n| doc.tag_name(n).unwrap())
            .collect();
        assert_eq!(tags, ["script", "p"]);
    }

    #[test]
    fn uppercase_and_unclosed_script() {
        let doc = Document::parse_html("<SCRIPT>a<b</Script ><i>x</i>").unwrap();
        assert_eq!(doc.to_html(), "<script>a<b</script><i>x</i>");

        let doc = Document::parse_html("<p>y</p><script>never closed < ").unwrap();
        assert_eq!(doc.to_html(), "<p>y</p><script>never closed < </script>");
    }

    #[test]
    fn round_trips_simple_markup() {
        let html = r#"<!DOCTYPE html><div class="a"><p>x &amp; y</p><!-- note --></div>"#;
        let doc = Document::parse_html(html).unwrap();
        assert_eq!(doc.to_html(), html);
    }
}
