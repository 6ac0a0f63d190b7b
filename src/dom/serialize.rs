//! HTML serialization of an [`ArenaDom`].
//!
//! Output is HTML syntax, suitable for handing to a browsing context as a
//! complete document. A standards-mode doctype is always emitted first.

use html5ever::ns;

use super::arena::{ArenaDom, ArenaNodeData, ArenaNodeId};

/// Elements with no end tag in HTML syntax.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Elements whose text content is emitted unescaped.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "style",
    "script",
    "xmp",
    "iframe",
    "noembed",
    "noframes",
    "plaintext",
];

/// Serialize a whole document, doctype included.
pub fn serialize_document(dom: &ArenaDom) -> String {
    let mut out = String::with_capacity(dom.len() * 16);
    out.push_str("<!DOCTYPE html>\n");
    for child in dom.children(dom.document()) {
        write_node(dom, child, false, &mut out);
    }
    out
}

/// Serialize a single node and its subtree.
pub fn serialize_node(dom: &ArenaDom, id: ArenaNodeId) -> String {
    let mut out = String::new();
    write_node(dom, id, false, &mut out);
    out
}

fn write_node(dom: &ArenaDom, id: ArenaNodeId, raw_text: bool, out: &mut String) {
    let Some(node) = dom.get(id) else {
        return;
    };

    match &node.data {
        ArenaNodeData::Document => {
            for child in dom.children(id) {
                write_node(dom, child, false, out);
            }
        }
        // Emitted once up front by serialize_document
        ArenaNodeData::Doctype { .. } => {}
        ArenaNodeData::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        ArenaNodeData::Text(text) => {
            if raw_text {
                out.push_str(text);
            } else {
                out.push_str(&escape_text(text));
            }
        }
        ArenaNodeData::Element { name, attrs, .. } => {
            let tag = name.local.as_ref();
            let is_html = name.ns == ns!(html);

            out.push('<');
            out.push_str(tag);
            for attr in attrs {
                out.push(' ');
                if let Some(prefix) = &attr.name.prefix {
                    out.push_str(prefix.as_ref());
                    out.push(':');
                }
                out.push_str(attr.name.local.as_ref());
                out.push_str("=\"");
                out.push_str(&escape_attr(&attr.value));
                out.push('"');
            }

            let has_children = node.first_child.is_some();
            if is_html && VOID_ELEMENTS.contains(&tag) {
                out.push('>');
                return;
            }
            if !is_html && !has_children {
                out.push_str("/>");
                return;
            }
            out.push('>');

            let child_raw = is_html && RAW_TEXT_ELEMENTS.contains(&tag);
            for child in dom.children(id) {
                write_node(dom, child, child_raw, out);
            }

            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

/// Escape text content.
pub fn escape_text(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '\u{a0}' => result.push_str("&nbsp;"),
            _ => result.push(c),
        }
    }
    result
}

/// Escape a double-quoted attribute value.
pub fn escape_attr(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '"' => result.push_str("&quot;"),
            '\u{a0}' => result.push_str("&nbsp;"),
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;

    #[test]
    fn test_void_elements() {
        let dom = parse_html(r#"<p>a<br>b<img src="x.png" alt="A &amp; B"></p>"#);
        let p = dom.find_by_tag("p").unwrap();
        assert_eq!(
            serialize_node(&dom, p),
            r#"<p>a<br>b<img src="x.png" alt="A &amp; B"></p>"#
        );
    }

    #[test]
    fn test_style_text_is_raw() {
        let dom = parse_html("<style>a > b { content: \"&\" }</style><p>1 &lt; 2</p>");
        let style = dom.find_by_tag("style").unwrap();
        assert_eq!(
            serialize_node(&dom, style),
            "<style>a > b { content: \"&\" }</style>"
        );
        let p = dom.find_by_tag("p").unwrap();
        assert_eq!(serialize_node(&dom, p), "<p>1 &lt; 2</p>");
    }

    #[test]
    fn test_document_has_doctype() {
        let dom = parse_html("<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.1//EN\" \"x\"><p>x</p>");
        let html = serialize_document(&dom);
        assert!(html.starts_with("<!DOCTYPE html>\n<html>"));
        assert_eq!(html.matches("<!DOCTYPE").count(), 1);
    }

    #[test]
    fn test_foreign_empty_elements_self_close() {
        let dom = parse_html(r#"<svg><rect width="1"></rect></svg>"#);
        let svg = dom.find_by_tag("svg").unwrap();
        assert_eq!(serialize_node(&dom, svg), r#"<svg><rect width="1"/></svg>"#);
    }

    #[test]
    fn test_escape_attr() {
        assert_eq!(escape_attr(r#"say "hi" & go"#), "say &quot;hi&quot; &amp; go");
    }
}
