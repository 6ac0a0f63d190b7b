//! Dominant writing mode of a section.

use std::fmt;

use crate::css::{CascadeSheet, cascaded_value};
use crate::dom::{ArenaDom, ArenaNodeId};

/// The `writing-mode` the reader chrome lays itself out for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WritingMode {
    #[default]
    HorizontalTb,
    VerticalRl,
    VerticalLr,
}

impl WritingMode {
    pub fn is_vertical(self) -> bool {
        !matches!(self, WritingMode::HorizontalTb)
    }

    pub fn as_css(self) -> &'static str {
        match self {
            WritingMode::HorizontalTb => "horizontal-tb",
            WritingMode::VerticalRl => "vertical-rl",
            WritingMode::VerticalLr => "vertical-lr",
        }
    }

    /// Parse a `writing-mode` value, mapping the SVG 1.1 / CSS2 legacy
    /// keywords and `sideways-*` onto the three modes.
    ///
    /// Returns `None` for CSS-wide keywords and anything unknown.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        let mode = match value.as_str() {
            "horizontal-tb" | "lr" | "lr-tb" | "rl" | "rl-tb" => WritingMode::HorizontalTb,
            "vertical-rl" | "tb" | "tb-rl" | "sideways-rl" => WritingMode::VerticalRl,
            "vertical-lr" | "tb-lr" | "sideways-lr" => WritingMode::VerticalLr,
            _ => return None,
        };
        Some(mode)
    }
}

impl fmt::Display for WritingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_css())
    }
}

/// Infer the writing mode of the content below `start`.
///
/// Walks down from `start` while the current element has exactly one element
/// child, applying each element's cascaded `writing-mode` to a running value
/// that starts at `horizontal-tb` and is inherited downward. The walk stops
/// at the first element with zero or several element children; the running
/// value at that point is the answer.
///
/// `inherit`, `unset` and unknown values keep the inherited value; `initial`
/// resets to `horizontal-tb`.
pub fn infer_writing_mode(dom: &ArenaDom, start: ArenaNodeId, sheets: &[&CascadeSheet]) -> WritingMode {
    let mut mode = WritingMode::default();
    let mut current = start;

    loop {
        if let Some(value) = cascaded_value(dom, current, sheets, "writing-mode") {
            match WritingMode::parse(&value) {
                Some(parsed) => mode = parsed,
                None if value.trim().eq_ignore_ascii_case("initial") => {
                    mode = WritingMode::default()
                }
                None => log::debug!("keeping inherited writing mode over {value:?}"),
            }
        }

        let mut children = dom.element_children(current);
        match (children.next(), children.next()) {
            (Some(only), None) => current = only,
            _ => break,
        }
    }

    mode
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;

    #[test]
    fn test_parse_legacy_values() {
        assert_eq!(WritingMode::parse("tb-rl"), Some(WritingMode::VerticalRl));
        assert_eq!(WritingMode::parse(" TB "), Some(WritingMode::VerticalRl));
        assert_eq!(WritingMode::parse("lr-tb"), Some(WritingMode::HorizontalTb));
        assert_eq!(WritingMode::parse("sideways-lr"), Some(WritingMode::VerticalLr));
        assert_eq!(WritingMode::parse("inherit"), None);
    }

    #[test]
    fn test_helpers() {
        assert!(WritingMode::VerticalLr.is_vertical());
        assert!(!WritingMode::default().is_vertical());
        assert_eq!(WritingMode::VerticalRl.to_string(), "vertical-rl");
    }

    #[test]
    fn test_walks_single_child_chain() {
        let dom = parse_html(
            r#"<body><div id="a"><div id="b"><p>one</p><p>two</p></div></div></body>"#,
        );
        let body = dom.body().unwrap();
        let sheet = CascadeSheet::parse("#b { writing-mode: vertical-rl }");
        assert_eq!(infer_writing_mode(&dom, body, &[&sheet]), WritingMode::VerticalRl);
    }

    #[test]
    fn test_branching_element_inherits_from_parent() {
        let dom = parse_html(
            r#"<body><div class="outer"><div class="inner"><p>one</p><p>two</p></div></div></body>"#,
        );
        let body = dom.body().unwrap();
        let sheet = CascadeSheet::parse(
            ".outer { writing-mode: vertical-rl } p { writing-mode: vertical-lr }",
        );
        assert_eq!(infer_writing_mode(&dom, body, &[&sheet]), WritingMode::VerticalRl);
    }

    #[test]
    fn test_stops_at_branching() {
        let dom = parse_html(r#"<body><div id="a"></div><div id="b"></div></body>"#);
        let body = dom.body().unwrap();
        let sheet = CascadeSheet::parse("#a { writing-mode: vertical-rl }");
        assert_eq!(infer_writing_mode(&dom, body, &[&sheet]), WritingMode::HorizontalTb);
    }

    #[test]
    fn test_deeper_value_overrides_and_initial_resets() {
        let dom = parse_html(r#"<body><div id="a"><div id="b"><div id="c"></div></div></div></body>"#);
        let body = dom.body().unwrap();
        let sheet = CascadeSheet::parse(
            "body { writing-mode: vertical-rl } #b { writing-mode: vertical-lr }",
        );
        assert_eq!(infer_writing_mode(&dom, body, &[&sheet]), WritingMode::VerticalLr);

        let sheet = CascadeSheet::parse(
            "body { writing-mode: vertical-rl } #c { writing-mode: initial } #b { writing-mode: inherit }",
        );
        assert_eq!(infer_writing_mode(&dom, body, &[&sheet]), WritingMode::HorizontalTb);
    }
}
