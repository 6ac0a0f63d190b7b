//! Collect the stylesheets a section document carries.

use crate::css::CascadeSheet;
use crate::dom::{ArenaDom, ArenaNodeId};
use crate::error::{Error, Result};
use crate::loader::{ResourceLoader, resolve_internal};
use crate::util::decode_stylesheet;

/// One stylesheet of a section, in document order.
#[derive(Debug, Clone)]
pub struct StylesheetRecord {
    /// The `<style>` or `<link>` node in the working document.
    pub origin: ArenaNodeId,
    /// Container path of a linked sheet. `None` for `<style>` blocks.
    pub href: Option<String>,
    /// Path that relative references in `source` resolve against.
    pub base_path: String,
    /// Current sheet text. Rewritten in place by later stages.
    pub source: String,
    /// Parsed form used by the writing-mode cascade, once hydrated.
    pub compiled: Option<CascadeSheet>,
}

impl StylesheetRecord {
    /// Parse the current source into its cascade form.
    pub fn hydrate(&mut self) {
        self.compiled = Some(CascadeSheet::parse(&self.source));
    }
}

/// Whether `id` is a `<style>` element.
fn is_style_block(dom: &ArenaDom, id: ArenaNodeId) -> bool {
    dom.element_name(id).is_some_and(|n| n.as_ref() == "style")
}

/// Whether `id` is a `<link>` whose `rel` includes `stylesheet` (and not
/// `alternate`).
fn is_stylesheet_link(dom: &ArenaDom, id: ArenaNodeId) -> bool {
    if !dom.element_name(id).is_some_and(|n| n.as_ref() == "link") {
        return false;
    }
    let rel = dom.get_attr(id, "rel").unwrap_or_default();
    let mut tokens = rel.split_ascii_whitespace();
    let has = |tokens: &mut std::str::SplitAsciiWhitespace<'_>, want: &str| {
        tokens.any(|t| t.eq_ignore_ascii_case(want))
    };
    has(&mut tokens.clone(), "stylesheet") && !has(&mut tokens, "alternate")
}

/// Whether a node carries a stylesheet.
pub fn is_stylesheet_node(dom: &ArenaDom, id: ArenaNodeId) -> bool {
    is_style_block(dom, id) || is_stylesheet_link(dom, id)
}

/// Every `<style>` and `<link rel=stylesheet>` of the document, in document
/// order, with its text loaded.
///
/// Linked targets are resolved against `section_path`. A target outside the
/// container is [`Error::ExternalResource`]; loader failures propagate.
pub fn extract_stylesheets(
    dom: &ArenaDom,
    section_path: &str,
    loader: &dyn ResourceLoader,
) -> Result<Vec<StylesheetRecord>> {
    let mut records = Vec::new();
    for id in dom.elements() {
        if !is_stylesheet_node(dom, id) {
            continue;
        }
        let (href, source) = stylesheet_source(dom, id, section_path, loader)?;
        records.push(StylesheetRecord {
            origin: id,
            base_path: href.clone().unwrap_or_else(|| section_path.to_string()),
            href,
            source,
            compiled: None,
        });
    }
    log::debug!("{section_path}: {} stylesheets", records.len());
    Ok(records)
}

/// Text of one stylesheet node, with the container path it was loaded from
/// when linked.
///
/// Calling this on anything but a `<style>` or stylesheet `<link>` is a
/// caller bug and yields [`Error::Internal`].
pub fn stylesheet_source(
    dom: &ArenaDom,
    id: ArenaNodeId,
    section_path: &str,
    loader: &dyn ResourceLoader,
) -> Result<(Option<String>, String)> {
    if is_style_block(dom, id) {
        return Ok((None, dom.collect_text(id)));
    }
    if !is_stylesheet_link(dom, id) {
        return Err(Error::Internal(format!(
            "node {id:?} ({:?}) carries no stylesheet",
            dom.element_name(id)
        )));
    }

    let Some(href) = dom.get_attr(id, "href").filter(|h| !h.trim().is_empty()) else {
        log::warn!("{section_path}: stylesheet link without href");
        return Ok((None, String::new()));
    };
    let target = resolve_internal(section_path, href)?;
    let bytes = loader.load(&target.path)?;
    Ok((Some(target.path), decode_stylesheet(&bytes)))
}
