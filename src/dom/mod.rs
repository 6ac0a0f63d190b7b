//! Arena DOM used by the section pipeline.
//!
//! html5ever parses a section into an [`ArenaDom`], the pipeline rewrites it
//! in place, and [`serialize_document`] turns it back into markup.

mod arena;
mod element_ref;
mod serialize;
mod tree_sink;

pub use arena::{ArenaDom, ArenaNode, ArenaNodeData, ArenaNodeId, Attribute};
pub use element_ref::{BasaltSelectors, ElementRef};
pub use serialize::{escape_attr, escape_text, serialize_document, serialize_node};
pub use tree_sink::ArenaSink;

use html5ever::driver::ParseOpts;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;

/// Parse an HTML or XHTML string into an arena DOM.
///
/// Parsing never fails: malformed markup is recovered the way a browser
/// would recover it.
pub fn parse_html(html: &str) -> ArenaDom {
    let sink = parse_document(ArenaSink::new(), ParseOpts::default()).one(html);
    if sink.parse_errors() > 0 {
        log::debug!("recovered from {} html parse errors", sink.parse_errors());
    }
    sink.into_dom()
}

/// Decode markup bytes (honoring any XML encoding declaration) and parse them.
pub fn parse_html_bytes(bytes: &[u8]) -> ArenaDom {
    parse_html(&crate::util::decode_markup(bytes))
}
