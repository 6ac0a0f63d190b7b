//! Move the section's content into wrapper elements.
//!
//! After refactoring, the document looks like
//!
//! ```text
//! <html>
//!   <head>...</head>
//!   <body>
//!     <main class="basaltmainhtml [html classes]">
//!       <section class="basaltmainbody [body classes]" id="...">
//!         ...original body content...
//!       </section>
//!     </main>
//!   </body>
//! </html>
//! ```
//!
//! `<html>` and `<body>` keep no id, class or style of their own, so the
//! reader chrome injected into `<body>` later is unaffected by them.

use crate::dom::{ArenaDom, ArenaNodeId};
use crate::error::{Error, Result};
use crate::names::NamespaceSet;

/// The wrapper elements standing in for `<html>` and `<body>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wrappers {
    /// `<main>` carrying the root element's id, classes and style.
    pub html: ArenaNodeId,
    /// `<section>` carrying the body's id, classes and style.
    pub body: ArenaNodeId,
}

/// Wrap the body's content in `<main><section>` and move the root and body
/// presentation attributes onto the wrappers.
///
/// The section takes the body's id, or the namespace's outer-section id when
/// the body has none. A document without a `<body>` is a caller bug; the HTML
/// parser always synthesizes one.
pub fn refactor_document(dom: &mut ArenaDom, ns: &NamespaceSet) -> Result<Wrappers> {
    let root = dom
        .document_element()
        .ok_or_else(|| Error::Internal("document has no root element".to_string()))?;
    let body = dom
        .body()
        .ok_or_else(|| Error::Internal("document has no body".to_string()))?;

    let main = dom.create_html_element("main");
    move_presentation(dom, root, main, &ns.html_wrapper_class);

    let section = dom.create_html_element("section");
    move_presentation(dom, body, section, &ns.body_wrapper_class);
    if dom.element_id(section).is_none() {
        dom.set_attr(section, "id", &ns.outer_section_id);
    }

    dom.reparent_children(body, section);
    dom.append(main, section);
    dom.append(body, main);

    Ok(Wrappers {
        html: main,
        body: section,
    })
}

/// Give `to` the wrapper class, then `from`'s classes, id and style.
fn move_presentation(dom: &mut ArenaDom, from: ArenaNodeId, to: ArenaNodeId, wrapper_class: &str) {
    dom.add_class(to, wrapper_class);
    for class in dom.element_classes(from).to_vec() {
        dom.add_class(to, &class);
    }
    dom.remove_attr(from, "class");

    if let Some(id) = dom.remove_attr(from, "id") {
        dom.set_attr(to, "id", &id);
    }
    if let Some(style) = dom.remove_attr(from, "style") {
        dom.set_attr(to, "style", &style);
    }
}
