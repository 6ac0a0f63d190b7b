//! Hyperlink annotation.
//!
//! Links inside a section cannot be followed by the display surface: the
//! document has no URL inside the container. Each `<a href>` is annotated so
//! the host script can turn a click into the right message instead.

use crate::book::Book;
use crate::dom::ArenaDom;
use crate::loader::{is_external, resolve_internal};

/// Spine index of an internal link target.
pub const INDEX_ATTR: &str = "data-basalt-index";
/// Fragment of an internal link target, when it has one.
pub const FRAGMENT_ATTR: &str = "data-basalt-fragment";
/// Set on internal links whose target is not a spine section.
pub const INVALID_ATTR: &str = "data-basalt-invalid";

/// Counts of rewritten links.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LinkSummary {
    pub internal: usize,
    pub invalid: usize,
    pub external: usize,
}

/// Annotate every `<a href>` of a section located at `section_path`.
///
/// - links into a spine section get [`INDEX_ATTR`] and, if present,
///   [`FRAGMENT_ATTR`];
/// - links inside the container that miss the spine get [`INVALID_ATTR`];
/// - external links open in a new browsing context without an opener.
pub fn rewrite_links(dom: &mut ArenaDom, section_path: &str, book: &Book) -> LinkSummary {
    let mut summary = LinkSummary::default();

    for id in dom.find_all_by_tag("a") {
        let Some(href) = dom
            .get_attr(id, "href")
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string)
        else {
            continue;
        };

        if is_external(&href) {
            dom.set_attr(id, "target", "_blank");
            dom.set_attr(id, "rel", "noopener");
            summary.external += 1;
            continue;
        }

        let target = match resolve_internal(section_path, &href) {
            Ok(target) => target,
            Err(_) => {
                log::warn!("{section_path}: link {href:?} leaves the book");
                dom.set_attr(id, INVALID_ATTR, "");
                summary.invalid += 1;
                continue;
            }
        };

        match book.spine_index_of(&target.path) {
            Some(index) => {
                dom.set_attr(id, INDEX_ATTR, &index.to_string());
                if let Some(fragment) = &target.fragment {
                    dom.set_attr(id, FRAGMENT_ATTR, fragment);
                }
                summary.internal += 1;
            }
            None => {
                log::warn!(
                    "{section_path}: link {href:?} points to {:?}, which is not a section",
                    target.path
                );
                dom.set_attr(id, INVALID_ATTR, "");
                summary.invalid += 1;
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;

    #[test]
    fn test_rewrite_links() {
        let mut book = Book::new();
        book.add_spine_item("c1", "OEBPS/text/c1.xhtml", "application/xhtml+xml");
        book.add_spine_item("c2", "OEBPS/text/chapter two.xhtml", "application/xhtml+xml");

        let mut dom = parse_html(
            r##"<a href="chapter%20two.xhtml#n%201">next</a>
               <a href="#top">top</a>
               <a href="../img/a.png">image</a>
               <a href="https://example.com">out</a>
               <a name="anchor">no href</a>"##,
        );
        let summary = rewrite_links(&mut dom, "OEBPS/text/c1.xhtml", &book);
        assert_eq!(
            summary,
            LinkSummary {
                internal: 2,
                invalid: 1,
                external: 1
            }
        );

        let links = dom.find_all_by_tag("a");
        assert_eq!(dom.get_attr(links[0], INDEX_ATTR), Some("1"));
        assert_eq!(dom.get_attr(links[0], FRAGMENT_ATTR), Some("n 1"));
        assert_eq!(dom.get_attr(links[1], INDEX_ATTR), Some("0"));
        assert_eq!(dom.get_attr(links[1], FRAGMENT_ATTR), Some("top"));
        assert!(dom.has_attr(links[2], INVALID_ATTR));
        assert_eq!(dom.get_attr(links[3], "target"), Some("_blank"));
        assert_eq!(dom.get_attr(links[3], "rel"), Some("noopener"));
        assert!(!dom.has_attr(links[4], INDEX_ATTR));
    }
}
