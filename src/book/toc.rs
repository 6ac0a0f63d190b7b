//! Flattened table of contents and the spine-to-TOC position map.
//!
//! The reader shows the TOC as a single `<select>`. Nested entries are
//! flattened depth-first with their labels indented, and every spine section
//! is mapped to the entry the header selector and the footer selector should
//! show while that section is open.

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

use super::{Book, TocEntry};
use crate::error::{Error, Result};

/// Indentation added per nesting level: four no-break spaces.
const INDENT: &str = "\u{a0}\u{a0}\u{a0}\u{a0}";

pub const START_LABEL: &str = "[Start]";
pub const END_LABEL: &str = "[End]";

/// Where a TOC entry points: a spine index plus an optional fragment.
///
/// Serialized as JSON, this is the `value` of a TOC `<option>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocTarget {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment: Option<String>,
}

impl TocTarget {
    pub fn new(index: usize, fragment: Option<String>) -> Self {
        Self { index, fragment }
    }

    /// JSON `{index, fragment}` used as the `<option value>`.
    pub fn option_value(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// One row of the flattened TOC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocItem {
    /// Display label, indented by nesting depth.
    pub label: String,
    pub href: String,
    pub target: TocTarget,
}

/// Which TOC entry the header and footer selectors show for a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocPosition {
    /// First entry pointing into the section.
    pub header: TocTarget,
    /// Last entry pointing into the section.
    pub footer: TocTarget,
}

/// Flattened TOC plus a position for every spine index.
#[derive(Debug, Clone, Default)]
pub struct TocIndex {
    items: Vec<TocItem>,
    positions: Vec<TocPosition>,
}

impl TocIndex {
    /// Build the index for a book.
    ///
    /// Entries whose href does not land on a spine section are logged and
    /// left out. `[Start]`/`[End]` entries are added when the TOC does not
    /// already begin at the top of the first section or end at the top of
    /// the last one.
    pub fn build(book: &Book) -> Result<Self> {
        let (Some(first), Some(last)) = (book.spine.first(), book.spine.last()) else {
            return Err(Error::MalformedBook("spine is empty".to_string()));
        };

        let mut items = Vec::new();
        flatten(book, &book.toc, 0, &mut items);

        let first_href = first.href.clone();
        let last_href = last.href.clone();
        let last_index = book.spine.len() - 1;

        let start = TocTarget::new(0, None);
        let end = TocTarget::new(last_index, None);
        if items.first().is_none_or(|item| item.target != start) {
            items.insert(
                0,
                TocItem {
                    label: START_LABEL.to_string(),
                    href: first_href,
                    target: start,
                },
            );
        }
        if items.last().is_none_or(|item| item.target != end) {
            items.push(TocItem {
                label: END_LABEL.to_string(),
                href: last_href,
                target: end,
            });
        }

        let mut positions: Vec<TocPosition> = Vec::with_capacity(book.spine.len());
        for index in 0..book.spine.len() {
            let first_match = items.iter().find(|item| item.target.index == index);
            let last_match = items.iter().rev().find(|item| item.target.index == index);
            let position = match (first_match, last_match, positions.last()) {
                (Some(first), Some(last), _) => TocPosition {
                    header: first.target.clone(),
                    footer: last.target.clone(),
                },
                (_, _, Some(previous)) => TocPosition {
                    header: previous.footer.clone(),
                    footer: previous.footer.clone(),
                },
                // Section 0 always has the [Start] entry at worst.
                _ => {
                    return Err(Error::Internal(format!(
                        "no TOC position for spine index {index}"
                    )));
                }
            };
            positions.push(position);
        }

        Ok(Self { items, positions })
    }

    /// The flattened entries, in display order.
    pub fn items(&self) -> &[TocItem] {
        &self.items
    }

    /// Header/footer position for a spine index.
    pub fn position(&self, index: usize) -> Result<&TocPosition> {
        self.positions.get(index).ok_or_else(|| {
            Error::MalformedBook(format!("no TOC position for spine index {index}"))
        })
    }

    /// Number of spine sections covered.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

fn flatten(book: &Book, entries: &[TocEntry], depth: usize, items: &mut Vec<TocItem>) {
    for entry in entries {
        let label = format!("{}{}", INDENT.repeat(depth), entry.title.trim());
        match locate(book, &entry.href) {
            Some(target) => items.push(TocItem {
                label,
                href: entry.href.clone(),
                target,
            }),
            None => log::warn!(
                "TOC entry {:?} points outside the spine ({:?}); leaving it out",
                entry.title.trim(),
                entry.href
            ),
        }
        flatten(book, &entry.children, depth + 1, items);
    }
}

fn locate(book: &Book, href: &str) -> Option<TocTarget> {
    let (path, fragment) = match href.split_once('#') {
        Some((p, f)) => (p, Some(f.to_string()).filter(|f| !f.is_empty())),
        None => (href, None),
    };
    let index = book.spine_index_of(path).or_else(|| {
        let decoded = percent_decode_str(path).decode_utf8_lossy();
        book.spine_index_of(&decoded)
    })?;
    Some(TocTarget::new(index, fragment))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(sections: usize) -> Book {
        let mut book = Book::new();
        for i in 0..sections {
            book.add_spine_item(format!("s{i}"), format!("OEBPS/s{i}.xhtml"), "application/xhtml+xml");
        }
        book
    }

    #[test]
    fn test_labels_are_indented_and_trimmed() {
        let mut b = book(2);
        b.toc = vec![
            TocEntry::new("  Part One ", "OEBPS/s0.xhtml")
                .with_child(TocEntry::new("Chapter\n", "OEBPS/s1.xhtml")),
        ];
        let index = TocIndex::build(&b).unwrap();
        let labels: Vec<_> = index.items().iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["Part One", "\u{a0}\u{a0}\u{a0}\u{a0}Chapter"]);
    }

    #[test]
    fn test_start_and_end_are_added() {
        let mut b = book(3);
        b.toc = vec![TocEntry::new("Middle", "OEBPS/s1.xhtml#m")];
        let index = TocIndex::build(&b).unwrap();
        let labels: Vec<_> = index.items().iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec![START_LABEL, "Middle", END_LABEL]);
        assert_eq!(index.items()[1].target, TocTarget::new(1, Some("m".into())));
    }

    #[test]
    fn test_empty_toc_gets_start_and_end() {
        let index = TocIndex::build(&book(2)).unwrap();
        assert_eq!(index.items().len(), 2);
        assert_eq!(index.position(1).unwrap().header, TocTarget::new(1, None));
    }

    #[test]
    fn test_single_section_empty_toc() {
        let index = TocIndex::build(&book(1)).unwrap();
        assert_eq!(index.items().len(), 1);
        assert_eq!(index.items()[0].label, START_LABEL);
    }

    #[test]
    fn test_positions_cover_every_section() {
        let mut b = book(5);
        b.toc = vec![
            TocEntry::new("One", "OEBPS/s0.xhtml"),
            TocEntry::new("Two a", "OEBPS/s2.xhtml#a"),
            TocEntry::new("Two b", "OEBPS/s2.xhtml#b"),
            TocEntry::new("Four", "OEBPS/s4.xhtml"),
        ];
        let index = TocIndex::build(&b).unwrap();
        assert_eq!(index.len(), 5);

        let two_a = TocTarget::new(2, Some("a".into()));
        let two_b = TocTarget::new(2, Some("b".into()));
        let p2 = index.position(2).unwrap();
        assert_eq!((p2.header.clone(), p2.footer.clone()), (two_a, two_b.clone()));

        // Unnamed sections inherit the previous footer for both.
        let p3 = index.position(3).unwrap();
        assert_eq!((p3.header.clone(), p3.footer.clone()), (two_b.clone(), two_b));
        let p1 = index.position(1).unwrap();
        assert_eq!(p1.header, TocTarget::new(0, None));

        assert!(matches!(index.position(5), Err(Error::MalformedBook(_))));
    }

    #[test]
    fn test_entries_outside_spine_are_dropped() {
        let mut b = book(1);
        b.toc = vec![
            TocEntry::new("Good", "OEBPS/s0.xhtml"),
            TocEntry::new("Bad", "OEBPS/missing.xhtml"),
        ];
        let index = TocIndex::build(&b).unwrap();
        assert!(index.items().iter().all(|i| i.label != "Bad"));
    }

    #[test]
    fn test_percent_encoded_href_matches() {
        let mut b = Book::new();
        b.add_spine_item("a", "OEBPS/chapter one.xhtml", "application/xhtml+xml");
        b.toc = vec![TocEntry::new("One", "OEBPS/chapter%20one.xhtml")];
        let index = TocIndex::build(&b).unwrap();
        assert_eq!(index.items().len(), 1);
        assert_eq!(index.items()[0].label, "One");
    }

    #[test]
    fn test_empty_spine_is_malformed() {
        assert!(matches!(
            TocIndex::build(&Book::new()),
            Err(Error::MalformedBook(_))
        ));
    }

    #[test]
    fn test_option_value_json() {
        assert_eq!(
            TocTarget::new(3, None).option_value().unwrap(),
            r#"{"index":3}"#
        );
        assert_eq!(
            TocTarget::new(3, Some("x".into())).option_value().unwrap(),
            r#"{"index":3,"fragment":"x"}"#
        );
    }
}
