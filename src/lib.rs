//! # basalt
//!
//! The core of an in-browser EPUB reader: takes one spine section of a book
//! and turns it into a document that can be shown next to the reader's own
//! navigation chrome without either one breaking the other's styles.
//!
//! ## What happens to a section
//!
//! - class and id names for the chrome are picked so they collide with
//!   nothing in the section ([`names`])
//! - the section's `<html>` and `<body>` are mirrored onto wrapper elements
//!   and every `html`/`body` selector of its stylesheets is re-aimed at them
//!   ([`refactor`], [`css`])
//! - stylesheets get their imports inlined, vendor prefixes stripped, and
//!   are transpiled for a Firefox version floor ([`css`])
//! - the section's writing mode is inferred from its own cascade so the
//!   chrome can follow it ([`writing_mode`])
//! - navigation bars and the theme, override, and chrome style layers are
//!   injected ([`inject`])
//! - every resource the document needs is handed out as a blob URL, and
//!   those URLs are revoked once a newer document is showing ([`blobs`])
//!
//! ## Quick Start
//!
//! ```no_run
//! use basalt::blobs::MemoryBlobStore;
//! use basalt::prefs::MemoryPreferenceStore;
//! use basalt::session::{MemorySurface, Session, SessionConfig};
//!
//! let book = basalt::read_epub("book.epub")?;
//! let mut session = Session::new(
//!     SessionConfig::default(),
//!     MemorySurface::new(),
//!     MemoryBlobStore::new(),
//!     MemoryPreferenceStore::new(),
//! );
//! session.open_book(book)?;
//! session.next_section()?;
//! # Ok::<(), basalt::Error>(())
//! ```
//!
//! ## Preparing a single section
//!
//! ```
//! use basalt::blobs::MemoryBlobStore;
//! use basalt::{Book, NavigationTemplate, PipelineOptions, SectionPipeline, TocEntry, TocIndex};
//!
//! let mut book = Book::new();
//! book.add_resource(
//!     "chapter1.xhtml",
//!     b"<html><body style=\"writing-mode: vertical-rl\"><p>Hi</p></body></html>".to_vec(),
//!     "application/xhtml+xml",
//! );
//! book.add_spine_item("ch1", "chapter1.xhtml", "application/xhtml+xml");
//! book.toc.push(TocEntry::new("Chapter 1", "chapter1.xhtml"));
//!
//! let toc = TocIndex::build(&book)?;
//! let template = NavigationTemplate::from_toc(&toc)?;
//! let mut store = MemoryBlobStore::new();
//! let section = SectionPipeline::new(&book, &toc, &template)
//!     .prepare(0, &PipelineOptions::default(), &mut store)?;
//! assert!(section.writing_mode.is_vertical());
//! # Ok::<(), basalt::Error>(())
//! ```

pub mod blobs;
pub mod book;
pub mod css;
pub mod dom;
pub mod epub;
pub mod error;
pub mod inject;
pub mod links;
pub mod loader;
pub mod message;
pub mod names;
pub mod pipeline;
pub mod prefs;
pub mod refactor;
pub mod resources;
pub mod session;
pub(crate) mod util;
pub mod writing_mode;

pub use blobs::{BlobStore, BlobTracker, JobId};
pub use book::{Book, Metadata, Resource, SpineItem, TocEntry, TocIndex};
pub use css::{Normalizer, ReaimMode, StylesheetNormalizer};
pub use epub::{read_epub, read_epub_from_reader};
pub use error::{Error, Result};
pub use inject::{Appearance, NavigationTemplate, Theme};
pub use loader::ResourceLoader;
pub use message::HostMessage;
pub use names::NamespaceSet;
pub use pipeline::{PipelineOptions, PreparedSection, SectionPipeline};
pub use prefs::{PreferenceStore, StyleRecord, StyleScope};
pub use session::{DisplaySurface, Page, Session, SessionConfig};
pub use writing_mode::WritingMode;
