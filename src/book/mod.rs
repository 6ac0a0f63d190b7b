//! In-memory book model: metadata, spine, TOC tree, and container resources.

mod toc;

pub use toc::{TocIndex, TocItem, TocPosition, TocTarget};

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::loader::{ResourceLoader, guess_media_type};

/// An opened book. All paths are full container paths.
#[derive(Debug, Clone, Default)]
pub struct Book {
    pub metadata: Metadata,
    pub spine: Vec<SpineItem>,
    pub toc: Vec<TocEntry>,
    pub resources: HashMap<String, Resource>,
}

/// Book metadata (Dublin Core subset)
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub title: String,
    pub authors: Vec<String>,
    pub language: String,
    /// The package's unique identifier. Used to tell books apart.
    pub identifier: String,
}

/// An item in the reading order (spine)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
    /// `false` for auxiliary content skipped by next/previous navigation.
    pub linear: bool,
}

/// A table of contents entry (hierarchical)
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TocEntry {
    pub title: String,
    /// Full container path, with an optional `#fragment`.
    pub href: String,
    pub children: Vec<TocEntry>,
    /// Play order for sorting (from NCX playOrder attribute)
    pub play_order: Option<usize>,
}

/// A resource (content document, image, CSS, font, etc.)
#[derive(Debug, Clone)]
pub struct Resource {
    pub data: Vec<u8>,
    pub media_type: String,
}

impl Book {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource to the book
    pub fn add_resource(
        &mut self,
        href: impl Into<String>,
        data: Vec<u8>,
        media_type: impl Into<String>,
    ) {
        self.resources.insert(
            href.into(),
            Resource {
                data,
                media_type: media_type.into(),
            },
        );
    }

    /// Get a resource by container path
    pub fn get_resource(&self, href: &str) -> Option<&Resource> {
        self.resources.get(href)
    }

    /// Add a linear spine item
    pub fn add_spine_item(
        &mut self,
        id: impl Into<String>,
        href: impl Into<String>,
        media_type: impl Into<String>,
    ) {
        self.push_spine_item(id.into(), href.into(), media_type.into(), true);
    }

    /// Add a spine item marked `linear="no"`
    pub fn add_nonlinear_spine_item(
        &mut self,
        id: impl Into<String>,
        href: impl Into<String>,
        media_type: impl Into<String>,
    ) {
        self.push_spine_item(id.into(), href.into(), media_type.into(), false);
    }

    fn push_spine_item(&mut self, id: String, href: String, media_type: String, linear: bool) {
        self.spine.push(SpineItem {
            id,
            href,
            media_type,
            linear,
        });
    }

    /// The spine item at `index`.
    pub fn section(&self, index: usize) -> Result<&SpineItem> {
        self.spine.get(index).ok_or_else(|| {
            Error::MalformedBook(format!(
                "spine index {index} out of range ({} sections)",
                self.spine.len()
            ))
        })
    }

    /// Spine index of the section at a container path.
    pub fn spine_index_of(&self, path: &str) -> Option<usize> {
        self.spine.iter().position(|item| item.href == path)
    }

    /// Index of the first linear section.
    pub fn first_linear(&self) -> Option<usize> {
        self.spine.iter().position(|item| item.linear)
    }

    /// Index of the next linear section after `index`.
    pub fn next_linear(&self, index: usize) -> Option<usize> {
        self.spine
            .iter()
            .enumerate()
            .skip(index + 1)
            .find(|(_, item)| item.linear)
            .map(|(i, _)| i)
    }

    /// Index of the closest linear section before `index`.
    pub fn prev_linear(&self, index: usize) -> Option<usize> {
        self.spine
            .iter()
            .enumerate()
            .take(index)
            .rev()
            .find(|(_, item)| item.linear)
            .map(|(i, _)| i)
    }
}

impl ResourceLoader for Book {
    fn load(&self, path: &str) -> Result<Vec<u8>> {
        self.resources
            .get(path)
            .map(|r| r.data.clone())
            .ok_or_else(|| Error::ResourceNotFound(path.to_string()))
    }

    fn media_type(&self, path: &str) -> Option<String> {
        match self.resources.get(path) {
            Some(r) if !r.media_type.is_empty() => Some(r.media_type.clone()),
            Some(_) => Some(guess_media_type(path).to_string()),
            None => None,
        }
    }
}

impl TocEntry {
    pub fn new(title: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            href: href.into(),
            children: Vec::new(),
            play_order: None,
        }
    }

    pub fn with_child(mut self, child: TocEntry) -> Self {
        self.children.push(child);
        self
    }
}
