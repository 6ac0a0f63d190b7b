//! Blob URLs for the resources a section references.
//!
//! The displayed document has no base URL inside the container, so every
//! image, font, media file and stylesheet it uses is handed over as a blob
//! URL instead.

use std::collections::HashMap;

use crate::blobs::BlobStore;
use crate::css::rewrite_css_urls;
use crate::dom::ArenaDom;
use crate::error::{Error, Result};
use crate::loader::{ResourceLoader, guess_media_type, is_external, resolve_internal};

/// Element/attribute pairs that load a resource.
const MEDIA_ATTRIBUTES: &[(&str, &str)] = &[
    ("img", "src"),
    ("source", "src"),
    ("audio", "src"),
    ("video", "src"),
    ("video", "poster"),
    ("track", "src"),
    ("input", "src"),
    ("embed", "src"),
    ("object", "data"),
    // SVG; `href` also matches `xlink:href`
    ("image", "href"),
    ("feImage", "href"),
];

/// Mints blob URLs for one render, at most once per container path.
pub struct ResourceMinter<'a> {
    loader: &'a dyn ResourceLoader,
    store: &'a mut dyn BlobStore,
    by_path: HashMap<String, String>,
    minted: Vec<String>,
}

impl<'a> ResourceMinter<'a> {
    pub fn new(loader: &'a dyn ResourceLoader, store: &'a mut dyn BlobStore) -> Self {
        Self {
            loader,
            store,
            by_path: HashMap::new(),
            minted: Vec::new(),
        }
    }

    /// Blob URL for in-memory content, such as a normalized stylesheet.
    pub fn mint_bytes(&mut self, bytes: Vec<u8>, mime: &str) -> Result<String> {
        let url = self.store.create_object_url(bytes, mime)?;
        self.minted.push(url.clone());
        Ok(url)
    }

    /// Blob URL for a container resource. `Ok(None)` if the container has
    /// no such resource.
    pub fn mint_path(&mut self, path: &str) -> Result<Option<String>> {
        if let Some(url) = self.by_path.get(path) {
            return Ok(Some(url.clone()));
        }
        let bytes = match self.loader.load(path) {
            Ok(bytes) => bytes,
            Err(Error::ResourceNotFound(_)) => {
                log::warn!("referenced resource {path:?} is not in the book");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let mime = self
            .loader
            .media_type(path)
            .unwrap_or_else(|| guess_media_type(path).to_string());
        let url = self.mint_bytes(bytes, &mime)?;
        self.by_path.insert(path.to_string(), url.clone());
        Ok(Some(url))
    }

    /// Blob URL for a reference found in a document at `base`, keeping its
    /// fragment. `Ok(None)` leaves the reference as it is.
    fn mint_reference(&mut self, base: &str, reference: &str) -> Result<Option<String>> {
        let reference = reference.trim();
        if reference.is_empty() || reference.starts_with('#') || is_external(reference) {
            return Ok(None);
        }
        let Ok(target) = resolve_internal(base, reference) else {
            log::debug!("{base}: leaving {reference:?} alone");
            return Ok(None);
        };
        Ok(self.mint_path(&target.path)?.map(|url| match target.fragment {
            Some(fragment) => format!("{url}#{fragment}"),
            None => url,
        }))
    }

    /// Replace container-root `url()`s in a sheet with blob URLs.
    ///
    /// Sheets reach this point with every internal reference already rooted
    /// (see [`crate::css::root_css_urls`]).
    pub fn rewrite_css(&mut self, css: &str) -> Result<String> {
        rewrite_css_urls(css, |url| {
            if url.starts_with('/') && !url.starts_with("//") {
                self.mint_reference("", url)
            } else {
                Ok(None)
            }
        })
    }

    /// Point media elements of the document at blob URLs. Returns the number
    /// of attributes rewritten.
    pub fn rewrite_media(&mut self, dom: &mut ArenaDom, section_path: &str) -> Result<usize> {
        let mut rewritten = 0;
        for id in dom.elements() {
            let Some(name) = dom.element_name(id).map(|n| n.to_string()) else {
                continue;
            };
            for (element, attr) in MEDIA_ATTRIBUTES {
                if !name.eq_ignore_ascii_case(element) {
                    continue;
                }
                let Some(value) = dom.get_attr(id, attr).map(str::to_string) else {
                    continue;
                };
                if let Some(url) = self.mint_reference(section_path, &value)? {
                    dom.set_attr(id, attr, &url);
                    rewritten += 1;
                }
            }
        }
        Ok(rewritten)
    }

    /// Every URL minted so far, in minting order.
    pub fn minted(&self) -> &[String] {
        &self.minted
    }

    /// Hand the minted URLs over to the caller, who now owns their lifetime.
    pub fn into_minted(self) -> Vec<String> {
        self.minted
    }

    /// Revoke everything minted so far. Used when a render fails halfway.
    pub fn abandon(self) {
        for url in &self.minted {
            self.store.revoke_object_url(url);
        }
    }
}
