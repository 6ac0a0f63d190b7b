//! Section preparation: untrusted section markup in, display-ready HTML out.
//!
//! Stages, in order:
//!
//! 1. parse the section markup
//! 2. allocate the chrome namespace
//! 3. wrap the content ([`refactor_document`])
//! 4. extract stylesheets
//! 5. per sheet: root `url()`s, inline imports, normalize, swap `url()`s for
//!    blobs
//! 6. replace each sheet's node with a blob-backed `<link>`
//! 7. hydrate the normalized sheets for the cascade
//! 8. infer the writing mode
//! 9. annotate links and swap media references for blobs
//! 10. inject the chrome
//! 11. serialize
//!
//! Every blob minted along the way is returned with the result; if any stage
//! fails, they are all revoked before the error is returned.

use crate::blobs::BlobStore;
use crate::book::{Book, TocIndex};
use crate::css::{
    DEFAULT_FIREFOX_VERSION, Normalizer, ReaimMode, StylesheetNormalizer, StylesheetRecord,
    extract_stylesheets, inline_imports, root_css_urls,
};
use crate::dom::{ArenaDom, parse_html, parse_html_bytes, serialize_document};
use crate::error::Result;
use crate::inject::{Appearance, NavigationTemplate, inject_host_styles, inject_navigation};
use crate::links::rewrite_links;
use crate::loader::{EmptyLoader, ResourceLoader};
use crate::names::NamespaceSet;
use crate::refactor::refactor_document;
use crate::resources::ResourceMinter;
use crate::writing_mode::{WritingMode, infer_writing_mode};

/// Knobs for section preparation.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub reaim_mode: ReaimMode,
    /// Oldest Firefox major version the output must support.
    pub firefox_version: u32,
    pub appearance: Appearance,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            reaim_mode: ReaimMode::default(),
            firefox_version: DEFAULT_FIREFOX_VERSION,
            appearance: Appearance::default(),
        }
    }
}

/// A section ready for display.
#[derive(Debug, Clone)]
pub struct PreparedSection {
    pub index: usize,
    pub html: String,
    pub writing_mode: WritingMode,
    pub namespace: NamespaceSet,
    /// Blob URLs the document depends on. The caller owns their lifetime.
    pub blobs: Vec<String>,
}

/// A host page (library, style editor) ready for display.
#[derive(Debug, Clone)]
pub struct PreparedPage {
    pub html: String,
    pub blobs: Vec<String>,
}

/// Book-level state shared by every section render.
pub struct SectionPipeline<'a> {
    book: &'a Book,
    toc: &'a TocIndex,
    template: &'a NavigationTemplate,
}

impl<'a> SectionPipeline<'a> {
    pub fn new(book: &'a Book, toc: &'a TocIndex, template: &'a NavigationTemplate) -> Self {
        Self {
            book,
            toc,
            template,
        }
    }

    /// Run every stage for spine section `index`.
    pub fn prepare(
        &self,
        index: usize,
        options: &PipelineOptions,
        store: &mut dyn BlobStore,
    ) -> Result<PreparedSection> {
        let mut minter = ResourceMinter::new(self.book, store);
        match self.run(index, options, &mut minter) {
            Ok(mut prepared) => {
                prepared.blobs = minter.into_minted();
                log::debug!(
                    "prepared section {index} ({}, {} blobs)",
                    prepared.writing_mode,
                    prepared.blobs.len()
                );
                Ok(prepared)
            }
            Err(e) => {
                log::debug!("section {index} failed, revoking {} blobs", minter.minted().len());
                minter.abandon();
                Err(e)
            }
        }
    }

    fn run(
        &self,
        index: usize,
        options: &PipelineOptions,
        minter: &mut ResourceMinter<'_>,
    ) -> Result<PreparedSection> {
        let item = self.book.section(index)?;
        let path = item.href.as_str();
        let mut dom = parse_html_bytes(&self.book.load(path)?);

        let namespace = NamespaceSet::allocate(&dom);
        let wrappers = refactor_document(&mut dom, &namespace)?;

        let mut sheets = extract_stylesheets(&dom, path, self.book)?;
        let normalizer = Normalizer::new(
            namespace.html_wrapper_class.clone(),
            namespace.body_wrapper_class.clone(),
        )
        .with_mode(options.reaim_mode)
        .with_firefox_version(options.firefox_version);
        for sheet in &mut sheets {
            sheet.source = normalize_sheet(sheet, self.book, &normalizer, minter)?;
            replace_with_blob_link(&mut dom, sheet, minter)?;
            sheet.hydrate();
        }

        let compiled: Vec<_> = sheets.iter().filter_map(|s| s.compiled.as_ref()).collect();
        let writing_mode = infer_writing_mode(&dom, wrappers.html, &compiled);

        let links = rewrite_links(&mut dom, path, self.book);
        let media = minter.rewrite_media(&mut dom, path)?;
        log::debug!("{path}: {links:?}, {media} media references");

        inject_navigation(
            &mut dom,
            &namespace,
            self.template,
            self.toc.position(index).ok(),
            writing_mode,
            &options.appearance,
            minter,
        )?;

        Ok(PreparedSection {
            index,
            html: serialize_document(&dom),
            writing_mode,
            namespace,
            blobs: Vec::new(),
        })
    }
}

/// Root, inline, normalize, then point `url()`s at blobs.
fn normalize_sheet(
    sheet: &StylesheetRecord,
    loader: &dyn ResourceLoader,
    normalizer: &dyn StylesheetNormalizer,
    minter: &mut ResourceMinter<'_>,
) -> Result<String> {
    let rooted = root_css_urls(&sheet.source, &sheet.base_path)?;
    let inlined = inline_imports(&rooted, &sheet.base_path, loader)?;
    let normalized = normalizer.normalize(&inlined)?;
    minter.rewrite_css(&normalized)
}

/// Swap a sheet's `<style>`/`<link>` for a `<link>` to a blob of its
/// normalized text, keeping its `media` attribute.
fn replace_with_blob_link(
    dom: &mut ArenaDom,
    sheet: &mut StylesheetRecord,
    minter: &mut ResourceMinter<'_>,
) -> Result<()> {
    let url = minter.mint_bytes(sheet.source.clone().into_bytes(), "text/css")?;
    let link = dom.create_html_element("link");
    dom.set_attr(link, "rel", "stylesheet");
    dom.set_attr(link, "href", &url);
    if let Some(media) = dom.get_attr(sheet.origin, "media").map(str::to_string) {
        dom.set_attr(link, "media", &media);
    }
    dom.replace(sheet.origin, link);
    sheet.origin = link;
    Ok(())
}

/// Prepare a host page: parse it and add the theme and override layers.
pub fn prepare_host_page(
    html: &str,
    appearance: &Appearance,
    store: &mut dyn BlobStore,
) -> Result<PreparedPage> {
    let mut minter = ResourceMinter::new(&EmptyLoader, store);
    let mut dom = parse_html(html);
    match inject_host_styles(&mut dom, appearance, &mut minter) {
        Ok(()) => Ok(PreparedPage {
            html: serialize_document(&dom),
            blobs: minter.into_minted(),
        }),
        Err(e) => {
            minter.abandon();
            Err(e)
        }
    }
}
