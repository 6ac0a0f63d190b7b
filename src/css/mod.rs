//! Stylesheet handling for section documents.
//!
//! A section's sheets go through these stages, in order:
//!
//! 1. [`extract_stylesheets`] collects every `<style>` and stylesheet `<link>`.
//! 2. [`root_css_urls`] rebases relative `url()`s onto the container root.
//! 3. [`inline_imports`] replaces `@import`s with the imported text.
//! 4. A [`StylesheetNormalizer`] re-aims `html`/`body` selectors and
//!    transpiles for the target engine.
//! 5. [`CascadeSheet::parse`] hydrates the result for writing-mode inference.

mod cascade;
mod extract;
mod imports;
mod reaim;
mod transpile;
mod urls;

pub use cascade::{
    CascadeDeclaration, CascadeRule, CascadeSheet, Specificity, cascaded_value,
    parse_inline_style,
};
pub use extract::{StylesheetRecord, extract_stylesheets, is_stylesheet_node, stylesheet_source};
pub use imports::inline_imports;
pub use reaim::{ReaimMode, reaim_selectors, strip_vendor_prefixes};
pub use transpile::{DEFAULT_FIREFOX_VERSION, Normalizer, StylesheetNormalizer, transpile};
pub use urls::{extract_css_urls, rewrite_css_urls, root_css_urls};
