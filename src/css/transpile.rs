//! Stylesheet normalization: re-aiming plus lightningcss transpilation.

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};

use super::reaim::{ReaimMode, reaim_selectors, strip_vendor_prefixes};
use crate::error::{Error, Result};

/// Oldest Firefox major version the output has to work in.
pub const DEFAULT_FIREFOX_VERSION: u32 = 115;

/// Turns a book stylesheet into the text the display surface receives.
pub trait StylesheetNormalizer {
    fn normalize(&self, css: &str) -> Result<String>;
}

/// Regex re-aim, prefix strip, then lightningcss for a Firefox floor.
#[derive(Debug, Clone)]
pub struct Normalizer {
    pub html_class: String,
    pub body_class: String,
    pub mode: ReaimMode,
    pub firefox_version: u32,
}

impl Normalizer {
    pub fn new(html_class: impl Into<String>, body_class: impl Into<String>) -> Self {
        Self {
            html_class: html_class.into(),
            body_class: body_class.into(),
            mode: ReaimMode::default(),
            firefox_version: DEFAULT_FIREFOX_VERSION,
        }
    }

    pub fn with_mode(mut self, mode: ReaimMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_firefox_version(mut self, version: u32) -> Self {
        self.firefox_version = version;
        self
    }
}

impl StylesheetNormalizer for Normalizer {
    fn normalize(&self, css: &str) -> Result<String> {
        let reaimed = reaim_selectors(css, &self.html_class, &self.body_class, self.mode)?;
        let stripped = strip_vendor_prefixes(&reaimed)?;
        match transpile(&stripped, self.firefox_version) {
            Ok(out) => Ok(out),
            Err(e) => {
                log::warn!("keeping untranspiled stylesheet: {e}");
                Ok(stripped)
            }
        }
    }
}

/// Parse, minify and print `css` for the given Firefox major version.
///
/// Unparseable rules are dropped rather than failing the whole sheet.
pub fn transpile(css: &str, firefox_version: u32) -> Result<String> {
    let targets = Targets::from(Browsers {
        firefox: Some(firefox_version << 16),
        ..Browsers::default()
    });

    let mut sheet = StyleSheet::parse(
        css,
        ParserOptions {
            error_recovery: true,
            ..ParserOptions::default()
        },
    )
    .map_err(|e| Error::Css(e.to_string()))?;

    sheet
        .minify(MinifyOptions {
            targets,
            ..MinifyOptions::default()
        })
        .map_err(|e| Error::Css(e.to_string()))?;

    let printed = sheet
        .to_css(PrinterOptions {
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| Error::Css(e.to_string()))?;
    Ok(printed.code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_reaims_and_strips() {
        let normalizer = Normalizer::new("h", "b");
        let out = normalizer
            .normalize("body { -webkit-hyphens: auto } html p { color: red }")
            .unwrap();
        assert!(out.contains(".b"), "{out}");
        assert!(out.contains(".h p"), "{out}");
        assert!(out.contains("hyphens"), "{out}");
        assert!(!out.contains("body"), "{out}");
        assert!(!out.contains("-webkit-hyphens"), "{out}");
    }

    #[test]
    fn test_transpile_recovers_from_bad_rules() {
        let out = transpile("p { color: red } ;;; .y { color: blue } .z { color: green }", 115).unwrap();
        assert!(out.contains("red"), "{out}");
        assert!(out.contains(".z"), "{out}");
    }

    #[test]
    fn test_second_pass_does_not_reaim() {
        // Re-aim happens once, on the source text
        let normalizer = Normalizer::new("h", "b").with_mode(ReaimMode::FirstOccurrence);
        let out = normalizer.normalize("body, body p { color: red }").unwrap();
        assert!(out.contains("body p"), "{out}");
    }
}
