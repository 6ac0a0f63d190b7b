//! Resource loading and container-relative path resolution.
//!
//! Everything a section references is looked up by its path inside the
//! container. Targets outside the container (absolute URLs, protocol-relative
//! URLs, `data:` URIs, `..` walking past the root) are never loaded.

use std::path::{Component, Path};

use percent_encoding::percent_decode_str;

use crate::error::{Error, Result};

/// Source of container resources, keyed by full container path.
pub trait ResourceLoader {
    /// Load the raw bytes of a resource.
    fn load(&self, path: &str) -> Result<Vec<u8>>;

    /// Media type of a resource, if known. Defaults to a guess from the
    /// file extension.
    fn media_type(&self, path: &str) -> Option<String> {
        Some(guess_media_type(path).to_string())
    }
}

/// Loader with no resources, for pages that are not part of a book.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyLoader;

impl ResourceLoader for EmptyLoader {
    fn load(&self, path: &str) -> Result<Vec<u8>> {
        Err(Error::ResourceNotFound(path.to_string()))
    }
}

/// A reference resolved to a location inside the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalTarget {
    /// Full container path, percent-decoded.
    pub path: String,
    /// Fragment without the leading `#`, if any.
    pub fragment: Option<String>,
}

/// Whether a reference points outside the container.
pub fn is_external(reference: &str) -> bool {
    let r = reference.trim();
    if r.starts_with("//") {
        return true;
    }
    // A scheme is letters/digits/+/-/. before the first ':' (and before any '/')
    match r.find(':') {
        Some(colon) => {
            let scheme = &r[..colon];
            !scheme.is_empty()
                && scheme
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// Resolve a relative path against a base file path logically (no filesystem
/// access).
///
/// ```
/// use basalt::loader::resolve_path;
///
/// assert_eq!(
///     resolve_path("OEBPS/text/ch1.html", "../images/logo.png"),
///     "OEBPS/images/logo.png"
/// );
/// assert_eq!(resolve_path("ch1.html", "/images/absolute.png"), "images/absolute.png");
/// ```
pub fn resolve_path(base: &str, rel: &str) -> String {
    let (path, _) = resolve_components(base, rel);
    path
}

/// Like [`resolve_path`], but reports whether `..` tried to climb past the
/// container root.
fn resolve_components(base: &str, rel: &str) -> (String, bool) {
    let rel_path = Path::new(rel);

    let mut stack: Vec<&str> = if rel_path.has_root() {
        Vec::new()
    } else {
        Path::new(base)
            .parent()
            .unwrap_or(Path::new(""))
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect()
    };

    let mut escaped = false;
    for component in rel_path.components() {
        match component {
            Component::ParentDir => {
                if stack.pop().is_none() {
                    escaped = true;
                }
            }
            Component::Normal(c) => {
                if let Some(s) = c.to_str() {
                    stack.push(s);
                }
            }
            _ => {}
        }
    }

    (stack.join("/"), escaped)
}

/// Resolve an href found in a container document to a container path and
/// fragment.
///
/// Fragment-only references resolve to `base` itself. External references
/// and paths escaping the container root are [`Error::ExternalResource`].
pub fn resolve_internal(base: &str, href: &str) -> Result<InternalTarget> {
    let href = href.trim();
    if is_external(href) {
        return Err(Error::ExternalResource(href.to_string()));
    }

    let (path_part, fragment) = match href.split_once('#') {
        Some((p, f)) => (p, Some(f)),
        None => (href, None),
    };
    // Queries mean nothing inside a container.
    let path_part = path_part.split('?').next().unwrap_or_default();
    let fragment = fragment
        .filter(|f| !f.is_empty())
        .map(|f| percent_decode_str(f).decode_utf8_lossy().into_owned());

    if path_part.is_empty() {
        return Ok(InternalTarget {
            path: base.to_string(),
            fragment,
        });
    }

    let decoded = percent_decode_str(path_part).decode_utf8_lossy();
    let (path, escaped) = resolve_components(base, &decoded);
    if escaped {
        return Err(Error::ExternalResource(href.to_string()));
    }

    Ok(InternalTarget { path, fragment })
}

/// Guess a media type from a file extension.
pub fn guess_media_type(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "xhtml" | "html" | "htm" => "application/xhtml+xml",
        "css" => "text/css",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "mp3" => "audio/mpeg",
        "mp4" | "m4v" => "video/mp4",
        "ncx" => "application/x-dtbncx+xml",
        "opf" => "application/oebps-package+xml",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path() {
        assert_eq!(resolve_path("OEBPS/content.html", "images/photo.jpg"), "OEBPS/images/photo.jpg");
        assert_eq!(resolve_path("OEBPS/a/b.html", "./c.css"), "OEBPS/a/c.css");
        assert_eq!(resolve_path("a.html", "b.html"), "b.html");
    }

    #[test]
    fn test_is_external() {
        assert!(is_external("http://example.com/x.css"));
        assert!(is_external("https://example.com"));
        assert!(is_external("//cdn.example.com/x.css"));
        assert!(is_external("data:text/css,p{}"));
        assert!(is_external("mailto:someone@example.com"));
        assert!(!is_external("styles/main.css"));
        assert!(!is_external("../x.css"));
        assert!(!is_external("#note"));
    }

    #[test]
    fn test_resolve_internal_splits_fragment() {
        let target = resolve_internal("OEBPS/text/ch1.xhtml", "ch2.xhtml#sec%201").unwrap();
        assert_eq!(target.path, "OEBPS/text/ch2.xhtml");
        assert_eq!(target.fragment.as_deref(), Some("sec 1"));
    }

    #[test]
    fn test_resolve_internal_fragment_only() {
        let target = resolve_internal("OEBPS/ch1.xhtml", "#top").unwrap();
        assert_eq!(target.path, "OEBPS/ch1.xhtml");
        assert_eq!(target.fragment.as_deref(), Some("top"));
    }

    #[test]
    fn test_resolve_internal_decodes_path() {
        let target = resolve_internal("OEBPS/ch1.xhtml", "my%20styles.css").unwrap();
        assert_eq!(target.path, "OEBPS/my styles.css");
    }

    #[test]
    fn test_resolve_internal_rejects_escapes() {
        assert!(matches!(
            resolve_internal("OEBPS/ch1.xhtml", "../../etc/passwd"),
            Err(Error::ExternalResource(_))
        ));
        assert!(matches!(
            resolve_internal("OEBPS/ch1.xhtml", "https://example.com/x.css"),
            Err(Error::ExternalResource(_))
        ));
        assert!(resolve_internal("OEBPS/ch1.xhtml", "../root.css").is_ok());
    }

    #[test]
    fn test_guess_media_type() {
        assert_eq!(guess_media_type("a/b.PNG"), "image/png");
        assert_eq!(guess_media_type("style.css"), "text/css");
        assert_eq!(guess_media_type("noext"), "application/octet-stream");
    }
}
