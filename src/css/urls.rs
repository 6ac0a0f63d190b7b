//! `url()` references inside stylesheets.
//!
//! Stylesheets are inlined into the section document, so relative `url()`s
//! lose their base. Every internal reference is first rebased onto the
//! container root (`/OEBPS/img/a.png`), which stays valid no matter where the
//! text ends up; the pipeline later swaps rooted references for blob URLs.

use regex_lite::Regex;

use crate::error::{Error, Result};
use crate::loader::{is_external, resolve_internal};

fn url_pattern() -> Result<Regex> {
    // regex-lite has no backreferences, so quotes are matched loosely
    Regex::new(r#"url\s*\(\s*['"]?([^)'"\s]+)['"]?\s*\)"#)
        .map_err(|e| Error::Internal(format!("url pattern: {e}")))
}

/// Rewrite every `url(...)` in `css`.
///
/// The rewriter returns `Ok(None)` to leave a reference untouched.
pub fn rewrite_css_urls<F>(css: &str, mut rewriter: F) -> Result<String>
where
    F: FnMut(&str) -> Result<Option<String>>,
{
    let pattern = url_pattern()?;

    let mut replacements = Vec::new();
    for cap in pattern.captures_iter(css) {
        let (Some(full_match), Some(url)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        if let Some(new_url) = rewriter(url.as_str())? {
            replacements.push((
                full_match.start(),
                full_match.end(),
                format!("url(\"{new_url}\")"),
            ));
        }
    }

    let mut result = css.to_string();
    for (start, end, replacement) in replacements.into_iter().rev() {
        result.replace_range(start..end, &replacement);
    }
    Ok(result)
}

/// Extract all `url()` references in `css`, in source order.
pub fn extract_css_urls(css: &str) -> Result<Vec<String>> {
    let pattern = url_pattern()?;
    Ok(pattern
        .captures_iter(css)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect())
}

/// Rebase every internal `url()` in a sheet located at `sheet_path` onto the
/// container root. External and fragment-only references are left alone, as
/// are references that climb out of the container.
pub fn root_css_urls(css: &str, sheet_path: &str) -> Result<String> {
    rewrite_css_urls(css, |url| {
        if url.starts_with('#') || url.starts_with('/') || is_external(url) {
            return Ok(None);
        }
        match resolve_internal(sheet_path, url) {
            Ok(target) => Ok(Some(rooted(&target.path, target.fragment.as_deref()))),
            Err(_) => {
                log::warn!("stylesheet {sheet_path:?} references {url:?} outside the book");
                Ok(None)
            }
        }
    })
}

fn rooted(path: &str, fragment: Option<&str>) -> String {
    match fragment {
        Some(f) => format!("/{path}#{f}"),
        None => format!("/{path}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_urls() {
        let css = r#"
            body { background: url('bg.png'); }
            .icon { background-image: url("icon.svg"); }
            @font-face { src: url(fonts/a.woff2) }
        "#;
        assert_eq!(
            extract_css_urls(css).unwrap(),
            vec!["bg.png", "icon.svg", "fonts/a.woff2"]
        );
    }

    #[test]
    fn test_rewrite_urls() {
        let css = "body { background: url('images/bg.png'); }";
        let rewritten =
            rewrite_css_urls(css, |url| Ok(Some(url.replace("images/", "assets/")))).unwrap();
        assert_eq!(rewritten, "body { background: url(\"assets/bg.png\"); }");
    }

    #[test]
    fn test_root_css_urls() {
        let css = r#"a { background: url(../img/a.png) } b { background: url("https://x.test/b.png") } c { filter: url(#f) }"#;
        let rooted = root_css_urls(css, "OEBPS/css/main.css").unwrap();
        assert!(rooted.contains(r#"url("/OEBPS/img/a.png")"#));
        assert!(rooted.contains(r#"url("https://x.test/b.png")"#));
        assert!(rooted.contains("url(#f)"));
    }

    #[test]
    fn test_root_css_urls_leaves_escapes_alone() {
        let css = "a { background: url(../../../x.png) }";
        assert_eq!(root_css_urls(css, "OEBPS/main.css").unwrap(), css);
    }
}
