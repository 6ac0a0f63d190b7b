//! Textual selector re-aiming and prefix stripping.
//!
//! Section markup is wrapped (see [`crate::refactor`]) so the reader chrome
//! can live in the real `<body>`. Rules the book wrote for `html` and `body`
//! must follow the content into the wrappers, so those type selectors are
//! rewritten to the wrappers' classes before the sheet is handed to
//! lightningcss.

use regex_lite::Regex;

use crate::error::{Error, Result};

/// How many `html`/`body` type selectors are rewritten per rule prelude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReaimMode {
    /// Only the first `body` and the first `html` of each prelude. This
    /// leaves e.g. `h1, body, p, body` half rewritten.
    FirstOccurrence,
    /// Every occurrence.
    #[default]
    AllOccurrences,
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::Internal(format!("bad pattern {pattern:?}: {e}")))
}

/// Rewrite `html` and `body` type selectors in every rule prelude of `css`
/// to `.html_class` and `.body_class`.
///
/// A match counts as a type selector when it is not preceded by a word
/// character or one of `. # [ = : -` and not followed by a word character or
/// `-`. So `.body`, `#html`, `[body]`, `:body`, `bodyfoo` and `tbody` are
/// left alone. Matching is case-sensitive. Declaration blocks are never
/// touched.
pub fn reaim_selectors(
    css: &str,
    html_class: &str,
    body_class: &str,
    mode: ReaimMode,
) -> Result<String> {
    let pattern = compile("body|html")?;
    let body_replacement = format!(".{body_class}");
    let html_replacement = format!(".{html_class}");

    let mut chunks: Vec<String> = Vec::new();
    for chunk in css.split('}') {
        let Some(open) = chunk.rfind('{') else {
            chunks.push(chunk.to_string());
            continue;
        };
        let prelude_start = chunk[..open]
            .rfind(['{', ';'])
            .map_or(0, |i| i + 1);
        let prelude = &chunk[prelude_start..open];

        let mut replaced_body = false;
        let mut replaced_html = false;
        let mut rewritten = String::with_capacity(prelude.len());
        let mut copied_to = 0;
        for m in pattern.find_iter(prelude) {
            if !is_type_selector(prelude, m.start(), m.end()) {
                continue;
            }
            let (replacement, done) = if m.as_str() == "body" {
                (&body_replacement, &mut replaced_body)
            } else {
                (&html_replacement, &mut replaced_html)
            };
            if mode == ReaimMode::FirstOccurrence && *done {
                continue;
            }
            *done = true;
            rewritten.push_str(&prelude[copied_to..m.start()]);
            rewritten.push_str(replacement);
            copied_to = m.end();
        }
        rewritten.push_str(&prelude[copied_to..]);

        chunks.push(format!(
            "{}{rewritten}{}",
            &chunk[..prelude_start],
            &chunk[open..]
        ));
    }
    Ok(chunks.join("}"))
}

fn is_type_selector(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    let blocked_before = before.is_some_and(|c| {
        c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '#' | '[' | '=' | ':' | '-')
    });
    let blocked_after = after.is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'));
    !blocked_before && !blocked_after
}

/// Remove `-webkit-`, `-moz-`, `-o-` and `-ms-` from declaration property
/// names. Prefixed values and selectors are kept.
pub fn strip_vendor_prefixes(css: &str) -> Result<String> {
    let pattern = compile(r"(^|[{;])(\s*)-(?:webkit|moz|o|ms)-([A-Za-z][\w-]*\s*:)")?;
    Ok(pattern.replace_all(css, "$1$2$3").into_owned())
}
