//! `@import` inlining.
//!
//! Sheets end up in blob URLs, where relative imports no longer resolve, so
//! every import is replaced by the text it points at. The walk is done over
//! top-level tokens only; the rest of the sheet is copied byte for byte.
//!
//! `@namespace` rules of every sheet involved are moved to the front of the
//! result, since they are only valid ahead of all other rules.

use cssparser::{Delimiter, ParseError, Parser, ParserInput, Token};

use super::urls::root_css_urls;
use crate::error::Result;
use crate::loader::{ResourceLoader, resolve_internal};
use crate::util::decode_stylesheet;

/// A parsed `@import` prelude.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ImportRule {
    url: String,
    /// `Some("")` for an anonymous `layer`.
    layer: Option<String>,
    supports: Option<String>,
    media: Option<String>,
}

impl ImportRule {
    /// Wrap inlined text in the import's conditions. Media is innermost and
    /// the layer outermost.
    fn wrap(&self, mut text: String) -> String {
        if let Some(media) = &self.media {
            text = format!("@media {media} {{\n{text}\n}}");
        }
        if let Some(supports) = &self.supports {
            text = format!("@supports {} {{\n{text}\n}}", supports_condition(supports));
        }
        match self.layer.as_deref() {
            Some("") => format!("@layer {{\n{text}\n}}"),
            Some(name) => format!("@layer {name} {{\n{text}\n}}"),
            None => text,
        }
    }
}

/// A `@namespace` rule and how deep in the import tree it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
struct NamespaceRule {
    prefix: Option<String>,
    uri: String,
    text: String,
    depth: usize,
}

/// `supports(display: grid)` carries a bare declaration; `@supports` wants it
/// parenthesized.
fn supports_condition(condition: &str) -> String {
    let lower = condition.to_ascii_lowercase();
    if condition.starts_with('(') || lower.starts_with("not ") || lower.starts_with("selector(") {
        condition.to_string()
    } else {
        format!("({condition})")
    }
}

/// Replace every `@import` in `css` with the recursively inlined text of its
/// target.
///
/// `base_path` is the container path the sheet was loaded from; nested
/// imports resolve against their own sheet. `@charset` rules are removed.
/// Imports after the first style or group rule are invalid CSS and are
/// dropped. A sheet that is already being inlined further up the import
/// chain is replaced by nothing.
///
/// Namespace declarations are hoisted to the top. On a prefix clash the
/// outer sheet's binding wins, and an imported sheet's default namespace is
/// dropped.
pub fn inline_imports(css: &str, base_path: &str, loader: &dyn ResourceLoader) -> Result<String> {
    let mut stack = vec![base_path.to_string()];
    let mut namespaces = Vec::new();
    let body = inline_into(css, base_path, loader, &mut stack, &mut namespaces)?;
    if namespaces.is_empty() {
        return Ok(body);
    }
    Ok(hoist_namespaces(namespaces, body))
}

fn hoist_namespaces(mut found: Vec<NamespaceRule>, body: String) -> String {
    found.sort_by_key(|rule| rule.depth);
    let mut kept: Vec<NamespaceRule> = Vec::new();
    for rule in found {
        match kept.iter().find(|k| k.prefix == rule.prefix) {
            Some(k) if k.uri == rule.uri => {}
            Some(k) => log::warn!(
                "dropping @namespace {} {:?}: already bound to {:?}",
                rule.prefix.as_deref().unwrap_or("(default)"),
                rule.uri,
                k.uri
            ),
            None if rule.prefix.is_none() && rule.depth > 0 => {
                log::warn!("dropping default @namespace {:?} of an imported sheet", rule.uri)
            }
            None => kept.push(rule),
        }
    }

    let mut out = String::with_capacity(body.len() + kept.len() * 48);
    for rule in &kept {
        out.push_str(&rule.text);
        out.push('\n');
    }
    out.push_str(&body);
    out
}

fn inline_into(
    css: &str,
    base_path: &str,
    loader: &dyn ResourceLoader,
    stack: &mut Vec<String>,
    namespaces: &mut Vec<NamespaceRule>,
) -> Result<String> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    let mut out = String::with_capacity(css.len());
    let mut copied_to = 0;
    // Still in the region where @charset/@layer statements and @import live
    let mut preamble = true;
    // Imports must also precede @namespace
    let mut imports_open = true;

    loop {
        let start = parser.position().byte_index();
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };
        let name = match token {
            Token::AtKeyword(name) => name,
            Token::WhiteSpace(_) | Token::Comment(_) | Token::CDO | Token::CDC => continue,
            _ => {
                preamble = false;
                continue;
            }
        };

        if name.eq_ignore_ascii_case("charset") {
            let _ = parser.parse_until_after(Delimiter::Semicolon, drain);
            out.push_str(&css[copied_to..start]);
            copied_to = parser.position().byte_index();
        } else if name.eq_ignore_ascii_case("import") {
            let rule = parser.parse_until_after(Delimiter::Semicolon, parse_import_prelude);
            let end = parser.position().byte_index();
            out.push_str(&css[copied_to..start]);
            copied_to = end;

            match rule {
                Err(_) => {
                    log::warn!("{base_path}: dropping malformed {:?}", css[start..end].trim())
                }
                Ok(rule) if !preamble || !imports_open => {
                    log::warn!("{base_path}: ignoring @import {:?} after other rules", rule.url)
                }
                Ok(rule) => {
                    out.push_str(&inline_rule(&rule, base_path, loader, stack, namespaces)?)
                }
            }
        } else if name.eq_ignore_ascii_case("namespace") {
            let parsed = parser.parse_until_after(Delimiter::Semicolon, parse_namespace_prelude);
            let end = parser.position().byte_index();
            let text = css[start..end].trim();
            out.push_str(&css[copied_to..start]);
            copied_to = end;
            imports_open = false;

            match parsed {
                Err(_) => log::warn!("{base_path}: dropping malformed {text:?}"),
                Ok(_) if !preamble => {
                    log::warn!("{base_path}: ignoring {text:?} after other rules")
                }
                Ok((prefix, uri)) => {
                    let mut text = text.to_string();
                    if !text.ends_with(';') {
                        text.push(';');
                    }
                    namespaces.push(NamespaceRule {
                        prefix,
                        uri,
                        text,
                        depth: stack.len() - 1,
                    });
                }
            }
        } else if name.eq_ignore_ascii_case("layer") {
            let _ = parser.parse_until_before(
                Delimiter::Semicolon | Delimiter::CurlyBracketBlock,
                drain,
            );
            // A layer statement may precede imports; a layer block may not
            if !matches!(parser.next(), Ok(Token::Semicolon)) {
                preamble = false;
            }
        } else {
            preamble = false;
        }
    }

    out.push_str(&css[copied_to..]);
    Ok(out)
}

fn inline_rule(
    rule: &ImportRule,
    base_path: &str,
    loader: &dyn ResourceLoader,
    stack: &mut Vec<String>,
    namespaces: &mut Vec<NamespaceRule>,
) -> Result<String> {
    let target = resolve_internal(base_path, &rule.url)?;
    if stack.contains(&target.path) {
        log::warn!(
            "{base_path}: import cycle through {:?}; skipping",
            target.path
        );
        return Ok(String::new());
    }

    let bytes = loader.load(&target.path)?;
    let text = root_css_urls(&decode_stylesheet(&bytes), &target.path)?;

    stack.push(target.path.clone());
    let inlined = inline_into(&text, &target.path, loader, stack, namespaces);
    stack.pop();

    Ok(rule.wrap(inlined?))
}

fn drain<'i>(input: &mut Parser<'i, '_>) -> std::result::Result<(), ParseError<'i, ()>> {
    while input.next().is_ok() {}
    Ok(())
}

/// Remaining source text of a parser, trimmed.
fn rest<'i>(input: &mut Parser<'i, '_>) -> std::result::Result<String, ParseError<'i, ()>> {
    let start = input.position();
    drain(input)?;
    Ok(input.slice_from(start).trim().to_string())
}

fn parse_namespace_prelude<'i>(
    input: &mut Parser<'i, '_>,
) -> std::result::Result<(Option<String>, String), ParseError<'i, ()>> {
    let prefix = input
        .try_parse(|i| i.expect_ident_cloned())
        .ok()
        .map(|prefix| prefix.to_string());
    let uri = input.expect_url_or_string()?.to_string();
    input.expect_exhausted()?;
    Ok((prefix, uri))
}

fn parse_import_prelude<'i>(
    input: &mut Parser<'i, '_>,
) -> std::result::Result<ImportRule, ParseError<'i, ()>> {
    let url = input.expect_url_or_string()?.to_string();

    let layer = if input
        .try_parse(|i| i.expect_ident_matching("layer"))
        .is_ok()
    {
        Some(String::new())
    } else if input
        .try_parse(|i| i.expect_function_matching("layer"))
        .is_ok()
    {
        Some(input.parse_nested_block(rest)?)
    } else {
        None
    };

    let supports = if input
        .try_parse(|i| i.expect_function_matching("supports"))
        .is_ok()
    {
        Some(input.parse_nested_block(rest)?)
    } else {
        None
    };

    let media = Some(rest(input)?).filter(|m| !m.is_empty());

    Ok(ImportRule {
        url,
        layer,
        supports,
        media,
    })
}
