//! Minimal author cascade.
//!
//! Only enough of CSS is modelled to answer "what is the cascaded value of
//! property X on element Y": selectors are matched with the `selectors`
//! crate, declaration values are kept as source text, and conditional group
//! rules are flattened as if their conditions held.

use std::cmp::Ordering;

use cssparser::{
    AtRuleParser, CowRcStr, DeclarationParser, ParseError, Parser, ParserInput, ParserState,
    QualifiedRuleParser, RuleBodyItemParser, RuleBodyParser, StyleSheetParser,
    match_ignore_ascii_case,
};
use selectors::context::{MatchingContext, SelectorCaches};
use selectors::parser::{ParseRelative, Selector, SelectorList};

use crate::dom::{ArenaDom, ArenaNodeId, BasaltSelectors, ElementRef};

/// A parsed stylesheet, flattened to style rules.
#[derive(Debug, Default, Clone)]
pub struct CascadeSheet {
    rules: Vec<CascadeRule>,
}

/// A style rule: selector list plus declarations, with its position in the
/// sheet.
#[derive(Debug, Clone)]
pub struct CascadeRule {
    pub selectors: Vec<Selector<BasaltSelectors>>,
    pub declarations: Vec<CascadeDeclaration>,
    pub order: usize,
}

/// A CSS declaration with its value as source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeDeclaration {
    /// Lowercased property name, with known aliases folded.
    pub property: String,
    pub value: String,
    pub important: bool,
}

/// CSS specificity for cascade ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Specificity {
    pub ids: u16,
    pub classes: u16,
    pub elements: u16,
}

impl Specificity {
    pub fn from_selector(selector: &Selector<BasaltSelectors>) -> Self {
        let spec = selector.specificity();
        // selectors packs specificity as (id << 20) | (class << 10) | elements
        Self {
            ids: ((spec >> 20) & 0x3FF) as u16,
            classes: ((spec >> 10) & 0x3FF) as u16,
            elements: (spec & 0x3FF) as u16,
        }
    }
}

impl Ord for Specificity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ids
            .cmp(&other.ids)
            .then(self.classes.cmp(&other.classes))
            .then(self.elements.cmp(&other.elements))
    }
}

impl PartialOrd for Specificity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl CascadeSheet {
    /// Parse a stylesheet. Rules that fail to parse are logged and skipped.
    pub fn parse(css: &str) -> Self {
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);
        let mut rule_parser = SheetParser { rules: Vec::new() };
        parse_rule_list(&mut parser, &mut rule_parser);
        Self {
            rules: rule_parser.rules,
        }
    }

    pub fn rules(&self) -> &[CascadeRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl CascadeRule {
    /// Highest specificity among the selectors matching `elem`, if any match.
    fn matching_specificity(&self, elem: &ElementRef<'_>) -> Option<Specificity> {
        let mut caches = SelectorCaches::default();
        let mut context = MatchingContext::new(
            selectors::matching::MatchingMode::Normal,
            None,
            &mut caches,
            selectors::context::QuirksMode::NoQuirks,
            selectors::matching::NeedsSelectorFlags::No,
            selectors::matching::MatchingForInvalidation::No,
        );

        self.selectors
            .iter()
            .filter(|selector| {
                selectors::matching::matches_selector(*selector, 0, None, elem, &mut context)
            })
            .map(Specificity::from_selector)
            .max()
    }
}

/// A declaration that applies to an element, with its cascade sort key.
#[derive(Debug)]
struct Candidate<'a> {
    declaration: &'a CascadeDeclaration,
    inline: bool,
    specificity: Specificity,
    order: (usize, usize),
}

impl Candidate<'_> {
    fn cmp_precedence(&self, other: &Self) -> Ordering {
        self.declaration
            .important
            .cmp(&other.declaration.important)
            .then(self.inline.cmp(&other.inline))
            .then(self.specificity.cmp(&other.specificity))
            .then(self.order.cmp(&other.order))
    }
}

/// Cascaded value of `property` on element `id`, or `None` when no rule or
/// inline declaration sets it.
///
/// Sheets are given in document order. Importance beats the inline style
/// attribute, which beats specificity, which beats source order.
pub fn cascaded_value(
    dom: &ArenaDom,
    id: ArenaNodeId,
    sheets: &[&CascadeSheet],
    property: &str,
) -> Option<String> {
    let elem = ElementRef::new(dom, id);
    let mut candidates = Vec::new();

    for (sheet_index, sheet) in sheets.iter().enumerate() {
        for rule in &sheet.rules {
            if !rule.declarations.iter().any(|d| d.property == property) {
                continue;
            }
            let Some(specificity) = rule.matching_specificity(&elem) else {
                continue;
            };
            candidates.extend(
                rule.declarations
                    .iter()
                    .filter(|d| d.property == property)
                    .map(|declaration| Candidate {
                        declaration,
                        inline: false,
                        specificity,
                        order: (sheet_index, rule.order),
                    }),
            );
        }
    }

    let inline = dom.get_attr(id, "style").map(parse_inline_style).unwrap_or_default();
    candidates.extend(
        inline
            .iter()
            .filter(|d| d.property == property)
            .map(|declaration| Candidate {
                declaration,
                inline: true,
                specificity: Specificity::default(),
                order: (sheets.len(), 0),
            }),
    );

    candidates
        .into_iter()
        .max_by(|a, b| a.cmp_precedence(b))
        .map(|c| c.declaration.value.clone())
}

/// Parse a `style` attribute into declarations.
pub fn parse_inline_style(style: &str) -> Vec<CascadeDeclaration> {
    let mut input = ParserInput::new(style);
    let mut parser = Parser::new(&mut input);
    let mut declarations = Vec::new();
    let mut decl_parser = DeclarationListParser {
        declarations: &mut declarations,
    };
    for result in RuleBodyParser::new(&mut parser, &mut decl_parser) {
        if let Err((_, slice)) = result {
            log::debug!("ignoring inline declaration {slice:?}");
        }
    }
    declarations
}

fn normalize_property(name: &str) -> String {
    let name = name.to_ascii_lowercase();
    match name.as_str() {
        "-epub-writing-mode" | "-webkit-writing-mode" => "writing-mode".to_string(),
        _ => name,
    }
}

fn parse_rule_list<'i>(input: &mut Parser<'i, '_>, rule_parser: &mut SheetParser) {
    for result in StyleSheetParser::new(input, rule_parser) {
        if let Err((_, slice)) = result {
            log::warn!("skipping unsupported CSS rule: {:?}", slice.trim());
        }
    }
}

/// Top-level rule collector.
struct SheetParser {
    rules: Vec<CascadeRule>,
}

/// How an at-rule is treated.
enum AtRulePrelude {
    /// Conditional group rule whose body holds ordinary style rules.
    Group,
    /// Anything else: font faces, pages, keyframes, layer statements.
    Skip,
}

impl<'i> AtRuleParser<'i> for SheetParser {
    type Prelude = AtRulePrelude;
    type AtRule = ();
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        while input.next().is_ok() {}
        Ok(match_ignore_ascii_case! { &*name,
            "media" | "supports" | "layer" | "document" | "-moz-document" | "container"
                => AtRulePrelude::Group,
            _ => AtRulePrelude::Skip,
        })
    }

    fn rule_without_block(
        &mut self,
        _prelude: Self::Prelude,
        _start: &ParserState,
    ) -> Result<Self::AtRule, ()> {
        Ok(())
    }

    fn parse_block<'t>(
        &mut self,
        prelude: Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::AtRule, ParseError<'i, Self::Error>> {
        match prelude {
            AtRulePrelude::Group => parse_rule_list(input, self),
            AtRulePrelude::Skip => while input.next().is_ok() {},
        }
        Ok(())
    }
}

impl<'i> QualifiedRuleParser<'i> for SheetParser {
    type Prelude = Vec<Selector<BasaltSelectors>>;
    type QualifiedRule = ();
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        let location = input.current_source_location();
        let list = SelectorList::parse(&BasaltSelectors, input, ParseRelative::No)
            .map_err(|_| location.new_custom_error(()))?;
        Ok(list.slice().to_vec())
    }

    fn parse_block<'t>(
        &mut self,
        prelude: Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::QualifiedRule, ParseError<'i, Self::Error>> {
        let mut declarations = Vec::new();
        let mut decl_parser = DeclarationListParser {
            declarations: &mut declarations,
        };
        for result in RuleBodyParser::new(input, &mut decl_parser) {
            // Nested rules and bad declarations are dropped
            let _ = result;
        }

        let order = self.rules.len();
        self.rules.push(CascadeRule {
            selectors: prelude,
            declarations,
            order,
        });
        Ok(())
    }
}

struct DeclarationListParser<'a> {
    declarations: &'a mut Vec<CascadeDeclaration>,
}

impl<'i> AtRuleParser<'i> for DeclarationListParser<'_> {
    type Prelude = ();
    type AtRule = ();
    type Error = ();
}

impl<'i> QualifiedRuleParser<'i> for DeclarationListParser<'_> {
    type Prelude = ();
    type QualifiedRule = ();
    type Error = ();
}

impl<'i> DeclarationParser<'i> for DeclarationListParser<'_> {
    type Declaration = ();
    type Error = ();

    fn parse_value<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
        _start: &ParserState,
    ) -> Result<Self::Declaration, ParseError<'i, Self::Error>> {
        let start = input.position();
        let mut important = false;
        loop {
            if input.try_parse(cssparser::parse_important).is_ok() {
                important = true;
                break;
            }
            if input.next().is_err() {
                break;
            }
        }

        let mut value = input.slice_from(start).trim();
        if important && let Some(bang) = value.rfind('!') {
            value = value[..bang].trim_end();
        }
        self.declarations.push(CascadeDeclaration {
            property: normalize_property(&name),
            value: value.to_string(),
            important,
        });
        Ok(())
    }
}

impl<'i> RuleBodyItemParser<'i, (), ()> for DeclarationListParser<'_> {
    fn parse_declarations(&self) -> bool {
        true
    }
    fn parse_qualified(&self) -> bool {
        false
    }
}
