//! selectors crate Element implementation for ArenaDom.
//!
//! Author stylesheets are matched against the arena when inferring the
//! writing mode of a section.

use std::fmt;

use cssparser::{CowRcStr, ParseError, SourceLocation, ToCss, match_ignore_ascii_case};
use html5ever::{LocalName, Namespace};
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::context::MatchingContext;
use selectors::matching::ElementSelectorFlags;
use selectors::parser::SelectorParseErrorKind;
use selectors::{OpaqueElement, SelectorImpl};

use super::arena::{ArenaDom, ArenaNodeData, ArenaNodeId};

/// Selector implementation for matching against the arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasaltSelectors;

/// Identifier string type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct IdentStr(pub String);

impl precomputed_hash::PrecomputedHash for IdentStr {
    fn precomputed_hash(&self) -> u32 {
        self.0
            .bytes()
            .fold(0u32, |h, b| h.wrapping_mul(31).wrapping_add(b as u32))
    }
}

impl AsRef<str> for IdentStr {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for IdentStr {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl ToCss for IdentStr {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        cssparser::serialize_identifier(&self.0, dest)
    }
}

/// LocalName that implements ToCss.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CssLocalName(pub LocalName);

impl precomputed_hash::PrecomputedHash for CssLocalName {
    fn precomputed_hash(&self) -> u32 {
        self.0.precomputed_hash()
    }
}

impl ToCss for CssLocalName {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        dest.write_str(self.0.as_ref())
    }
}

impl From<&str> for CssLocalName {
    fn from(s: &str) -> Self {
        Self(LocalName::from(s))
    }
}

impl AsRef<str> for CssLocalName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

/// Namespace that implements ToCss.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CssNamespace(pub Namespace);

impl precomputed_hash::PrecomputedHash for CssNamespace {
    fn precomputed_hash(&self) -> u32 {
        self.0.precomputed_hash()
    }
}

impl ToCss for CssNamespace {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        dest.write_str(self.0.as_ref())
    }
}

impl From<&str> for CssNamespace {
    fn from(s: &str) -> Self {
        Self(Namespace::from(s))
    }
}

/// Pseudo-elements we accept in selectors. They never match a real element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PseudoElement {
    Before,
    After,
    FirstLine,
    FirstLetter,
    Marker,
    Selection,
}

impl ToCss for PseudoElement {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        dest.write_str(match self {
            Self::Before => "::before",
            Self::After => "::after",
            Self::FirstLine => "::first-line",
            Self::FirstLetter => "::first-letter",
            Self::Marker => "::marker",
            Self::Selection => "::selection",
        })
    }
}

impl selectors::parser::PseudoElement for PseudoElement {
    type Impl = BasaltSelectors;

    fn accepts_state_pseudo_classes(&self) -> bool {
        false
    }

    fn valid_after_slotted(&self) -> bool {
        false
    }
}

/// Non-tree-structural pseudo-classes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NonTSPseudoClass {
    Link,
    AnyLink,
    Visited,
    Hover,
    Active,
    Focus,
}

impl selectors::parser::NonTSPseudoClass for NonTSPseudoClass {
    type Impl = BasaltSelectors;

    fn is_active_or_hover(&self) -> bool {
        matches!(self, Self::Hover | Self::Active)
    }

    fn is_user_action_state(&self) -> bool {
        matches!(self, Self::Hover | Self::Active | Self::Focus)
    }
}

impl ToCss for NonTSPseudoClass {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        dest.write_str(match self {
            Self::Link => ":link",
            Self::AnyLink => ":any-link",
            Self::Visited => ":visited",
            Self::Hover => ":hover",
            Self::Active => ":active",
            Self::Focus => ":focus",
        })
    }
}

impl SelectorImpl for BasaltSelectors {
    type ExtraMatchingData<'a> = ();
    type AttrValue = IdentStr;
    type Identifier = IdentStr;
    type LocalName = CssLocalName;
    type NamespaceUrl = CssNamespace;
    type NamespacePrefix = IdentStr;
    type BorrowedLocalName = CssLocalName;
    type BorrowedNamespaceUrl = CssNamespace;
    type NonTSPseudoClass = NonTSPseudoClass;
    type PseudoElement = PseudoElement;
}

impl<'i> selectors::parser::Parser<'i> for BasaltSelectors {
    type Impl = BasaltSelectors;
    type Error = SelectorParseErrorKind<'i>;

    fn parse_is_and_where(&self) -> bool {
        true
    }

    fn parse_non_ts_pseudo_class(
        &self,
        location: SourceLocation,
        name: CowRcStr<'i>,
    ) -> Result<NonTSPseudoClass, ParseError<'i, Self::Error>> {
        let pc = match_ignore_ascii_case! { &*name,
            "link" => NonTSPseudoClass::Link,
            "any-link" => NonTSPseudoClass::AnyLink,
            "visited" => NonTSPseudoClass::Visited,
            "hover" => NonTSPseudoClass::Hover,
            "active" => NonTSPseudoClass::Active,
            "focus" => NonTSPseudoClass::Focus,
            _ => return Err(location.new_custom_error(
                SelectorParseErrorKind::UnsupportedPseudoClassOrElement(name.clone()),
            )),
        };
        Ok(pc)
    }

    fn parse_pseudo_element(
        &self,
        location: SourceLocation,
        name: CowRcStr<'i>,
    ) -> Result<PseudoElement, ParseError<'i, Self::Error>> {
        let pe = match_ignore_ascii_case! { &*name,
            "before" => PseudoElement::Before,
            "after" => PseudoElement::After,
            "first-line" => PseudoElement::FirstLine,
            "first-letter" => PseudoElement::FirstLetter,
            "marker" => PseudoElement::Marker,
            "selection" => PseudoElement::Selection,
            _ => return Err(location.new_custom_error(
                SelectorParseErrorKind::UnsupportedPseudoClassOrElement(name.clone()),
            )),
        };
        Ok(pe)
    }
}

/// Reference to an element in the ArenaDom for selector matching.
#[derive(Clone, Copy)]
pub struct ElementRef<'a> {
    pub dom: &'a ArenaDom,
    pub id: ArenaNodeId,
}

impl<'a> ElementRef<'a> {
    pub fn new(dom: &'a ArenaDom, id: ArenaNodeId) -> Self {
        Self { dom, id }
    }

    fn is_anchor_with_href(&self) -> bool {
        self.dom
            .element_name(self.id)
            .is_some_and(|n| matches!(n.as_ref(), "a" | "area"))
            && self.dom.has_attr(self.id, "href")
    }

    fn sibling_element(&self, forward: bool) -> Option<Self> {
        let node = self.dom.get(self.id)?;
        let mut current = if forward {
            node.next_sibling
        } else {
            node.prev_sibling
        };
        while current.is_some() {
            if self.dom.is_element(current) {
                return Some(Self::new(self.dom, current));
            }
            let n = self.dom.get(current)?;
            current = if forward { n.next_sibling } else { n.prev_sibling };
        }
        None
    }
}

impl fmt::Debug for ElementRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementRef")
            .field("id", &self.id)
            .field("name", &self.dom.element_name(self.id))
            .finish()
    }
}

impl<'a> selectors::Element for ElementRef<'a> {
    type Impl = BasaltSelectors;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(self)
    }

    fn parent_element(&self) -> Option<Self> {
        let parent = self.dom.get(self.id)?.parent;
        self.dom
            .is_element(parent)
            .then(|| Self::new(self.dom, parent))
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        self.sibling_element(false)
    }

    fn next_sibling_element(&self) -> Option<Self> {
        self.sibling_element(true)
    }

    fn first_element_child(&self) -> Option<Self> {
        self.dom
            .element_children(self.id)
            .next()
            .map(|c| Self::new(self.dom, c))
    }

    fn is_html_element_in_html_document(&self) -> bool {
        self.dom
            .element_namespace(self.id)
            .is_some_and(|ns| *ns == html5ever::ns!(html))
    }

    fn has_local_name(&self, name: &CssLocalName) -> bool {
        self.dom
            .element_name(self.id)
            .is_some_and(|n| n == &name.0)
    }

    fn has_namespace(&self, ns: &CssNamespace) -> bool {
        self.dom
            .element_namespace(self.id)
            .is_some_and(|n| n == &ns.0)
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.dom.element_name(self.id) == other.dom.element_name(other.id)
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&CssNamespace>,
        local_name: &CssLocalName,
        operation: &AttrSelectorOperation<&IdentStr>,
    ) -> bool {
        let Some(ArenaNodeData::Element { attrs, .. }) = self.dom.get(self.id).map(|n| &n.data)
        else {
            return false;
        };

        attrs.iter().any(|attr| {
            let ns_match = match ns {
                NamespaceConstraint::Any => true,
                NamespaceConstraint::Specific(ns) => attr.name.ns == ns.0,
            };
            ns_match && attr.name.local == local_name.0 && operation.eval_str(&attr.value)
        })
    }

    fn match_non_ts_pseudo_class(
        &self,
        pc: &NonTSPseudoClass,
        _context: &mut MatchingContext<'_, Self::Impl>,
    ) -> bool {
        match pc {
            NonTSPseudoClass::Link | NonTSPseudoClass::AnyLink => self.is_anchor_with_href(),
            // No user interaction state in a freshly parsed section
            NonTSPseudoClass::Visited
            | NonTSPseudoClass::Hover
            | NonTSPseudoClass::Active
            | NonTSPseudoClass::Focus => false,
        }
    }

    fn match_pseudo_element(
        &self,
        _pe: &PseudoElement,
        _context: &mut MatchingContext<'_, Self::Impl>,
    ) -> bool {
        false
    }

    fn is_link(&self) -> bool {
        self.is_anchor_with_href()
    }

    fn is_html_slot_element(&self) -> bool {
        false
    }

    fn has_id(&self, id: &IdentStr, case_sensitivity: CaseSensitivity) -> bool {
        self.dom
            .element_id(self.id)
            .is_some_and(|elem_id| case_sensitivity.eq(elem_id.as_bytes(), id.0.as_bytes()))
    }

    fn has_class(&self, name: &IdentStr, case_sensitivity: CaseSensitivity) -> bool {
        self.dom
            .element_classes(self.id)
            .iter()
            .any(|c| case_sensitivity.eq(c.as_bytes(), name.0.as_bytes()))
    }

    fn imported_part(&self, _name: &IdentStr) -> Option<IdentStr> {
        None
    }

    fn is_part(&self, _name: &IdentStr) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        !self
            .dom
            .children(self.id)
            .any(|child| match self.dom.get(child).map(|n| &n.data) {
                Some(ArenaNodeData::Element { .. }) => true,
                Some(ArenaNodeData::Text(t)) => !t.is_empty(),
                _ => false,
            })
    }

    fn is_root(&self) -> bool {
        let parent = self.dom.get(self.id).map(|n| n.parent);
        parent
            .and_then(|p| self.dom.get(p))
            .is_some_and(|p| matches!(p.data, ArenaNodeData::Document))
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn add_element_unique_hashes(&self, _filter: &mut selectors::bloom::BloomFilter) -> bool {
        false
    }

    fn has_custom_state(&self, _name: &IdentStr) -> bool {
        false
    }
}
