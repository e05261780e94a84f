//! CSS selector queries over the arena
//!
//! Parsing and matching come from the `selectors` crate. This module only
//! supplies a small `SelectorImpl` and an `Element` view of a `DomNode`.
//! Tree-structural pseudo-classes (`:first-child`, `:nth-child()`, `:not()`,
//! `:is()`, `:has()`, `:scope`, ...) and all four combinators are supported.
//! State pseudo-classes such as `:hover` and pseudo-elements are rejected.
//! Matching never crosses a shadow root boundary.

use std::fmt;

use cssparser::{ParserInput, ToCss};
use html5ever::{namespace_url, ns, LocalName, Namespace};
use precomputed_hash::PrecomputedHash;
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::bloom::BloomFilter;
use selectors::matching::{
    self, ElementSelectorFlags, MatchingContext, MatchingForInvalidation, MatchingMode,
    NeedsSelectorFlags, QuirksMode, SelectorCaches,
};
use selectors::parser::{self, ParseRelative, SelectorList, SelectorParseErrorKind};
use selectors::{Element, OpaqueElement};

use crate::arena::DomArena;
use crate::error::{DomError, Result};
use crate::types::{DomNode, NodeId, NodeType};

/// A compiled selector list
#[derive(Clone)]
pub struct Selector {
    source: String,
    list: SelectorList<DomSelectors>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self> {
        let mut parser_input = ParserInput::new(input);
        let mut css = cssparser::Parser::new(&mut parser_input);
        let list = SelectorList::parse(&SelectorParser, &mut css, ParseRelative::No)
            .map_err(|_| DomError::InvalidSelector(input.to_string()))?;
        Ok(Self {
            source: input.to_string(),
            list,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `node_id` is an element matching any selector in the list
    pub fn matches(&self, arena: &DomArena, node_id: NodeId) -> bool {
        let Some(element) = ArenaElement::new(arena, node_id) else {
            return false;
        };
        let mut caches = SelectorCaches::default();
        let mut context = matching_context(&mut caches);
        matching::matches_selector_list(&self.list, &element, &mut context)
    }

    /// Matching descendants of `scope` in document order
    ///
    /// `:scope` refers to `scope` itself, which is never part of the result.
    pub fn query_all(&self, arena: &DomArena, scope: NodeId) -> Result<Vec<NodeId>> {
        let candidates = arena.descendants(scope)?;
        let mut caches = SelectorCaches::default();
        let mut context = matching_context(&mut caches);
        context.scope_element = ArenaElement::new(arena, scope).map(|element| element.opaque());

        Ok(candidates
            .into_iter()
            .filter(|&id| {
                ArenaElement::new(arena, id).is_some_and(|element| {
                    matching::matches_selector_list(&self.list, &element, &mut context)
                })
            })
            .collect())
    }

    /// First matching descendant of `scope`
    pub fn query(&self, arena: &DomArena, scope: NodeId) -> Result<Option<NodeId>> {
        Ok(self.query_all(arena, scope)?.into_iter().next())
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Selector").field(&self.source).finish()
    }
}

impl PartialEq for Selector {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Selector {}

fn matching_context(caches: &mut SelectorCaches) -> MatchingContext<'_, DomSelectors> {
    MatchingContext::new(
        MatchingMode::Normal,
        None,
        caches,
        QuirksMode::NoQuirks,
        NeedsSelectorFlags::No,
        MatchingForInvalidation::No,
    )
}

/// Type family handed to the `selectors` crate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomSelectors;

impl parser::SelectorImpl for DomSelectors {
    type ExtraMatchingData<'a> = ();
    type AttrValue = CssString;
    type Identifier = CssLocalName;
    type LocalName = CssLocalName;
    type NamespaceUrl = Namespace;
    type NamespacePrefix = CssLocalName;
    type BorrowedNamespaceUrl = Namespace;
    type BorrowedLocalName = CssLocalName;
    type NonTSPseudoClass = NonTSPseudoClass;
    type PseudoElement = PseudoElement;
}

struct SelectorParser;

impl<'i> parser::Parser<'i> for SelectorParser {
    type Impl = DomSelectors;
    type Error = SelectorParseErrorKind<'i>;

    fn parse_is_and_where(&self) -> bool {
        true
    }

    fn parse_has(&self) -> bool {
        true
    }
}

/// Attribute value as written in a selector
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CssString(pub String);

impl<'a> From<&'a str> for CssString {
    fn from(value: &'a str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for CssString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl ToCss for CssString {
    fn to_css<W>(&self, dest: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        cssparser::serialize_string(&self.0, dest)
    }
}

/// Interned name: tags, ids, classes and attribute names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CssLocalName(pub LocalName);

impl<'a> From<&'a str> for CssLocalName {
    fn from(value: &'a str) -> Self {
        Self(value.into())
    }
}

impl ToCss for CssLocalName {
    fn to_css<W>(&self, dest: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        dest.write_str(&self.0)
    }
}

impl PrecomputedHash for CssLocalName {
    fn precomputed_hash(&self) -> u32 {
        self.0.precomputed_hash()
    }
}

/// No state pseudo-classes: there is no hover or focus in the arena
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NonTSPseudoClass {}

impl parser::NonTSPseudoClass for NonTSPseudoClass {
    type Impl = DomSelectors;

    fn is_active_or_hover(&self) -> bool {
        match *self {}
    }

    fn is_user_action_state(&self) -> bool {
        match *self {}
    }
}

impl ToCss for NonTSPseudoClass {
    fn to_css<W>(&self, _dest: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        match *self {}
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PseudoElement {}

impl parser::PseudoElement for PseudoElement {
    type Impl = DomSelectors;
}

impl ToCss for PseudoElement {
    fn to_css<W>(&self, _dest: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        match *self {}
    }
}

/// Borrowed element view used during matching
#[derive(Clone, Copy)]
struct ArenaElement<'a> {
    arena: &'a DomArena,
    node: &'a DomNode,
}

impl<'a> ArenaElement<'a> {
    fn new(arena: &'a DomArena, node_id: NodeId) -> Option<Self> {
        let node = arena.get(node_id).ok()?;
        node.is_element().then_some(Self { arena, node })
    }

    fn parent_node(&self) -> Option<&'a DomNode> {
        self.arena.get(self.node.parent_id?).ok()
    }

    fn sibling_element(&self, forward: bool) -> Option<Self> {
        let siblings = &self.parent_node()?.children_ids;
        let position = siblings.iter().position(|&id| id == self.node.node_id)?;
        let element = |&id: &NodeId| Self::new(self.arena, id);
        if forward {
            siblings[position + 1..].iter().find_map(element)
        } else {
            siblings[..position].iter().rev().find_map(element)
        }
    }
}

impl fmt::Debug for ArenaElement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} #{}>", self.node.node_name, self.node.node_id)
    }
}

impl Element for ArenaElement<'_> {
    type Impl = DomSelectors;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(self.node)
    }

    fn parent_element(&self) -> Option<Self> {
        Self::new(self.arena, self.node.parent_id?)
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        self.parent_node().is_some_and(|parent| parent.host_id.is_some())
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        let mut current = self.parent_node();
        while let Some(node) = current {
            if let Some(host) = node.host_id {
                return Self::new(self.arena, host);
            }
            current = node.parent_id.and_then(|id| self.arena.get(id).ok());
        }
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
        self.node
            .children_ids
            .iter()
            .find_map(|&id| Self::new(self.arena, id))
    }

    fn is_html_element_in_html_document(&self) -> bool {
        true
    }

    fn has_local_name(&self, local_name: &CssLocalName) -> bool {
        self.node.node_name == *local_name.0
    }

    fn has_namespace(&self, ns: &Namespace) -> bool {
        *ns == ns!(html)
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.node.node_name == other.node.node_name
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&Namespace>,
        local_name: &CssLocalName,
        operation: &AttrSelectorOperation<&CssString>,
    ) -> bool {
        if let NamespaceConstraint::Specific(url) = ns {
            if !url.is_empty() {
                return false;
            }
        }
        self.node
            .attr(&local_name.0)
            .is_some_and(|value| operation.eval_str(value))
    }

    fn match_non_ts_pseudo_class(
        &self,
        pc: &NonTSPseudoClass,
        _context: &mut MatchingContext<Self::Impl>,
    ) -> bool {
        match *pc {}
    }

    fn match_pseudo_element(
        &self,
        pe: &PseudoElement,
        _context: &mut MatchingContext<Self::Impl>,
    ) -> bool {
        match *pe {}
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        false
    }

    fn is_html_slot_element(&self) -> bool {
        self.node.node_name == "slot"
    }

    fn has_id(&self, id: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.node
            .id()
            .is_some_and(|value| case_sensitivity.eq(id.0.as_bytes(), value.as_bytes()))
    }

    fn has_class(&self, name: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.node.attr("class").is_some_and(|classes| {
            classes
                .split_ascii_whitespace()
                .any(|class| case_sensitivity.eq(name.0.as_bytes(), class.as_bytes()))
        })
    }

    fn has_custom_state(&self, _name: &CssLocalName) -> bool {
        false
    }

    fn imported_part(&self, _name: &CssLocalName) -> Option<CssLocalName> {
        None
    }

    fn is_part(&self, _name: &CssLocalName) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        self.node.children_ids.iter().all(|&id| {
            self.arena.get(id).map_or(true, |child| match child.node_type {
                NodeType::Element => false,
                NodeType::Text => child.node_value.is_empty(),
                _ => true,
            })
        })
    }

    fn is_root(&self) -> bool {
        self.parent_node()
            .is_some_and(|parent| parent.node_type == NodeType::Document)
    }

    fn add_element_unique_hashes(&self, _filter: &mut BloomFilter) -> bool {
        false
    }
}
