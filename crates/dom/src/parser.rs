//! HTML parsing into the arena
//!
//! html5ever builds an `RcDom`; we then walk it once and copy every node
//! into the arena. `<template>` contents land in a separate fragment linked
//! through `template_content_id`, matching how browsers keep them inert.

use html5ever::tendril::TendrilSink;
use html5ever::{namespace_url, ns, LocalName, ParseOpts, QualName};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

use crate::arena::DomArena;
use crate::error::{DomError, Result};
use crate::types::{DomNode, NodeId};

/// Parse a full HTML document into a fresh arena
pub fn parse_document(html: &str) -> Result<DomArena> {
    let dom = html5ever::parse_document(RcDom::default(), ParseOpts::default()).one(html);

    let mut arena = DomArena::new();
    let root = arena.root_id();
    for child in dom.document.children.borrow().iter() {
        import_node(&mut arena, child, root)?;
    }
    // A freshly built document has no history
    arena.take_records();
    Ok(arena)
}

/// Parse markup as if assigned to `body.innerHTML`.
///
/// Returns a detached fragment holding the parsed nodes.
pub fn parse_fragment(arena: &mut DomArena, markup: &str) -> Result<NodeId> {
    parse_fragment_in(arena, markup, "body")
}

/// Parse markup as if assigned to the `innerHTML` of a `<context>` element.
///
/// The context picks the insertion mode, so `<tr>` survives under `tbody`
/// and text stays raw under `style`.
pub fn parse_fragment_in(arena: &mut DomArena, markup: &str, context: &str) -> Result<NodeId> {
    let context = QualName::new(None, ns!(html), LocalName::from(context.to_ascii_lowercase()));
    let dom = html5ever::parse_fragment(RcDom::default(), ParseOpts::default(), context, Vec::new())
        .one(markup);

    let fragment = arena.create_fragment();
    // Fragment parsing wraps everything in a synthetic <html> element
    let wrapper = dom.document.children.borrow().first().cloned();
    if let Some(wrapper) = wrapper {
        for child in wrapper.children.borrow().iter() {
            import_node(arena, child, fragment)?;
        }
    }
    Ok(fragment)
}

/// Parse markup that must describe a single element.
///
/// Parsed in a `<template>` context, so any element is accepted, table
/// parts included. Leading/trailing whitespace is ignored. Fails when the
/// first parsed node is missing or is not an element; anything after it is
/// discarded.
pub fn parse_element(arena: &mut DomArena, markup: &str) -> Result<NodeId> {
    let fragment = parse_fragment_in(arena, markup.trim(), "template")?;
    let first = arena
        .children(fragment)?
        .first()
        .copied()
        .ok_or(DomError::MissingElementRoot)?;
    if !arena.get(first)?.is_element() {
        return Err(DomError::MissingElementRoot);
    }
    arena.detach(first)?;
    Ok(first)
}

/// Recursively copy an html5ever node under `parent`
fn import_node(arena: &mut DomArena, handle: &Handle, parent: NodeId) -> Result<()> {
    match &handle.data {
        NodeData::Document => {
            for child in handle.children.borrow().iter() {
                import_node(arena, child, parent)?;
            }
        }

        NodeData::Element {
            name,
            attrs,
            template_contents,
            ..
        } => {
            let mut node = DomNode::element(&name.local);
            node.attributes = attrs
                .borrow()
                .iter()
                .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
                .collect();
            let node_id = arena.add_node(node);
            arena.append_child(parent, node_id)?;

            if let Some(contents) = template_contents.borrow().as_ref() {
                let content_id = arena.create_fragment();
                for child in contents.children.borrow().iter() {
                    import_node(arena, child, content_id)?;
                }
                arena.get_mut(node_id)?.template_content_id = Some(content_id);
            }

            for child in handle.children.borrow().iter() {
                import_node(arena, child, node_id)?;
            }
        }

        NodeData::Text { contents } => {
            let text_id = arena.create_text(&contents.borrow());
            arena.append_child(parent, text_id)?;
        }

        NodeData::Comment { contents } => {
            let comment_id = arena.add_node(DomNode::comment(contents.to_string()));
            arena.append_child(parent, comment_id)?;
        }

        NodeData::Doctype { .. } | NodeData::ProcessingInstruction { .. } => {}
    }

    Ok(())
}
