//! HTML serializer
//!
//! Produces `outerHTML` / `innerHTML` strings from the arena. Text and
//! attribute values are escaped; raw-text elements (`style`, `script`) are
//! written verbatim. Template elements serialize their content fragment.

use crate::arena::DomArena;
use crate::error::Result;
use crate::types::*;

/// Serializer configuration
#[derive(Debug, Clone, Default)]
pub struct SerializerConfig {
    /// Also serialize shadow roots (as `<template shadowrootmode="open">`)
    pub include_shadow_roots: bool,
}

/// DOM Tree Serializer
pub struct DomSerializer {
    config: SerializerConfig,
}

impl DomSerializer {
    pub fn new() -> Self {
        Self::with_config(SerializerConfig::default())
    }

    pub fn with_config(config: SerializerConfig) -> Self {
        Self { config }
    }

    /// Serialize a node including itself
    pub fn outer_html(&self, arena: &DomArena, node_id: NodeId) -> Result<String> {
        let mut output = String::with_capacity(256);
        self.serialize_node(arena, node_id, false, &mut output)?;
        Ok(output)
    }

    /// Serialize the children of a node
    pub fn inner_html(&self, arena: &DomArena, node_id: NodeId) -> Result<String> {
        let mut output = String::with_capacity(256);
        let node = arena.get(node_id)?;
        let raw = is_raw_text(node);
        self.serialize_children(arena, node, raw, &mut output)?;
        Ok(output)
    }

    fn serialize_children(
        &self,
        arena: &DomArena,
        node: &DomNode,
        raw: bool,
        output: &mut String,
    ) -> Result<()> {
        if let Some(content) = node.template_content_id {
            for &child in arena.children(content)? {
                self.serialize_node(arena, child, false, output)?;
            }
        }
        for &child in &node.children_ids {
            self.serialize_node(arena, child, raw, output)?;
        }
        Ok(())
    }

    /// Serialize a single node recursively
    fn serialize_node(
        &self,
        arena: &DomArena,
        node_id: NodeId,
        raw_text: bool,
        output: &mut String,
    ) -> Result<()> {
        let node = arena.get(node_id)?;

        match node.node_type {
            NodeType::Element => {
                output.push('<');
                output.push_str(&node.node_name);
                for (name, value) in &node.attributes {
                    output.push(' ');
                    output.push_str(name);
                    output.push_str("=\"");
                    escape_into(value, true, output);
                    output.push('"');
                }
                output.push('>');

                if VOID_ELEMENTS.contains(&node.node_name.as_str()) {
                    return Ok(());
                }

                if self.config.include_shadow_roots {
                    if let Some(shadow) = node.shadow_root_id {
                        output.push_str("<template shadowrootmode=\"open\">");
                        for &child in arena.children(shadow)? {
                            self.serialize_node(arena, child, false, output)?;
                        }
                        output.push_str("</template>");
                    }
                }

                self.serialize_children(arena, node, is_raw_text(node), output)?;

                output.push_str("</");
                output.push_str(&node.node_name);
                output.push('>');
            }

            NodeType::Text => {
                if raw_text {
                    output.push_str(&node.node_value);
                } else {
                    escape_into(&node.node_value, false, output);
                }
            }

            NodeType::Comment => {
                output.push_str("<!--");
                output.push_str(&node.node_value);
                output.push_str("-->");
            }

            NodeType::Document | NodeType::DocumentFragment => {
                self.serialize_children(arena, node, false, output)?;
            }
        }

        Ok(())
    }
}

impl Default for DomSerializer {
    fn default() -> Self {
        Self::new()
    }
}

fn is_raw_text(node: &DomNode) -> bool {
    node.is_element() && RAW_TEXT_ELEMENTS.contains(&node.node_name.as_str())
}

/// HTML escaping as done by the fragment serialization algorithm
fn escape_into(text: &str, attribute: bool, output: &mut String) {
    for c in text.chars() {
        match c {
            '&' => output.push_str("&amp;"),
            '\u{a0}' => output.push_str("&nbsp;"),
            '"' if attribute => output.push_str("&quot;"),
            '<' if !attribute => output.push_str("&lt;"),
            '>' if !attribute => output.push_str("&gt;"),
            _ => output.push(c),
        }
    }
}
