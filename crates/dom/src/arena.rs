//! Arena-based DOM tree storage
//!
//! All nodes live in a single `Vec<DomNode>` and refer to each other by
//! 4-byte index. Node 0 is always the document node. Nodes are never freed:
//! removing a node only detaches it, so a `NodeId` stays valid for the
//! lifetime of the arena and can be used as a stable identity.
//!
//! ```text
//! Arena: Vec<DomNode>
//!        [#document][html][body][ul][li]...
//!         ↑ 4-byte index, not 8-byte pointer
//! ```
//!
//! Every structural change made below the document node appends a
//! `MutationRecord`. Changes inside detached subtrees and shadow roots are
//! not recorded.

use smallvec::{smallvec, SmallVec};

use crate::error::{DomError, Result};
use crate::mutation::MutationRecord;
use crate::types::{DomNode, NodeId, NodeType};

#[derive(Debug)]
pub struct DomArena {
    /// All nodes stored sequentially (cache-friendly)
    nodes: Vec<DomNode>,

    /// Document node
    root_id: NodeId,

    /// Pending child-list records, drained by the owning document
    records: Vec<MutationRecord>,
}

impl DomArena {
    /// Create an arena holding only the document node
    pub fn new() -> Self {
        Self::with_capacity(1024) // Pre-allocate for typical page
    }

    /// Create arena with specific capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let mut arena = Self {
            nodes: Vec::with_capacity(capacity),
            root_id: 0,
            records: Vec::new(),
        };
        arena.root_id = arena.add_node(DomNode::new(NodeType::Document, "#document"));
        arena
    }

    /// Add a detached node to the arena, returns its ID
    pub fn add_node(&mut self, mut node: DomNode) -> NodeId {
        let node_id = self.nodes.len() as NodeId;
        node.node_id = node_id;
        node.parent_id = None;
        self.nodes.push(node);
        node_id
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.add_node(DomNode::element(tag))
    }

    pub fn create_text(&mut self, value: &str) -> NodeId {
        self.add_node(DomNode::text(value))
    }

    pub fn create_fragment(&mut self) -> NodeId {
        self.add_node(DomNode::fragment())
    }

    /// Get node by ID (immutable)
    pub fn get(&self, node_id: NodeId) -> Result<&DomNode> {
        self.nodes
            .get(node_id as usize)
            .ok_or(DomError::NodeNotFound(node_id))
    }

    /// Get node by ID (mutable)
    pub fn get_mut(&mut self, node_id: NodeId) -> Result<&mut DomNode> {
        self.nodes
            .get_mut(node_id as usize)
            .ok_or(DomError::NodeNotFound(node_id))
    }

    /// Get an element by ID, failing for any other node type
    pub fn element(&self, node_id: NodeId) -> Result<&DomNode> {
        let node = self.get(node_id)?;
        if node.is_element() {
            Ok(node)
        } else {
            Err(DomError::InvalidNodeType {
                expected: NodeType::Element.name().to_string(),
                actual: node.node_type.name().to_string(),
            })
        }
    }

    /// Get document node ID
    pub fn root_id(&self) -> NodeId {
        self.root_id
    }

    /// Get document node
    pub fn root(&self) -> &DomNode {
        &self.nodes[self.root_id as usize]
    }

    /// Total number of nodes, attached or not
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Only the document node exists
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Iterator over all nodes
    pub fn iter(&self) -> impl Iterator<Item = &DomNode> {
        self.nodes.iter()
    }

    /// Get children of a node
    pub fn children(&self, node_id: NodeId) -> Result<&[NodeId]> {
        Ok(&self.get(node_id)?.children_ids)
    }

    /// Element children only, in order
    pub fn element_children(&self, node_id: NodeId) -> Result<Vec<NodeId>> {
        Ok(self
            .children(node_id)?
            .iter()
            .copied()
            .filter(|&child| self.nodes[child as usize].is_element())
            .collect())
    }

    /// Get parent of a node
    pub fn parent(&self, node_id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.get(node_id)?.parent_id)
    }

    /// Parent, or the host element when `node_id` is a shadow root
    pub fn parent_or_host(&self, node_id: NodeId) -> Option<NodeId> {
        let node = self.nodes.get(node_id as usize)?;
        node.parent_id.or(node.host_id)
    }

    /// Whether the node is reachable from the document, crossing shadow roots
    pub fn is_connected(&self, node_id: NodeId) -> bool {
        let mut current = Some(node_id);
        while let Some(id) = current {
            if id == self.root_id {
                return true;
            }
            current = self.parent_or_host(id);
        }
        false
    }

    /// Whether the node lives in the document's light tree
    pub fn is_observed(&self, node_id: NodeId) -> bool {
        let mut current = Some(node_id);
        while let Some(id) = current {
            if id == self.root_id {
                return true;
            }
            current = self.nodes.get(id as usize).and_then(|n| n.parent_id);
        }
        false
    }

    /// Inclusive descendant check, like `Node.contains`
    pub fn contains(&self, ancestor: NodeId, node_id: NodeId) -> bool {
        let mut current = Some(node_id);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(id as usize).and_then(|n| n.parent_id);
        }
        false
    }

    /// Traverse tree depth-first (iterative, no recursion)
    pub fn traverse_df<F>(&self, start_id: NodeId, mut visit: F) -> Result<()>
    where
        F: FnMut(&DomNode) -> Result<()>,
    {
        let mut stack = vec![start_id];

        while let Some(node_id) = stack.pop() {
            let node = self.get(node_id)?;
            visit(node)?;

            // Push children in reverse order (so they're visited left-to-right)
            for &child_id in node.children_ids.iter().rev() {
                stack.push(child_id);
            }
        }

        Ok(())
    }

    /// All descendants of `start_id` in document order, excluding itself
    pub fn descendants(&self, start_id: NodeId) -> Result<Vec<NodeId>> {
        let mut out = Vec::new();
        self.traverse_df(start_id, |node| {
            if node.node_id != start_id {
                out.push(node.node_id);
            }
            Ok(())
        })?;
        Ok(out)
    }

    /// Find connected nodes matching predicate
    pub fn find<F>(&self, predicate: F) -> Vec<NodeId>
    where
        F: Fn(&DomNode) -> bool,
    {
        let mut found = Vec::new();
        // The document node always exists, so traversal cannot fail
        let _ = self.traverse_df(self.root_id, |node| {
            if predicate(node) {
                found.push(node.node_id);
            }
            Ok(())
        });
        found
    }

    /// Find first connected element by ID attribute
    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        self.find(|node| node.is_element() && node.id() == Some(id))
            .into_iter()
            .next()
    }

    /// Find all connected elements by tag name
    pub fn find_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.find(|node| node.is_element() && node.node_name.eq_ignore_ascii_case(tag))
    }

    pub fn set_attribute(&mut self, node_id: NodeId, name: &str, value: &str) -> Result<()> {
        self.element(node_id)?;
        self.get_mut(node_id)?.set_attr(name, value);
        Ok(())
    }

    pub fn remove_attribute(&mut self, node_id: NodeId, name: &str) -> Result<Option<String>> {
        self.element(node_id)?;
        Ok(self.get_mut(node_id)?.remove_attr(name))
    }

    /// Append `child` as the last child of `parent`
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` before `reference`, or at the end when `reference` is `None`.
    ///
    /// Fragments are emptied into `parent`. A node that already has a parent
    /// is moved.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<()> {
        self.check_insertable(parent, child)?;
        if let Some(reference) = reference {
            if self.get(reference)?.parent_id != Some(parent) {
                return Err(DomError::NotAChild {
                    parent,
                    child: reference,
                });
            }
            if reference == child {
                return Ok(());
            }
        }

        let moved: SmallVec<[NodeId; 2]> = if self.get(child)?.node_type == NodeType::DocumentFragment
        {
            let kids = std::mem::take(&mut self.get_mut(child)?.children_ids);
            for &kid in &kids {
                self.nodes[kid as usize].parent_id = None;
            }
            kids.into_iter().collect()
        } else {
            self.detach(child)?;
            smallvec![child]
        };

        if moved.is_empty() {
            return Ok(());
        }

        let position = match reference {
            Some(reference) => self
                .get(parent)?
                .children_ids
                .iter()
                .position(|&id| id == reference)
                .ok_or(DomError::NotAChild {
                    parent,
                    child: reference,
                })?,
            None => self.get(parent)?.children_ids.len(),
        };

        for (offset, &node) in moved.iter().enumerate() {
            self.nodes[node as usize].parent_id = Some(parent);
            self.nodes[parent as usize]
                .children_ids
                .insert(position + offset, node);
        }

        self.record(parent, moved, SmallVec::new());
        Ok(())
    }

    /// Remove `child` from `parent`
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if self.get(child)?.parent_id != Some(parent) {
            return Err(DomError::NotAChild { parent, child });
        }
        self.detach(child)?;
        Ok(())
    }

    /// Replace `old_child` of `parent` with `new_child`
    pub fn replace_child(&mut self, parent: NodeId, new_child: NodeId, old_child: NodeId) -> Result<()> {
        if self.get(old_child)?.parent_id != Some(parent) {
            return Err(DomError::NotAChild {
                parent,
                child: old_child,
            });
        }
        if new_child == old_child {
            return Ok(());
        }
        self.check_insertable(parent, new_child)?;

        if self.get(new_child)?.node_type == NodeType::DocumentFragment {
            self.insert_before(parent, new_child, Some(old_child))?;
            return self.remove_child(parent, old_child);
        }

        self.detach(new_child)?;
        let position = self.nodes[parent as usize]
            .children_ids
            .iter()
            .position(|&id| id == old_child)
            .ok_or(DomError::NotAChild {
                parent,
                child: old_child,
            })?;
        self.nodes[parent as usize].children_ids[position] = new_child;
        self.nodes[new_child as usize].parent_id = Some(parent);
        self.nodes[old_child as usize].parent_id = None;

        self.record(parent, smallvec![new_child], smallvec![old_child]);
        Ok(())
    }

    /// Detach a node from its parent. Returns whether it had one.
    pub fn detach(&mut self, node_id: NodeId) -> Result<bool> {
        let Some(parent) = self.get(node_id)?.parent_id else {
            return Ok(false);
        };
        self.nodes[parent as usize]
            .children_ids
            .retain(|id| *id != node_id);
        self.nodes[node_id as usize].parent_id = None;
        self.record(parent, SmallVec::new(), smallvec![node_id]);
        Ok(true)
    }

    /// Remove every child of `node_id` with a single record
    pub fn clear_children(&mut self, node_id: NodeId) -> Result<()> {
        let removed = std::mem::take(&mut self.get_mut(node_id)?.children_ids);
        if removed.is_empty() {
            return Ok(());
        }
        for &child in &removed {
            self.nodes[child as usize].parent_id = None;
        }
        self.record(node_id, SmallVec::new(), removed.into_iter().collect());
        Ok(())
    }

    /// Copy a node (and, when `deep`, its subtree and template content).
    /// Shadow roots are not cloned. The copy is detached.
    pub fn clone_node(&mut self, node_id: NodeId, deep: bool) -> Result<NodeId> {
        let copy = self.shallow_copy(node_id)?;
        if !deep {
            return Ok(copy);
        }

        let mut stack = vec![(node_id, copy)];
        while let Some((source, target)) = stack.pop() {
            if let Some(content) = self.get(source)?.template_content_id {
                let content_copy = self.shallow_copy(content)?;
                self.nodes[target as usize].template_content_id = Some(content_copy);
                stack.push((content, content_copy));
            }

            let children = self.get(source)?.children_ids.clone();
            for child in children {
                let child_copy = self.shallow_copy(child)?;
                self.nodes[child_copy as usize].parent_id = Some(target);
                self.nodes[target as usize].children_ids.push(child_copy);
                stack.push((child, child_copy));
            }
        }

        Ok(copy)
    }

    /// Attach an isolated root to an element, returning the existing one if present
    pub fn attach_shadow(&mut self, host: NodeId) -> Result<NodeId> {
        if let Some(existing) = self.element(host)?.shadow_root_id {
            return Ok(existing);
        }
        let mut root = DomNode::fragment();
        root.host_id = Some(host);
        let root_id = self.add_node(root);
        self.nodes[host as usize].shadow_root_id = Some(root_id);
        Ok(root_id)
    }

    /// Drain pending mutation records
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }

    pub fn has_pending_records(&self) -> bool {
        !self.records.is_empty()
    }

    fn shallow_copy(&mut self, node_id: NodeId) -> Result<NodeId> {
        let source = self.get(node_id)?;
        let mut copy = DomNode::new(source.node_type, source.node_name.clone());
        copy.node_value = source.node_value.clone();
        copy.attributes = source.attributes.clone();
        Ok(self.add_node(copy))
    }

    fn check_insertable(&self, parent: NodeId, child: NodeId) -> Result<()> {
        let parent_node = self.get(parent)?;
        let child_node = self.get(child)?;
        if !matches!(
            parent_node.node_type,
            NodeType::Element | NodeType::Document | NodeType::DocumentFragment
        ) {
            return Err(DomError::InvalidNodeType {
                expected: "element, document or fragment".to_string(),
                actual: parent_node.node_type.name().to_string(),
            });
        }
        if child_node.node_type == NodeType::Document || child_node.host_id.is_some() {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        if self.contains(child, parent) {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        Ok(())
    }

    fn record(
        &mut self,
        target: NodeId,
        added_nodes: SmallVec<[NodeId; 2]>,
        removed_nodes: SmallVec<[NodeId; 2]>,
    ) {
        if self.is_observed(target) {
            self.records.push(MutationRecord {
                target,
                added_nodes,
                removed_nodes,
            });
        }
    }
}

impl Default for DomArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(arena: &mut DomArena) -> (NodeId, NodeId, NodeId) {
        let ul = arena.create_element("ul");
        let a = arena.create_element("li");
        let b = arena.create_element("li");
        arena.append_child(ul, a).unwrap();
        arena.append_child(ul, b).unwrap();
        (ul, a, b)
    }

    #[test]
    fn test_arena_basic() {
        let mut arena = DomArena::new();
        assert!(arena.is_empty());

        let id = arena.create_element("DIV");
        assert_eq!(id, 1);

        let retrieved = arena.get(id).unwrap();
        assert_eq!(retrieved.node_name, "div");
        assert_eq!(retrieved.parent_id, None);
        assert!(matches!(arena.get(99), Err(DomError::NodeNotFound(99))));
    }

    #[test]
    fn test_traverse_df() {
        let mut arena = DomArena::new();
        let (ul, _, _) = list(&mut arena);
        let root = arena.root_id();
        arena.append_child(root, ul).unwrap();

        let mut visited = Vec::new();
        arena
            .traverse_df(root, |node| {
                visited.push(node.node_name.clone());
                Ok(())
            })
            .unwrap();

        assert_eq!(visited, vec!["#document", "ul", "li", "li"]);
    }

    #[test]
    fn test_detached_changes_are_not_recorded() {
        let mut arena = DomArena::new();
        let (ul, a, _) = list(&mut arena);
        arena.remove_child(ul, a).unwrap();
        assert!(!arena.has_pending_records());

        let root = arena.root_id();
        arena.append_child(root, ul).unwrap();
        let records = arena.take_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target, root);
        assert_eq!(records[0].added_nodes.as_slice(), &[ul]);
    }

    #[test]
    fn test_remove_and_replace_record_removed_nodes() {
        let mut arena = DomArena::new();
        let root = arena.root_id();
        let (ul, a, b) = list(&mut arena);
        arena.append_child(root, ul).unwrap();
        arena.take_records();

        let c = arena.create_element("li");
        arena.replace_child(ul, c, a).unwrap();
        arena.remove_child(ul, b).unwrap();

        assert_eq!(arena.children(ul).unwrap(), &[c]);
        assert_eq!(arena.parent(a).unwrap(), None);

        let records = arena.take_records();
        assert_eq!(records.len(), 2);
        assert!(records[0].removed(a));
        assert_eq!(records[0].added_nodes.as_slice(), &[c]);
        assert!(records[1].removed(b));
    }

    #[test]
    fn test_insert_before_and_fragments() {
        let mut arena = DomArena::new();
        let (ul, a, b) = list(&mut arena);
        let fragment = arena.create_fragment();
        let x = arena.create_element("li");
        let y = arena.create_element("li");
        arena.append_child(fragment, x).unwrap();
        arena.append_child(fragment, y).unwrap();

        arena.insert_before(ul, fragment, Some(b)).unwrap();
        assert_eq!(arena.children(ul).unwrap(), &[a, x, y, b]);
        assert!(arena.children(fragment).unwrap().is_empty());

        // Moving an existing child keeps a single copy
        arena.insert_before(ul, b, Some(a)).unwrap();
        assert_eq!(arena.children(ul).unwrap(), &[b, a, x, y]);
    }

    #[test]
    fn test_cycles_are_rejected() {
        let mut arena = DomArena::new();
        let (ul, a, _) = list(&mut arena);
        assert_eq!(
            arena.append_child(a, ul),
            Err(DomError::HierarchyRequest {
                parent: a,
                child: ul
            })
        );
        assert!(matches!(
            arena.remove_child(a, ul),
            Err(DomError::NotAChild { .. })
        ));
    }

    #[test]
    fn test_clone_node_deep() {
        let mut arena = DomArena::new();
        let (ul, a, _) = list(&mut arena);
        arena.set_attribute(a, "class", "first").unwrap();

        let copy = arena.clone_node(ul, true).unwrap();
        let kids = arena.children(copy).unwrap().to_vec();
        assert_eq!(kids.len(), 2);
        assert_ne!(kids[0], a);
        assert_eq!(arena.get(kids[0]).unwrap().attr("class"), Some("first"));
        assert_eq!(arena.parent(kids[0]).unwrap(), Some(copy));
    }

    #[test]
    fn test_shadow_roots_connect_but_are_not_observed() {
        let mut arena = DomArena::new();
        let root = arena.root_id();
        let host = arena.create_element("x-card");
        arena.append_child(root, host).unwrap();
        let shadow = arena.attach_shadow(host).unwrap();
        assert_eq!(arena.attach_shadow(host).unwrap(), shadow);

        let inner = arena.create_element("p");
        arena.take_records();
        arena.append_child(shadow, inner).unwrap();

        assert!(arena.is_connected(inner));
        assert!(!arena.is_observed(inner));
        assert!(!arena.has_pending_records());
        assert!(arena.find_by_tag("p").is_empty());
    }
}
