//! Rendering keys for engine-generated children
//!
//! Keys are the slot index at create/update time. The table is the source
//! of truth; the `data-key` attribute is only a stamped copy.

use ahash::AHashMap;
use dom::NodeId;
use std::cell::RefCell;

#[derive(Debug, Default)]
pub struct KeyTable {
    keys: RefCell<AHashMap<NodeId, usize>>,
}

impl KeyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, node: NodeId, key: usize) {
        self.keys.borrow_mut().insert(node, key);
    }

    pub fn get(&self, node: NodeId) -> Option<usize> {
        self.keys.borrow().get(&node).copied()
    }

    pub fn remove(&self, node: NodeId) -> Option<usize> {
        self.keys.borrow_mut().remove(&node)
    }

    /// Drop the keys of `nodes`; returns how many were present
    pub fn remove_all(&self, nodes: impl IntoIterator<Item = NodeId>) -> usize {
        let mut keys = self.keys.borrow_mut();
        nodes
            .into_iter()
            .filter(|node| keys.remove(node).is_some())
            .count()
    }

    pub fn len(&self) -> usize {
        self.keys.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_table() {
        let keys = KeyTable::new();
        assert!(keys.is_empty());
        keys.set(7, 0);
        keys.set(7, 2);
        keys.set(9, 1);
        assert_eq!(keys.get(7), Some(2));
        assert_eq!(keys.len(), 2);
        assert_eq!(keys.remove(9), Some(1));
        assert_eq!(keys.get(9), None);

        keys.set(9, 1);
        assert_eq!(keys.remove_all([7, 9, 11]), 2);
        assert!(keys.is_empty());
    }
}
