//! Child-list mutation records
//!
//! The arena appends one record per structural change made under the
//! document node. Records are drained in batches by `Document::flush_mutations`,
//! which is the only point where observers run.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::types::NodeId;

/// One child-list change on `target`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added_nodes: SmallVec<[NodeId; 2]>,
    pub removed_nodes: SmallVec<[NodeId; 2]>,
}

impl MutationRecord {
    pub fn removed(&self, node: NodeId) -> bool {
        self.removed_nodes.contains(&node)
    }
}

/// Observer handle returned by `Document::observe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub u64);
