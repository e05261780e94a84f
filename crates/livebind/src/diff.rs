//! Positional sequence differ
//!
//! Compares two sequences slot by slot. No move detection: inserting in
//! the middle turns into a run of updates followed by a create.

use serde::{Deserialize, Serialize};

/// One step of an edit script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DiffEntry<T> {
    Create { item: T, index: usize },
    Update { item: T, index: usize },
    Delete { index: usize },
}

impl<T> DiffEntry<T> {
    pub fn index(&self) -> usize {
        match self {
            DiffEntry::Create { index, .. }
            | DiffEntry::Update { index, .. }
            | DiffEntry::Delete { index } => *index,
        }
    }
}

/// Edit script turning `previous` into `next`, in ascending index order
pub fn diff<T: PartialEq + Clone>(previous: &[T], next: &[T]) -> Vec<DiffEntry<T>> {
    let len = previous.len().max(next.len());
    let mut entries = Vec::new();

    for index in 0..len {
        match (previous.get(index), next.get(index)) {
            (Some(old), Some(new)) if old == new => {}
            (Some(_), Some(new)) => entries.push(DiffEntry::Update {
                item: new.clone(),
                index,
            }),
            (None, Some(new)) => entries.push(DiffEntry::Create {
                item: new.clone(),
                index,
            }),
            (Some(_), None) => entries.push(DiffEntry::Delete { index }),
            (None, None) => unreachable!("index below max length"),
        }
    }

    entries
}

/// Apply an edit script the way the binding engine applies it to children:
/// update/delete indices address slots as they were before the script ran,
/// creates append.
pub fn apply<T: Clone>(target: &mut Vec<T>, entries: &[DiffEntry<T>]) {
    let original_len = target.len();
    let mut deleted = vec![false; original_len];

    for entry in entries {
        match entry {
            DiffEntry::Create { item, .. } => target.push(item.clone()),
            DiffEntry::Update { item, index } => {
                if *index < original_len {
                    target[*index] = item.clone();
                }
            }
            DiffEntry::Delete { index } => {
                if let Some(slot) = deleted.get_mut(*index) {
                    *slot = true;
                }
            }
        }
    }

    for index in (0..original_len).rev() {
        if deleted[index] {
            target.remove(index);
        }
    }
}
