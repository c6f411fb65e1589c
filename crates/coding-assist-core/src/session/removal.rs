//! Tombstones for soft-deleted code entries.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Ids hidden from every displayed view. Entries stay in the suggestion lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct RemovalSet {
    ids: BTreeSet<String>,
}

impl RemovalSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` removed. Returns false if it already was.
    pub fn insert(&mut self, id: &str) -> bool {
        self.ids.insert(id.to_string())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.ids.iter()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}
