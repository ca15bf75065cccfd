use crate::types::ItemId;
use std::collections::HashSet;

/// Ids already handed to the sink by this process.
#[derive(Debug, Default, Clone)]
pub struct DedupSet {
    seen: HashSet<ItemId>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.seen.contains(id)
    }

    /// Returns `false` if `id` was already present.
    pub fn insert(&mut self, id: ItemId) -> bool {
        self.seen.insert(id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
