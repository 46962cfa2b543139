//! Set of resources checked in the current directory view.

use std::collections::BTreeSet;

use crate::types::ResourceId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    ids: BTreeSet<ResourceId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check or uncheck `id`.
    pub fn set(&mut self, id: ResourceId, checked: bool) {
        if checked {
            self.ids.insert(id);
        } else {
            self.ids.remove(&id);
        }
    }

    /// Replace the selection with `ids`.
    pub fn select_all(&mut self, ids: impl IntoIterator<Item = ResourceId>) {
        self.ids = ids.into_iter().collect();
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceId> {
        self.ids.iter()
    }

    /// Selected ids in order.
    pub fn to_vec(&self) -> Vec<ResourceId> {
        self.ids.iter().cloned().collect()
    }
}
