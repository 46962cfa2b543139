//! Directory listing cache.
//!
//! One snapshot per [`QueryKey`]. Snapshots are replaced wholesale on
//! reconciliation; the only in-place edits are single-resource patches
//! and restores.

use std::collections::HashMap;

use crate::types::{QueryKey, Resource, ResourceId};

#[derive(Debug, Default)]
pub struct ResourceCache {
    listings: HashMap<QueryKey, Vec<Resource>>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot for `key`, if loaded.
    pub fn get(&self, key: &QueryKey) -> Option<&[Resource]> {
        self.listings.get(key).map(Vec::as_slice)
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.listings.contains_key(key)
    }

    /// Replace the snapshot for `key`.
    pub fn replace(&mut self, key: QueryKey, resources: Vec<Resource>) {
        self.listings.insert(key, resources);
    }

    /// Put back a resource entry captured earlier.
    ///
    /// Returns `false` if the listing no longer holds that resource.
    pub fn restore(&mut self, key: &QueryKey, resource: Resource) -> bool {
        let id = resource.resource_id.clone();
        self.patch(key, &id, |r| *r = resource).is_some()
    }

    /// Drop the snapshot for `key`.
    pub fn invalidate(&mut self, key: &QueryKey) -> bool {
        self.listings.remove(key).is_some()
    }

    /// Find a resource in the snapshot for `key`.
    pub fn find(&self, key: &QueryKey, id: &ResourceId) -> Option<&Resource> {
        self.get(key)?.iter().find(|r| &r.resource_id == id)
    }

    /// Apply `patch` to the resource `id` under `key`.
    ///
    /// Returns the patched resource, or `None` if it is not cached.
    pub fn patch(
        &mut self,
        key: &QueryKey,
        id: &ResourceId,
        patch: impl FnOnce(&mut Resource),
    ) -> Option<Resource> {
        let resource = self
            .listings
            .get_mut(key)?
            .iter_mut()
            .find(|r| &r.resource_id == id)?;
        patch(resource);
        Some(resource.clone())
    }
}
