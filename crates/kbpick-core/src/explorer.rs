//! File explorer state.
//!
//! [`Explorer`] ties the [`ResourceController`] to a single directory view:
//! current path, search query, sort order and selection, plus the per-item
//! and bulk actions a front end exposes.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use uuid::Uuid;

use crate::controller::ResourceController;
use crate::errors::{KbError, KbResult};
use crate::projection::{
    breadcrumbs, project, Breadcrumb, FileItem, Projection, SortDirection, SortKey, SortOptions,
};
use crate::selection::SelectionSet;
use crate::types::{describe_key, DeIndexRequest, QueryKey, Resource, ResourceId};

/// Path of the drive root.
pub const ROOT_PATH: &str = "/";

/// Normalize a drive path for comparison: no leading or trailing slashes.
fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}

/// Everything a front end needs to render the current directory.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerView {
    pub current_path: String,
    pub breadcrumbs: Vec<Breadcrumb>,
    pub items: Vec<FileItem>,
    pub indexed_items: BTreeMap<ResourceId, bool>,
    pub pending: Vec<ResourceId>,
    pub selected: Vec<ResourceId>,
    pub search_query: String,
    pub sort: SortOptions,
}

/// Per-item results of a bulk action.
#[derive(Debug, Default)]
pub struct BulkOutcome {
    pub succeeded: Vec<ResourceId>,
    pub failed: Vec<(ResourceId, KbError)>,
}

impl BulkOutcome {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

#[derive(Debug)]
pub struct Explorer {
    controller: Arc<ResourceController>,
    current_path: String,
    current_key: QueryKey,
    search_query: String,
    sort: SortOptions,
    selection: SelectionSet,
}

impl Explorer {
    /// Create an explorer positioned at the drive root.
    pub fn new(controller: Arc<ResourceController>) -> Self {
        Self {
            controller,
            current_path: ROOT_PATH.to_string(),
            current_key: None,
            search_query: String::new(),
            sort: SortOptions::default(),
            selection: SelectionSet::new(),
        }
    }

    pub fn controller(&self) -> &Arc<ResourceController> {
        &self.controller
    }

    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    /// Cache key of the current directory.
    pub fn current_key(&self) -> &QueryKey {
        &self.current_key
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
    }

    pub fn sort(&self) -> SortOptions {
        self.sort
    }

    pub fn set_sort_key(&mut self, key: SortKey) {
        self.sort.key = key;
    }

    pub fn set_sort_direction(&mut self, direction: SortDirection) {
        self.sort.direction = direction;
    }

    pub fn toggle_sort_direction(&mut self) {
        self.sort.direction = self.sort.direction.toggled();
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    // -------------------------------------------------------------------------
    // Loading & navigation
    // -------------------------------------------------------------------------

    /// Make sure the current directory is loaded.
    pub async fn load(&self) -> KbResult<Vec<Resource>> {
        self.controller.load(&self.current_key).await
    }

    /// Refetch the current directory.
    pub async fn reload(&self) -> KbResult<Vec<Resource>> {
        self.controller.refresh(&self.current_key).await
    }

    /// Cached listing of the current directory (empty if not loaded).
    pub fn resources(&self) -> Vec<Resource> {
        self.controller
            .listing(&self.current_key)
            .unwrap_or_default()
    }

    /// Find the entry of the current listing whose path is `path`.
    fn lookup_path(&self, path: &str) -> Option<Resource> {
        let wanted = normalize(path);
        self.resources()
            .into_iter()
            .find(|r| normalize(r.path()) == wanted)
    }

    /// Switch to `path`.
    ///
    /// The path is resolved against the current listing; if it is not an
    /// entry there the view falls back to the root listing. The selection is
    /// cleared either way.
    pub fn navigate_to_path(&mut self, path: &str) {
        let target = self.lookup_path(path);
        if target.is_none() && !normalize(path).is_empty() {
            tracing::debug!("Path {} is not in the current listing, showing root", path);
        }

        self.current_key = target.map(|r| r.resource_id);
        self.current_path = format!("/{}", normalize(path));
        self.selection.clear();
    }

    /// Open `path` from the root, loading every level on the way.
    ///
    /// # Errors
    ///
    /// Returns [`KbError::ResourceNotFound`] if a segment is not a folder of
    /// its parent.
    pub async fn navigate_to(&mut self, path: &str) -> KbResult<()> {
        self.current_key = None;
        self.current_path = ROOT_PATH.to_string();
        self.selection.clear();
        self.load().await?;

        for crumb in breadcrumbs(path) {
            let folder = self
                .lookup_path(&crumb.path)
                .filter(Resource::is_directory)
                .ok_or_else(|| KbError::ResourceNotFound(crumb.path.clone()))?;
            self.navigate_to_path(folder.path());
            self.load().await?;
        }

        tracing::debug!(
            "Opened {} ({})",
            self.current_path,
            describe_key(&self.current_key)
        );
        Ok(())
    }

    /// Resolve an entry of the current listing by resource id or by name.
    ///
    /// Exact matches win over case-insensitive name matches.
    pub fn find(&self, needle: &str) -> Option<Resource> {
        let resources = self.resources();
        resources
            .iter()
            .find(|r| r.resource_id.as_str() == needle || r.name() == needle)
            .or_else(|| {
                let lowered = needle.to_lowercase();
                resources.iter().find(|r| r.name().to_lowercase() == lowered)
            })
            .cloned()
    }

    // -------------------------------------------------------------------------
    // Projection
    // -------------------------------------------------------------------------

    /// Projection of the current listing under the search query.
    pub fn projection(&self) -> Projection {
        project(&self.resources(), &self.search_query)
    }

    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        breadcrumbs(&self.current_path)
    }

    pub fn view(&self) -> ExplorerView {
        let projection = self.projection();
        ExplorerView {
            current_path: self.current_path.clone(),
            breadcrumbs: self.breadcrumbs(),
            items: projection.sorted_items(self.sort),
            indexed_items: projection.indexed_items,
            pending: self.controller.pending(),
            selected: self.selection.to_vec(),
            search_query: self.search_query.clone(),
            sort: self.sort,
        }
    }

    // -------------------------------------------------------------------------
    // Selection
    // -------------------------------------------------------------------------

    pub fn select(&mut self, id: ResourceId, checked: bool) {
        self.selection.set(id, checked);
    }

    /// Select every visible item.
    pub fn select_all(&mut self) {
        let ids = self.projection().items().into_iter().map(|i| i.id().clone());
        self.selection.select_all(ids);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    // -------------------------------------------------------------------------
    // Actions
    // -------------------------------------------------------------------------

    /// Index one entry of the current directory.
    pub async fn index_item(&self, id: &ResourceId) -> KbResult<Uuid> {
        self.controller.index(&self.current_key, id).await
    }

    fn de_index_request(&self, id: &ResourceId) -> KbResult<DeIndexRequest> {
        self.controller
            .find(&self.current_key, id)
            .map(|r| DeIndexRequest::for_resource(&r))
            .ok_or_else(|| KbError::ResourceNotFound(id.to_string()))
    }

    /// De-index one entry of the current directory.
    pub async fn de_index_item(&self, id: &ResourceId) -> KbResult<()> {
        let request = self.de_index_request(id)?;
        self.controller.de_index(&self.current_key, &request).await
    }

    /// Remove one entry of the current directory from its knowledge base.
    pub async fn remove_item(&self, id: &ResourceId) -> KbResult<()> {
        let request = self.de_index_request(id)?;
        self.controller.remove(&self.current_key, &request).await
    }

    /// Index every selected entry concurrently, then clear the selection.
    pub async fn index_selected(&mut self) -> KbResult<BulkOutcome> {
        let ids = self.take_selection()?;
        let results = join_all(ids.iter().map(|id| self.index_item(id))).await;
        Ok(Self::collect(ids, results))
    }

    /// De-index every selected entry concurrently, then clear the selection.
    pub async fn de_index_selected(&mut self) -> KbResult<BulkOutcome> {
        let ids = self.take_selection()?;
        let results = join_all(ids.iter().map(|id| self.de_index_item(id))).await;
        Ok(Self::collect(ids, results))
    }

    /// Remove every selected entry concurrently, then clear the selection.
    pub async fn remove_selected(&mut self) -> KbResult<BulkOutcome> {
        let ids = self.take_selection()?;
        let results = join_all(ids.iter().map(|id| self.remove_item(id))).await;
        Ok(Self::collect(ids, results))
    }

    fn take_selection(&mut self) -> KbResult<Vec<ResourceId>> {
        if self.selection.is_empty() {
            return Err(KbError::NothingSelected);
        }
        let ids = self.selection.to_vec();
        self.selection.clear();
        Ok(ids)
    }

    fn collect<T>(ids: Vec<ResourceId>, results: Vec<KbResult<T>>) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();
        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(_) => outcome.succeeded.push(id),
                Err(e) => outcome.failed.push((id, e)),
            }
        }
        if !outcome.all_succeeded() {
            tracing::warn!(
                "{} of {} item(s) failed",
                outcome.failed.len(),
                outcome.total()
            );
        }
        outcome
    }
}
