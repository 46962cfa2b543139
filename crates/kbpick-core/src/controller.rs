//! Resource cache controller.
//!
//! Owns the directory listings and applies index / de-index / remove as
//! optimistic mutations:
//!
//! 1. capture the resource's current entry in its directory listing,
//! 2. patch the resource with a transient status (`indexing` / `deindexing`),
//! 3. await the remote call,
//! 4. commit the authoritative patch, or restore that entry on failure.
//!
//! At most one mutation per resource id runs at a time; an overlapping
//! request fails with [`KbError::MutationInProgress`]. Listing fetches are
//! cancellable and a mutation cancels the in-flight fetch of its directory
//! before capturing the entry. A refetch that was started after the
//! capture can still overwrite the optimistic patch (last write wins).

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::api::KnowledgeApi;
use crate::cache::ResourceCache;
use crate::errors::{KbError, KbResult};
use crate::types::{
    describe_key, is_valid_knowledge_base_id, DeIndexRequest, QueryKey, Resource, ResourceId,
    ResourceStatus,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-flight listing fetch for one key.
#[derive(Debug)]
struct ListingTicket {
    generation: u64,
    token: CancellationToken,
}

#[derive(Debug, Default)]
struct ListingRegistry {
    next_generation: u64,
    in_flight: HashMap<QueryKey, ListingTicket>,
}

/// Marks a resource as busy until dropped.
struct MutationGuard<'a> {
    in_flight: &'a Mutex<HashSet<ResourceId>>,
    id: ResourceId,
}

impl Drop for MutationGuard<'_> {
    fn drop(&mut self) {
        lock(self.in_flight).remove(&self.id);
    }
}

/// Cache of directory listings plus the optimistic mutations on them.
pub struct ResourceController {
    api: Arc<dyn KnowledgeApi>,
    cache: Mutex<ResourceCache>,
    in_flight: Mutex<HashSet<ResourceId>>,
    listings: Mutex<ListingRegistry>,
}

impl std::fmt::Debug for ResourceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceController")
            .field("cache", &self.cache)
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

impl ResourceController {
    pub fn new(api: Arc<dyn KnowledgeApi>) -> Self {
        Self {
            api,
            cache: Mutex::new(ResourceCache::new()),
            in_flight: Mutex::new(HashSet::new()),
            listings: Mutex::new(ListingRegistry::default()),
        }
    }

    /// The remote API this controller talks to.
    pub fn api(&self) -> &Arc<dyn KnowledgeApi> {
        &self.api
    }

    // -------------------------------------------------------------------------
    // Listings
    // -------------------------------------------------------------------------

    /// Cached listing for `key`.
    pub fn listing(&self, key: &QueryKey) -> Option<Vec<Resource>> {
        lock(&self.cache).get(key).map(<[Resource]>::to_vec)
    }

    /// Cached resource `id` under `key`.
    pub fn find(&self, key: &QueryKey, id: &ResourceId) -> Option<Resource> {
        lock(&self.cache).find(key, id).cloned()
    }

    /// Whether the listing for `key` is cached.
    pub fn is_loaded(&self, key: &QueryKey) -> bool {
        lock(&self.cache).contains(key)
    }

    /// Drop the cached listing so the next load refetches it.
    pub fn invalidate(&self, key: &QueryKey) {
        if lock(&self.cache).invalidate(key) {
            tracing::debug!("Invalidated listing of {}", describe_key(key));
        }
    }

    /// Cancel the in-flight fetch for `key`, if any.
    pub fn cancel_listing(&self, key: &QueryKey) {
        if let Some(ticket) = lock(&self.listings).in_flight.remove(key) {
            tracing::debug!("Cancelling listing fetch of {}", describe_key(key));
            ticket.token.cancel();
        }
    }

    /// Return the cached listing, fetching it first if needed.
    pub async fn load(&self, key: &QueryKey) -> KbResult<Vec<Resource>> {
        if let Some(resources) = self.listing(key) {
            return Ok(resources);
        }
        self.refresh(key).await
    }

    /// Fetch the listing for `key` and replace the cached snapshot.
    ///
    /// A previous fetch for the same key is cancelled first. If this fetch is
    /// itself cancelled it returns [`KbError::Cancelled`] and leaves the
    /// cache untouched.
    pub async fn refresh(&self, key: &QueryKey) -> KbResult<Vec<Resource>> {
        let (generation, token) = self.begin_listing(key);

        let result = tokio::select! {
            _ = token.cancelled() => Err(KbError::Cancelled),
            result = self.api.list_children(key.as_ref()) => result,
        };

        self.finish_listing(key, generation);

        let resources = match result {
            Ok(resources) => resources,
            Err(KbError::Cancelled) => {
                tracing::debug!("Listing fetch of {} was cancelled", describe_key(key));
                return Err(KbError::Cancelled);
            }
            Err(e) => {
                tracing::error!("Error fetching {}: {}", describe_key(key), e);
                return Err(KbError::listing_failed(key.as_ref().map(ResourceId::as_str), e));
            }
        };

        let mut cache = lock(&self.cache);
        if token.is_cancelled() {
            return Err(KbError::Cancelled);
        }
        cache.replace(key.clone(), resources.clone());
        Ok(resources)
    }

    fn begin_listing(&self, key: &QueryKey) -> (u64, CancellationToken) {
        let mut registry = lock(&self.listings);
        registry.next_generation += 1;
        let generation = registry.next_generation;
        let token = CancellationToken::new();
        let previous = registry.in_flight.insert(
            key.clone(),
            ListingTicket {
                generation,
                token: token.clone(),
            },
        );
        if let Some(previous) = previous {
            tracing::debug!("Superseding listing fetch of {}", describe_key(key));
            previous.token.cancel();
        }
        (generation, token)
    }

    fn finish_listing(&self, key: &QueryKey, generation: u64) {
        let mut registry = lock(&self.listings);
        if registry
            .in_flight
            .get(key)
            .is_some_and(|t| t.generation == generation)
        {
            registry.in_flight.remove(key);
        }
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Whether a mutation on `id` is in flight.
    pub fn is_pending(&self, id: &ResourceId) -> bool {
        lock(&self.in_flight).contains(id)
    }

    /// Ids with a mutation in flight.
    pub fn pending(&self) -> Vec<ResourceId> {
        let mut ids: Vec<_> = lock(&self.in_flight).iter().cloned().collect();
        ids.sort();
        ids
    }

    fn begin_mutation(&self, id: &ResourceId) -> KbResult<MutationGuard<'_>> {
        if !lock(&self.in_flight).insert(id.clone()) {
            return Err(KbError::MutationInProgress {
                resource_id: id.to_string(),
            });
        }
        Ok(MutationGuard {
            in_flight: &self.in_flight,
            id: id.clone(),
        })
    }

    /// Apply the transient patch to `id`, returning its prior value.
    fn apply_optimistic(
        &self,
        key: &QueryKey,
        id: &ResourceId,
        status: ResourceStatus,
    ) -> Option<Resource> {
        self.cancel_listing(key);
        let mut cache = lock(&self.cache);
        let prior = cache.find(key, id).cloned();
        cache.patch(key, id, |r| r.status = Some(status));
        prior
    }

    /// Put back the entry captured by [`Self::apply_optimistic`].
    ///
    /// Only the mutated resource is restored; siblings committed meanwhile
    /// keep their state.
    fn rollback(&self, key: &QueryKey, prior: Option<Resource>) {
        let Some(prior) = prior else {
            return;
        };
        tracing::warn!("Rolling back {} in {}", prior.resource_id, describe_key(key));
        if !lock(&self.cache).restore(key, prior) {
            tracing::debug!("Rolled back resource is no longer cached under {}", describe_key(key));
        }
    }

    /// Index the resource `id` listed under `key`.
    ///
    /// Creates a knowledge base scoped to the resource and triggers its sync
    /// job. Returns the new knowledge base id.
    ///
    /// # Errors
    ///
    /// - [`KbError::ResourceNotFound`] / [`KbError::AlreadyIndexed`] before any
    ///   network call.
    /// - [`KbError::IndexFailed`] if the knowledge base could not be created.
    /// - [`KbError::SyncTriggerFailed`] if it was created but sync did not
    ///   start. The knowledge base stays on the server.
    ///
    /// On error the resource's entry is restored to its pre-mutation value.
    pub async fn index(&self, key: &QueryKey, id: &ResourceId) -> KbResult<Uuid> {
        let _guard = self.begin_mutation(id)?;

        match self.find(key, id) {
            None => return Err(KbError::ResourceNotFound(id.to_string())),
            Some(resource) if resource.is_indexed() => {
                return Err(KbError::AlreadyIndexed(id.to_string()))
            }
            Some(_) => {}
        }

        tracing::debug!("Indexing resource {}", id);
        let prior = self.apply_optimistic(key, id, ResourceStatus::Indexing);

        match self.run_index(id).await {
            Ok(knowledge_base_id) => {
                let committed = lock(&self.cache).patch(key, id, |r| {
                    r.knowledge_base_id = Some(knowledge_base_id);
                    r.status = Some(ResourceStatus::Indexed);
                });
                if committed.is_none() {
                    tracing::debug!("Indexed {} is no longer cached under {}", id, describe_key(key));
                }
                tracing::info!("Indexed {} into knowledge base {}", id, knowledge_base_id);
                Ok(knowledge_base_id)
            }
            Err(e) => {
                tracing::error!("Error indexing resource {}: {}", id, e);
                self.rollback(key, prior);
                Err(e)
            }
        }
    }

    async fn run_index(&self, id: &ResourceId) -> KbResult<Uuid> {
        let knowledge_base = self
            .api
            .create_knowledge_base(id)
            .await
            .map_err(|e| KbError::IndexFailed {
                resource_id: id.to_string(),
                reason: e.to_string(),
            })?;
        let knowledge_base_id = knowledge_base.knowledge_base_id;

        let sync_failed = |e: KbError| {
            tracing::warn!(
                "Knowledge base {} left without a sync job for {}",
                knowledge_base_id,
                id
            );
            KbError::SyncTriggerFailed {
                resource_id: id.to_string(),
                knowledge_base_id: knowledge_base_id.to_string(),
                reason: e.to_string(),
            }
        };

        let organization = self.api.current_organization().await.map_err(sync_failed)?;
        self.api
            .trigger_sync(&knowledge_base_id, &organization.org_id)
            .await
            .map_err(sync_failed)?;

        Ok(knowledge_base_id)
    }

    /// Remove a resource from its knowledge base.
    ///
    /// # Errors
    ///
    /// - [`KbError::NotIndexed`] if the request carries no valid knowledge
    ///   base id. No network call is made.
    /// - [`KbError::DeIndexFailed`] if the remote deletion failed; the
    ///   resource's entry is restored to its pre-mutation value.
    pub async fn de_index(&self, key: &QueryKey, request: &DeIndexRequest) -> KbResult<()> {
        let knowledge_base_id = match request.knowledge_base_id {
            Some(id) if is_valid_knowledge_base_id(Some(&id)) => id,
            _ => {
                return Err(KbError::NotIndexed {
                    resource_id: request.resource_id.to_string(),
                })
            }
        };
        let id = &request.resource_id;
        let _guard = self.begin_mutation(id)?;

        tracing::debug!("De-indexing resource {} from {}", id, knowledge_base_id);
        let prior = self.apply_optimistic(key, id, ResourceStatus::Deindexing);

        let result = self
            .api
            .delete_knowledge_base_resource(&knowledge_base_id, &request.resource_path)
            .await;

        match result {
            Ok(()) => {
                lock(&self.cache).patch(key, id, |r| r.status = Some(ResourceStatus::DeIndexed));
                tracing::info!("De-indexed {}", id);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Error de-indexing resource {}: {}", id, e);
                self.rollback(key, prior);
                Err(KbError::DeIndexFailed {
                    resource_id: id.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// De-index, then invalidate the listing so it is refetched.
    pub async fn remove(&self, key: &QueryKey, request: &DeIndexRequest) -> KbResult<()> {
        self.de_index(key, request).await?;
        self.invalidate(key);
        Ok(())
    }
}
