//! Remote knowledge-base API.
//!
//! [`KnowledgeApi`] is the seam between the resource controller and the
//! backend. [`HttpKnowledgeApi`] is the production implementation; tests
//! provide their own doubles.

mod http;
mod session;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::KbResult;
use crate::types::{Connection, KnowledgeBase, Organization, Resource, ResourceId};

pub use http::HttpKnowledgeApi;
pub use session::{Session, AUTH_TOKEN_PATH};

/// Operations the picker issues against the knowledge-base backend.
///
/// Implementations must be `Send + Sync`; the controller shares one instance
/// across concurrent mutations.
#[async_trait]
pub trait KnowledgeApi: Send + Sync {
    /// List the drive connections of the configured provider.
    async fn list_connections(&self) -> KbResult<Vec<Connection>>;

    /// List the children of `parent`, or of the drive root when `None`.
    async fn list_children(&self, parent: Option<&ResourceId>) -> KbResult<Vec<Resource>>;

    /// Create a knowledge base scoped to a single resource.
    async fn create_knowledge_base(&self, resource_id: &ResourceId) -> KbResult<KnowledgeBase>;

    /// Look up the organization of the authenticated user.
    async fn current_organization(&self) -> KbResult<Organization>;

    /// Start the sync job that indexes a knowledge base.
    async fn trigger_sync(&self, knowledge_base_id: &Uuid, org_id: &str) -> KbResult<()>;

    /// Remove the resource at `resource_path` from a knowledge base.
    async fn delete_knowledge_base_resource(
        &self,
        knowledge_base_id: &Uuid,
        resource_path: &str,
    ) -> KbResult<()>;
}
