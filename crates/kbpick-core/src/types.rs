//! Common types used throughout kbpick.
//!
//! These mirror the payloads of the knowledge-base backend: drive resources,
//! connections, knowledge bases and organizations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// ResourceId
// ============================================================================

/// Identifier of a drive resource (file or folder).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub String);

impl ResourceId {
    /// Create a new resource id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ResourceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Cache key of a directory listing: the parent resource id, `None` for the root.
pub type QueryKey = Option<ResourceId>;

/// Render a query key for logs and error messages.
pub fn describe_key(key: &QueryKey) -> &str {
    key.as_ref().map(ResourceId::as_str).unwrap_or("root")
}

// ============================================================================
// Knowledge base ids
// ============================================================================

/// The all-zero id the backend uses for "no knowledge base".
pub const NIL_KNOWLEDGE_BASE_ID: Uuid = Uuid::nil();

/// Whether `id` references a real knowledge base.
pub fn is_valid_knowledge_base_id(id: Option<&Uuid>) -> bool {
    matches!(id, Some(id) if *id != NIL_KNOWLEDGE_BASE_ID)
}

// ============================================================================
// InodeType / InodePath
// ============================================================================

/// Kind of drive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InodeType {
    /// A folder.
    Directory,
    /// A regular file.
    File,
}

/// Path wrapper as sent by the backend (`{"path": "..."}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InodePath {
    pub path: String,
}

// ============================================================================
// ResourceStatus
// ============================================================================

/// Indexing status of a resource.
///
/// Unknown values reported by the backend are preserved in [`ResourceStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResourceStatus {
    /// Registered in a knowledge base.
    Indexed,
    /// Index requested, not confirmed yet.
    Indexing,
    /// De-index requested, not confirmed yet.
    Deindexing,
    /// Removed from its knowledge base.
    DeIndexed,
    /// Any other status string.
    Other(String),
}

impl ResourceStatus {
    /// Get the wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Indexed => "indexed",
            Self::Indexing => "indexing",
            Self::Deindexing => "deindexing",
            Self::DeIndexed => "de-indexed",
            Self::Other(s) => s,
        }
    }

    /// Whether a mutation on this resource is still waiting for the server.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Indexing | Self::Deindexing)
    }
}

impl From<String> for ResourceStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "indexed" => Self::Indexed,
            "indexing" => Self::Indexing,
            "deindexing" => Self::Deindexing,
            "de-indexed" => Self::DeIndexed,
            _ => Self::Other(s),
        }
    }
}

impl From<ResourceStatus> for String {
    fn from(status: ResourceStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Resource
// ============================================================================

/// A file or folder entry of the remote drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub resource_id: ResourceId,
    pub inode_type: InodeType,
    pub inode_path: InodePath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ResourceStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_base_id: Option<Uuid>,
    pub modified_at: DateTime<Utc>,
}

impl Resource {
    /// Full path of the resource.
    pub fn path(&self) -> &str {
        &self.inode_path.path
    }

    /// Last path segment.
    pub fn name(&self) -> &str {
        self.inode_path.path.rsplit('/').next().unwrap_or("")
    }

    pub fn is_directory(&self) -> bool {
        self.inode_type == InodeType::Directory
    }

    pub fn is_indexed(&self) -> bool {
        self.status == Some(ResourceStatus::Indexed)
    }
}

// ============================================================================
// Remote payloads
// ============================================================================

/// A drive connection of the current account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub connection_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub connection_provider: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A knowledge base as returned by the creation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub knowledge_base_id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
}

/// The organization of the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub org_id: String,
}

/// Arguments of a de-index or remove request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeIndexRequest {
    pub knowledge_base_id: Option<Uuid>,
    pub resource_path: String,
    pub resource_id: ResourceId,
}

impl DeIndexRequest {
    /// Build a request from a listing entry.
    pub fn for_resource(resource: &Resource) -> Self {
        Self {
            knowledge_base_id: resource.knowledge_base_id,
            resource_path: resource.inode_path.path.clone(),
            resource_id: resource.resource_id.clone(),
        }
    }
}
