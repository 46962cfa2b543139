//! # kbpick-core
//!
//! **Knowledge-base file picker** – core library.
//!
//! Browse a drive-like resource tree exposed by a knowledge-base backend and
//! toggle which files and folders are indexed. Designed to be consumed by the
//! `kbpick` CLI and other Rust front ends.
//!
//! ## Main Types
//!
//! - [`ResourceController`] – listing cache with optimistic index / de-index / remove
//! - [`Explorer`] – navigation, search, sort and selection over one directory view
//! - [`KnowledgeApi`] – the remote API seam, with [`HttpKnowledgeApi`] as implementation
//! - [`KbError`] – domain-specific error type
//!
//! ## Modules
//!
//! - [`api`] – remote API trait, HTTP client, authenticated session
//! - [`cache`] – per-directory listing snapshots
//! - [`config`] – configuration (`~/.kbpick/config.yaml`)
//! - [`controller`] – optimistic mutations with rollback
//! - [`explorer`] – directory view state and bulk actions
//! - [`projection`] – filtering, sorting, breadcrumbs
//! - [`selection`] – checked items
//! - [`types`] – resources and backend payloads
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use kbpick_core::{Config, Explorer, HttpKnowledgeApi, ResourceController};
//!
//! let config = Config::load_default()?.with_env_overrides();
//! let api = Arc::new(HttpKnowledgeApi::from_config(&config)?);
//! let controller = Arc::new(ResourceController::new(api));
//!
//! let mut explorer = Explorer::new(controller);
//! explorer.navigate_to("/papers").await?;
//! for item in explorer.view().items {
//!     println!("{}", item.name());
//! }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod controller;
pub mod errors;
pub mod explorer;
pub mod projection;
pub mod selection;
pub mod types;

pub use api::{HttpKnowledgeApi, KnowledgeApi, Session};
pub use cache::ResourceCache;
pub use config::{AuthConfig, Config, ConnectionConfig, Credentials, IndexingConfig};
pub use controller::ResourceController;
pub use errors::{ErrorKind, KbError, KbResult};
pub use explorer::{BulkOutcome, Explorer, ExplorerView, ROOT_PATH};
pub use projection::{
    breadcrumbs, project, sort_items, Breadcrumb, File, FileItem, Folder, Projection,
    SortDirection, SortKey, SortOptions,
};
pub use selection::SelectionSet;
pub use types::{
    is_valid_knowledge_base_id, Connection, DeIndexRequest, InodePath, InodeType, KnowledgeBase,
    Organization, QueryKey, Resource, ResourceId, ResourceStatus, NIL_KNOWLEDGE_BASE_ID,
};
