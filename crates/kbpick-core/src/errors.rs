//! Error types for kbpick-core.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for kbpick-core operations.
pub type KbResult<T> = Result<T, KbError>;

/// Coarse classification of a [`KbError`].
///
/// Front ends use this to decide how a failure is surfaced: authentication
/// failures block the app, listing failures show an inline error, mutation
/// failures are transient notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Token acquisition failed. Fatal at startup.
    Authentication,
    /// A directory listing could not be fetched. Retry by re-navigating.
    Listing,
    /// Index / de-index / remove failed remotely. Local state was rolled back.
    Mutation,
    /// The request was rejected before any network call.
    Precondition,
    /// Configuration is missing or invalid.
    Configuration,
    /// The operation was superseded by a newer one.
    Cancelled,
    /// Anything else (I/O, decoding).
    Internal,
}

/// Domain-specific errors for kbpick operations.
#[derive(Error, Debug)]
pub enum KbError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration file is invalid.
    #[error("Config invalid: {0}")]
    InvalidConfig(String),

    /// A configuration value is invalid.
    #[error("Invalid configuration: {message}. {hint}")]
    InvalidConfiguration {
        /// Description of the invalid configuration.
        message: String,
        /// Actionable hint on how to fix it.
        hint: String,
    },

    /// Email or password for the identity provider is not configured.
    #[error("Missing credentials: {field} is not set. Set `auth.{field}` in the config or KBPICK_{env}.")]
    MissingCredentials {
        /// Config field name (`email` or `password`).
        field: &'static str,
        /// Upper-case environment variable suffix.
        env: &'static str,
    },

    // =========================================================================
    // Session Errors
    // =========================================================================
    /// The identity provider rejected the credentials.
    #[error("Authentication failed ({status}): {message}")]
    AuthenticationFailed {
        /// HTTP status of the token response.
        status: u16,
        /// Response body or decode error.
        message: String,
    },

    /// The identity provider could not be reached.
    #[error("Could not reach the identity provider at `{url}`: {reason}")]
    AuthUnreachable {
        /// Token endpoint that was called.
        url: String,
        /// Transport error.
        reason: String,
    },

    // =========================================================================
    // Remote API Errors
    // =========================================================================
    /// Transport-level failure (connect, timeout, decode).
    #[error("Request to `{endpoint}` failed: {reason}")]
    Request {
        /// Endpoint path that was called.
        endpoint: String,
        /// Description of the failure.
        reason: String,
    },

    /// The server answered with a non-success status.
    #[error("Request to `{endpoint}` returned {status}: {body}")]
    UnexpectedStatus {
        /// Endpoint path that was called.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Response body (possibly truncated).
        body: String,
    },

    /// No connection exists for the configured provider.
    #[error("No `{provider}` connection found for this account.")]
    NoConnection {
        /// Connection provider (e.g. `gdrive`).
        provider: String,
    },

    // =========================================================================
    // Listing Errors
    // =========================================================================
    /// Fetching the children of a directory failed.
    #[error("Failed to load `{parent}`: {reason}")]
    ListingFailed {
        /// Parent resource id, or `root`.
        parent: String,
        /// Description of the failure.
        reason: String,
    },

    /// The operation was cancelled by a newer request for the same listing.
    #[error("Request cancelled")]
    Cancelled,

    // =========================================================================
    // Precondition Errors
    // =========================================================================
    /// The resource is not part of the loaded listing.
    #[error("Resource `{0}` not found.")]
    ResourceNotFound(String),

    /// The resource is already indexed.
    #[error("Resource `{0}` is already indexed.")]
    AlreadyIndexed(String),

    /// The resource has no valid knowledge base.
    #[error("Resource `{resource_id}` is not indexed or has no valid knowledge base.")]
    NotIndexed {
        /// The resource that was targeted.
        resource_id: String,
    },

    /// Another mutation for the same resource is still in flight.
    #[error("An operation on `{resource_id}` is already in progress.")]
    MutationInProgress {
        /// The resource that is busy.
        resource_id: String,
    },

    /// A bulk action was requested with an empty selection.
    #[error("No items selected.")]
    NothingSelected,

    // =========================================================================
    // Mutation Errors
    // =========================================================================
    /// Creating the knowledge base for a resource failed.
    #[error("Failed to index `{resource_id}`: {reason}")]
    IndexFailed {
        /// The resource being indexed.
        resource_id: String,
        /// Description of the failure.
        reason: String,
    },

    /// The knowledge base was created but the sync job could not be started.
    ///
    /// The knowledge base is left on the server.
    #[error("Knowledge base `{knowledge_base_id}` was created for `{resource_id}` but sync could not be triggered: {reason}")]
    SyncTriggerFailed {
        /// The resource being indexed.
        resource_id: String,
        /// The orphaned knowledge base.
        knowledge_base_id: String,
        /// Description of the failure.
        reason: String,
    },

    /// Removing the resource from its knowledge base failed.
    #[error("Failed to de-index `{resource_id}`: {reason}")]
    DeIndexFailed {
        /// The resource being de-indexed.
        resource_id: String,
        /// Description of the failure.
        reason: String,
    },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// Config I/O error.
    #[error("Config I/O error at `{path}`: {message}")]
    ConfigIo {
        /// Path to the config file.
        path: PathBuf,
        /// Description of the I/O error.
        message: String,
    },

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A wrapped generic error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl KbError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig(_)
            | Self::InvalidConfiguration { .. }
            | Self::MissingCredentials { .. }
            | Self::ConfigIo { .. } => ErrorKind::Configuration,
            Self::AuthenticationFailed { .. } | Self::AuthUnreachable { .. } => {
                ErrorKind::Authentication
            }
            Self::ListingFailed { .. } | Self::NoConnection { .. } => ErrorKind::Listing,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::ResourceNotFound(_)
            | Self::AlreadyIndexed(_)
            | Self::NotIndexed { .. }
            | Self::MutationInProgress { .. }
            | Self::NothingSelected => ErrorKind::Precondition,
            Self::IndexFailed { .. }
            | Self::SyncTriggerFailed { .. }
            | Self::DeIndexFailed { .. } => ErrorKind::Mutation,
            Self::Request { .. } | Self::UnexpectedStatus { .. } => ErrorKind::Mutation,
            Self::Io(_) | Self::Json(_) | Self::Yaml(_) | Self::Other(_) => ErrorKind::Internal,
        }
    }

    /// Whether re-invoking the same action may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Listing | ErrorKind::Mutation | ErrorKind::Cancelled
        )
    }

    /// Create a listing failure for `parent` (`None` = root).
    pub fn listing_failed(parent: Option<&str>, reason: impl std::fmt::Display) -> Self {
        Self::ListingFailed {
            parent: parent.unwrap_or("root").to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a request failure.
    pub fn request(endpoint: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Request {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }
}
