//! Error types for the catalog synchronization engine.

use thiserror::Error;

/// Result type alias using `SyncError`.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while talking to the Remote Catalog Service or
/// reconciling its entities into the local catalog.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// API key to bearer token exchange failed.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The Remote Catalog Service answered with a non-success status.
    #[error("Remote request failed ({}): {message}", status_label(.status))]
    RemoteRequest { status: Option<u16>, message: String },

    /// The remote side broke a wire invariant.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Required linkage missing while building a payload.
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// Local Catalog Store operation failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// The entity was created remotely but its local link could not be stored.
    #[error("created remotely as {remote_id} but the local link failed: {source}")]
    Unlinked {
        remote_id: String,
        #[source]
        source: StoreError,
    },

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Maximum retry attempts exceeded for a transient failure.
    #[error("Maximum retries ({attempts}) exceeded")]
    MaxRetriesExceeded { attempts: u32 },

    /// The operation was cancelled by the caller.
    #[error("Operation cancelled")]
    Cancelled,
}

impl SyncError {
    /// Builds a `RemoteRequest` error from a status code and body.
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::RemoteRequest {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Returns true for failures that are worth retrying.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RemoteRequest {
                status: Some(status),
                ..
            } => matches!(status, 429 | 502 | 503 | 504),
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Returns the HTTP status carried by the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RemoteRequest { status, .. } => *status,
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

fn status_label(status: &Option<u16>) -> String {
    status.map_or_else(|| "no status".to_string(), |s| s.to_string())
}

/// Missing linkage detected while mapping between remote and local entities.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    /// No local category is linked to the remote category of a product.
    #[error("no local category associated with remote category '{remote_category_id}'")]
    MissingCategoryLink { remote_category_id: String },

    /// The remote product carries no category at all.
    #[error("remote product '{remote_id}' has no category")]
    ProductWithoutCategory { remote_id: String },

    /// No department was chosen for a product.
    #[error("no department chosen for product '{name}'")]
    MissingDepartment { name: String },

    /// The local entity has no remote sales point assigned.
    #[error("no remote sales point assigned to '{name}'")]
    MissingSalesPoint { name: String },

    /// The local category of a product has not been exported yet.
    #[error("category of product '{name}' is not linked to a remote category")]
    MissingRemoteCategory { name: String },
}

/// Failure reported by a Local Catalog Store implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The entity to update does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The store rejected the payload.
    #[error("rejected by store: {0}")]
    Rejected(String),

    /// The store could not be reached or failed internally.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
