//! Error types for bdgeo.
//!
//! A single error hierarchy built with `thiserror`. Stores return it, and the
//! HTTP surface translates it into status codes at the boundary.

use thiserror::Error;

/// Result type alias using `GeoError`.
pub type Result<T> = std::result::Result<T, GeoError>;

/// Main error type for all hierarchy operations.
#[derive(Debug, Error)]
pub enum GeoError {
    // ═══════════════════════════════════════════════════════════════════════════
    // CLIENT ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Malformed id, name, search term, or scope.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Unknown parent, or a parent without children.
    #[error("{0}")]
    NotFound(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // BACKEND ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The backing store could not be reached or timed out.
    #[error("Store unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The dataset violates a structural invariant (duplicate id, dangling parent).
    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Unexpected fault.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GeoError {
    /// Returns true if the caller is at fault (bad input or unknown entity).
    pub fn is_client_error(&self) -> bool {
        matches!(self, GeoError::InvalidArgument(_) | GeoError::NotFound(_))
    }

    /// Returns true if retrying later may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GeoError::UpstreamUnavailable(_))
    }
}
