//! Error types for the catalog.

use fstore_dfs::DfsError;
use thiserror::Error;

/// Result type alias for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Catalog failures.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Filesystem call failed while reading or writing an attribute.
    #[error("filesystem error: {0}")]
    Dfs(#[from] DfsError),

    /// An attribute document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A filter parameter could not be bound.
    #[error("invalid filter {filter}={param}: {reason}")]
    InvalidFilter {
        /// Filter name.
        filter: String,
        /// The rejected parameter.
        param: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A sort or filter name is not known.
    #[error("unknown {kind}: {name}")]
    UnknownQueryField {
        /// `sort` or `filter`.
        kind: &'static str,
        /// The rejected name.
        name: String,
    },

    /// A record breaks a table constraint.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}
