//! Error types for graph traversal.

use canopy_store::StoreError;

/// Errors that end a traversal.
#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    /// An object could not be loaded, or was not what it claimed to be.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience alias for traversal results.
pub type WalkResult<T> = Result<T, WalkError>;
