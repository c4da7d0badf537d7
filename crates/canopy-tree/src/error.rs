use canopy_index::IndexError;
use canopy_store::StoreError;
use canopy_types::ObjectId;

/// Errors from tree building and lookup.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("node index error: {0}")]
    Index(#[from] IndexError),

    /// A lookup path broke a precondition. Nothing was read.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// A node name cannot be stored in a tree.
    #[error("invalid node name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// A stored tree violates the canonical shape.
    #[error("corrupt tree {id}: {reason}")]
    CorruptTree { id: ObjectId, reason: String },
}

/// Result alias for tree operations.
pub type TreeResult<T> = Result<T, TreeError>;
