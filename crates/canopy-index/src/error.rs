use std::path::PathBuf;

use canopy_store::StoreError;

/// Errors from the external node index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// I/O failure creating, writing, reading or removing spill files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A node record failed to encode or decode.
    #[error("node codec error: {0}")]
    Store(#[from] StoreError),

    /// A spill file does not start with a valid partition header.
    #[error("bad partition file {path}: {reason}")]
    BadPartition { path: PathBuf, reason: String },

    #[error("invalid index configuration: {0}")]
    InvalidConfig(String),

    /// The index was closed.
    #[error("node index is closed")]
    Closed,

    /// `nodes()` was already called; the index is single-pass.
    #[error("node index was already drained")]
    AlreadyDrained,

    /// A flush worker panicked; its partition is lost.
    #[error("flush worker panicked")]
    WorkerPanicked,

    /// The flush pool stopped accepting work.
    #[error("flush pool is shut down")]
    PoolShutDown,
}

/// Result alias for node index operations.
pub type IndexResult<T> = Result<T, IndexError>;
