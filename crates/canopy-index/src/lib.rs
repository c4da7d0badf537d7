//! External node index for canopy bulk loads.
//!
//! [`FileNodeIndex`] accepts any number of [`Node`](canopy_store::Node)s from
//! any number of threads while keeping at most one partition per flush slot
//! in memory. Full partitions are handed to a small pool of flush workers
//! that write them, sorted and zstd-compressed, into a private scratch
//! directory. [`FileNodeIndex::nodes`] then streams every node back exactly
//! once in canonical order with a k-way merge over the spilled partitions
//! and whatever is still in memory.
//!
//! When the same name is added more than once the last value added wins.

pub mod config;
pub mod error;
pub mod index;
mod merge;
mod partition;
mod pool;

pub use config::NodeIndexConfig;
pub use error::{IndexError, IndexResult};
pub use index::FileNodeIndex;
pub use merge::Nodes;
