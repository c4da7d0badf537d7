//! Post-order traversal of the canopy object graph.
//!
//! [`PostOrderIter`] lazily walks tags, commits, trees, features and feature
//! types reachable from a set of starting ids, yielding every object after
//! everything it references. What counts as reachable is a [`Successors`]
//! policy; deduplication and blacklisting are policy combinators, with the
//! visited set supplied by the caller through [`Deduplicator`].
//!
//! The factories cover the common walks:
//!
//! - [`all`] -- everything reachable from one id
//! - [`range`] -- what `start` reaches that `base` does not, for transfers
//! - [`range_of_commits`] -- the same, restricted to commits
//! - [`contents_of`] -- tree and feature content without ancestry

pub mod dedup;
pub mod error;
pub mod iter;
pub mod successors;

pub use dedup::{Deduplicator, HeapDeduplicator};
pub use error::{WalkError, WalkResult};
pub use iter::{all, contents_of, range, range_of_commits, PostOrderIter};
pub use successors::Successors;
