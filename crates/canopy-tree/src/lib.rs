//! Building and searching canonical revision trees.
//!
//! A tree level holds its entries directly while they fit under the leaf
//! limit for its depth, and is split into hash buckets once they do not. The
//! shape only depends on the set of entries, so the same contents always get
//! the same tree id no matter how they were assembled.
//!
//! - [`CanonicalTreeBuilder`] applies puts and removes to an existing tree
//!   and rewrites only the buckets that changed.
//! - [`LargeTreeBuilder`] stages any number of entries from many producers
//!   through an external index and folds them into a tree in one pass.
//! - [`DepthSearch`] resolves `/`-separated paths through nested trees.

pub mod builder;
pub mod config;
pub mod error;
pub mod large;
pub mod node_ref;
pub mod paths;
pub mod search;

pub use builder::CanonicalTreeBuilder;
pub use config::TreeBuilderConfig;
pub use error::{TreeError, TreeResult};
pub use large::LargeTreeBuilder;
pub use node_ref::NodeRef;
pub use search::DepthSearch;
