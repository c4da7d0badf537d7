//! Revision objects and content-addressed storage for canopy.
//!
//! Every snapshot of a dataset is a tree of immutable objects keyed by the
//! BLAKE3 hash of their canonical encoding. This crate owns that object model
//! and the narrow storage interface the rest of the system reads and writes
//! through.
//!
//! # Object Types
//!
//! - [`RevTree`] -- either a leaf tree of [`Node`]s or a sparse map of [`Bucket`]s
//! - [`RevCommit`] -- a root tree plus parent commits
//! - [`RevTag`] -- a named pointer at a commit
//! - [`RevFeature`] -- a record's attribute values
//! - [`RevFeatureType`] -- a record schema, referenced from nodes as metadata
//!
//! # Canonical Ordering
//!
//! [`ordering`] fixes the order of entries inside a tree and the bucket each
//! name falls into at every depth. It is part of the hashed format and must
//! never change.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding

pub mod codec;
pub mod error;
pub mod memory;
pub mod node;
pub mod object;
pub mod ordering;
pub mod traits;
pub mod tree;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryObjectStore;
pub use node::{Node, NodeType, Value};
pub use object::{
    ObjectKind, RevCommit, RevFeature, RevFeatureType, RevObject, RevTag, StoredObject,
};
pub use ordering::CanonicalKey;
pub use traits::ObjectStore;
pub use tree::{Bucket, RevTree, TreeContents};
