//! Foundation types for canopy revision trees.
//!
//! Every other canopy crate depends on `canopy-types`.
//!
//! # Key Types
//!
//! - [`ObjectId`] -- content-addressed identifier (BLAKE3 digest), with a
//!   distinguished [`ObjectId::NULL`] meaning "absent" or "deleted"
//! - [`Envelope`] -- 2D bounding box used for spatial pruning of nodes and buckets
//! - [`ContentHasher`] -- domain-separated hashing, one domain per object kind

pub mod envelope;
pub mod error;
pub mod hasher;
pub mod object;

pub use envelope::Envelope;
pub use error::TypeError;
pub use hasher::ContentHasher;
pub use object::ObjectId;
