//! Canonical ordering of tree entries and hash sharding of names.
//!
//! A name is hashed with 64-bit FNV-1a over its UTF-16 code units, each unit
//! fed as its high byte then its low byte, and each byte sign-extended to 64
//! bits before it is XORed in. The hash is read as eight bytes, most
//! significant first. Byte `d` picks the name's bucket at tree depth `d`, scaled down to
//! the number of buckets allowed at that depth. Entries are ordered by their
//! bucket at depth 0, then depth 1, and so on; names that land in the same
//! bucket at every depth fall back to plain string order.
//!
//! Because a name's bucket at depth `d` never depends on anything but the
//! name, two trees holding the same bucket contents at the same depth always
//! hash identically. Every constant here is part of the persisted format.
//!
//! ```text
//! depth  buckets  leaf limit
//! 0-2    32       512
//! 3-4    8        256
//! 5-6    4        256
//! 7      2        256
//! ```

use std::cmp::Ordering;

/// Number of hash bytes, and therefore the deepest bucket level.
pub const MAX_DEPTH: usize = 8;

/// Largest bucket count at any depth.
pub const MAX_BUCKETS: usize = 32;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a hash of a node name.
///
/// Every UTF-16 unit contributes two octets, high byte first. Octets are
/// treated as signed, so `0x80..=0xFF` XOR in with their upper 56 bits set.
pub fn hash_name(name: &str) -> u64 {
    name.encode_utf16()
        .flat_map(|unit| [(unit >> 8) as u8, unit as u8])
        .fold(FNV_OFFSET_BASIS, |hash, octet| {
            (hash ^ octet as i8 as i64 as u64).wrapping_mul(FNV_PRIME)
        })
}

/// Maximum number of entries a leaf tree at `depth` may hold before it must
/// be split into buckets.
pub fn normalized_size_limit(depth: usize) -> usize {
    match depth {
        0..=2 => 512,
        _ => 256,
    }
}

/// Number of buckets a tree at `depth` is split into.
pub fn max_buckets_for_depth(depth: usize) -> usize {
    match depth {
        0..=2 => 32,
        3 | 4 => 8,
        5 | 6 => 4,
        _ => 2,
    }
}

/// Bucket index of a hash at the given depth.
///
/// # Panics
///
/// If `depth >= MAX_DEPTH`; there are no hash bits left to shard on.
pub fn bucket_of_hash(hash: u64, depth: usize) -> u32 {
    assert!(depth < MAX_DEPTH, "depth too deep: {depth}");
    let byte_n = (hash >> (8 * (MAX_DEPTH - 1 - depth))) & 0xFF;
    ((byte_n as usize * max_buckets_for_depth(depth)) / 256) as u32
}

/// Bucket index of `name` at `depth`.
pub fn bucket(name: &str, depth: usize) -> u32 {
    bucket_of_hash(hash_name(name), depth)
}

/// Bucket index of `name` at every depth.
pub fn all_buckets(name: &str) -> [u8; MAX_DEPTH] {
    let hash = hash_name(name);
    let mut buckets = [0u8; MAX_DEPTH];
    for (depth, slot) in buckets.iter_mut().enumerate() {
        *slot = bucket_of_hash(hash, depth) as u8;
    }
    buckets
}

/// Compare two names in canonical order.
pub fn compare(a: &str, b: &str) -> Ordering {
    all_buckets(a)
        .cmp(&all_buckets(b))
        .then_with(|| a.cmp(b))
}

/// A name with its bucket path precomputed, ordered canonically.
///
/// The derived `Ord` compares `buckets` first and `name` second, which is
/// exactly [`compare`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalKey {
    buckets: [u8; MAX_DEPTH],
    name: String,
}

impl CanonicalKey {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            buckets: all_buckets(&name),
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bucket at `depth`; same value as [`bucket`] for this name.
    pub fn bucket(&self, depth: usize) -> u32 {
        self.buckets[depth] as u32
    }

    pub fn into_name(self) -> String {
        self.name
    }
}
