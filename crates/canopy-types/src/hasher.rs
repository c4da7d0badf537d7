use crate::object::ObjectId;

/// Domain-separated BLAKE3 content hasher.
///
/// Each object kind hashes under its own domain tag so that, e.g., a tree and
/// a feature with byte-identical payloads still get different ids. The tags
/// are part of the persisted format: changing one re-keys every object of
/// that kind.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    pub const COMMIT: Self = Self::new("canopy-commit-v1");
    pub const TREE: Self = Self::new("canopy-tree-v1");
    pub const FEATURE: Self = Self::new("canopy-feature-v1");
    pub const FEATURE_TYPE: Self = Self::new("canopy-featuretype-v1");
    pub const TAG: Self = Self::new("canopy-tag-v1");

    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> ObjectId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        ObjectId::from_hash(*hasher.finalize().as_bytes())
    }

    /// Verify that `data` hashes to `expected` under this domain.
    pub fn verify(&self, data: &[u8], expected: &ObjectId) -> bool {
        self.hash(data) == *expected
    }

    pub fn domain(&self) -> &str {
        self.domain
    }
}
