use canopy_types::{ContentHasher, ObjectId};

use crate::codec;
use crate::error::{StoreError, StoreResult};
use crate::node::Value;
use crate::tree::{corrupt, RevTree};

/// The kind of object stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Commit,
    Tree,
    Feature,
    FeatureType,
    Tag,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Commit => write!(f, "commit"),
            Self::Tree => write!(f, "tree"),
            Self::Feature => write!(f, "feature"),
            Self::FeatureType => write!(f, "feature type"),
            Self::Tag => write!(f, "tag"),
        }
    }
}

impl ObjectKind {
    fn hasher(self) -> &'static ContentHasher {
        match self {
            Self::Commit => &ContentHasher::COMMIT,
            Self::Tree => &ContentHasher::TREE,
            Self::Feature => &ContentHasher::FEATURE,
            Self::FeatureType => &ContentHasher::FEATURE_TYPE,
            Self::Tag => &ContentHasher::TAG,
        }
    }
}

/// A stored object: kind tag + encoded data + cached size.
///
/// `StoredObject` is the unit of storage. Stores never interpret the data;
/// they are pure key-value maps keyed by [`StoredObject::compute_id`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub kind: ObjectKind,
    pub data: Vec<u8>,
    pub size: u64,
}

impl StoredObject {
    pub fn new(kind: ObjectKind, data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self { kind, data, size }
    }

    /// Content-addressed id, hashed under the kind's domain.
    pub fn compute_id(&self) -> ObjectId {
        self.kind.hasher().hash(&self.data)
    }
}

fn check_kind(obj: &StoredObject, expected: ObjectKind) -> StoreResult<ObjectId> {
    let id = obj.compute_id();
    if obj.kind != expected {
        return Err(StoreError::UnexpectedKind {
            id,
            expected,
            actual: obj.kind,
        });
    }
    Ok(id)
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

/// A snapshot: a root tree plus the commits it descends from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevCommit {
    id: ObjectId,
    tree_id: ObjectId,
    parent_ids: Vec<ObjectId>,
    author: String,
    message: String,
    timestamp: i64,
}

impl RevCommit {
    pub fn new(
        tree_id: ObjectId,
        parent_ids: Vec<ObjectId>,
        author: impl Into<String>,
        message: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        let mut commit = Self {
            id: ObjectId::NULL,
            tree_id,
            parent_ids,
            author: author.into(),
            message: message.into(),
            timestamp,
        };
        commit.id = ContentHasher::COMMIT.hash(&commit.encode());
        commit
    }

    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    pub fn tree_id(&self) -> &ObjectId {
        &self.tree_id
    }

    pub fn parent_ids(&self) -> &[ObjectId] {
        &self.parent_ids
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Milliseconds since the Unix epoch.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        codec::encode_id(&mut buf, &self.tree_id);
        codec::encode_varint(&mut buf, self.parent_ids.len() as u64);
        for parent in &self.parent_ids {
            codec::encode_id(&mut buf, parent);
        }
        codec::encode_str(&mut buf, &self.author);
        codec::encode_str(&mut buf, &self.message);
        codec::encode_i64(&mut buf, self.timestamp);
        buf
    }

    pub fn to_stored_object(&self) -> StoredObject {
        StoredObject::new(ObjectKind::Commit, self.encode())
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        let id = check_kind(obj, ObjectKind::Commit)?;
        codec::decode_exact(&obj.data, |dec| {
            let tree_id = dec.id("commit tree")?;
            let count = dec.varint("parent count")?;
            let parent_ids = (0..count)
                .map(|_| dec.id("commit parent"))
                .collect::<StoreResult<Vec<_>>>()?;
            Ok(Self {
                id,
                tree_id,
                parent_ids,
                author: dec.string("commit author")?,
                message: dec.string("commit message")?,
                timestamp: dec.i64("commit timestamp")?,
            })
        })
        .map_err(|e| corrupt(id, e))
    }
}

// ---------------------------------------------------------------------------
// Tag
// ---------------------------------------------------------------------------

/// A named, annotated pointer at a commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevTag {
    id: ObjectId,
    name: String,
    commit_id: ObjectId,
    message: String,
}

impl RevTag {
    pub fn new(name: impl Into<String>, commit_id: ObjectId, message: impl Into<String>) -> Self {
        let mut tag = Self {
            id: ObjectId::NULL,
            name: name.into(),
            commit_id,
            message: message.into(),
        };
        tag.id = ContentHasher::TAG.hash(&tag.encode());
        tag
    }

    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn commit_id(&self) -> &ObjectId {
        &self.commit_id
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        codec::encode_str(&mut buf, &self.name);
        codec::encode_id(&mut buf, &self.commit_id);
        codec::encode_str(&mut buf, &self.message);
        buf
    }

    pub fn to_stored_object(&self) -> StoredObject {
        StoredObject::new(ObjectKind::Tag, self.encode())
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        let id = check_kind(obj, ObjectKind::Tag)?;
        codec::decode_exact(&obj.data, |dec| {
            Ok(Self {
                id,
                name: dec.string("tag name")?,
                commit_id: dec.id("tag commit")?,
                message: dec.string("tag message")?,
            })
        })
        .map_err(|e| corrupt(id, e))
    }
}

// ---------------------------------------------------------------------------
// Feature
// ---------------------------------------------------------------------------

/// A record's attribute values, in schema order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevFeature {
    id: ObjectId,
    values: Vec<Value>,
}

impl RevFeature {
    pub fn new(values: Vec<Value>) -> Self {
        let mut buf = Vec::new();
        codec::encode_values(&mut buf, &values);
        Self {
            id: ContentHasher::FEATURE.hash(&buf),
            values,
        }
    }

    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn to_stored_object(&self) -> StoredObject {
        let mut buf = Vec::new();
        codec::encode_values(&mut buf, &self.values);
        StoredObject::new(ObjectKind::Feature, buf)
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        let id = check_kind(obj, ObjectKind::Feature)?;
        let values = codec::decode_exact(&obj.data, |dec| dec.values()).map_err(|e| corrupt(id, e))?;
        Ok(Self { id, values })
    }
}

// ---------------------------------------------------------------------------
// Feature type
// ---------------------------------------------------------------------------

/// A record schema. Nodes reference it through their metadata id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevFeatureType {
    id: ObjectId,
    name: String,
    attributes: Vec<String>,
}

impl RevFeatureType {
    pub fn new(name: impl Into<String>, attributes: Vec<String>) -> Self {
        let mut ft = Self {
            id: ObjectId::NULL,
            name: name.into(),
            attributes,
        };
        ft.id = ContentHasher::FEATURE_TYPE.hash(&ft.encode());
        ft
    }

    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        codec::encode_str(&mut buf, &self.name);
        codec::encode_varint(&mut buf, self.attributes.len() as u64);
        for attr in &self.attributes {
            codec::encode_str(&mut buf, attr);
        }
        buf
    }

    pub fn to_stored_object(&self) -> StoredObject {
        StoredObject::new(ObjectKind::FeatureType, self.encode())
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        let id = check_kind(obj, ObjectKind::FeatureType)?;
        codec::decode_exact(&obj.data, |dec| {
            let name = dec.string("feature type name")?;
            let count = dec.varint("attribute count")?;
            let attributes = (0..count)
                .map(|_| dec.string("attribute name"))
                .collect::<StoreResult<Vec<_>>>()?;
            Ok(Self {
                id,
                name,
                attributes,
            })
        })
        .map_err(|e| corrupt(id, e))
    }
}

// ---------------------------------------------------------------------------
// Any object
// ---------------------------------------------------------------------------

/// Any decoded revision object.
#[derive(Clone, Debug, PartialEq)]
pub enum RevObject {
    Commit(RevCommit),
    Tree(RevTree),
    Feature(RevFeature),
    FeatureType(RevFeatureType),
    Tag(RevTag),
}

impl RevObject {
    pub fn id(&self) -> &ObjectId {
        match self {
            Self::Commit(c) => c.id(),
            Self::Tree(t) => t.id(),
            Self::Feature(f) => f.id(),
            Self::FeatureType(ft) => ft.id(),
            Self::Tag(t) => t.id(),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Commit(_) => ObjectKind::Commit,
            Self::Tree(_) => ObjectKind::Tree,
            Self::Feature(_) => ObjectKind::Feature,
            Self::FeatureType(_) => ObjectKind::FeatureType,
            Self::Tag(_) => ObjectKind::Tag,
        }
    }

    pub fn to_stored_object(&self) -> StoredObject {
        match self {
            Self::Commit(c) => c.to_stored_object(),
            Self::Tree(t) => t.to_stored_object(),
            Self::Feature(f) => f.to_stored_object(),
            Self::FeatureType(ft) => ft.to_stored_object(),
            Self::Tag(t) => t.to_stored_object(),
        }
    }

    /// Decode according to the stored kind tag.
    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        Ok(match obj.kind {
            ObjectKind::Commit => Self::Commit(RevCommit::from_stored_object(obj)?),
            ObjectKind::Tree => Self::Tree(RevTree::from_stored_object(obj)?),
            ObjectKind::Feature => Self::Feature(RevFeature::from_stored_object(obj)?),
            ObjectKind::FeatureType => Self::FeatureType(RevFeatureType::from_stored_object(obj)?),
            ObjectKind::Tag => Self::Tag(RevTag::from_stored_object(obj)?),
        })
    }
}

impl From<RevCommit> for RevObject {
    fn from(c: RevCommit) -> Self {
        Self::Commit(c)
    }
}

impl From<RevTree> for RevObject {
    fn from(t: RevTree) -> Self {
        Self::Tree(t)
    }
}

impl From<RevFeature> for RevObject {
    fn from(f: RevFeature) -> Self {
        Self::Feature(f)
    }
}

impl From<RevFeatureType> for RevObject {
    fn from(ft: RevFeatureType) -> Self {
        Self::FeatureType(ft)
    }
}

impl From<RevTag> for RevObject {
    fn from(t: RevTag) -> Self {
        Self::Tag(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_roundtrip() {
        let commit = RevCommit::new(
            ObjectId::from_bytes(b"tree"),
            vec![ObjectId::from_bytes(b"p1"), ObjectId::from_bytes(b"p2")],
            "ada",
            "merge roads",
            1_700_000_000_000,
        );
        let stored = commit.to_stored_object();
        assert_eq!(stored.compute_id(), *commit.id());
        assert_eq!(RevCommit::from_stored_object(&stored).unwrap(), commit);
    }

    #[test]
    fn every_kind_decodes_through_rev_object() {
        let objects: Vec<RevObject> = vec![
            RevCommit::new(ObjectId::from_bytes(b"t"), vec![], "a", "m", 0).into(),
            RevTree::empty().into(),
            RevFeature::new(vec![Value::Int(1), Value::Text("x".into())]).into(),
            RevFeatureType::new("roads", vec!["geom".into(), "lanes".into()]).into(),
            RevTag::new("v1", ObjectId::from_bytes(b"c"), "release").into(),
        ];
        for object in objects {
            let stored = object.to_stored_object();
            assert_eq!(stored.kind, object.kind());
            assert_eq!(stored.compute_id(), *object.id());
            assert_eq!(RevObject::from_stored_object(&stored).unwrap(), object);
        }
    }

    #[test]
    fn kinds_hash_apart() {
        // Same empty payload under two kinds.
        let a = StoredObject::new(ObjectKind::Feature, vec![0]);
        let b = StoredObject::new(ObjectKind::Tree, vec![0]);
        assert_ne!(a.compute_id(), b.compute_id());
    }

    #[test]
    fn commit_decoded_as_tag_is_rejected() {
        let stored = RevCommit::new(ObjectId::from_bytes(b"t"), vec![], "a", "m", 0).to_stored_object();
        assert!(matches!(
            RevTag::from_stored_object(&stored),
            Err(StoreError::UnexpectedKind {
                expected: ObjectKind::Tag,
                actual: ObjectKind::Commit,
                ..
            })
        ));
    }

    #[test]
    fn garbage_feature_is_corrupt() {
        let stored = StoredObject::new(ObjectKind::Feature, vec![1, 9]);
        assert!(matches!(
            RevFeature::from_stored_object(&stored),
            Err(StoreError::CorruptObject { .. })
        ));
    }
}
