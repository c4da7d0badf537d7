use std::collections::BTreeMap;

use canopy_types::{ContentHasher, Envelope, ObjectId};

use crate::codec::{self, Decoder};
use crate::error::{StoreError, StoreResult};
use crate::node::{Node, NodeType};
use crate::object::{ObjectKind, StoredObject};

const SHAPE_LEAF: u8 = 0;
const SHAPE_BUCKETS: u8 = 1;

/// Reference to the subtree occupying one shard slot of a bucketed tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Bucket {
    object_id: ObjectId,
    bounds: Option<Envelope>,
}

impl Bucket {
    pub fn new(object_id: ObjectId, bounds: Option<Envelope>) -> Self {
        Self { object_id, bounds }
    }

    pub fn object_id(&self) -> &ObjectId {
        &self.object_id
    }

    /// Union of the bounds of everything below this bucket.
    pub fn bounds(&self) -> Option<&Envelope> {
        self.bounds.as_ref()
    }
}

/// The two shapes a non-empty tree can take.
#[derive(Clone, Debug, PartialEq)]
pub enum TreeContents {
    /// Direct children, each list in canonical order.
    Leaf { trees: Vec<Node>, features: Vec<Node> },
    /// Shard index at this tree's depth to subtree.
    Buckets(BTreeMap<u32, Bucket>),
}

/// Immutable, content-addressed tree.
///
/// A tree is either a leaf holding its child [`Node`]s directly or a
/// bucketed tree holding one [`Bucket`] per occupied shard. The empty tree is
/// a leaf with no children. `size` counts every entry the tree holds at its
/// own level (the sum over all buckets for a bucketed tree) and `num_trees`
/// counts how many of those entries are subtrees.
#[derive(Clone, Debug, PartialEq)]
pub struct RevTree {
    id: ObjectId,
    size: u64,
    num_trees: u64,
    contents: TreeContents,
}

impl RevTree {
    /// The tree with no entries.
    pub fn empty() -> Self {
        Self::leaf(Vec::new())
    }

    /// Well-known id of [`RevTree::empty`].
    pub fn empty_id() -> ObjectId {
        Self::empty().id
    }

    /// Leaf tree over `nodes`, which must have distinct names.
    pub fn leaf(nodes: impl IntoIterator<Item = Node>) -> Self {
        let (mut trees, mut features): (Vec<Node>, Vec<Node>) =
            nodes.into_iter().partition(|n| n.node_type() == NodeType::Tree);
        trees.sort_by_cached_key(Node::canonical_key);
        features.sort_by_cached_key(Node::canonical_key);
        let size = (trees.len() + features.len()) as u64;
        let num_trees = trees.len() as u64;
        Self::from_parts(size, num_trees, TreeContents::Leaf { trees, features })
    }

    /// Bucketed tree. `size` and `num_trees` are the totals over all buckets.
    pub fn bucketed(size: u64, num_trees: u64, buckets: BTreeMap<u32, Bucket>) -> Self {
        Self::from_parts(size, num_trees, TreeContents::Buckets(buckets))
    }

    fn from_parts(size: u64, num_trees: u64, contents: TreeContents) -> Self {
        let data = encode(size, num_trees, &contents);
        Self {
            id: ContentHasher::TREE.hash(&data),
            size,
            num_trees,
            contents,
        }
    }

    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn num_trees(&self) -> u64 {
        self.num_trees
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn contents(&self) -> &TreeContents {
        &self.contents
    }

    pub fn is_bucketed(&self) -> bool {
        matches!(self.contents, TreeContents::Buckets(_))
    }

    /// Direct subtree nodes; empty for a bucketed tree.
    pub fn trees(&self) -> &[Node] {
        match &self.contents {
            TreeContents::Leaf { trees, .. } => trees,
            TreeContents::Buckets(_) => &[],
        }
    }

    /// Direct feature nodes; empty for a bucketed tree.
    pub fn features(&self) -> &[Node] {
        match &self.contents {
            TreeContents::Leaf { features, .. } => features,
            TreeContents::Buckets(_) => &[],
        }
    }

    pub fn buckets(&self) -> Option<&BTreeMap<u32, Bucket>> {
        match &self.contents {
            TreeContents::Buckets(buckets) => Some(buckets),
            TreeContents::Leaf { .. } => None,
        }
    }

    /// All direct children: trees first, then features.
    pub fn children(&self) -> impl Iterator<Item = &Node> {
        self.trees().iter().chain(self.features())
    }

    /// Union of the bounds of every child or bucket.
    pub fn bounds(&self) -> Option<Envelope> {
        match &self.contents {
            TreeContents::Leaf { .. } => Envelope::union_of(self.children().map(Node::bounds)),
            TreeContents::Buckets(buckets) => {
                Envelope::union_of(buckets.values().map(Bucket::bounds))
            }
        }
    }

    pub fn to_stored_object(&self) -> StoredObject {
        StoredObject::new(
            ObjectKind::Tree,
            encode(self.size, self.num_trees, &self.contents),
        )
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        let id = obj.compute_id();
        if obj.kind != ObjectKind::Tree {
            return Err(StoreError::UnexpectedKind {
                id,
                expected: ObjectKind::Tree,
                actual: obj.kind,
            });
        }
        let (size, num_trees, contents) =
            codec::decode_exact(&obj.data, decode).map_err(|e| corrupt(id, e))?;
        Ok(Self {
            id,
            size,
            num_trees,
            contents,
        })
    }
}

fn encode(size: u64, num_trees: u64, contents: &TreeContents) -> Vec<u8> {
    let mut buf = Vec::new();
    match contents {
        TreeContents::Leaf { trees, features } => {
            buf.push(SHAPE_LEAF);
            codec::encode_varint(&mut buf, size);
            codec::encode_varint(&mut buf, num_trees);
            for list in [trees, features] {
                codec::encode_varint(&mut buf, list.len() as u64);
                for node in list {
                    codec::encode_node(node, &mut buf);
                }
            }
        }
        TreeContents::Buckets(buckets) => {
            buf.push(SHAPE_BUCKETS);
            codec::encode_varint(&mut buf, size);
            codec::encode_varint(&mut buf, num_trees);
            codec::encode_varint(&mut buf, buckets.len() as u64);
            for (index, bucket) in buckets {
                codec::encode_varint(&mut buf, u64::from(*index));
                codec::encode_id(&mut buf, &bucket.object_id);
                match &bucket.bounds {
                    Some(env) => {
                        buf.push(1);
                        codec::encode_envelope(&mut buf, env);
                    }
                    None => buf.push(0),
                }
            }
        }
    }
    buf
}

fn decode(dec: &mut Decoder<&[u8]>) -> StoreResult<(u64, u64, TreeContents)> {
    let shape = dec.u8("tree shape")?;
    let size = dec.varint("tree size")?;
    let num_trees = dec.varint("tree count")?;
    let contents = match shape {
        SHAPE_LEAF => {
            let mut lists = [Vec::new(), Vec::new()];
            for list in lists.iter_mut() {
                let count = dec.varint("child count")?;
                for _ in 0..count {
                    list.push(dec.node()?);
                }
            }
            let [trees, features] = lists;
            TreeContents::Leaf { trees, features }
        }
        SHAPE_BUCKETS => {
            let count = dec.varint("bucket count")?;
            let mut buckets = BTreeMap::new();
            for _ in 0..count {
                let index = u32::try_from(dec.varint("bucket index")?).map_err(|_| {
                    StoreError::CorruptRecord("bucket index out of range".into())
                })?;
                let object_id = dec.id("bucket id")?;
                let bounds = match dec.u8("bucket bounds flag")? {
                    0 => None,
                    _ => Some(dec.envelope()?),
                };
                buckets.insert(index, Bucket::new(object_id, bounds));
            }
            TreeContents::Buckets(buckets)
        }
        other => {
            return Err(StoreError::CorruptRecord(format!("unknown tree shape {other}")));
        }
    };
    Ok((size, num_trees, contents))
}

/// Re-tag decode failures with the id of the object being decoded.
pub(crate) fn corrupt(id: ObjectId, err: StoreError) -> StoreError {
    match err {
        StoreError::Truncated { .. } | StoreError::CorruptRecord(_) => StoreError::CorruptObject {
            id,
            reason: err.to_string(),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ordering;

    fn feature(name: &str) -> Node {
        Node::feature(name, ObjectId::from_bytes(name.as_bytes()), None)
    }

    // -----------------------------------------------------------------------
    // Shapes
    // -----------------------------------------------------------------------

    #[test]
    fn empty_tree_has_fixed_id() {
        let empty = RevTree::empty();
        assert!(empty.is_empty());
        assert!(!empty.is_bucketed());
        assert_eq!(empty.id(), &RevTree::empty_id());
        assert_eq!(RevTree::leaf(Vec::new()).id(), &RevTree::empty_id());
    }

    #[test]
    fn leaf_sorts_canonically_and_splits_by_type() {
        let names = ["delta", "alpha", "charlie", "bravo"];
        let mut nodes: Vec<Node> = names.iter().map(|n| feature(n)).collect();
        nodes.push(Node::tree("dir", ObjectId::from_bytes(b"dir"), None));
        let tree = RevTree::leaf(nodes);

        assert_eq!(tree.size(), 5);
        assert_eq!(tree.num_trees(), 1);
        assert_eq!(tree.trees().len(), 1);
        let features: Vec<&str> = tree.features().iter().map(Node::name).collect();
        let mut expected = names.to_vec();
        expected.sort_by(|a, b| ordering::compare(a, b));
        assert_eq!(features, expected);
    }

    #[test]
    fn id_ignores_insertion_order() {
        let a = RevTree::leaf(vec![feature("a"), feature("b"), feature("c")]);
        let b = RevTree::leaf(vec![feature("c"), feature("a"), feature("b")]);
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn bounds_union_children() {
        let tree = RevTree::leaf(vec![
            feature("a").with_bounds(Envelope::point(0.0, 0.0)),
            feature("b"),
            feature("c").with_bounds(Envelope::point(3.0, -1.0)),
        ]);
        assert_eq!(tree.bounds(), Some(Envelope::new(0.0, -1.0, 3.0, 0.0)));
        assert_eq!(RevTree::empty().bounds(), None);
    }

    #[test]
    fn bucketed_accessors() {
        let mut buckets = BTreeMap::new();
        buckets.insert(3, Bucket::new(ObjectId::from_bytes(b"b3"), Some(Envelope::point(1.0, 1.0))));
        buckets.insert(9, Bucket::new(ObjectId::from_bytes(b"b9"), None));
        let tree = RevTree::bucketed(600, 2, buckets);
        assert!(tree.is_bucketed());
        assert!(tree.trees().is_empty());
        assert_eq!(tree.buckets().unwrap().len(), 2);
        assert_eq!(tree.bounds(), Some(Envelope::point(1.0, 1.0)));
    }

    // -----------------------------------------------------------------------
    // Stored form
    // -----------------------------------------------------------------------

    #[test]
    fn stored_object_roundtrip_keeps_id() {
        let leaf = RevTree::leaf(vec![
            feature("x").with_bounds(Envelope::new(0.0, 0.0, 1.0, 1.0)),
            Node::tree("sub", ObjectId::from_bytes(b"sub"), Some(ObjectId::from_bytes(b"md"))),
        ]);
        let stored = leaf.to_stored_object();
        assert_eq!(stored.compute_id(), *leaf.id());
        assert_eq!(RevTree::from_stored_object(&stored).unwrap(), leaf);

        let mut buckets = BTreeMap::new();
        buckets.insert(0, Bucket::new(*leaf.id(), leaf.bounds()));
        let bucketed = RevTree::bucketed(2, 1, buckets);
        let decoded = RevTree::from_stored_object(&bucketed.to_stored_object()).unwrap();
        assert_eq!(decoded, bucketed);
    }

    #[test]
    fn wrong_kind_rejected() {
        let stored = StoredObject::new(ObjectKind::Feature, vec![0, 0, 0, 0, 0]);
        assert!(matches!(
            RevTree::from_stored_object(&stored),
            Err(StoreError::UnexpectedKind {
                expected: ObjectKind::Tree,
                actual: ObjectKind::Feature,
                ..
            })
        ));
    }

    #[test]
    fn truncated_tree_is_corrupt() {
        let mut stored = RevTree::leaf(vec![feature("x")]).to_stored_object();
        stored.data.truncate(stored.data.len() - 3);
        stored.size = stored.data.len() as u64;
        assert!(matches!(
            RevTree::from_stored_object(&stored),
            Err(StoreError::CorruptObject { .. })
        ));
    }
}
