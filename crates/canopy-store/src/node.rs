use std::collections::BTreeMap;

use canopy_types::{Envelope, ObjectId};

use crate::ordering::CanonicalKey;

/// What a [`Node`] points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeType {
    /// A subtree.
    Tree,
    /// A single record.
    Feature,
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tree => write!(f, "tree"),
            Self::Feature => write!(f, "feature"),
        }
    }
}

/// A small precomputed attribute carried on a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Bytes(Vec<u8>),
}

/// A named entry inside a tree.
///
/// Nodes are immutable; the `update`/`with_*` methods return new values.
/// A metadata id equal to [`ObjectId::NULL`] is normalized to `None` so the
/// "inherit from parent" case has exactly one representation.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    name: String,
    object_id: ObjectId,
    metadata_id: Option<ObjectId>,
    node_type: NodeType,
    bounds: Option<Envelope>,
    extra: BTreeMap<String, Value>,
}

impl Node {
    pub fn new(
        name: impl Into<String>,
        object_id: ObjectId,
        metadata_id: Option<ObjectId>,
        node_type: NodeType,
    ) -> Self {
        Self {
            name: name.into(),
            object_id,
            metadata_id: metadata_id.filter(|id| !id.is_null()),
            node_type,
            bounds: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn tree(name: impl Into<String>, object_id: ObjectId, metadata_id: Option<ObjectId>) -> Self {
        Self::new(name, object_id, metadata_id, NodeType::Tree)
    }

    pub fn feature(
        name: impl Into<String>,
        object_id: ObjectId,
        metadata_id: Option<ObjectId>,
    ) -> Self {
        Self::new(name, object_id, metadata_id, NodeType::Feature)
    }

    /// A feature node with a null object id, the marker for "delete this name"
    /// in bulk loads.
    pub fn tombstone(name: impl Into<String>) -> Self {
        Self::new(name, ObjectId::NULL, None, NodeType::Feature)
    }

    pub fn with_bounds(mut self, bounds: Envelope) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub(crate) fn with_parts(
        mut self,
        bounds: Option<Envelope>,
        extra: BTreeMap<String, Value>,
    ) -> Self {
        self.bounds = bounds;
        self.extra = extra;
        self
    }

    /// Same node pointing at a different object.
    pub fn update(&self, object_id: ObjectId) -> Self {
        Self {
            object_id,
            ..self.clone()
        }
    }

    /// Same node pointing at a different object with new bounds.
    pub fn update_with_bounds(&self, object_id: ObjectId, bounds: Option<Envelope>) -> Self {
        Self {
            object_id,
            bounds,
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn object_id(&self) -> &ObjectId {
        &self.object_id
    }

    pub fn metadata_id(&self) -> Option<&ObjectId> {
        self.metadata_id.as_ref()
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn is_tree(&self) -> bool {
        self.node_type == NodeType::Tree
    }

    /// `true` if this node marks a deletion.
    pub fn is_tombstone(&self) -> bool {
        self.object_id.is_null()
    }

    pub fn bounds(&self) -> Option<&Envelope> {
        self.bounds.as_ref()
    }

    pub fn extra(&self) -> &BTreeMap<String, Value> {
        &self.extra
    }

    pub fn canonical_key(&self) -> CanonicalKey {
        CanonicalKey::new(self.name.as_str())
    }
}
