use canopy_store::Node;
use canopy_types::ObjectId;

use crate::paths;

/// A node resolved at a path, with the metadata id it inherits.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeRef {
    node: Node,
    parent_path: String,
    default_metadata_id: Option<ObjectId>,
}

impl NodeRef {
    pub fn new(node: Node, parent_path: impl Into<String>, default_metadata_id: Option<ObjectId>) -> Self {
        Self {
            node,
            parent_path: parent_path.into(),
            default_metadata_id,
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn into_node(self) -> Node {
        self.node
    }

    pub fn name(&self) -> &str {
        self.node.name()
    }

    pub fn parent_path(&self) -> &str {
        &self.parent_path
    }

    /// Full path of the node.
    pub fn path(&self) -> String {
        paths::child_path(&self.parent_path, self.node.name())
    }

    pub fn object_id(&self) -> &ObjectId {
        self.node.object_id()
    }

    /// The nearest ancestor's metadata id.
    pub fn default_metadata_id(&self) -> Option<&ObjectId> {
        self.default_metadata_id.as_ref()
    }

    /// The node's own metadata id, or the inherited one.
    pub fn metadata_id(&self) -> Option<&ObjectId> {
        self.node
            .metadata_id()
            .or(self.default_metadata_id.as_ref())
    }
}
