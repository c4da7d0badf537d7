use std::borrow::Cow;
use std::sync::Arc;

use canopy_store::ordering::{self, MAX_DEPTH};
use canopy_store::{Node, ObjectStore, RevTree, TreeContents};
use canopy_types::ObjectId;

use crate::error::{TreeError, TreeResult};
use crate::node_ref::NodeRef;
use crate::paths::{self, SEPARATOR};

/// Read-only path lookup through a canonical tree.
///
/// Descends one path segment at a time, and within a segment one bucket
/// level at a time, loading each subtree from the store. Both loops are
/// iterative. A missing segment is `Ok(None)`, never an error.
pub struct DepthSearch {
    store: Arc<dyn ObjectStore>,
}

impl DepthSearch {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Find `path` relative to `root`.
    pub fn find(&self, root: &RevTree, path: &str) -> TreeResult<Option<NodeRef>> {
        self.find_in(root, "", path)
    }

    /// Find `path` relative to the tree stored under `root_id`.
    pub fn find_by_id(&self, root_id: &ObjectId, path: &str) -> TreeResult<Option<NodeRef>> {
        check_paths("", path)?;
        let root = self.store.get_tree(root_id)?;
        self.find_in(&root, "", path)
    }

    /// Find `child_path` in `root`, where `root` is the tree found at
    /// `parent_path` and `child_path` is a full path beneath it.
    pub fn find_in(
        &self,
        root: &RevTree,
        parent_path: &str,
        child_path: &str,
    ) -> TreeResult<Option<NodeRef>> {
        check_paths(parent_path, child_path)?;
        let relative = if parent_path.is_empty() {
            child_path
        } else {
            &child_path[parent_path.len() + 1..]
        };
        let segments = paths::split(relative);
        let Some((last, ancestors)) = segments.split_last() else {
            return Ok(None);
        };

        let mut current = Cow::Borrowed(root);
        let mut inherited: Option<ObjectId> = None;
        for segment in ancestors {
            let Some(node) = self.get_direct_child(&current, segment, 0)? else {
                return Ok(None);
            };
            if !node.is_tree() {
                return Ok(None);
            }
            if let Some(md) = node.metadata_id() {
                inherited = Some(*md);
            }
            current = Cow::Owned(self.store.get_tree(node.object_id())?);
        }

        let found = self.get_direct_child(&current, last, 0)?;
        Ok(found.map(|node| NodeRef::new(node, paths::parent_path(child_path), inherited)))
    }

    /// The entry named `name` directly inside `tree`, which sits at bucket
    /// depth `depth` (0 for a tree reached through a node).
    pub fn get_direct_child(
        &self,
        tree: &RevTree,
        name: &str,
        depth: usize,
    ) -> TreeResult<Option<Node>> {
        let mut current = Cow::Borrowed(tree);
        let mut depth = depth;
        loop {
            let next = match current.contents() {
                TreeContents::Leaf { trees, features } => {
                    return Ok(trees
                        .iter()
                        .chain(features)
                        .find(|n| n.name() == name)
                        .cloned());
                }
                TreeContents::Buckets(buckets) => {
                    if depth >= MAX_DEPTH {
                        return Err(TreeError::CorruptTree {
                            id: *current.id(),
                            reason: format!("bucketed at depth {depth}"),
                        });
                    }
                    match buckets.get(&ordering::bucket(name, depth)) {
                        Some(bucket) => *bucket.object_id(),
                        None => return Ok(None),
                    }
                }
            };
            current = Cow::Owned(self.store.get_tree(&next)?);
            depth += 1;
        }
    }
}

fn check_paths(parent_path: &str, child_path: &str) -> TreeResult<()> {
    let invalid = |path: &str, reason: &str| TreeError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };
    if parent_path.ends_with(SEPARATOR) {
        return Err(invalid(parent_path, "parent path has a trailing separator"));
    }
    if child_path.is_empty() {
        return Err(invalid(child_path, "child path is empty"));
    }
    if child_path.ends_with(SEPARATOR) {
        return Err(invalid(child_path, "child path has a trailing separator"));
    }
    if !parent_path.is_empty() {
        let under_parent = child_path
            .strip_prefix(parent_path)
            .is_some_and(|rest| rest.starts_with(SEPARATOR) && rest.len() > 1);
        if !under_parent {
            return Err(invalid(child_path, "child path is not under the parent path"));
        }
    }
    Ok(())
}
