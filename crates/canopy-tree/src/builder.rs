//! Incremental builder producing canonical trees.
//!
//! A tree's shape depends only on the set of entries it holds:
//!
//! - at most `normalized_size_limit(depth)` entries, or at `MAX_DEPTH`: a
//!   leaf holding them directly;
//! - otherwise: one bucket per occupied `bucket(name, depth)` slot, each
//!   pointing at the canonical tree of that slot's entries at `depth + 1`.
//!
//! Changes are buffered, then applied in canonical order. Only buckets that
//! receive changes are loaded and rewritten; every other bucket keeps its id.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use canopy_store::ordering::{self, normalized_size_limit, MAX_DEPTH};
use canopy_store::{Bucket, CanonicalKey, Node, ObjectStore, RevTree, TreeContents};
use tracing::debug;

use crate::config::TreeBuilderConfig;
use crate::error::{TreeError, TreeResult};
use crate::paths::SEPARATOR;
use crate::search::DepthSearch;

#[derive(Clone, Debug)]
enum Change {
    Put(Node),
    Remove,
}

/// Applies puts and removes against an original tree.
///
/// New bucket subtrees are written to the store as they are produced. The
/// root returned by [`CanonicalTreeBuilder::build`] is not; callers persist it
/// when they need it addressable. The original tree is never modified.
pub struct CanonicalTreeBuilder {
    store: Arc<dyn ObjectStore>,
    base: RevTree,
    pending: BTreeMap<CanonicalKey, Change>,
    config: TreeBuilderConfig,
}

impl CanonicalTreeBuilder {
    pub fn new(store: Arc<dyn ObjectStore>, original: RevTree) -> Self {
        Self::with_config(store, original, TreeBuilderConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn ObjectStore>,
        original: RevTree,
        config: TreeBuilderConfig,
    ) -> Self {
        Self {
            store,
            base: original,
            pending: BTreeMap::new(),
            config,
        }
    }

    /// Insert or replace the entry named `node.name()`.
    ///
    /// A node with a null object id removes the name instead.
    pub fn put(&mut self, node: Node) -> TreeResult<()> {
        check_name(node.name())?;
        if node.is_tombstone() {
            return self.remove(node.name());
        }
        self.stage(node.canonical_key(), Change::Put(node))
    }

    /// Remove the entry named `name`, if present.
    pub fn remove(&mut self, name: &str) -> TreeResult<()> {
        check_name(name)?;
        self.stage(CanonicalKey::new(name), Change::Remove)
    }

    /// The entry `name` as it would appear in the built tree.
    pub fn get(&self, name: &str) -> TreeResult<Option<Node>> {
        match self.pending.get(&CanonicalKey::new(name)) {
            Some(Change::Put(node)) => Ok(Some(node.clone())),
            Some(Change::Remove) => Ok(None),
            None => DepthSearch::new(Arc::clone(&self.store)).get_direct_child(&self.base, name, 0),
        }
    }

    /// Buffered changes not yet folded.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Fold all changes and return the new root.
    pub fn build(mut self) -> TreeResult<RevTree> {
        self.fold()?;
        Ok(self.base)
    }

    fn stage(&mut self, key: CanonicalKey, change: Change) -> TreeResult<()> {
        self.pending.insert(key, change);
        if self.pending.len() >= self.config.max_pending_changes {
            self.fold()?;
        }
        Ok(())
    }

    fn fold(&mut self) -> TreeResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let changes: Vec<(CanonicalKey, Change)> = std::mem::take(&mut self.pending).into_iter().collect();
        debug!(changes = changes.len(), base = %self.base.id().short_hex(), "folding changes");
        self.base = self.apply(&self.base, changes, 0)?;
        Ok(())
    }

    /// Apply `changes` (canonically sorted, all routed to `tree`) to the tree
    /// sitting at `depth`.
    fn apply(
        &self,
        tree: &RevTree,
        changes: Vec<(CanonicalKey, Change)>,
        depth: usize,
    ) -> TreeResult<RevTree> {
        let buckets = match tree.contents() {
            TreeContents::Leaf { .. } => {
                let mut entries: BTreeMap<CanonicalKey, Node> = tree
                    .children()
                    .map(|n| (n.canonical_key(), n.clone()))
                    .collect();
                for (key, change) in changes {
                    match change {
                        Change::Put(node) => {
                            entries.insert(key, node);
                        }
                        Change::Remove => {
                            entries.remove(&key);
                        }
                    }
                }
                return self.build_canonical(entries.into_values().collect(), depth);
            }
            TreeContents::Buckets(buckets) => buckets,
        };
        if depth >= MAX_DEPTH {
            return Err(TreeError::CorruptTree {
                id: *tree.id(),
                reason: format!("bucketed at depth {depth}"),
            });
        }

        let mut size = tree.size();
        let mut num_trees = tree.num_trees();
        let mut new_buckets = buckets.clone();
        let mut rewritten: HashMap<u32, RevTree> = HashMap::new();

        for (index, group) in group_by_bucket(changes, depth) {
            let old = match buckets.get(&index) {
                Some(bucket) => self.store.get_tree(bucket.object_id())?,
                None => RevTree::empty(),
            };
            let new = self.apply(&old, group, depth + 1)?;
            if new.id() == old.id() {
                continue;
            }
            size = size - old.size() + new.size();
            num_trees = num_trees - old.num_trees() + new.num_trees();
            if new.is_empty() {
                new_buckets.remove(&index);
            } else {
                new_buckets.insert(index, Bucket::new(*new.id(), new.bounds()));
                rewritten.insert(index, new);
            }
        }

        if size <= normalized_size_limit(depth) as u64 {
            debug!(depth, size, "collapsing buckets into leaf");
            let mut nodes = Vec::with_capacity(size as usize);
            for (index, bucket) in &new_buckets {
                match rewritten.remove(index) {
                    Some(sub) => self.collect_nodes(sub, &mut nodes)?,
                    None => self.collect_nodes(self.store.get_tree(bucket.object_id())?, &mut nodes)?,
                }
            }
            return Ok(RevTree::leaf(nodes));
        }

        for sub in rewritten.values() {
            self.store.put_tree(sub)?;
        }
        Ok(RevTree::bucketed(size, num_trees, new_buckets))
    }

    /// Canonical tree over `nodes` at `depth`, persisting any bucket subtrees.
    fn build_canonical(&self, nodes: Vec<Node>, depth: usize) -> TreeResult<RevTree> {
        if nodes.len() <= normalized_size_limit(depth) || depth >= MAX_DEPTH {
            return Ok(RevTree::leaf(nodes));
        }
        let size = nodes.len() as u64;
        let num_trees = nodes.iter().filter(|n| n.is_tree()).count() as u64;

        let mut groups: BTreeMap<u32, Vec<Node>> = BTreeMap::new();
        for node in nodes {
            groups
                .entry(ordering::bucket(node.name(), depth))
                .or_default()
                .push(node);
        }
        let mut buckets = BTreeMap::new();
        for (index, group) in groups {
            let sub = self.build_canonical(group, depth + 1)?;
            self.store.put_tree(&sub)?;
            buckets.insert(index, Bucket::new(*sub.id(), sub.bounds()));
        }
        debug!(depth, size, buckets = buckets.len(), "split tree into buckets");
        Ok(RevTree::bucketed(size, num_trees, buckets))
    }

    /// Append every node under `tree`, descending through buckets.
    fn collect_nodes(&self, tree: RevTree, out: &mut Vec<Node>) -> TreeResult<()> {
        let mut stack = vec![tree];
        while let Some(tree) = stack.pop() {
            match tree.contents() {
                TreeContents::Leaf { trees, features } => {
                    out.extend(trees.iter().cloned());
                    out.extend(features.iter().cloned());
                }
                TreeContents::Buckets(buckets) => {
                    for bucket in buckets.values() {
                        stack.push(self.store.get_tree(bucket.object_id())?);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Split sorted changes into runs sharing a bucket at `depth`. Canonical
/// order makes every run contiguous.
fn group_by_bucket(
    changes: Vec<(CanonicalKey, Change)>,
    depth: usize,
) -> Vec<(u32, Vec<(CanonicalKey, Change)>)> {
    let mut groups: Vec<(u32, Vec<(CanonicalKey, Change)>)> = Vec::new();
    for (key, change) in changes {
        let index = key.bucket(depth);
        match groups.last_mut() {
            Some((last, group)) if *last == index => group.push((key, change)),
            _ => groups.push((index, vec![(key, change)])),
        }
    }
    groups
}

fn check_name(name: &str) -> TreeResult<()> {
    if name.is_empty() {
        return Err(TreeError::InvalidName {
            name: name.to_string(),
            reason: "empty".into(),
        });
    }
    if name.contains(SEPARATOR) {
        return Err(TreeError::InvalidName {
            name: name.to_string(),
            reason: format!("contains {SEPARATOR:?}"),
        });
    }
    Ok(())
}
