//! Reachability policies for [`PostOrderIter`](crate::PostOrderIter).
//!
//! A policy answers two questions for the traversal: which ids are directly
//! reachable from a loaded object, and whether an id about to be produced
//! should actually be yielded. The base policies each follow one kind of
//! reference; [`Successors::Combine`], [`Successors::Unique`] and
//! [`Successors::Blacklist`] compose them.
//!
//! Expansion and visiting are decided separately. A policy may refuse to
//! yield an id while still having expanded it, and range traversals depend
//! on that.

use std::collections::HashSet;
use std::fmt;

use canopy_store::{Node, RevObject};
use canopy_types::ObjectId;

use crate::dedup::{Deduplicator, HeapDeduplicator};

/// A reachability policy.
pub enum Successors<'d> {
    /// Tag to the commit it points at.
    TagCommit,
    /// Commit to its parents.
    CommitParents,
    /// Commit to its root tree.
    CommitTree,
    /// Bucketed tree to its bucket subtrees.
    TreeBuckets,
    /// Leaf tree to its subtree nodes and their metadata.
    TreeSubtrees,
    /// Leaf tree to its feature nodes and their metadata.
    TreeFeatures,
    /// Union of successors; an id is yielded only if every policy agrees.
    Combine(Vec<Successors<'d>>),
    /// Expands and yields every id at most once.
    Unique {
        delegate: Box<Successors<'d>>,
        dedup: Box<dyn Deduplicator + 'd>,
    },
    /// Never expands or yields an id in `base`. Objects reachable from
    /// `base` are still produced when another path reaches them.
    Blacklist {
        delegate: Box<Successors<'d>>,
        base: HashSet<ObjectId>,
    },
}

impl<'d> Successors<'d> {
    /// Everything reachable: tags, commit ancestry, trees and their contents.
    pub fn all() -> Self {
        Successors::Combine(vec![
            Successors::TagCommit,
            Successors::CommitParents,
            Successors::CommitTree,
            Successors::TreeBuckets,
            Successors::TreeSubtrees,
            Successors::TreeFeatures,
        ])
    }

    /// Commit contents without ancestry.
    pub fn content() -> Self {
        Successors::Combine(vec![
            Successors::CommitTree,
            Successors::TreeBuckets,
            Successors::TreeSubtrees,
            Successors::TreeFeatures,
        ])
    }

    /// Deduplicate with an exact in-memory set.
    pub fn unique(self) -> Self {
        self.unique_with(HeapDeduplicator::new())
    }

    /// Deduplicate with a caller-supplied oracle.
    pub fn unique_with(self, dedup: impl Deduplicator + 'd) -> Self {
        Successors::Unique {
            delegate: Box::new(self),
            dedup: Box::new(dedup),
        }
    }

    pub fn blacklist(self, base: impl IntoIterator<Item = ObjectId>) -> Self {
        Successors::Blacklist {
            delegate: Box::new(self),
            base: base.into_iter().collect(),
        }
    }

    /// Append the ids directly reachable from `object` to `out`.
    pub fn find_successors(&self, object: &RevObject, out: &mut Vec<ObjectId>) {
        match (self, object) {
            (Successors::TagCommit, RevObject::Tag(tag)) => out.push(*tag.commit_id()),
            (Successors::CommitParents, RevObject::Commit(commit)) => {
                out.extend_from_slice(commit.parent_ids())
            }
            (Successors::CommitTree, RevObject::Commit(commit)) => out.push(*commit.tree_id()),
            (Successors::TreeBuckets, RevObject::Tree(tree)) => {
                if let Some(buckets) = tree.buckets() {
                    out.extend(buckets.values().map(|b| *b.object_id()));
                }
            }
            (Successors::TreeSubtrees, RevObject::Tree(tree)) => node_successors(tree.trees(), out),
            (Successors::TreeFeatures, RevObject::Tree(tree)) => {
                node_successors(tree.features(), out)
            }
            (Successors::Combine(policies), _) => {
                for policy in policies {
                    policy.find_successors(object, out);
                }
            }
            (Successors::Unique { delegate, dedup }, _) => {
                if !dedup.is_duplicate(object.id()) {
                    let mut found = Vec::new();
                    delegate.find_successors(object, &mut found);
                    dedup.remove_duplicates(&mut found);
                    out.append(&mut found);
                }
            }
            (Successors::Blacklist { delegate, base }, _) => {
                if !base.contains(object.id()) {
                    let mut found = Vec::new();
                    delegate.find_successors(object, &mut found);
                    found.retain(|id| !base.contains(id));
                    out.append(&mut found);
                }
            }
            _ => {}
        }
    }

    /// Whether `id`, about to be produced, should be yielded.
    ///
    /// Called exactly once per produced id; [`Successors::Unique`] records
    /// the visit here.
    pub fn previsit(&mut self, id: &ObjectId) -> bool {
        match self {
            Successors::Combine(policies) => policies.iter_mut().all(|p| p.previsit(id)),
            Successors::Unique { delegate, dedup } => dedup.visit(id) && delegate.previsit(id),
            Successors::Blacklist { delegate, base } => delegate.previsit(id) && !base.contains(id),
            _ => true,
        }
    }
}

/// Object ids of `nodes`, each preceded by its metadata id, without repeats.
fn node_successors(nodes: &[Node], out: &mut Vec<ObjectId>) {
    let mut seen = HashSet::new();
    for node in nodes {
        if let Some(md) = node.metadata_id() {
            if seen.insert(*md) {
                out.push(*md);
            }
        }
        if seen.insert(*node.object_id()) {
            out.push(*node.object_id());
        }
    }
}

impl fmt::Debug for Successors<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Successors::TagCommit => f.write_str("TagCommit"),
            Successors::CommitParents => f.write_str("CommitParents"),
            Successors::CommitTree => f.write_str("CommitTree"),
            Successors::TreeBuckets => f.write_str("TreeBuckets"),
            Successors::TreeSubtrees => f.write_str("TreeSubtrees"),
            Successors::TreeFeatures => f.write_str("TreeFeatures"),
            Successors::Combine(policies) => f.debug_tuple("Combine").field(policies).finish(),
            Successors::Unique { delegate, .. } => {
                f.debug_struct("Unique").field("delegate", delegate).finish_non_exhaustive()
            }
            Successors::Blacklist { delegate, base } => f
                .debug_struct("Blacklist")
                .field("delegate", delegate)
                .field("base", &base.len())
                .finish(),
        }
    }
}
