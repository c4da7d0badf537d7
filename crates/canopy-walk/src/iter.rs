//! Lazy post-order traversal over the object graph.

use std::collections::VecDeque;
use std::iter::FusedIterator;

use canopy_store::{ObjectStore, RevObject};
use canopy_types::ObjectId;
use tracing::debug;

use crate::dedup::Deduplicator;
use crate::error::WalkResult;
use crate::successors::Successors;

/// Every object reachable from `top`, each once.
pub fn all<'a>(
    top: ObjectId,
    store: &'a dyn ObjectStore,
    dedup: impl Deduplicator + 'a,
) -> PostOrderIter<'a> {
    PostOrderIter::new([top], store, Successors::all().unique_with(dedup))
}

/// Objects reachable from `start` but not through `base`, each once.
///
/// With `traverse_commits` the ancestry of `start` is followed as well as
/// its content; without it only the content of the start objects is.
pub fn range<'a>(
    start: impl IntoIterator<Item = ObjectId>,
    base: impl IntoIterator<Item = ObjectId>,
    store: &'a dyn ObjectStore,
    traverse_commits: bool,
    dedup: impl Deduplicator + 'a,
) -> PostOrderIter<'a> {
    let policy = if traverse_commits {
        Successors::all()
    } else {
        Successors::content()
    };
    PostOrderIter::new(start, store, policy.blacklist(base).unique_with(dedup))
}

/// Commits reachable from `start` but not through `base`, without content.
pub fn range_of_commits<'a>(
    start: impl IntoIterator<Item = ObjectId>,
    base: impl IntoIterator<Item = ObjectId>,
    store: &'a dyn ObjectStore,
    dedup: impl Deduplicator + 'a,
) -> PostOrderIter<'a> {
    let policy = Successors::CommitParents.blacklist(base).unique_with(dedup);
    PostOrderIter::new(start, store, policy)
}

/// The content of `ids` (commit trees and everything under them) plus the
/// objects themselves, each once.
pub fn contents_of<'a>(
    ids: impl IntoIterator<Item = ObjectId>,
    store: &'a dyn ObjectStore,
    dedup: impl Deduplicator + 'a,
) -> PostOrderIter<'a> {
    PostOrderIter::new(ids, store, Successors::content().unique_with(dedup))
}

/// Yields objects so that everything an object references under the active
/// policy comes out before the object itself.
///
/// The traversal keeps one queue of pending ids per depth, shallowest last.
/// In enqueue mode the head of the deepest queue is loaded and its
/// successors pushed as a new, deeper queue. When a queue runs empty it is
/// dropped and the head of the next queue is visited: removed, checked with
/// [`Successors::previsit`] and yielded if it passes. Each visit switches
/// back to enqueue mode so the next sibling is expanded before it is
/// visited.
///
/// The first store error is yielded and ends the traversal.
pub struct PostOrderIter<'a> {
    store: &'a dyn ObjectStore,
    successors: Successors<'a>,
    to_visit: VecDeque<VecDeque<ObjectId>>,
    enqueue: bool,
    yielded: u64,
    done: bool,
}

impl<'a> PostOrderIter<'a> {
    /// Traverse from `start` under a custom policy.
    pub fn new(
        start: impl IntoIterator<Item = ObjectId>,
        store: &'a dyn ObjectStore,
        successors: Successors<'a>,
    ) -> Self {
        let mut to_visit = VecDeque::new();
        to_visit.push_back(start.into_iter().collect());
        Self {
            store,
            successors,
            to_visit,
            enqueue: true,
            yielded: 0,
            done: false,
        }
    }

    fn step(&mut self) -> WalkResult<Option<RevObject>> {
        while let Some(level) = self.to_visit.front_mut() {
            let Some(&head) = level.front() else {
                self.to_visit.pop_front();
                self.enqueue = false;
                continue;
            };
            if self.enqueue {
                let object = self.store.get(&head)?;
                let mut next = Vec::new();
                self.successors.find_successors(&object, &mut next);
                self.to_visit.push_front(next.into());
            } else {
                level.pop_front();
                self.enqueue = true;
                if self.successors.previsit(&head) {
                    return Ok(Some(self.store.get(&head)?));
                }
            }
        }
        Ok(None)
    }
}

impl Iterator for PostOrderIter<'_> {
    type Item = WalkResult<RevObject>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(object)) => {
                self.yielded += 1;
                Some(Ok(object))
            }
            Ok(None) => {
                self.done = true;
                debug!(yielded = self.yielded, "traversal finished");
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for PostOrderIter<'_> {}

impl std::fmt::Debug for PostOrderIter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostOrderIter")
            .field("successors", &self.successors)
            .field("depth", &self.to_visit.len())
            .field("enqueue", &self.enqueue)
            .field("yielded", &self.yielded)
            .field("done", &self.done)
            .finish()
    }
}
