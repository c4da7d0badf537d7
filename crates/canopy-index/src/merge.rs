use std::cmp::{Ordering, Reverse};
use std::collections::{btree_map, BinaryHeap};
use std::marker::PhantomData;

use canopy_store::{CanonicalKey, Node};

use crate::error::IndexResult;
use crate::partition::PartitionReader;

/// One sorted input to the merge.
pub(crate) enum Run {
    File(PartitionReader),
    Memory(btree_map::IntoValues<CanonicalKey, Node>),
}

impl Run {
    fn next_node(&mut self) -> IndexResult<Option<Node>> {
        match self {
            Run::File(reader) => reader.next_node(),
            Run::Memory(nodes) => Ok(nodes.next()),
        }
    }
}

/// Heap entry for the k-way merge. Equal keys order the newest run first so
/// it is the one emitted.
struct HeapEntry {
    key: CanonicalKey,
    run: usize,
    node: Node,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.run == other.run
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| other.run.cmp(&self.run))
    }
}

/// Every node in the index, once each, in canonical order.
///
/// Single pass. Borrows the index so it cannot be closed underneath the
/// open spill files. After yielding an error the iterator is finished.
pub struct Nodes<'a> {
    runs: Vec<Run>,
    heap: BinaryHeap<Reverse<HeapEntry>>,
    failed: bool,
    _index: PhantomData<&'a mut ()>,
}

impl<'a> Nodes<'a> {
    /// `runs` must be ordered oldest to newest.
    pub(crate) fn new(runs: Vec<Run>) -> IndexResult<Self> {
        let mut merge = Self {
            heap: BinaryHeap::with_capacity(runs.len()),
            runs,
            failed: false,
            _index: PhantomData,
        };
        for run in 0..merge.runs.len() {
            merge.advance(run)?;
        }
        Ok(merge)
    }

    fn advance(&mut self, run: usize) -> IndexResult<()> {
        if let Some(node) = self.runs[run].next_node()? {
            self.heap.push(Reverse(HeapEntry {
                key: node.canonical_key(),
                run,
                node,
            }));
        }
        Ok(())
    }

    fn step(&mut self) -> IndexResult<Option<Node>> {
        let Some(Reverse(top)) = self.heap.pop() else {
            return Ok(None);
        };
        self.advance(top.run)?;
        // Older values for the same name.
        loop {
            let shadowed = match self.heap.peek() {
                Some(Reverse(entry)) if entry.key == top.key => entry.run,
                _ => break,
            };
            self.heap.pop();
            self.advance(shadowed)?;
        }
        Ok(Some(top.node))
    }
}

impl Iterator for Nodes<'_> {
    type Item = IndexResult<Node>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.step() {
            Ok(node) => node.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for Nodes<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_types::ObjectId;
    use std::collections::BTreeMap;

    fn memory_run(entries: &[(&str, &[u8])]) -> Run {
        let map: BTreeMap<CanonicalKey, Node> = entries
            .iter()
            .map(|(name, content)| {
                let node = Node::feature(*name, ObjectId::from_bytes(content), None);
                (node.canonical_key(), node)
            })
            .collect();
        Run::Memory(map.into_values())
    }

    #[test]
    fn newest_run_wins_ties() {
        let runs = vec![
            memory_run(&[("a", b"old"), ("b", b"b")]),
            memory_run(&[("a", b"mid"), ("c", b"c")]),
            memory_run(&[("a", b"new")]),
        ];
        let merged: Vec<Node> = Nodes::new(runs).unwrap().map(Result::unwrap).collect();
        assert_eq!(merged.len(), 3);
        let a = merged.iter().find(|n| n.name() == "a").unwrap();
        assert_eq!(a.object_id(), &ObjectId::from_bytes(b"new"));
    }

    #[test]
    fn output_is_canonically_sorted() {
        let names: Vec<String> = (0..50).map(|i| format!("n{i}")).collect();
        let (left, right) = names.split_at(20);
        let to_run = |names: &[String]| {
            let map: BTreeMap<CanonicalKey, Node> = names
                .iter()
                .map(|n| {
                    let node = Node::feature(n.as_str(), ObjectId::from_bytes(n.as_bytes()), None);
                    (node.canonical_key(), node)
                })
                .collect();
            Run::Memory(map.into_values())
        };
        let merged: Vec<CanonicalKey> = Nodes::new(vec![to_run(left), to_run(right)])
            .unwrap()
            .map(|n| n.unwrap().canonical_key())
            .collect();
        assert_eq!(merged.len(), 50);
        assert!(merged.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn no_runs_is_empty() {
        assert_eq!(Nodes::new(Vec::new()).unwrap().count(), 0);
    }
}
