use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use canopy_store::{CanonicalKey, Node};
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::config::NodeIndexConfig;
use crate::error::{IndexError, IndexResult};
use crate::merge::{Nodes, Run};
use crate::partition::PartitionReader;
use crate::pool::{FlushJob, FlushPool};

/// State guarded by the partition lock.
#[derive(Default)]
struct Active {
    /// Keyed by canonical key so a repeated name overwrites in place.
    nodes: BTreeMap<CanonicalKey, Node>,
    next_seq: u64,
    added: u64,
    drained: bool,
    closed: bool,
}

/// Disk-spilling sorted index of nodes.
///
/// `add` may be called concurrently from any number of threads. Each index
/// owns a uniquely named scratch directory under the parent it was created
/// in; [`FileNodeIndex::close`] (or dropping the index) removes it.
///
/// ```text
/// add ──► [partition] ──full──► flush queue ──► worker ──► partition-N.cnix
///                                                              │
/// nodes() ◄── k-way merge ◄── spill files + resident partition ┘
/// ```
pub struct FileNodeIndex {
    config: NodeIndexConfig,
    active: Mutex<Active>,
    pool: FlushPool,
    scratch: Option<TempDir>,
}

impl FileNodeIndex {
    /// Create an index whose spill files live in a fresh directory under
    /// `parent`.
    pub fn new(parent: &Path, config: NodeIndexConfig) -> IndexResult<Self> {
        config.validate()?;
        let scratch = tempfile::Builder::new()
            .prefix("nodeindex-")
            .tempdir_in(parent)?;
        let pool = FlushPool::spawn(scratch.path().to_path_buf(), &config)?;
        debug!(
            dir = %scratch.path().display(),
            capacity = config.partition_capacity,
            workers = config.flush_workers,
            "created node index"
        );
        Ok(Self {
            config,
            active: Mutex::new(Active::default()),
            pool,
            scratch: Some(scratch),
        })
    }

    pub fn config(&self) -> &NodeIndexConfig {
        &self.config
    }

    /// The scratch directory, until the index is closed.
    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch.as_ref().map(TempDir::path)
    }

    /// Total `add` calls so far, duplicates included.
    pub fn added(&self) -> u64 {
        self.active.lock().expect("lock poisoned").added
    }

    /// Add a node. A later node with the same name replaces an earlier one.
    ///
    /// When the resident partition fills up it is swapped out under the lock
    /// and handed to the flush pool after the lock is released.
    pub fn add(&self, node: Node) -> IndexResult<()> {
        let job = {
            let mut active = self.active.lock().expect("lock poisoned");
            if active.closed {
                return Err(IndexError::Closed);
            }
            if active.drained {
                return Err(IndexError::AlreadyDrained);
            }
            active.nodes.insert(node.canonical_key(), node);
            active.added += 1;
            if active.nodes.len() < self.config.partition_capacity {
                return Ok(());
            }
            let seq = active.next_seq;
            active.next_seq += 1;
            FlushJob {
                seq,
                nodes: std::mem::take(&mut active.nodes),
            }
        };
        self.pool.submit(job)
    }

    /// Stream every distinct node back in canonical order.
    ///
    /// Waits for all outstanding flushes first. May be called once.
    pub fn nodes(&mut self) -> IndexResult<Nodes<'_>> {
        let (resident, added) = {
            let active = self.active.get_mut().expect("lock poisoned");
            if active.closed {
                return Err(IndexError::Closed);
            }
            if active.drained {
                return Err(IndexError::AlreadyDrained);
            }
            active.drained = true;
            (std::mem::take(&mut active.nodes), active.added)
        };

        let spilled = self.pool.finish()?;
        let mut runs = Vec::with_capacity(spilled.len() + 1);
        for part in &spilled {
            runs.push(Run::File(PartitionReader::open(&part.path)?));
        }
        debug!(
            added,
            partitions = spilled.len(),
            spilled_nodes = spilled.iter().map(|p| p.count).sum::<usize>(),
            resident = resident.len(),
            "merging node index"
        );
        runs.push(Run::Memory(resident.into_values()));
        Nodes::new(runs)
    }

    /// Stop the flush workers and delete the scratch directory.
    ///
    /// Idempotent, and safe whether or not `nodes()` was called.
    pub fn close(&mut self) -> IndexResult<()> {
        {
            let active = self.active.get_mut().expect("lock poisoned");
            active.closed = true;
            active.nodes.clear();
        }
        if self.pool.join() {
            warn!("flush worker panicked before close");
        }
        if let Some(dir) = self.scratch.take() {
            let path = dir.path().to_path_buf();
            dir.close()?;
            debug!(dir = %path.display(), "removed node index scratch directory");
        }
        Ok(())
    }
}

impl Drop for FileNodeIndex {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to clean up node index");
        }
    }
}

impl std::fmt::Debug for FileNodeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileNodeIndex")
            .field("config", &self.config)
            .field("scratch", &self.scratch_dir())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_store::ordering;
    use canopy_types::ObjectId;

    fn feature(name: &str, version: u32) -> Node {
        let mut content = name.as_bytes().to_vec();
        content.extend_from_slice(&version.to_be_bytes());
        Node::feature(name, ObjectId::from_bytes(&content), None)
    }

    fn small(capacity: usize) -> NodeIndexConfig {
        NodeIndexConfig {
            partition_capacity: capacity,
            flush_workers: 2,
            flush_queue_depth: 2,
            compression_level: 1,
        }
    }

    fn drain(index: &mut FileNodeIndex) -> Vec<Node> {
        index.nodes().unwrap().map(Result::unwrap).collect()
    }

    // -----------------------------------------------------------------------
    // Ordering and duplicates
    // -----------------------------------------------------------------------

    #[test]
    fn empty_index_yields_nothing() {
        let parent = tempfile::tempdir().unwrap();
        let mut index = FileNodeIndex::new(parent.path(), small(4)).unwrap();
        assert!(drain(&mut index).is_empty());
    }

    #[test]
    fn resident_only_is_sorted() {
        let parent = tempfile::tempdir().unwrap();
        let mut index = FileNodeIndex::new(parent.path(), small(100)).unwrap();
        for i in 0..30 {
            index.add(feature(&format!("f{i}"), 0)).unwrap();
        }
        let names: Vec<String> = drain(&mut index).iter().map(|n| n.name().to_string()).collect();
        assert_eq!(names.len(), 30);
        assert!(names
            .windows(2)
            .all(|w| ordering::compare(&w[0], &w[1]).is_lt()));
    }

    #[test]
    fn spilled_partitions_merge_with_last_write_winning() {
        let parent = tempfile::tempdir().unwrap();
        let mut index = FileNodeIndex::new(parent.path(), small(7)).unwrap();
        // three rounds over the same 20 names, spanning several partitions
        for version in 0..3 {
            for i in 0..20 {
                index.add(feature(&format!("f{i}"), version)).unwrap();
            }
        }
        assert_eq!(index.added(), 60);
        let nodes = drain(&mut index);
        assert_eq!(nodes.len(), 20);
        for node in &nodes {
            assert_eq!(node, &feature(node.name(), 2));
        }
        let keys: Vec<CanonicalKey> = nodes.iter().map(Node::canonical_key).collect();
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn capacity_one_spills_everything() {
        let parent = tempfile::tempdir().unwrap();
        let mut index = FileNodeIndex::new(parent.path(), small(1)).unwrap();
        for i in 0..10 {
            index.add(feature(&format!("n{i}"), 0)).unwrap();
        }
        assert_eq!(drain(&mut index).len(), 10);
    }

    #[test]
    fn concurrent_producers() {
        let parent = tempfile::tempdir().unwrap();
        let mut index = FileNodeIndex::new(parent.path(), small(50)).unwrap();
        std::thread::scope(|s| {
            for t in 0..4 {
                let index = &index;
                s.spawn(move || {
                    for i in 0..250 {
                        index.add(feature(&format!("t{t}-{i}"), 0)).unwrap();
                    }
                });
            }
        });
        assert_eq!(drain(&mut index).len(), 1000);
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    #[test]
    fn nodes_is_single_pass() {
        let parent = tempfile::tempdir().unwrap();
        let mut index = FileNodeIndex::new(parent.path(), small(4)).unwrap();
        index.add(feature("a", 0)).unwrap();
        drain(&mut index);
        assert!(matches!(index.nodes(), Err(IndexError::AlreadyDrained)));
        assert!(matches!(index.add(feature("b", 0)), Err(IndexError::AlreadyDrained)));
    }

    #[test]
    fn close_twice_removes_scratch() {
        let parent = tempfile::tempdir().unwrap();
        let mut index = FileNodeIndex::new(parent.path(), small(2)).unwrap();
        for i in 0..9 {
            index.add(feature(&format!("n{i}"), 0)).unwrap();
        }
        let scratch = index.scratch_dir().unwrap().to_path_buf();
        assert!(scratch.exists());

        index.close().unwrap();
        index.close().unwrap();
        assert!(!scratch.exists());
        assert!(index.scratch_dir().is_none());
        assert!(matches!(index.add(feature("late", 0)), Err(IndexError::Closed)));
        assert!(matches!(index.nodes(), Err(IndexError::Closed)));
    }

    #[test]
    fn close_after_partial_drain() {
        let parent = tempfile::tempdir().unwrap();
        let mut index = FileNodeIndex::new(parent.path(), small(3)).unwrap();
        for i in 0..20 {
            index.add(feature(&format!("n{i}"), 0)).unwrap();
        }
        let scratch = index.scratch_dir().unwrap().to_path_buf();
        {
            let mut nodes = index.nodes().unwrap();
            nodes.next().unwrap().unwrap();
        }
        index.close().unwrap();
        assert!(!scratch.exists());
    }

    #[test]
    fn drop_cleans_up() {
        let parent = tempfile::tempdir().unwrap();
        let scratch = {
            let index = FileNodeIndex::new(parent.path(), small(2)).unwrap();
            for i in 0..5 {
                index.add(feature(&format!("n{i}"), 0)).unwrap();
            }
            index.scratch_dir().unwrap().to_path_buf()
        };
        assert!(!scratch.exists());
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
    }

    #[test]
    fn indexes_get_distinct_scratch_dirs() {
        let parent = tempfile::tempdir().unwrap();
        let a = FileNodeIndex::new(parent.path(), small(2)).unwrap();
        let b = FileNodeIndex::new(parent.path(), small(2)).unwrap();
        assert_ne!(a.scratch_dir(), b.scratch_dir());
    }

    #[test]
    fn invalid_config_rejected() {
        let parent = tempfile::tempdir().unwrap();
        assert!(matches!(
            FileNodeIndex::new(parent.path(), small(0)),
            Err(IndexError::InvalidConfig(_))
        ));
    }
}
