use serde::{Deserialize, Serialize};

use crate::error::{IndexError, IndexResult};

/// Tuning for [`FileNodeIndex`](crate::FileNodeIndex).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeIndexConfig {
    /// Nodes held in memory before the partition is spilled.
    pub partition_capacity: usize,
    /// Number of flush worker threads.
    pub flush_workers: usize,
    /// Full partitions that may wait for a worker before `add` blocks.
    pub flush_queue_depth: usize,
    /// zstd level for spill files.
    pub compression_level: i32,
}

impl Default for NodeIndexConfig {
    fn default() -> Self {
        Self {
            partition_capacity: 1_000_000,
            flush_workers: 2,
            flush_queue_depth: 4,
            compression_level: 3,
        }
    }
}

impl NodeIndexConfig {
    pub fn validate(&self) -> IndexResult<()> {
        if self.partition_capacity == 0 {
            return Err(IndexError::InvalidConfig(
                "partition_capacity must be at least 1".into(),
            ));
        }
        if self.flush_workers == 0 {
            return Err(IndexError::InvalidConfig(
                "flush_workers must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
