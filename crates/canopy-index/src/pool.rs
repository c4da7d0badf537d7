use std::collections::BTreeMap;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use canopy_store::{CanonicalKey, Node};
use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, warn};

use crate::config::NodeIndexConfig;
use crate::error::{IndexError, IndexResult};
use crate::partition::{write_partition, SpilledPartition};

/// A full partition on its way to disk.
pub(crate) struct FlushJob {
    pub seq: u64,
    pub nodes: BTreeMap<CanonicalKey, Node>,
}

/// Fixed set of threads writing partitions to spill files.
///
/// Jobs travel over a bounded channel, so a producer outrunning the disk
/// blocks in [`FlushPool::submit`] once `flush_queue_depth` partitions are
/// waiting. Results come back over an unbounded channel and are only looked
/// at in [`FlushPool::finish`].
pub(crate) struct FlushPool {
    jobs: Option<Sender<FlushJob>>,
    results: Receiver<IndexResult<SpilledPartition>>,
    workers: Vec<JoinHandle<()>>,
}

impl FlushPool {
    pub(crate) fn spawn(dir: PathBuf, config: &NodeIndexConfig) -> IndexResult<Self> {
        let (job_tx, job_rx) = crossbeam_channel::bounded::<FlushJob>(config.flush_queue_depth);
        let (result_tx, result_rx) = crossbeam_channel::unbounded();

        let mut workers = Vec::with_capacity(config.flush_workers);
        for i in 0..config.flush_workers {
            let jobs = job_rx.clone();
            let results = result_tx.clone();
            let dir = dir.clone();
            let level = config.compression_level;
            let handle = thread::Builder::new()
                .name(format!("canopy-flush-{i}"))
                .spawn(move || {
                    for job in jobs.iter() {
                        let outcome = flush(&dir, job, level);
                        if results.send(outcome).is_err() {
                            break;
                        }
                    }
                })?;
            workers.push(handle);
        }

        Ok(Self {
            jobs: Some(job_tx),
            results: result_rx,
            workers,
        })
    }

    /// Queue a partition for writing. Blocks while the queue is full.
    pub(crate) fn submit(&self, job: FlushJob) -> IndexResult<()> {
        let jobs = self.jobs.as_ref().ok_or(IndexError::PoolShutDown)?;
        jobs.send(job).map_err(|_| IndexError::PoolShutDown)
    }

    /// Stop accepting work, wait for every queued partition to be written and
    /// return them in submission order. The first failure wins.
    pub(crate) fn finish(&mut self) -> IndexResult<Vec<SpilledPartition>> {
        let panicked = self.join();
        let mut spilled = Vec::new();
        let mut first_err = None;
        for outcome in self.results.try_iter() {
            match outcome {
                Ok(part) => spilled.push(part),
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_err {
            return Err(e);
        }
        if panicked {
            return Err(IndexError::WorkerPanicked);
        }
        spilled.sort_by_key(|p| p.seq);
        Ok(spilled)
    }

    /// Close the job queue and join every worker. Returns `true` if any
    /// worker panicked.
    pub(crate) fn join(&mut self) -> bool {
        self.jobs.take();
        let mut panicked = false;
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                panicked = true;
            }
        }
        panicked
    }
}

impl Drop for FlushPool {
    fn drop(&mut self) {
        if self.join() {
            warn!("flush worker panicked during shutdown");
        }
    }
}

fn flush(dir: &std::path::Path, job: FlushJob, level: i32) -> IndexResult<SpilledPartition> {
    let path = dir.join(format!("partition-{:06}.cnix", job.seq));
    let count = write_partition(&path, job.nodes.values(), level)?;
    debug!(partition = job.seq, nodes = count, path = %path.display(), "flushed partition");
    Ok(SpilledPartition {
        seq: job.seq,
        path,
        count,
    })
}
