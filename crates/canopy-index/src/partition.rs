//! Spill files.
//!
//! ```text
//! [4 bytes: magic "CNIX"]
//! [1 byte:  format version]
//! [zstd stream of node records, canonical order]
//! ```

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use canopy_store::codec::{read_node, write_node};
use canopy_store::Node;

use crate::error::{IndexError, IndexResult};

const MAGIC: &[u8; 4] = b"CNIX";
const VERSION: u8 = 1;

/// A partition that made it to disk.
#[derive(Debug)]
pub(crate) struct SpilledPartition {
    pub seq: u64,
    pub path: PathBuf,
    pub count: usize,
}

/// Write `nodes` (already in canonical order) to a new spill file.
pub(crate) fn write_partition<'a>(
    path: &Path,
    nodes: impl IntoIterator<Item = &'a Node>,
    level: i32,
) -> IndexResult<usize> {
    let mut file = BufWriter::new(File::create(path)?);
    file.write_all(MAGIC)?;
    file.write_all(&[VERSION])?;

    let mut encoder = zstd::Encoder::new(file, level)?;
    let mut count = 0;
    for node in nodes {
        write_node(node, &mut encoder)?;
        count += 1;
    }
    let mut file = encoder.finish()?;
    file.flush()?;
    Ok(count)
}

/// Streaming reader over one spill file.
pub(crate) struct PartitionReader {
    decoder: zstd::Decoder<'static, std::io::BufReader<File>>,
}

impl PartitionReader {
    pub(crate) fn open(path: &Path) -> IndexResult<Self> {
        let mut file = File::open(path)?;
        let mut header = [0u8; 5];
        file.read_exact(&mut header).map_err(|e| IndexError::BadPartition {
            path: path.to_path_buf(),
            reason: format!("missing header: {e}"),
        })?;
        if &header[..4] != MAGIC {
            return Err(IndexError::BadPartition {
                path: path.to_path_buf(),
                reason: "bad magic".into(),
            });
        }
        if header[4] != VERSION {
            return Err(IndexError::BadPartition {
                path: path.to_path_buf(),
                reason: format!("unsupported version {}", header[4]),
            });
        }
        Ok(Self {
            decoder: zstd::Decoder::new(file)?,
        })
    }

    /// Next node, or `None` once the partition is exhausted.
    pub(crate) fn next_node(&mut self) -> IndexResult<Option<Node>> {
        Ok(read_node(&mut self.decoder)?)
    }
}
