use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use canopy_index::{FileNodeIndex, NodeIndexConfig};
use canopy_store::{Node, ObjectStore, RevFeatureType, RevObject, RevTree};
use canopy_types::{Envelope, ObjectId};
use tracing::{debug, info};

use crate::builder::CanonicalTreeBuilder;
use crate::config::TreeBuilderConfig;
use crate::error::TreeResult;

/// Bulk loader for one tree level.
///
/// Entries are staged in a [`FileNodeIndex`] so any number of them can be
/// added with bounded memory, then folded into the original tree in
/// canonical order by [`LargeTreeBuilder::build`]. Producers may call the
/// staging methods from several threads at once.
pub struct LargeTreeBuilder {
    store: Arc<dyn ObjectStore>,
    original: RevTree,
    index: FileNodeIndex,
    default_metadata_id: Option<ObjectId>,
    feature_types: Mutex<HashMap<ObjectId, RevFeatureType>>,
    builder_config: TreeBuilderConfig,
}

impl LargeTreeBuilder {
    /// `scratch` is the directory under which the index creates its own
    /// private spill directory.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        original: RevTree,
        scratch: &Path,
        config: NodeIndexConfig,
    ) -> TreeResult<Self> {
        Ok(Self {
            store,
            original,
            index: FileNodeIndex::new(scratch, config)?,
            default_metadata_id: None,
            feature_types: Mutex::new(HashMap::new()),
            builder_config: TreeBuilderConfig::default(),
        })
    }

    /// Metadata id the enclosing tree assigns to its entries. Features added
    /// with this feature type carry no metadata id of their own.
    pub fn with_default_metadata_id(mut self, id: ObjectId) -> Self {
        self.default_metadata_id = Some(id);
        self
    }

    pub fn with_builder_config(mut self, config: TreeBuilderConfig) -> Self {
        self.builder_config = config;
        self
    }

    /// Stage a node. A node with a null object id is a removal.
    pub fn put(&self, node: Node) -> TreeResult<()> {
        Ok(self.index.add(node)?)
    }

    /// Stage a feature of the given type and return the node that will be
    /// stored for it.
    pub fn put_feature(
        &self,
        id: ObjectId,
        name: impl Into<String>,
        bounds: Option<Envelope>,
        feature_type: &RevFeatureType,
    ) -> TreeResult<Node> {
        let type_id = *feature_type.id();
        let metadata_id = if Some(type_id) == self.default_metadata_id {
            None
        } else {
            self.feature_types
                .lock()
                .expect("lock poisoned")
                .entry(type_id)
                .or_insert_with(|| feature_type.clone());
            Some(type_id)
        };
        let mut node = Node::feature(name, id, metadata_id);
        if let Some(bounds) = bounds {
            node = node.with_bounds(bounds);
        }
        self.put(node.clone())?;
        Ok(node)
    }

    /// Stage the removal of `name`.
    pub fn remove_feature(&self, name: impl Into<String>) -> TreeResult<()> {
        self.put(Node::tombstone(name))
    }

    /// Fold every staged entry into the original tree, persist the result and
    /// return it.
    ///
    /// The index is closed whether or not the fold succeeds.
    pub fn build(mut self) -> TreeResult<RevTree> {
        let started = Instant::now();
        let folded = self.fold();
        let closed = self.index.close();
        let (tree, count) = folded?;
        closed?;
        info!(
            nodes = count,
            size = tree.size(),
            root = %tree.id().short_hex(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "built large tree"
        );
        Ok(tree)
    }

    fn fold(&mut self) -> TreeResult<(RevTree, u64)> {
        let mut builder = CanonicalTreeBuilder::with_config(
            Arc::clone(&self.store),
            self.original.clone(),
            self.builder_config.clone(),
        );
        let mut count = 0u64;
        for node in self.index.nodes()? {
            let node = node?;
            if node.is_tombstone() {
                builder.remove(node.name())?;
            } else {
                builder.put(node)?;
            }
            count += 1;
        }
        let tree = builder.build()?;

        let types: Vec<RevObject> = self
            .feature_types
            .get_mut()
            .expect("lock poisoned")
            .drain()
            .map(|(_, ft)| RevObject::FeatureType(ft))
            .collect();
        let stored = self.store.put_all(&types)?;
        debug!(feature_types = types.len(), newly_stored = stored, "persisted feature types");

        self.store.put_tree(&tree)?;
        Ok((tree, count))
    }
}

impl std::fmt::Debug for LargeTreeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LargeTreeBuilder")
            .field("original", self.original.id())
            .field("index", &self.index)
            .field("default_metadata_id", &self.default_metadata_id)
            .finish()
    }
}
