use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::RwLock;

use canopy_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::{ObjectKind, StoredObject};
use crate::traits::ObjectStore;

/// Object store that keeps every encoded object in a map.
///
/// Used as the fixture store in tests and by callers that build trees
/// without a repository on disk. Readers share the lock; writes of an id
/// already present are no-ops, so the first stored copy is kept.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<ObjectId, StoredObject>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of stored objects of `kind`.
    pub fn count_of(&self, kind: ObjectKind) -> usize {
        self.objects
            .read()
            .expect("lock poisoned")
            .values()
            .filter(|obj| obj.kind == kind)
            .count()
    }

    /// Ids of every stored object of `kind`, sorted.
    pub fn ids_of(&self, kind: ObjectKind) -> Vec<ObjectId> {
        let objects = self.objects.read().expect("lock poisoned");
        let mut ids: Vec<ObjectId> = objects
            .iter()
            .filter(|(_, obj)| obj.kind == kind)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        Ok(self.objects.read().expect("lock poisoned").get(id).cloned())
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        let id = object.compute_id();
        if id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        if let Entry::Vacant(slot) = self.objects.write().expect("lock poisoned").entry(id) {
            slot.insert(object.clone());
        }
        Ok(id)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.objects.read().expect("lock poisoned").contains_key(id))
    }

    fn delete(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.objects.write().expect("lock poisoned").remove(id).is_some())
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("trees", &self.count_of(ObjectKind::Tree))
            .field("features", &self.count_of(ObjectKind::Feature))
            .field("commits", &self.count_of(ObjectKind::Commit))
            .field("total", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, Value};
    use crate::object::*;
    use crate::tree::RevTree;

    fn make_feature(n: i64) -> RevObject {
        RevFeature::new(vec![Value::Int(n)]).into()
    }

    fn make_tree() -> RevTree {
        RevTree::leaf(vec![
            Node::feature("a", ObjectId::from_bytes(b"a"), None),
            Node::tree("sub", ObjectId::from_bytes(b"sub"), None),
        ])
    }

    // -----------------------------------------------------------------------
    // Byte-level access
    // -----------------------------------------------------------------------

    #[test]
    fn write_and_read_back() {
        let store = InMemoryObjectStore::new();
        let obj = make_feature(1).to_stored_object();
        let id = store.write(&obj).unwrap();
        assert_eq!(store.read(&id).unwrap(), Some(obj));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn write_is_idempotent() {
        let store = InMemoryObjectStore::new();
        let obj = make_feature(7).to_stored_object();
        assert_eq!(store.write(&obj).unwrap(), store.write(&obj).unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn delete_present_then_missing() {
        let store = InMemoryObjectStore::new();
        let id = store.write(&make_feature(2).to_stored_object()).unwrap();
        assert!(store.delete(&id).unwrap());
        assert!(!store.exists(&id).unwrap());
        assert!(!store.delete(&id).unwrap());
    }

    #[test]
    fn batch_with_missing() {
        let store = InMemoryObjectStore::new();
        let ids = store
            .write_batch(&[
                make_feature(1).to_stored_object(),
                make_feature(2).to_stored_object(),
            ])
            .unwrap();
        let missing = ObjectId::from_bytes(b"missing");
        let results = store.read_batch(&[ids[0], missing, ids[1]]).unwrap();
        assert!(results[0].is_some());
        assert!(results[1].is_none());
        assert!(results[2].is_some());
        assert_eq!(store.ids_of(ObjectKind::Feature).len(), 2);
        assert_eq!(store.count_of(ObjectKind::Tree), 0);
    }

    // -----------------------------------------------------------------------
    // Typed access
    // -----------------------------------------------------------------------

    #[test]
    fn put_reports_new_objects() {
        let store = InMemoryObjectStore::new();
        let feature = make_feature(3);
        assert!(store.put(&feature).unwrap());
        assert!(!store.put(&feature).unwrap());
        assert_eq!(store.get(feature.id()).unwrap(), feature);
    }

    #[test]
    fn put_all_counts_inserted() {
        let store = InMemoryObjectStore::new();
        store.put(&make_feature(1)).unwrap();
        let inserted = store
            .put_all(&[make_feature(1), make_feature(2), make_feature(3)])
            .unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn get_tree_and_commit() {
        let store = InMemoryObjectStore::new();
        let tree = make_tree();
        assert!(store.put_tree(&tree).unwrap());
        let commit = RevCommit::new(*tree.id(), vec![], "ada", "init", 1);
        store.put(&commit.clone().into()).unwrap();

        assert_eq!(store.get_tree(tree.id()).unwrap(), tree);
        assert_eq!(store.get_commit(commit.id()).unwrap(), commit);
    }

    #[test]
    fn empty_tree_needs_no_write() {
        let store = InMemoryObjectStore::new();
        let tree = store.get_tree(&RevTree::empty_id()).unwrap();
        assert!(tree.is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn missing_object_is_not_found() {
        let store = InMemoryObjectStore::new();
        let id = ObjectId::from_bytes(b"nope");
        assert!(store.get_if_present(&id).unwrap().is_none());
        assert!(matches!(store.get(&id), Err(StoreError::NotFound(missing)) if missing == id));
    }

    #[test]
    fn wrong_kind_is_reported() {
        let store = InMemoryObjectStore::new();
        let feature = make_feature(9);
        store.put(&feature).unwrap();
        assert!(matches!(
            store.get_tree(feature.id()),
            Err(StoreError::UnexpectedKind {
                expected: ObjectKind::Tree,
                actual: ObjectKind::Feature,
                ..
            })
        ));
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[test]
    fn writers_and_readers_share_the_store() {
        let store = InMemoryObjectStore::new();
        let tree = make_tree();
        store.put_tree(&tree).unwrap();

        std::thread::scope(|s| {
            for t in 0..4i64 {
                let store = &store;
                let tree = &tree;
                s.spawn(move || {
                    for n in 0..25 {
                        store.put(&make_feature(t * 100 + n)).unwrap();
                        assert_eq!(store.get_tree(tree.id()).unwrap().size(), 2);
                    }
                });
            }
        });
        assert_eq!(store.count_of(ObjectKind::Feature), 100);
        assert_eq!(store.count_of(ObjectKind::Tree), 1);
    }

    #[test]
    fn debug_lists_counts_by_kind() {
        let store = InMemoryObjectStore::new();
        store.put(&make_feature(1)).unwrap();
        let debug = format!("{store:?}");
        assert!(debug.contains("features: 1"));
        assert!(debug.contains("total: 1"));
    }
}
