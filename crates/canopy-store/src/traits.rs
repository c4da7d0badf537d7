use canopy_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::{ObjectKind, RevCommit, RevObject, StoredObject};
use crate::tree::RevTree;

/// Content-addressed object store.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable once written. The same data always produces the
///   same id.
/// - A write is visible to every subsequent read in the same process.
/// - Concurrent reads are always safe.
/// - The store never interprets object contents.
/// - All I/O errors are propagated, never silently ignored.
///
/// The byte-level methods are what a backend implements; the typed methods
/// (`get`, `get_tree`, `put`, ...) are provided on top of them.
pub trait ObjectStore: Send + Sync {
    /// Read an object by its content-addressed ID.
    ///
    /// Returns `Ok(None)` if the object does not exist.
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>>;

    /// Write an object and return its content-addressed ID.
    ///
    /// If the object already exists, this is a no-op.
    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId>;

    fn exists(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Delete an object by ID. Returns `true` if the object existed.
    ///
    /// Intended for garbage collection only.
    fn delete(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Read multiple objects in a batch.
    fn read_batch(&self, ids: &[ObjectId]) -> StoreResult<Vec<Option<StoredObject>>> {
        ids.iter().map(|id| self.read(id)).collect()
    }

    /// Write multiple objects in a batch and return their IDs.
    fn write_batch(&self, objects: &[StoredObject]) -> StoreResult<Vec<ObjectId>> {
        objects.iter().map(|obj| self.write(obj)).collect()
    }

    // -----------------------------------------------------------------------
    // Typed access
    // -----------------------------------------------------------------------

    /// Decode the object `id`, or `None` if it is not stored.
    ///
    /// The empty tree resolves without touching the backend.
    fn get_if_present(&self, id: &ObjectId) -> StoreResult<Option<RevObject>> {
        if *id == RevTree::empty_id() {
            return Ok(Some(RevObject::Tree(RevTree::empty())));
        }
        self.read(id)?
            .map(|stored| RevObject::from_stored_object(&stored))
            .transpose()
    }

    /// Decode the object `id`, failing with [`StoreError::NotFound`] if absent.
    fn get(&self, id: &ObjectId) -> StoreResult<RevObject> {
        self.get_if_present(id)?.ok_or(StoreError::NotFound(*id))
    }

    fn get_tree(&self, id: &ObjectId) -> StoreResult<RevTree> {
        match self.get(id)? {
            RevObject::Tree(tree) => Ok(tree),
            other => Err(StoreError::UnexpectedKind {
                id: *id,
                expected: ObjectKind::Tree,
                actual: other.kind(),
            }),
        }
    }

    fn get_commit(&self, id: &ObjectId) -> StoreResult<RevCommit> {
        match self.get(id)? {
            RevObject::Commit(commit) => Ok(commit),
            other => Err(StoreError::UnexpectedKind {
                id: *id,
                expected: ObjectKind::Commit,
                actual: other.kind(),
            }),
        }
    }

    /// Store `object`. Returns `true` if it was not already present.
    fn put(&self, object: &RevObject) -> StoreResult<bool> {
        store_if_absent(self, object.id(), || object.to_stored_object())
    }

    /// [`ObjectStore::put`] for a tree without wrapping it in a [`RevObject`].
    fn put_tree(&self, tree: &RevTree) -> StoreResult<bool> {
        store_if_absent(self, tree.id(), || tree.to_stored_object())
    }

    /// Store every object; returns how many were newly stored.
    fn put_all(&self, objects: &[RevObject]) -> StoreResult<usize> {
        let mut inserted = 0;
        for object in objects {
            if self.put(object)? {
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

fn store_if_absent<S: ObjectStore + ?Sized>(
    store: &S,
    id: &ObjectId,
    encode: impl FnOnce() -> StoredObject,
) -> StoreResult<bool> {
    if store.exists(id)? {
        return Ok(false);
    }
    store.write(&encode())?;
    Ok(true)
}
