//! Tracking of ids already produced by a traversal.

use std::collections::HashSet;

use canopy_types::ObjectId;

/// Oracle for which objects a traversal has already visited.
///
/// Implementations trade memory for precision. An approximate implementation
/// may report false duplicates, which drops objects from the traversal, so
/// it only suits callers that can tolerate that.
pub trait Deduplicator {
    /// `true` if `id` has been visited.
    fn is_duplicate(&self, id: &ObjectId) -> bool;

    /// Mark `id` visited. Returns `true` the first time `id` is seen.
    fn visit(&mut self, id: &ObjectId) -> bool;

    /// Drop every visited id from `ids`, keeping the order of the rest.
    fn remove_duplicates(&self, ids: &mut Vec<ObjectId>) {
        ids.retain(|id| !self.is_duplicate(id));
    }

    /// Forget everything visited so far.
    fn reset(&mut self);
}

impl<D: Deduplicator + ?Sized> Deduplicator for &mut D {
    fn is_duplicate(&self, id: &ObjectId) -> bool {
        (**self).is_duplicate(id)
    }

    fn visit(&mut self, id: &ObjectId) -> bool {
        (**self).visit(id)
    }

    fn remove_duplicates(&self, ids: &mut Vec<ObjectId>) {
        (**self).remove_duplicates(ids)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// Exact deduplicator backed by a `HashSet`. Memory grows with the number of
/// distinct ids visited.
#[derive(Debug, Default)]
pub struct HeapDeduplicator {
    seen: HashSet<ObjectId>,
}

impl HeapDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct ids visited.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl Deduplicator for HeapDeduplicator {
    fn is_duplicate(&self, id: &ObjectId) -> bool {
        self.seen.contains(id)
    }

    fn visit(&mut self, id: &ObjectId) -> bool {
        self.seen.insert(*id)
    }

    fn reset(&mut self) {
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(b: u8) -> ObjectId {
        ObjectId::from_bytes(&[b])
    }

    #[test]
    fn visit_reports_first_sighting() {
        let mut dedup = HeapDeduplicator::new();
        assert!(!dedup.is_duplicate(&oid(1)));
        assert!(dedup.visit(&oid(1)));
        assert!(!dedup.visit(&oid(1)));
        assert!(dedup.is_duplicate(&oid(1)));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn remove_duplicates_keeps_order() {
        let mut dedup = HeapDeduplicator::new();
        dedup.visit(&oid(2));
        let mut ids = vec![oid(3), oid(2), oid(1), oid(2)];
        dedup.remove_duplicates(&mut ids);
        assert_eq!(ids, vec![oid(3), oid(1)]);
    }

    #[test]
    fn reset_forgets() {
        let mut dedup = HeapDeduplicator::new();
        dedup.visit(&oid(1));
        dedup.reset();
        assert!(dedup.is_empty());
        assert!(dedup.visit(&oid(1)));
    }

    #[test]
    fn borrowed_deduplicator_shares_state() {
        fn mark(mut dedup: impl Deduplicator, id: ObjectId) -> bool {
            dedup.visit(&id)
        }
        let mut dedup = HeapDeduplicator::new();
        assert!(mark(&mut dedup, oid(9)));
        assert!(!mark(&mut dedup, oid(9)));
        assert!(dedup.is_duplicate(&oid(9)));
    }
}
