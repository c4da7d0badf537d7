//! Path lookups through trees of every shape, built the way callers build
//! them.

use std::sync::Arc;

use canopy_index::NodeIndexConfig;
use canopy_store::{InMemoryObjectStore, Node, ObjectStore, RevTree};
use canopy_tree::{CanonicalTreeBuilder, DepthSearch, LargeTreeBuilder};
use canopy_types::ObjectId;
use proptest::prelude::*;

fn store() -> Arc<dyn ObjectStore> {
    Arc::new(InMemoryObjectStore::new())
}

fn id_of(name: &str) -> ObjectId {
    ObjectId::from_bytes(name.as_bytes())
}

/// Builds and persists a tree holding `nodes`.
fn persist(store: &Arc<dyn ObjectStore>, nodes: Vec<Node>) -> RevTree {
    let mut builder = CanonicalTreeBuilder::new(Arc::clone(store), RevTree::empty());
    for node in nodes {
        builder.put(node).unwrap();
    }
    let tree = builder.build().unwrap();
    store.put_tree(&tree).unwrap();
    tree
}

/// root: { a: { b: { c, d, <siblings> } }, x }
fn layout(store: &Arc<dyn ObjectStore>, siblings: usize) -> RevTree {
    let mut b_nodes = vec![
        Node::feature("c", id_of("c"), None),
        Node::feature("d", id_of("d"), None),
    ];
    b_nodes.extend((0..siblings).map(|i| {
        let name = format!("s{i}");
        Node::feature(name.as_str(), id_of(&name), None)
    }));
    let b = persist(store, b_nodes);
    let a = persist(store, vec![Node::tree("b", *b.id(), None)]);
    persist(
        store,
        vec![
            Node::tree("a", *a.id(), Some(id_of("schema"))),
            Node::feature("x", id_of("x"), None),
        ],
    )
}

fn check_layout(store: Arc<dyn ObjectStore>, root: &RevTree) {
    let search = DepthSearch::new(store);
    for path in ["a/b/c", "a/b/d"] {
        let found = search.find(root, path).unwrap().unwrap();
        assert_eq!(found.path(), path);
        assert_eq!(found.parent_path(), "a/b");
        assert_eq!(found.metadata_id(), Some(&id_of("schema")));
    }
    let x = search.find(root, "x").unwrap().unwrap();
    assert_eq!(x.object_id(), &id_of("x"));
    assert!(search.find(root, "a/b/e").unwrap().is_none());
    assert!(search.find(root, "a/c").unwrap().is_none());
    assert!(search.find(root, "x/c").unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

#[test]
fn lookups_in_leaf_trees() {
    let store = store();
    let root = layout(&store, 0);
    check_layout(store, &root);
}

#[test]
fn lookups_in_bucketed_directory() {
    let store = store();
    let root = layout(&store, 600);
    let search = DepthSearch::new(Arc::clone(&store));
    let b = search.find(&root, "a/b").unwrap().unwrap();
    assert!(store.get_tree(b.object_id()).unwrap().is_bucketed());
    check_layout(Arc::clone(&store), &root);
    let s = search.find(&root, "a/b/s599").unwrap().unwrap();
    assert_eq!(s.object_id(), &id_of("s599"));
}

#[test]
fn every_entry_found_two_bucket_levels_down() {
    let store = store();
    let names: Vec<String> = (0..20_000).map(|i| format!("feature.{i}")).collect();
    let root = persist(
        &store,
        names.iter().map(|n| Node::feature(n.as_str(), id_of(n), None)).collect(),
    );
    assert_eq!(root.size(), 20_000);

    // some depth-1 bucket must itself be bucketed
    let deep = root
        .buckets()
        .unwrap()
        .values()
        .map(|b| store.get_tree(b.object_id()).unwrap())
        .any(|t| t.is_bucketed());
    assert!(deep);

    let search = DepthSearch::new(store);
    for name in &names {
        let found = search.find(&root, name).unwrap().unwrap();
        assert_eq!(found.object_id(), &id_of(name));
    }
    assert!(search.find(&root, "feature.20000").unwrap().is_none());
}

#[test]
fn bulk_built_tree_is_searchable() {
    let store = store();
    let scratch = tempfile::tempdir().unwrap();
    let config = NodeIndexConfig {
        partition_capacity: 256,
        ..NodeIndexConfig::default()
    };
    let large = LargeTreeBuilder::new(Arc::clone(&store), RevTree::empty(), scratch.path(), config)
        .unwrap();
    for i in 0..3000 {
        let name = format!("p{i}");
        large.put(Node::feature(name.as_str(), id_of(&name), None)).unwrap();
    }
    let root = large.build().unwrap();

    let search = DepthSearch::new(Arc::clone(&store));
    assert!(search.find_by_id(root.id(), "p2999").unwrap().is_some());
    assert!(search.find_by_id(root.id(), "p3000").unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Canonical form
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn id_depends_only_on_final_contents(
        count in 0usize..1200,
        removed in proptest::collection::btree_set(0usize..1200, 0..200),
        seed in any::<u64>(),
    ) {
        let store = store();
        let names: Vec<String> = (0..count).map(|i| format!("n{i}")).collect();

        // insert everything in a shuffled order, then remove some
        let mut order: Vec<usize> = (0..count).collect();
        let mut state = seed | 1;
        for i in (1..order.len()).rev() {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            order.swap(i, (state % (i as u64 + 1)) as usize);
        }
        let mut churned = CanonicalTreeBuilder::new(Arc::clone(&store), RevTree::empty());
        for &i in &order {
            churned.put(Node::feature(names[i].as_str(), id_of(&names[i]), None)).unwrap();
        }
        let churned = churned.build().unwrap();
        let mut churned_again = CanonicalTreeBuilder::new(Arc::clone(&store), churned);
        for &i in &removed {
            churned_again.remove(&format!("n{i}")).unwrap();
        }
        let churned = churned_again.build().unwrap();

        // build the survivors directly
        let survivors: Vec<Node> = (0..count)
            .filter(|i| !removed.contains(i))
            .map(|i| Node::feature(names[i].as_str(), id_of(&names[i]), None))
            .collect();
        let expected_size = survivors.len() as u64;
        let direct = persist(&store, survivors);

        prop_assert_eq!(churned.id(), direct.id());
        prop_assert_eq!(churned.size(), expected_size);
    }
}
