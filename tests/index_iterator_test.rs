//! Range iterator tests: ordering, liveness, and end-sentinel semantics.

mod common;

use std::sync::Arc;

use arbor::index::{BPlusTree, IntegerComparator};

use common::{create_bpm, key, rid};

fn build_tree(
    bpm: &Arc<arbor::buffer::BufferPoolManager>,
    keys: impl IntoIterator<Item = i64>,
) -> BPlusTree<IntegerComparator> {
    let mut tree =
        BPlusTree::with_max_sizes("iter_pk", Arc::clone(bpm), IntegerComparator, 3, 3).unwrap();
    for k in keys {
        tree.insert(&key(k), rid(k)).unwrap();
    }
    tree
}

#[test]
fn test_empty_tree_begin_is_end() {
    let (bpm, _temp) = create_bpm(16);
    let tree = build_tree(&bpm, []);

    assert!(tree.begin().unwrap().is_end());
    assert!(tree.begin_at(&key(5)).unwrap().is_end());
    assert!(tree.begin().unwrap() == tree.end());
}

#[test]
fn test_full_scan_in_order() {
    let (bpm, _temp) = create_bpm(32);
    let tree = build_tree(&bpm, (1..=40).rev());

    let mut expect = 1i64;
    let mut iter = tree.begin().unwrap();
    while !iter.is_end() {
        let (k, r) = iter.entry().unwrap();
        assert_eq!(k.to_integer(), expect);
        assert_eq!(r, rid(expect));
        expect += 1;
        iter.advance().unwrap();
    }
    assert_eq!(expect, 41);
    assert!(iter == tree.end());
}

#[test]
fn test_begin_at_existing_key() {
    let (bpm, _temp) = create_bpm(32);
    let tree = build_tree(&bpm, 1..=20);

    let mut iter = tree.begin_at(&key(13)).unwrap();
    let (k, _) = iter.entry().unwrap();
    assert_eq!(k.to_integer(), 13);

    let mut count = 0;
    while !iter.is_end() {
        iter.advance().unwrap();
        count += 1;
    }
    assert_eq!(count, 8); // 13..=20
}

#[test]
fn test_begin_at_missing_key_finds_successor() {
    let (bpm, _temp) = create_bpm(32);
    let tree = build_tree(&bpm, (2..=40).step_by(2).map(|k| k as i64));

    let iter = tree.begin_at(&key(15)).unwrap();
    assert_eq!(iter.entry().unwrap().0.to_integer(), 16);

    // Past the largest key: immediately at end.
    assert!(tree.begin_at(&key(41)).unwrap().is_end());
}

/// Iterator liveness: starting at `k`, advancing once per element >= k
/// reaches exactly the end sentinel.
#[test]
fn test_liveness_exact_step_count() {
    let (bpm, _temp) = create_bpm(32);
    let tree = build_tree(&bpm, 1..=37);

    for start in [1i64, 9, 20, 37] {
        let remaining = 37 - start + 1;
        let mut iter = tree.begin_at(&key(start)).unwrap();
        for _ in 0..remaining {
            assert!(!iter.is_end());
            iter.advance().unwrap();
        }
        assert!(iter.is_end());
        assert!(iter == tree.end());
    }
}

#[test]
fn test_end_entry_fails_loudly() {
    let (bpm, _temp) = create_bpm(16);
    let tree = build_tree(&bpm, 1..=3);

    let iter = tree.end();
    assert!(iter.entry().is_err());

    // Advancing the end sentinel stays at end.
    let mut iter = tree.end();
    iter.advance().unwrap();
    assert!(iter.is_end());
}

#[test]
fn test_iterator_equality_is_positional() {
    let (bpm, _temp) = create_bpm(32);
    let tree = build_tree(&bpm, 1..=10);

    let a = tree.begin().unwrap();
    let b = tree.begin().unwrap();
    assert!(a == b);

    let mut c = tree.begin().unwrap();
    c.advance().unwrap();
    assert!(a != c);
    assert!(tree.end() == tree.end());
}

#[test]
fn test_std_iterator_adapter() {
    let (bpm, _temp) = create_bpm(32);
    let tree = build_tree(&bpm, 1..=25);

    let collected: Vec<i64> = tree
        .begin_at(&key(10))
        .unwrap()
        .map(|item| item.unwrap().0.to_integer())
        .collect();
    assert_eq!(collected, (10..=25).collect::<Vec<i64>>());
}

/// The iterator holds no pin between accesses, so heavy churn through a
/// tiny pool during iteration is fine.
#[test]
fn test_iteration_survives_buffer_churn() {
    let (bpm, _temp) = create_bpm(4);
    let tree = build_tree(&bpm, 1..=120);

    let mut expect = 1i64;
    let mut iter = tree.begin().unwrap();
    while !iter.is_end() {
        assert_eq!(iter.entry().unwrap().0.to_integer(), expect);
        // Interleave unrelated lookups to churn the pool.
        tree.get_value(&key((expect % 120) + 1)).unwrap();
        iter.advance().unwrap();
        expect += 1;
    }
    assert_eq!(expect, 121);
    assert_eq!(bpm.pinned_frame_count(), 0);
}
