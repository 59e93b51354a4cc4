#![allow(dead_code)]

use std::sync::Arc;

use tempfile::NamedTempFile;

use arbor::buffer::BufferPoolManager;
use arbor::index::{
    BPlusTree, IndexKey, IntegerComparator, InternalPageRef, LeafPageRef, TreePageRef,
};
use arbor::storage::disk::DiskManager;
use arbor::{PageId, RecordId};

pub fn create_bpm(pool_size: usize) -> (Arc<BufferPoolManager>, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let disk_manager = Arc::new(DiskManager::new(temp_file.path()).unwrap());
    let bpm = Arc::new(BufferPoolManager::new(pool_size, disk_manager));
    (bpm, temp_file)
}

pub fn key(v: i64) -> IndexKey {
    IndexKey::from_integer(v)
}

/// Record id convention used throughout the suites: the page id carries the
/// key's high 32 bits and the slot number its low 32 bits.
pub fn rid(v: i64) -> RecordId {
    RecordId::new(PageId::new((v >> 32) as u32), v as u32)
}

/// Walks the whole tree verifying the structural invariants: balance
/// bounds, per-node key ordering, parent-child consistency, and the leaf
/// sibling chain. Panics on the first violation.
pub fn check_integrity(tree: &BPlusTree<IntegerComparator>, bpm: &BufferPoolManager) {
    if tree.is_empty() {
        return;
    }

    let mut leaves = Vec::new();
    walk(bpm, tree.root_page_id(), None, &mut leaves);

    // The sibling chain from the leftmost leaf visits every leaf exactly
    // once, in order, and terminates at the invalid page id.
    let mut chain = Vec::new();
    let mut current = Some(leaves[0]);
    let mut last_key: Option<i64> = None;
    while let Some(page_id) = current {
        chain.push(page_id);
        let guard = bpm.read_page(page_id).unwrap();
        let leaf = LeafPageRef::new(guard.data());
        for i in 0..leaf.size() {
            let k = leaf.key_at(i).to_integer();
            if let Some(prev) = last_key {
                assert!(prev < k, "keys not strictly ascending: {} then {}", prev, k);
            }
            last_key = Some(k);
        }
        current = leaf.next_page_id();
    }
    assert_eq!(chain, leaves, "sibling chain disagrees with tree order");

    assert_eq!(
        bpm.pinned_frame_count(),
        0,
        "integrity walk must leave no pins behind"
    );
}

fn walk(bpm: &BufferPoolManager, page_id: PageId, parent: Option<PageId>, leaves: &mut Vec<PageId>) {
    let (children, is_leaf) = {
        let guard = bpm.read_page(page_id).unwrap();
        let page = TreePageRef::new(guard.data());

        assert_eq!(
            page.parent_page_id(),
            parent,
            "page {} has wrong parent",
            page_id
        );
        assert_eq!(page.page_id(), page_id, "page {} misstates its own id", page_id);

        let is_root = parent.is_none();
        if is_root {
            if page.is_leaf() {
                assert!(page.size() >= 1, "non-empty tree with empty root leaf");
            } else {
                assert!(page.size() >= 2, "internal root kept a single child");
            }
        } else {
            assert!(
                page.min_size() <= page.size() && page.size() <= page.max_size(),
                "page {} out of balance: size {} not in [{}, {}]",
                page_id,
                page.size(),
                page.min_size(),
                page.max_size()
            );
        }

        if page.is_leaf() {
            let leaf = LeafPageRef::new(guard.data());
            for i in 1..leaf.size() {
                assert!(
                    leaf.key_at(i - 1).to_integer() < leaf.key_at(i).to_integer(),
                    "leaf {} keys out of order",
                    page_id
                );
            }
            (Vec::new(), true)
        } else {
            let internal = InternalPageRef::new(guard.data());
            for i in 2..internal.size() {
                assert!(
                    internal.key_at(i - 1).to_integer() < internal.key_at(i).to_integer(),
                    "internal {} separators out of order",
                    page_id
                );
            }
            let children = (0..internal.size()).map(|i| internal.value_at(i)).collect();
            (children, false)
        }
    };

    if is_leaf {
        leaves.push(page_id);
        return;
    }
    for child in children {
        walk(bpm, child, Some(page_id), leaves);
    }
}
