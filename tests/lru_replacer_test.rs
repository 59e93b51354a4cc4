//! Integration tests for the LRU replacer, including a reference-simulator
//! check of the buffer pool's residency behavior.

mod common;

use arbor::buffer::LruReplacer;
use arbor::{FrameId, PageId};

use common::create_bpm;

#[test]
fn test_victim_empty() {
    let replacer = LruReplacer::new(8);
    assert_eq!(replacer.victim(), None);
    assert_eq!(replacer.size(), 0);
}

#[test]
fn test_victim_is_least_recently_unpinned() {
    let replacer = LruReplacer::new(8);

    for i in [3u32, 0, 5, 1] {
        replacer.unpin(FrameId::new(i));
    }
    assert_eq!(replacer.size(), 4);

    assert_eq!(replacer.victim(), Some(FrameId::new(3)));
    assert_eq!(replacer.victim(), Some(FrameId::new(0)));
    assert_eq!(replacer.victim(), Some(FrameId::new(5)));
    assert_eq!(replacer.victim(), Some(FrameId::new(1)));
    assert_eq!(replacer.victim(), None);
}

#[test]
fn test_pin_removes_from_queue() {
    let replacer = LruReplacer::new(8);

    replacer.unpin(FrameId::new(0));
    replacer.unpin(FrameId::new(1));
    replacer.unpin(FrameId::new(2));

    replacer.pin(FrameId::new(1));
    replacer.pin(FrameId::new(1)); // second pin is a no-op
    assert_eq!(replacer.size(), 2);

    assert_eq!(replacer.victim(), Some(FrameId::new(0)));
    assert_eq!(replacer.victim(), Some(FrameId::new(2)));
}

#[test]
fn test_unpin_twice_keeps_position() {
    let replacer = LruReplacer::new(8);

    replacer.unpin(FrameId::new(0));
    replacer.unpin(FrameId::new(1));
    // Frame 0 is already queued; this must not move it to the front.
    replacer.unpin(FrameId::new(0));

    assert_eq!(replacer.victim(), Some(FrameId::new(0)));
    assert_eq!(replacer.victim(), Some(FrameId::new(1)));
}

#[test]
fn test_interleaved_operations() {
    let replacer = LruReplacer::new(16);

    replacer.unpin(FrameId::new(0));
    replacer.unpin(FrameId::new(1));
    replacer.unpin(FrameId::new(2));
    assert_eq!(replacer.victim(), Some(FrameId::new(0)));

    replacer.unpin(FrameId::new(3));
    replacer.pin(FrameId::new(2));
    replacer.unpin(FrameId::new(2));

    // Order of unpin recency now: 2 (front), 3, 1 (back).
    assert_eq!(replacer.victim(), Some(FrameId::new(1)));
    assert_eq!(replacer.victim(), Some(FrameId::new(3)));
    assert_eq!(replacer.victim(), Some(FrameId::new(2)));
    assert_eq!(replacer.size(), 0);
}

/// Reference LRU simulator: for a pool of size P and a page reference
/// string, the set of resident pages after each access must match a plain
/// LRU cache simulation.
#[test]
fn test_buffer_pool_matches_lru_simulation() {
    const POOL_SIZE: usize = 4;
    let (bpm, _temp) = create_bpm(POOL_SIZE);

    // Materialize 8 pages up front.
    let mut pages = Vec::new();
    for _ in 0..8 {
        let (pid, guard) = bpm.new_page().unwrap();
        drop(guard);
        pages.push(pid);
    }

    // Reference string over the 8 pages, with re-references mixed in.
    let reference: Vec<usize> = vec![0, 1, 2, 3, 0, 4, 5, 0, 6, 1, 7, 2, 0, 3, 3, 5];

    // Most recently used at the front. Creating 8 pages through a 4-frame
    // pool leaves the last four resident, newest first.
    let mut simulated: Vec<PageId> = pages.iter().skip(4).rev().copied().collect();

    for &i in &reference {
        let page_id = pages[i];
        {
            let guard = bpm.read_page(page_id).unwrap();
            assert_eq!(guard.page_id(), page_id);
        }

        if let Some(pos) = simulated.iter().position(|&p| p == page_id) {
            simulated.remove(pos);
        } else if simulated.len() == POOL_SIZE {
            simulated.pop();
        }
        simulated.insert(0, page_id);

        for &p in &pages {
            let resident = bpm.get_pin_count(p).is_some();
            let expected = simulated.contains(&p);
            assert_eq!(
                resident, expected,
                "page {} residency mismatch after accessing {}",
                p, page_id
            );
        }
    }
}
