use std::sync::Arc;

use arbor::buffer::BufferPoolManager;
use arbor::index::{BPlusTree, IndexKey, IntegerComparator};
use arbor::storage::disk::DiskManager;
use arbor::{PageId, RecordId};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("Arbor - a disk-backed B+tree index in Rust");
    println!("==========================================\n");

    let db_path = "demo.db";

    let disk_manager = Arc::new(DiskManager::new(db_path).expect("Failed to create disk manager"));
    println!("Created disk manager for: {}", db_path);

    let bpm = Arc::new(BufferPoolManager::new(64, disk_manager));
    println!("Created buffer pool with 64 frames\n");

    let mut tree =
        BPlusTree::new("demo_pk", Arc::clone(&bpm), IntegerComparator).expect("Failed to open index");

    // Insert a batch of keys out of order
    let keys = [42i64, 7, 19, 3, 88, 56, 21, 64, 11, 35];
    for &k in &keys {
        let rid = RecordId::new(PageId::new((k >> 32) as u32), k as u32);
        tree.insert(&IndexKey::from_integer(k), rid)
            .expect("insert failed");
        println!("Inserted key {}", k);
    }

    // Point lookup
    let probe = IndexKey::from_integer(19);
    match tree.get_value(&probe).expect("lookup failed") {
        Some(rid) => println!("\nLookup 19 -> {}", rid),
        None => println!("\nLookup 19 -> not found"),
    }

    // Ordered scan from the smallest key
    println!("\nFull scan in key order:");
    let mut iter = tree.begin().expect("begin failed");
    while !iter.is_end() {
        let (key, rid) = iter.entry().expect("entry failed");
        println!("  {} -> {}", key.to_integer(), rid);
        iter.advance().expect("advance failed");
    }

    // Remove a few keys and scan the remainder from 20 upward
    for k in [3i64, 42, 88] {
        tree.remove(&IndexKey::from_integer(k)).expect("remove failed");
        println!("\nRemoved key {}", k);
    }

    println!("\nScan from 20:");
    let start = IndexKey::from_integer(20);
    let mut iter = tree.begin_at(&start).expect("begin_at failed");
    while !iter.is_end() {
        let (key, rid) = iter.entry().expect("entry failed");
        println!("  {} -> {}", key.to_integer(), rid);
        iter.advance().expect("advance failed");
    }

    bpm.flush_all_pages().expect("flush failed");
    println!("\nFlushed all pages to disk");

    std::fs::remove_file(db_path).ok();
    println!("Demo completed successfully!");
}
