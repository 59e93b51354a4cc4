//! Arbor - a disk-backed B⁺-tree index over a buffer-pool page cache
//!
//! The crate provides the storage core of a relational engine: fixed-size
//! frames of main memory cache fixed-size pages of a backing file, and a
//! persistent ordered index with unique keys is built on top of that
//! abstraction.
//!
//! # Architecture
//!
//! - **Storage layer** (`storage`): disk I/O and bookkeeping pages
//!   - `DiskManager`: allocates page ids and reads/writes page images
//!   - `DiskScheduler`: background worker serializing disk requests
//!   - `HeaderPage`: page 0, mapping index names to root page ids
//!
//! - **Buffer pool** (`buffer`): memory management for database pages
//!   - `BufferPoolManager`: page table, free list and eviction
//!   - `LruReplacer`: least-recently-unpinned victim selection
//!   - `Frame`: per-frame metadata and the page image
//!   - `ReadPageGuard`/`WritePageGuard`: RAII pins with dirty tracking
//!
//! - **Index** (`index`): the B⁺-tree
//!   - `BPlusTree`: lookup, insert with split propagation, delete with
//!     coalesce/redistribute, root tracking through the header page
//!   - `InternalPage`/`LeafPage`: typed in-place codecs over page images
//!   - `IndexIterator`: ordered range scan over the leaf chain
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use arbor::buffer::BufferPoolManager;
//! use arbor::index::{BPlusTree, IndexKey, IntegerComparator};
//! use arbor::storage::disk::DiskManager;
//! use arbor::{PageId, RecordId};
//!
//! let disk_manager = Arc::new(DiskManager::new("index.db").unwrap());
//! let bpm = Arc::new(BufferPoolManager::new(64, disk_manager));
//!
//! let mut tree = BPlusTree::new("orders_pk", bpm, IntegerComparator).unwrap();
//! let key = IndexKey::from_integer(42);
//! tree.insert(&key, RecordId::new(PageId::new(7), 3)).unwrap();
//! assert!(tree.get_value(&key).unwrap().is_some());
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{ArborError, FrameId, PageId, RecordId, Result};
pub use index::{BPlusTree, IndexIterator, IndexKey};
