pub mod bplus_tree;
pub mod btree_page;
pub mod index_iterator;
pub mod internal_page;
pub mod key_comparator;
pub mod leaf_page;

pub use bplus_tree::BPlusTree;
pub use btree_page::{NodePageType, TreePage, TreePageRef};
pub use index_iterator::IndexIterator;
pub use internal_page::{InternalPage, InternalPageRef};
pub use key_comparator::{BytewiseComparator, IndexKey, IntegerComparator, KeyComparator};
pub use leaf_page::{LeafPage, LeafPageRef};
