use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::{ArborError, PageId, RecordId, Result, INVALID_PAGE_ID};

use super::key_comparator::IndexKey;
use super::leaf_page::LeafPageRef;

/// Forward iterator over the leaf chain, yielding `(key, record_id)` pairs
/// in key order.
///
/// The iterator holds no pin between accesses: every dereference and every
/// advance briefly pins the current leaf and releases it clean, so iteration
/// survives arbitrary buffer churn. Structural modification of the tree
/// between accesses is not supported.
pub struct IndexIterator {
    bpm: Arc<BufferPoolManager>,
    page_id: PageId,
    index: usize,
    is_end: bool,
}

impl IndexIterator {
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, page_id: PageId, index: usize) -> Self {
        Self {
            bpm,
            page_id,
            index,
            is_end: false,
        }
    }

    pub(crate) fn end(bpm: Arc<BufferPoolManager>) -> Self {
        Self {
            bpm,
            page_id: INVALID_PAGE_ID,
            index: 0,
            is_end: true,
        }
    }

    pub fn is_end(&self) -> bool {
        self.is_end
    }

    /// The pair at the current position. Dereferencing the end sentinel is
    /// a caller error.
    pub fn entry(&self) -> Result<(IndexKey, RecordId)> {
        if self.is_end {
            return Err(ArborError::IteratorAtEnd);
        }

        let guard = self.bpm.read_page(self.page_id)?;
        let leaf = LeafPageRef::new(guard.data());
        Ok(leaf.get_item(self.index))
    }

    /// Steps to the next pair, following the sibling link at the end of
    /// each leaf. Advancing the end sentinel is a no-op.
    pub fn advance(&mut self) -> Result<()> {
        if self.is_end {
            return Ok(());
        }

        let (size, next) = {
            let guard = self.bpm.read_page(self.page_id)?;
            let leaf = LeafPageRef::new(guard.data());
            (leaf.size(), leaf.next_page_id())
        };

        self.index += 1;
        if self.index >= size {
            self.index = 0;
            match next {
                Some(next_page) => self.page_id = next_page,
                None => {
                    self.page_id = INVALID_PAGE_ID;
                    self.is_end = true;
                }
            }
        }
        Ok(())
    }
}

impl PartialEq for IndexIterator {
    fn eq(&self, other: &Self) -> bool {
        self.page_id == other.page_id && self.index == other.index && self.is_end == other.is_end
    }
}

impl Eq for IndexIterator {}

impl Iterator for IndexIterator {
    type Item = Result<(IndexKey, RecordId)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_end {
            return None;
        }
        let item = match self.entry() {
            Ok(item) => item,
            Err(e) => return Some(Err(e)),
        };
        if let Err(e) = self.advance() {
            return Some(Err(e));
        }
        Some(Ok(item))
    }
}
