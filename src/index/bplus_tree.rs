use std::sync::Arc;

use tracing::debug;

use crate::buffer::{BufferPoolManager, WritePageGuard};
use crate::common::{
    ArborError, PageId, RecordId, Result, DEFAULT_INTERNAL_MAX_SIZE, DEFAULT_LEAF_MAX_SIZE,
    HEADER_PAGE_ID, INVALID_PAGE_ID,
};
use crate::storage::page::{HeaderPage, HeaderPageRef, MAX_INDEX_NAME_LEN};

use super::btree_page::{TreePage, TreePageRef};
use super::index_iterator::IndexIterator;
use super::internal_page::{InternalPage, InternalPageRef};
use super::key_comparator::{IndexKey, KeyComparator};
use super::leaf_page::{LeafPage, LeafPageRef};

/// Disk-backed B⁺-tree index with unique keys.
///
/// All persistent state flows through the buffer pool: the engine fetches a
/// page, casts it through the node codecs, mutates in place and releases the
/// guard clean or dirty. The current root page id is persisted as this
/// index's record in the header page (page 0) and rewritten on every root
/// change, so reopening the index by name restores the tree.
pub struct BPlusTree<C: KeyComparator> {
    index_name: String,
    root_page_id: PageId,
    bpm: Arc<BufferPoolManager>,
    comparator: C,
    leaf_max_size: usize,
    internal_max_size: usize,
}

impl<C: KeyComparator> BPlusTree<C> {
    pub fn new(name: &str, bpm: Arc<BufferPoolManager>, comparator: C) -> Result<Self> {
        Self::with_max_sizes(
            name,
            bpm,
            comparator,
            DEFAULT_LEAF_MAX_SIZE,
            DEFAULT_INTERNAL_MAX_SIZE,
        )
    }

    pub fn with_max_sizes(
        name: &str,
        bpm: Arc<BufferPoolManager>,
        comparator: C,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Self> {
        if name.len() > MAX_INDEX_NAME_LEN {
            return Err(ArborError::IndexNameTooLong(name.to_string()));
        }
        debug_assert!(leaf_max_size >= 2);
        debug_assert!(internal_max_size >= 3);

        let mut guard = bpm.write_page(HEADER_PAGE_ID)?;
        let existing = HeaderPageRef::new(guard.data()).get_root_id(name);
        let root_page_id = match existing {
            Some(root) => root,
            None => {
                HeaderPage::new(guard.data_mut()).insert_record(name, INVALID_PAGE_ID);
                INVALID_PAGE_ID
            }
        };
        drop(guard);

        Ok(Self {
            index_name: name.to_string(),
            root_page_id,
            bpm,
            comparator,
            leaf_max_size,
            internal_max_size,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.root_page_id == INVALID_PAGE_ID
    }

    pub fn root_page_id(&self) -> PageId {
        self.root_page_id
    }

    /// Point lookup. Returns the single record id stored under `key`, if
    /// any (keys are unique).
    pub fn get_value(&self, key: &IndexKey) -> Result<Option<RecordId>> {
        if self.is_empty() {
            return Ok(None);
        }

        let leaf_id = self.find_leaf(Some(key))?;
        let guard = self.bpm.read_page(leaf_id)?;
        let leaf = LeafPageRef::new(guard.data());
        Ok(leaf.lookup(key, &self.comparator))
    }

    /// Inserts a key/record pair. Returns false (tree unchanged) when the
    /// key is already present.
    pub fn insert(&mut self, key: &IndexKey, rid: RecordId) -> Result<bool> {
        if self.is_empty() {
            self.start_new_tree()?;
        }
        self.insert_into_leaf(key, rid)
    }

    /// Deletes the pair stored under `key`; silently succeeds when absent.
    pub fn remove(&mut self, key: &IndexKey) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        let leaf_id = self.find_leaf(Some(key))?;
        let mut guard = self.bpm.write_page(leaf_id)?;

        {
            let leaf = LeafPageRef::new(guard.data());
            if leaf.lookup(key, &self.comparator).is_none() {
                return Ok(());
            }
        }

        let (new_size, min_size, is_root) = {
            let mut leaf = LeafPage::new(guard.data_mut());
            let new_size = leaf.remove_and_delete_record(key, &self.comparator);
            (new_size, leaf.min_size(), leaf.parent_page_id().is_none())
        };

        if is_root {
            // The root is exempt from the minimum; collapse only when the
            // last pair is gone.
            if new_size == 0 {
                drop(guard);
                let old_root = self.root_page_id;
                self.root_page_id = INVALID_PAGE_ID;
                self.update_root_page_id()?;
                self.bpm.delete_page(old_root)?;
                debug!(old_root = old_root.as_u32(), "tree emptied, root collapsed");
            }
            return Ok(());
        }

        if new_size < min_size {
            self.coalesce_or_redistribute_leaf(guard)?;
        }
        Ok(())
    }

    /// Iterator positioned at the smallest key.
    pub fn begin(&self) -> Result<IndexIterator> {
        if self.is_empty() {
            return Ok(IndexIterator::end(Arc::clone(&self.bpm)));
        }
        let leaf_id = self.find_leaf(None)?;
        Ok(IndexIterator::new(Arc::clone(&self.bpm), leaf_id, 0))
    }

    /// Iterator positioned at `key`, or at the first key greater than it.
    pub fn begin_at(&self, key: &IndexKey) -> Result<IndexIterator> {
        if self.is_empty() {
            return Ok(IndexIterator::end(Arc::clone(&self.bpm)));
        }

        let leaf_id = self.find_leaf(Some(key))?;
        let guard = self.bpm.read_page(leaf_id)?;
        let leaf = LeafPageRef::new(guard.data());
        let index = leaf.key_index(key, &self.comparator);

        if index < leaf.size() {
            return Ok(IndexIterator::new(Arc::clone(&self.bpm), leaf_id, index));
        }
        // Every key in this leaf is smaller; the position rolls into the
        // next leaf.
        match leaf.next_page_id() {
            Some(next) => Ok(IndexIterator::new(Arc::clone(&self.bpm), next, 0)),
            None => Ok(IndexIterator::end(Arc::clone(&self.bpm))),
        }
    }

    /// The past-the-end sentinel.
    pub fn end(&self) -> IndexIterator {
        IndexIterator::end(Arc::clone(&self.bpm))
    }

    /// Descends from the root to the leaf covering `key`, unpinning each
    /// internal page clean along the way. `None` descends to the leftmost
    /// leaf.
    fn find_leaf(&self, key: Option<&IndexKey>) -> Result<PageId> {
        let mut current = self.root_page_id;
        loop {
            let guard = self.bpm.read_page(current)?;
            if TreePageRef::new(guard.data()).is_leaf() {
                return Ok(current);
            }

            let internal = InternalPageRef::new(guard.data());
            let next = match key {
                Some(key) => internal.lookup(key, &self.comparator),
                None => internal.value_at(0),
            };
            if next == INVALID_PAGE_ID {
                return Err(ArborError::Corrupted(format!(
                    "internal page {} has no child for descent",
                    current
                )));
            }
            current = next;
        }
    }

    /// Allocates the first leaf and makes it the root.
    fn start_new_tree(&mut self) -> Result<()> {
        let (page_id, mut guard) = self.bpm.new_page()?;
        LeafPage::new(guard.data_mut()).init(page_id, None, self.leaf_max_size);
        drop(guard);

        self.root_page_id = page_id;
        self.update_root_page_id()?;
        debug!(root = page_id.as_u32(), "started new tree");
        Ok(())
    }

    fn insert_into_leaf(&mut self, key: &IndexKey, rid: RecordId) -> Result<bool> {
        let leaf_id = self.find_leaf(Some(key))?;
        let mut guard = self.bpm.write_page(leaf_id)?;

        let (duplicate, size, max_size) = {
            let leaf = LeafPageRef::new(guard.data());
            (
                leaf.lookup(key, &self.comparator).is_some(),
                leaf.size(),
                leaf.max_size(),
            )
        };
        if duplicate {
            return Ok(false);
        }

        if size < max_size {
            LeafPage::new(guard.data_mut()).insert(key, rid, &self.comparator);
            return Ok(true);
        }

        // Leaf is at capacity: insert (transiently overflowing by one) and
        // split the upper half into a fresh sibling.
        let (new_leaf_id, mut new_guard) = self.bpm.new_page()?;
        let separator = {
            let mut leaf = LeafPage::new(guard.data_mut());
            leaf.insert(key, rid, &self.comparator);

            let mut new_leaf = LeafPage::new(new_guard.data_mut());
            new_leaf.init(new_leaf_id, None, self.leaf_max_size);
            leaf.move_half_to(&mut new_leaf);

            new_leaf.set_next_page_id(leaf.next_page_id());
            leaf.set_next_page_id(Some(new_leaf_id));
            new_leaf.key_at(0)
        };
        debug!(
            left = leaf_id.as_u32(),
            right = new_leaf_id.as_u32(),
            "leaf split"
        );

        self.insert_into_parent(guard, separator, new_guard)?;
        Ok(true)
    }

    /// Wires a freshly split `right` node into `left`'s parent, growing a
    /// new root or splitting the parent as needed. Consumes both guards;
    /// they are released dirty.
    fn insert_into_parent(
        &mut self,
        mut left: WritePageGuard,
        key: IndexKey,
        mut right: WritePageGuard,
    ) -> Result<()> {
        let left_id = left.page_id();
        let right_id = right.page_id();
        let parent_id = TreePageRef::new(left.data()).parent_page_id();

        let Some(parent_id) = parent_id else {
            // The split node was the root: grow a new one above it.
            let (root_id, mut root_guard) = self.bpm.new_page()?;
            {
                let mut root = InternalPage::new(root_guard.data_mut());
                root.init(root_id, None, self.internal_max_size);
                root.populate_new_root(left_id, &key, right_id);
            }
            TreePage::new(left.data_mut()).set_parent_page_id(Some(root_id));
            TreePage::new(right.data_mut()).set_parent_page_id(Some(root_id));
            drop(left);
            drop(right);
            drop(root_guard);

            self.root_page_id = root_id;
            self.update_root_page_id()?;
            debug!(root = root_id.as_u32(), "grew new root");
            return Ok(());
        };

        let mut parent_guard = self.bpm.write_page(parent_id)?;
        TreePage::new(right.data_mut()).set_parent_page_id(Some(parent_id));

        let parent_size = TreePageRef::new(parent_guard.data()).size();
        if parent_size < self.internal_max_size {
            InternalPage::new(parent_guard.data_mut()).insert_after(left_id, &key, right_id);
            return Ok(());
        }

        // Parent is full. Release the children before the split: the moved
        // half's children (possibly including `right`) get re-fetched for
        // reparenting.
        drop(left);
        drop(right);

        let (new_parent_id, mut new_parent_guard) = self.bpm.new_page()?;
        let push_key = {
            let mut parent = InternalPage::new(parent_guard.data_mut());
            parent.insert_after(left_id, &key, right_id);

            let mut new_parent = InternalPage::new(new_parent_guard.data_mut());
            new_parent.init(new_parent_id, None, self.internal_max_size);
            parent.move_half_to(&mut new_parent, &self.bpm)?;
            new_parent.key_at(0)
        };
        debug!(
            left = parent_id.as_u32(),
            right = new_parent_id.as_u32(),
            "internal split"
        );

        self.insert_into_parent(parent_guard, push_key, new_parent_guard)
    }

    /// Restores the minimum-size invariant for an underfull leaf by merging
    /// with or borrowing from a sibling. Consumes the node's guard.
    fn coalesce_or_redistribute_leaf(&mut self, mut node_guard: WritePageGuard) -> Result<()> {
        let node_id = node_guard.page_id();
        let parent_id = TreePageRef::new(node_guard.data())
            .parent_page_id()
            .ok_or_else(|| {
                ArborError::Corrupted(format!("non-root leaf {} has no parent", node_id))
            })?;

        let mut parent_guard = self.bpm.write_page(parent_id)?;
        let (node_index, sibling_id) = {
            let parent = InternalPageRef::new(parent_guard.data());
            let node_index = parent.value_index(node_id).ok_or_else(|| {
                ArborError::Corrupted(format!("leaf {} missing from parent {}", node_id, parent_id))
            })?;
            let sibling_index = if node_index == 0 { 1 } else { node_index - 1 };
            (node_index, parent.value_at(sibling_index))
        };

        let mut sibling_guard = self.bpm.write_page(sibling_id)?;
        let (node_size, sibling_size, max_size) = {
            let node = LeafPageRef::new(node_guard.data());
            let sibling = LeafPageRef::new(sibling_guard.data());
            (node.size(), sibling.size(), node.max_size())
        };

        if node_size + sibling_size <= max_size {
            // Coalesce: fold the right-hand node of the pair into the left.
            debug!(
                node = node_id.as_u32(),
                sibling = sibling_id.as_u32(),
                "leaf coalesce"
            );
            if node_index == 0 {
                {
                    let mut sibling = LeafPage::new(sibling_guard.data_mut());
                    let mut node = LeafPage::new(node_guard.data_mut());
                    sibling.move_all_to(&mut node);
                }
                drop(sibling_guard);
                drop(node_guard);
                self.bpm.delete_page(sibling_id)?;
                InternalPage::new(parent_guard.data_mut()).remove(1);
            } else {
                {
                    let mut node = LeafPage::new(node_guard.data_mut());
                    let mut sibling = LeafPage::new(sibling_guard.data_mut());
                    node.move_all_to(&mut sibling);
                }
                drop(node_guard);
                drop(sibling_guard);
                self.bpm.delete_page(node_id)?;
                InternalPage::new(parent_guard.data_mut()).remove(node_index);
            }
            return self.maybe_shrink_parent(parent_guard);
        }

        // Redistribute: rotate one pair across the boundary and repaint the
        // separator.
        debug!(
            node = node_id.as_u32(),
            sibling = sibling_id.as_u32(),
            "leaf redistribute"
        );
        if node_index == 0 {
            let mut sibling = LeafPage::new(sibling_guard.data_mut());
            let mut node = LeafPage::new(node_guard.data_mut());
            sibling.move_first_to_end_of(&mut node);
            let separator = sibling.key_at(0);
            InternalPage::new(parent_guard.data_mut()).set_key_at(1, &separator);
        } else {
            let mut sibling = LeafPage::new(sibling_guard.data_mut());
            let mut node = LeafPage::new(node_guard.data_mut());
            sibling.move_last_to_front_of(&mut node);
            let separator = node.key_at(0);
            InternalPage::new(parent_guard.data_mut()).set_key_at(node_index, &separator);
        }
        Ok(())
    }

    /// Same as [`Self::coalesce_or_redistribute_leaf`] for internal nodes:
    /// merges and rotations carry the parent separator as the middle key and
    /// reparent the children they move.
    fn coalesce_or_redistribute_internal(&mut self, mut node_guard: WritePageGuard) -> Result<()> {
        let node_id = node_guard.page_id();
        let parent_id = TreePageRef::new(node_guard.data())
            .parent_page_id()
            .ok_or_else(|| {
                ArborError::Corrupted(format!("non-root internal {} has no parent", node_id))
            })?;

        let mut parent_guard = self.bpm.write_page(parent_id)?;
        let (node_index, sibling_id) = {
            let parent = InternalPageRef::new(parent_guard.data());
            let node_index = parent.value_index(node_id).ok_or_else(|| {
                ArborError::Corrupted(format!("node {} missing from parent {}", node_id, parent_id))
            })?;
            let sibling_index = if node_index == 0 { 1 } else { node_index - 1 };
            (node_index, parent.value_at(sibling_index))
        };

        let mut sibling_guard = self.bpm.write_page(sibling_id)?;
        let (node_size, sibling_size, max_size) = {
            let node = InternalPageRef::new(node_guard.data());
            let sibling = InternalPageRef::new(sibling_guard.data());
            (node.size(), sibling.size(), node.max_size())
        };

        if node_size + sibling_size <= max_size {
            debug!(
                node = node_id.as_u32(),
                sibling = sibling_id.as_u32(),
                "internal coalesce"
            );
            if node_index == 0 {
                let middle_key = InternalPageRef::new(parent_guard.data()).key_at(1);
                {
                    let mut sibling = InternalPage::new(sibling_guard.data_mut());
                    let mut node = InternalPage::new(node_guard.data_mut());
                    sibling.move_all_to(&mut node, &middle_key, &self.bpm)?;
                }
                drop(sibling_guard);
                drop(node_guard);
                self.bpm.delete_page(sibling_id)?;
                InternalPage::new(parent_guard.data_mut()).remove(1);
            } else {
                let middle_key = InternalPageRef::new(parent_guard.data()).key_at(node_index);
                {
                    let mut node = InternalPage::new(node_guard.data_mut());
                    let mut sibling = InternalPage::new(sibling_guard.data_mut());
                    node.move_all_to(&mut sibling, &middle_key, &self.bpm)?;
                }
                drop(node_guard);
                drop(sibling_guard);
                self.bpm.delete_page(node_id)?;
                InternalPage::new(parent_guard.data_mut()).remove(node_index);
            }
            return self.maybe_shrink_parent(parent_guard);
        }

        debug!(
            node = node_id.as_u32(),
            sibling = sibling_id.as_u32(),
            "internal redistribute"
        );
        if node_index == 0 {
            let middle_key = InternalPageRef::new(parent_guard.data()).key_at(1);
            let separator = {
                let mut sibling = InternalPage::new(sibling_guard.data_mut());
                let mut node = InternalPage::new(node_guard.data_mut());
                sibling.move_first_to_end_of(&mut node, &middle_key, &self.bpm)?;
                sibling.key_at(0)
            };
            InternalPage::new(parent_guard.data_mut()).set_key_at(1, &separator);
        } else {
            let middle_key = InternalPageRef::new(parent_guard.data()).key_at(node_index);
            let separator = {
                let mut sibling = InternalPage::new(sibling_guard.data_mut());
                let mut node = InternalPage::new(node_guard.data_mut());
                sibling.move_last_to_front_of(&mut node, &middle_key, &self.bpm)?;
                node.key_at(0)
            };
            InternalPage::new(parent_guard.data_mut()).set_key_at(node_index, &separator);
        }
        Ok(())
    }

    /// After a coalesce removed a slot from `parent`, restore its invariant:
    /// an underfull non-root parent rebalances recursively (the guard passed
    /// down is the pin the recursion operates on); an internal root left
    /// with a single child is collapsed away.
    fn maybe_shrink_parent(&mut self, parent_guard: WritePageGuard) -> Result<()> {
        let (size, min_size, is_root) = {
            let parent = TreePageRef::new(parent_guard.data());
            (parent.size(), parent.min_size(), parent.is_root())
        };

        if is_root {
            if size == 1 {
                return self.adjust_root(parent_guard);
            }
            return Ok(());
        }
        if size < min_size {
            return self.coalesce_or_redistribute_internal(parent_guard);
        }
        Ok(())
    }

    /// Promotes the sole remaining child of an internal root and deletes
    /// the old root page.
    fn adjust_root(&mut self, old_root_guard: WritePageGuard) -> Result<()> {
        let old_root_id = old_root_guard.page_id();
        let child_id = InternalPageRef::new(old_root_guard.data()).value_at(0);
        drop(old_root_guard);

        self.root_page_id = child_id;
        self.update_root_page_id()?;

        {
            let mut child_guard = self.bpm.write_page(child_id)?;
            TreePage::new(child_guard.data_mut()).set_parent_page_id(None);
        }
        self.bpm.delete_page(old_root_id)?;
        debug!(
            old_root = old_root_id.as_u32(),
            new_root = child_id.as_u32(),
            "root collapsed onto child"
        );
        Ok(())
    }

    /// Rewrites this index's root record in the header page. Called on
    /// every root change.
    fn update_root_page_id(&self) -> Result<()> {
        let mut guard = self.bpm.write_page(HEADER_PAGE_ID)?;
        HeaderPage::new(guard.data_mut()).update_record(&self.index_name, self.root_page_id);
        Ok(())
    }
}
