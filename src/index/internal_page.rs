use crate::buffer::BufferPoolManager;
use crate::common::{PageId, Result, INVALID_PAGE_ID, KEY_SIZE, PAGE_SIZE};

use super::btree_page::{
    init_header, min_size_for, read_optional_page_id, read_u16, read_u32, write_optional_page_id,
    write_u16, write_u32, NodePageType, TreePage, MAX_SIZE_OFFSET, PAGE_ID_OFFSET,
    PARENT_PAGE_ID_OFFSET, SIZE_OFFSET, TREE_PAGE_HEADER_SIZE,
};
use super::key_comparator::{IndexKey, KeyComparator};

const SLOT_SIZE: usize = KEY_SIZE + 4; // key + child page id

fn slot_offset(index: usize) -> usize {
    TREE_PAGE_HEADER_SIZE + index * SLOT_SIZE
}

/// Mutable view over an internal node page.
///
/// An internal node is an ordered array of `(key, child_page_id)` slots where
/// `size` counts slots (= children). Slot 0's key is a dummy at rest: the
/// subtree at `child(0)` holds keys below `key(1)`, and for `i >= 1` the
/// subtree at `child(i)` holds keys in `[key(i), key(i+1))`. During merges
/// and rotations the dummy slot is overwritten with the separator inherited
/// from the parent (the `middle_key`), so the moved slot carries real
/// information.
pub struct InternalPage<'a> {
    data: &'a mut [u8],
}

impl<'a> InternalPage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn init(&mut self, page_id: PageId, parent: Option<PageId>, max_size: usize) {
        init_header(self.data, page_id, NodePageType::Internal, parent, max_size);
    }

    pub fn page_id(&self) -> PageId {
        PageId::new(read_u32(self.data, PAGE_ID_OFFSET))
    }

    pub fn size(&self) -> usize {
        read_u16(self.data, SIZE_OFFSET) as usize
    }

    fn set_size(&mut self, size: usize) {
        write_u16(self.data, SIZE_OFFSET, size as u16);
    }

    pub fn max_size(&self) -> usize {
        read_u16(self.data, MAX_SIZE_OFFSET) as usize
    }

    pub fn min_size(&self) -> usize {
        min_size_for(self.max_size())
    }

    pub fn parent_page_id(&self) -> Option<PageId> {
        read_optional_page_id(self.data, PARENT_PAGE_ID_OFFSET)
    }

    pub fn set_parent_page_id(&mut self, parent: Option<PageId>) {
        write_optional_page_id(self.data, PARENT_PAGE_ID_OFFSET, parent);
    }

    pub fn key_at(&self, index: usize) -> IndexKey {
        let offset = slot_offset(index);
        IndexKey::new(self.data[offset..offset + KEY_SIZE].try_into().unwrap())
    }

    pub fn set_key_at(&mut self, index: usize, key: &IndexKey) {
        let offset = slot_offset(index);
        self.data[offset..offset + KEY_SIZE].copy_from_slice(key.as_bytes());
    }

    pub fn value_at(&self, index: usize) -> PageId {
        PageId::new(read_u32(self.data, slot_offset(index) + KEY_SIZE))
    }

    fn set_value_at(&mut self, index: usize, value: PageId) {
        write_u32(self.data, slot_offset(index) + KEY_SIZE, value.as_u32());
    }

    /// Index of the slot whose child pointer equals `value`.
    pub fn value_index(&self, value: PageId) -> Option<usize> {
        (0..self.size()).find(|&i| self.value_at(i) == value)
    }

    /// Returns the child covering `key`. For a well-formed node this is
    /// `value_at(i)` for the greatest `i >= 1` with `key_at(i) <= key`, or
    /// `value_at(0)` when no such slot exists. An empty node is malformed
    /// and yields INVALID_PAGE_ID.
    pub fn lookup<C: KeyComparator>(&self, key: &IndexKey, comparator: &C) -> PageId {
        lookup_in(self.data, self.size(), key, comparator)
    }

    /// Turns an empty node into a root with two children separated by `key`.
    pub fn populate_new_root(&mut self, left_child: PageId, key: &IndexKey, right_child: PageId) {
        self.set_value_at(0, left_child);
        self.set_key_at(1, key);
        self.set_value_at(1, right_child);
        self.set_size(2);
    }

    /// Places `(key, new_value)` immediately after the slot whose child
    /// pointer equals `old_value`. Returns the new size.
    pub fn insert_after(&mut self, old_value: PageId, key: &IndexKey, new_value: PageId) -> usize {
        let index = self
            .value_index(old_value)
            .expect("insert_after: old child is not in this node");
        let size = self.size();

        self.data
            .copy_within(slot_offset(index + 1)..slot_offset(size), slot_offset(index + 2));
        self.set_key_at(index + 1, key);
        self.set_value_at(index + 1, new_value);
        self.set_size(size + 1);
        size + 1
    }

    /// Removes the slot at `index`, shifting later slots left.
    /// Returns the new size.
    pub fn remove(&mut self, index: usize) -> usize {
        let size = self.size();
        self.data
            .copy_within(slot_offset(index + 1)..slot_offset(size), slot_offset(index));
        self.data[slot_offset(size - 1)..slot_offset(size)].fill(0);
        self.set_size(size - 1);
        size - 1
    }

    /// Moves the upper half of this node's slots into the empty `recipient`
    /// and reparents every moved child. The recipient's slot-0 key ends up
    /// holding the separator to push into the parent.
    pub fn move_half_to(
        &mut self,
        recipient: &mut InternalPage<'_>,
        bpm: &BufferPoolManager,
    ) -> Result<()> {
        let size = self.size();
        let keep = size / 2;
        let moved = size - keep;

        recipient.data[slot_offset(0)..slot_offset(moved)]
            .copy_from_slice(&self.data[slot_offset(keep)..slot_offset(size)]);
        recipient.set_size(moved);

        self.data[slot_offset(keep)..slot_offset(size)].fill(0);
        self.set_size(keep);

        reparent_children(recipient, 0, moved, bpm)
    }

    /// Overwrites this node's dummy slot-0 key with `middle_key` (the
    /// separator from the parent), appends every slot to `recipient`,
    /// reparents the moved children, and empties this node.
    pub fn move_all_to(
        &mut self,
        recipient: &mut InternalPage<'_>,
        middle_key: &IndexKey,
        bpm: &BufferPoolManager,
    ) -> Result<()> {
        self.set_key_at(0, middle_key);

        let size = self.size();
        let base = recipient.size();

        recipient.data[slot_offset(base)..slot_offset(base + size)]
            .copy_from_slice(&self.data[slot_offset(0)..slot_offset(size)]);
        recipient.set_size(base + size);

        self.data[slot_offset(0)..slot_offset(size)].fill(0);
        self.set_size(0);

        reparent_children(recipient, base, base + size, bpm)
    }

    /// Rotates this node's first slot to the end of `recipient` (its left
    /// sibling). The moved slot's key is repainted with `middle_key` so the
    /// separator travels with the child; this node's new slot-0 key becomes
    /// the parent's replacement separator.
    pub fn move_first_to_end_of(
        &mut self,
        recipient: &mut InternalPage<'_>,
        middle_key: &IndexKey,
        bpm: &BufferPoolManager,
    ) -> Result<()> {
        self.set_key_at(0, middle_key);

        let size = self.size();
        let tail = recipient.size();

        recipient.data[slot_offset(tail)..slot_offset(tail + 1)]
            .copy_from_slice(&self.data[slot_offset(0)..slot_offset(1)]);
        recipient.set_size(tail + 1);

        self.data
            .copy_within(slot_offset(1)..slot_offset(size), slot_offset(0));
        self.data[slot_offset(size - 1)..slot_offset(size)].fill(0);
        self.set_size(size - 1);

        reparent_children(recipient, tail, tail + 1, bpm)
    }

    /// Rotates this node's last slot to the front of `recipient` (its right
    /// sibling). The recipient's old dummy key is repainted with
    /// `middle_key` before the shift so it stays a valid separator.
    pub fn move_last_to_front_of(
        &mut self,
        recipient: &mut InternalPage<'_>,
        middle_key: &IndexKey,
        bpm: &BufferPoolManager,
    ) -> Result<()> {
        recipient.set_key_at(0, middle_key);

        let size = self.size();
        let recipient_size = recipient.size();

        recipient
            .data
            .copy_within(slot_offset(0)..slot_offset(recipient_size), slot_offset(1));
        recipient.data[slot_offset(0)..slot_offset(1)]
            .copy_from_slice(&self.data[slot_offset(size - 1)..slot_offset(size)]);
        recipient.set_size(recipient_size + 1);

        self.data[slot_offset(size - 1)..slot_offset(size)].fill(0);
        self.set_size(size - 1);

        reparent_children(recipient, 0, 1, bpm)
    }
}

/// Repoints the parent pointer of the children in `recipient`'s slot range
/// `[from, to)` to the recipient itself, persisting through the buffer pool.
fn reparent_children(
    recipient: &mut InternalPage<'_>,
    from: usize,
    to: usize,
    bpm: &BufferPoolManager,
) -> Result<()> {
    let new_parent = recipient.page_id();
    for i in from..to {
        let child_id = recipient.value_at(i);
        let mut guard = bpm.write_page(child_id)?;
        TreePage::new(guard.data_mut()).set_parent_page_id(Some(new_parent));
    }
    Ok(())
}

fn lookup_in<C: KeyComparator>(data: &[u8], size: usize, key: &IndexKey, comparator: &C) -> PageId {
    if size == 0 {
        return INVALID_PAGE_ID;
    }

    // Binary search for the first separator greater than `key`; the child
    // just before it covers the key.
    let (mut lo, mut hi) = (1, size);
    while lo < hi {
        let mid = (lo + hi) / 2;
        let offset = slot_offset(mid);
        let mid_key = &data[offset..offset + KEY_SIZE];
        if comparator.compare(mid_key, key.as_bytes()) == std::cmp::Ordering::Greater {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }

    PageId::new(read_u32(data, slot_offset(lo - 1) + KEY_SIZE))
}

/// Read-only view over an internal node page.
pub struct InternalPageRef<'a> {
    data: &'a [u8],
}

impl<'a> InternalPageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn page_id(&self) -> PageId {
        PageId::new(read_u32(self.data, PAGE_ID_OFFSET))
    }

    pub fn size(&self) -> usize {
        read_u16(self.data, SIZE_OFFSET) as usize
    }

    pub fn max_size(&self) -> usize {
        read_u16(self.data, MAX_SIZE_OFFSET) as usize
    }

    pub fn min_size(&self) -> usize {
        min_size_for(self.max_size())
    }

    pub fn parent_page_id(&self) -> Option<PageId> {
        read_optional_page_id(self.data, PARENT_PAGE_ID_OFFSET)
    }

    pub fn key_at(&self, index: usize) -> IndexKey {
        let offset = slot_offset(index);
        IndexKey::new(self.data[offset..offset + KEY_SIZE].try_into().unwrap())
    }

    pub fn value_at(&self, index: usize) -> PageId {
        PageId::new(read_u32(self.data, slot_offset(index) + KEY_SIZE))
    }

    pub fn value_index(&self, value: PageId) -> Option<usize> {
        (0..self.size()).find(|&i| self.value_at(i) == value)
    }

    pub fn lookup<C: KeyComparator>(&self, key: &IndexKey, comparator: &C) -> PageId {
        lookup_in(self.data, self.size(), key, comparator)
    }
}
