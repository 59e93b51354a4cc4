use crate::common::{PageId, PAGE_SIZE};

const RECORD_COUNT_OFFSET: usize = 0;
const RECORDS_OFFSET: usize = 4;

/// Fixed-width index name field, NUL-padded
pub const MAX_INDEX_NAME_LEN: usize = 32;
const RECORD_SIZE: usize = MAX_INDEX_NAME_LEN + 4; // name + root page id

const MAX_RECORDS: usize = (PAGE_SIZE - RECORDS_OFFSET) / RECORD_SIZE;

fn record_offset(index: usize) -> usize {
    RECORDS_OFFSET + index * RECORD_SIZE
}

fn encode_name(name: &str) -> [u8; MAX_INDEX_NAME_LEN] {
    debug_assert!(name.len() <= MAX_INDEX_NAME_LEN);
    let mut buf = [0u8; MAX_INDEX_NAME_LEN];
    buf[..name.len()].copy_from_slice(name.as_bytes());
    buf
}

/// The header page lives at page 0 and stores one `(index_name,
/// root_page_id)` record per index. The tree rewrites its record on every
/// root change; a zeroed page is a valid empty header.
pub struct HeaderPage<'a> {
    data: &'a mut [u8],
}

impl<'a> HeaderPage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn record_count(&self) -> usize {
        u32::from_le_bytes(
            self.data[RECORD_COUNT_OFFSET..RECORD_COUNT_OFFSET + 4]
                .try_into()
                .unwrap(),
        ) as usize
    }

    fn set_record_count(&mut self, count: usize) {
        self.data[RECORD_COUNT_OFFSET..RECORD_COUNT_OFFSET + 4]
            .copy_from_slice(&(count as u32).to_le_bytes());
    }

    fn find_record(&self, name: &str) -> Option<usize> {
        let encoded = encode_name(name);
        (0..self.record_count()).find(|&i| {
            let offset = record_offset(i);
            self.data[offset..offset + MAX_INDEX_NAME_LEN] == encoded
        })
    }

    fn write_record(&mut self, index: usize, name: &str, root_id: PageId) {
        let offset = record_offset(index);
        self.data[offset..offset + MAX_INDEX_NAME_LEN].copy_from_slice(&encode_name(name));
        self.data[offset + MAX_INDEX_NAME_LEN..offset + RECORD_SIZE]
            .copy_from_slice(&root_id.as_u32().to_le_bytes());
    }

    /// Returns the root page id recorded for the named index.
    pub fn get_root_id(&self, name: &str) -> Option<PageId> {
        self.find_record(name).map(|i| {
            let offset = record_offset(i) + MAX_INDEX_NAME_LEN;
            PageId::new(u32::from_le_bytes(
                self.data[offset..offset + 4].try_into().unwrap(),
            ))
        })
    }

    /// Adds a record; false if the name is already present or the page is
    /// full.
    pub fn insert_record(&mut self, name: &str, root_id: PageId) -> bool {
        if self.find_record(name).is_some() {
            return false;
        }
        let count = self.record_count();
        if count >= MAX_RECORDS {
            return false;
        }
        self.write_record(count, name, root_id);
        self.set_record_count(count + 1);
        true
    }

    /// Rewrites an existing record; false if the name is absent.
    pub fn update_record(&mut self, name: &str, root_id: PageId) -> bool {
        match self.find_record(name) {
            Some(i) => {
                self.write_record(i, name, root_id);
                true
            }
            None => false,
        }
    }

    /// Removes a record by swapping the last one into its slot; false if
    /// the name is absent.
    pub fn delete_record(&mut self, name: &str) -> bool {
        let Some(i) = self.find_record(name) else {
            return false;
        };
        let count = self.record_count();
        if i < count - 1 {
            let last = record_offset(count - 1);
            let (head, tail) = self.data.split_at_mut(last);
            head[record_offset(i)..record_offset(i) + RECORD_SIZE]
                .copy_from_slice(&tail[..RECORD_SIZE]);
        }
        self.set_record_count(count - 1);
        true
    }
}

/// Read-only view over a header page image.
pub struct HeaderPageRef<'a> {
    data: &'a [u8],
}

impl<'a> HeaderPageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn record_count(&self) -> usize {
        u32::from_le_bytes(
            self.data[RECORD_COUNT_OFFSET..RECORD_COUNT_OFFSET + 4]
                .try_into()
                .unwrap(),
        ) as usize
    }

    pub fn get_root_id(&self, name: &str) -> Option<PageId> {
        let encoded = encode_name(name);
        for i in 0..self.record_count() {
            let offset = record_offset(i);
            if self.data[offset..offset + MAX_INDEX_NAME_LEN] == encoded {
                let root = offset + MAX_INDEX_NAME_LEN;
                return Some(PageId::new(u32::from_le_bytes(
                    self.data[root..root + 4].try_into().unwrap(),
                )));
            }
        }
        None
    }
}
