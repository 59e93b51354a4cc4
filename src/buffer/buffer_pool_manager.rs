use std::collections::{HashMap, LinkedList};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::common::{ArborError, FrameId, PageId, Result, INVALID_PAGE_ID, PAGE_SIZE};
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{Frame, LruReplacer, ReadPageGuard, WritePageGuard};

/// Shared buffer pool state; page guards hold an Arc to it so dropping a
/// guard can perform the unpin.
pub(crate) struct BufferPoolState {
    /// The buffer pool frames
    pub(crate) frames: Vec<Arc<Frame>>,
    /// Page table: maps resident page IDs to frame IDs
    pub(crate) page_table: Mutex<HashMap<PageId, FrameId>>,
    /// Frames never used since startup, or returned by delete_page
    free_list: Mutex<LinkedList<FrameId>>,
    /// LRU queue of unpinned frames
    replacer: LruReplacer,
}

impl BufferPoolState {
    /// Unpins a resident page, OR-accumulating the dirty flag. When the pin
    /// count reaches zero the frame becomes eligible for eviction.
    /// Returns false if the page is not resident or was already unpinned.
    pub(crate) fn unpin(&self, page_id: PageId, is_dirty: bool) -> bool {
        let page_table = self.page_table.lock();
        let Some(&frame_id) = page_table.get(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.as_usize()];
        if is_dirty {
            frame.set_dirty(true);
        }
        match frame.unpin() {
            None => false,
            Some(0) => {
                self.replacer.unpin(frame_id);
                true
            }
            Some(_) => true,
        }
    }
}

/// BufferPoolManager caches fixed-size disk pages in a fixed set of in-memory
/// frames. It owns the page table, the free list and the LRU replacer, and
/// moves page images between frames and the disk manager as callers pin and
/// unpin pages through RAII guards.
pub struct BufferPoolManager {
    /// Number of frames in the buffer pool
    pool_size: usize,
    /// Shared state
    state: Arc<BufferPoolState>,
    /// Disk scheduler wrapping the disk manager
    disk_scheduler: DiskScheduler,
}

impl BufferPoolManager {
    /// Creates a buffer pool with `pool_size` frames over the given disk
    /// manager. Every frame starts on the free list.
    pub fn new(pool_size: usize, disk_manager: Arc<DiskManager>) -> Self {
        assert!(pool_size >= 1, "buffer pool requires at least one frame");

        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = LinkedList::new();

        for i in 0..pool_size {
            frames.push(Arc::new(Frame::new()));
            free_list.push_back(FrameId::new(i as u32));
        }

        let state = Arc::new(BufferPoolState {
            frames,
            page_table: Mutex::new(HashMap::new()),
            free_list: Mutex::new(free_list),
            replacer: LruReplacer::new(pool_size),
        });

        Self {
            pool_size,
            state,
            disk_scheduler: DiskScheduler::new(disk_manager),
        }
    }

    /// Pins a page for read access.
    pub fn read_page(&self, page_id: PageId) -> Result<ReadPageGuard> {
        if page_id == INVALID_PAGE_ID {
            return Err(ArborError::InvalidPageId(page_id));
        }

        let frame_id = self.fetch_frame(page_id)?;
        let frame = Arc::clone(&self.state.frames[frame_id.as_usize()]);

        // Safety: the Arc clones keep state and frame alive for the guard.
        Ok(unsafe { ReadPageGuard::new(page_id, Arc::clone(&self.state), frame) })
    }

    /// Pins a page for write access.
    pub fn write_page(&self, page_id: PageId) -> Result<WritePageGuard> {
        if page_id == INVALID_PAGE_ID {
            return Err(ArborError::InvalidPageId(page_id));
        }

        let frame_id = self.fetch_frame(page_id)?;
        let frame = Arc::clone(&self.state.frames[frame_id.as_usize()]);

        // Safety: the Arc clones keep state and frame alive for the guard.
        Ok(unsafe { WritePageGuard::new(page_id, Arc::clone(&self.state), frame) })
    }

    /// Allocates a fresh page on disk and pins it for write access. The
    /// frame starts dirty: the page is new and has never been written out.
    pub fn new_page(&self) -> Result<(PageId, WritePageGuard)> {
        let page_id = self.disk_scheduler.disk_manager().allocate_page()?;

        let frame_id = self.acquire_frame()?;
        let frame = &self.state.frames[frame_id.as_usize()];

        frame.set_page_id(page_id);
        frame.set_dirty(true);
        frame.pin();
        self.state.page_table.lock().insert(page_id, frame_id);

        trace!(page_id = page_id.as_u32(), frame_id = frame_id.as_u32(), "new page");

        let frame = Arc::clone(&self.state.frames[frame_id.as_usize()]);
        // Safety: the Arc clones keep state and frame alive for the guard.
        let guard = unsafe { WritePageGuard::new(page_id, Arc::clone(&self.state), frame) };
        Ok((page_id, guard))
    }

    /// Explicit unpin, the inverse of a successful fetch. Guards call this
    /// on drop; it is public so callers that transfer pin obligations
    /// manually can release them. Returns false on a pin-count underflow.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        self.state.unpin(page_id, is_dirty)
    }

    /// Deletes a page from the pool and deallocates it on disk.
    /// Fails if the page is currently pinned.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut page_table = self.state.page_table.lock();

        if let Some(&frame_id) = page_table.get(&page_id) {
            let frame = &self.state.frames[frame_id.as_usize()];
            if frame.pin_count() > 0 {
                return Err(ArborError::PagePinned(page_id));
            }

            page_table.remove(&page_id);
            self.state.replacer.pin(frame_id);
            frame.reset();
            self.state.free_list.lock().push_back(frame_id);
        }
        drop(page_table);

        self.disk_scheduler.disk_manager().deallocate_page(page_id);
        Ok(true)
    }

    /// Writes a resident page back to disk unconditionally and clears its
    /// dirty bit. Returns false when the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if page_id == INVALID_PAGE_ID {
            return Err(ArborError::InvalidPageId(page_id));
        }

        let page_table = self.state.page_table.lock();
        let Some(&frame_id) = page_table.get(&page_id) else {
            return Ok(false);
        };
        let frame = &self.state.frames[frame_id.as_usize()];

        let mut data = [0u8; PAGE_SIZE];
        frame.copy_to(&mut data);
        self.disk_scheduler.schedule_write_sync(page_id, &data)?;
        frame.set_dirty(false);

        Ok(true)
    }

    /// Flushes every resident page.
    pub fn flush_all_pages(&self) -> Result<()> {
        let resident: Vec<PageId> = self.state.page_table.lock().keys().copied().collect();
        for page_id in resident {
            self.flush_page(page_id)?;
        }
        Ok(())
    }

    /// Returns the pin count for a resident page.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let page_table = self.state.page_table.lock();
        page_table
            .get(&page_id)
            .map(|&frame_id| self.state.frames[frame_id.as_usize()].pin_count())
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.state.free_list.lock().len()
    }

    /// Number of frames with at least one outstanding pin.
    pub fn pinned_frame_count(&self) -> usize {
        self.state
            .frames
            .iter()
            .filter(|frame| frame.pin_count() > 0)
            .count()
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        self.disk_scheduler.disk_manager()
    }

    /// Pins the page into a frame and returns the frame id. A hit pins the
    /// existing frame; a miss victimizes a frame (free list first, then the
    /// replacer), writes back its dirty content, and reads the page in.
    fn fetch_frame(&self, page_id: PageId) -> Result<FrameId> {
        {
            let page_table = self.state.page_table.lock();
            if let Some(&frame_id) = page_table.get(&page_id) {
                let frame = &self.state.frames[frame_id.as_usize()];
                frame.pin();
                self.state.replacer.pin(frame_id);
                return Ok(frame_id);
            }
        }

        let frame_id = self.acquire_frame()?;
        let frame = &self.state.frames[frame_id.as_usize()];

        let mut data = [0u8; PAGE_SIZE];
        self.disk_scheduler.schedule_read_sync(page_id, &mut data)?;

        frame.set_page_id(page_id);
        frame.copy_from(&data);
        frame.set_dirty(false);
        frame.pin();
        self.state.page_table.lock().insert(page_id, frame_id);

        Ok(frame_id)
    }

    /// Picks a victim frame: free list in insertion order first, then the
    /// LRU replacer. The victim's dirty content is written back and the
    /// frame is left reset and unmapped.
    fn acquire_frame(&self) -> Result<FrameId> {
        {
            let mut free_list = self.state.free_list.lock();
            if let Some(frame_id) = free_list.pop_front() {
                return Ok(frame_id);
            }
        }

        let Some(frame_id) = self.state.replacer.victim() else {
            return Err(ArborError::NoFreeFrame);
        };
        let frame = &self.state.frames[frame_id.as_usize()];
        let old_page_id = frame.page_id();

        if frame.is_dirty() {
            debug!(
                page_id = old_page_id.as_u32(),
                frame_id = frame_id.as_u32(),
                "evicting dirty page, writing back"
            );
            let mut data = [0u8; PAGE_SIZE];
            frame.copy_to(&mut data);
            self.disk_scheduler.schedule_write_sync(old_page_id, &data)?;
        }

        self.state.page_table.lock().remove(&old_page_id);
        frame.reset();

        Ok(frame_id)
    }
}
