use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{PageId, PAGE_SIZE};

use super::buffer_pool_manager::BufferPoolState;
use super::Frame;

/// RAII guard for read-only access to a pinned page.
/// Dropping the guard unpins the page with the clean flag.
pub struct ReadPageGuard {
    page_id: PageId,
    state: Arc<BufferPoolState>,
    /// Kept alive so the transmuted lock guard below stays valid
    _frame: Arc<Frame>,
    data_guard: Option<RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>>>,
}

impl ReadPageGuard {
    /// # Safety
    /// The frame must stay alive for the guard's lifetime; the Arc held in
    /// `_frame` guarantees this, which is what makes the 'static transmute
    /// of the lock guard sound.
    pub(crate) unsafe fn new(page_id: PageId, state: Arc<BufferPoolState>, frame: Arc<Frame>) -> Self {
        let data_guard = frame.data.read();
        let data_guard: RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>> =
            std::mem::transmute(data_guard);

        Self {
            page_id,
            state,
            _frame: frame,
            data_guard: Some(data_guard),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data_guard.as_ref().unwrap()[..]
    }
}

impl Deref for ReadPageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        // Release the data lock before unpinning
        self.data_guard.take();
        self.state.unpin(self.page_id, false);
    }
}

/// RAII guard for read-write access to a pinned page.
/// The dirty bit is set the first time `data_mut` is called; dropping the
/// guard unpins the page with the accumulated flag.
pub struct WritePageGuard {
    page_id: PageId,
    state: Arc<BufferPoolState>,
    _frame: Arc<Frame>,
    data_guard: Option<RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>>>,
    is_dirty: bool,
}

impl WritePageGuard {
    /// # Safety
    /// Same contract as [`ReadPageGuard::new`].
    pub(crate) unsafe fn new(page_id: PageId, state: Arc<BufferPoolState>, frame: Arc<Frame>) -> Self {
        let data_guard = frame.data.write();
        let data_guard: RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>> =
            std::mem::transmute(data_guard);

        Self {
            page_id,
            state,
            _frame: frame,
            data_guard: Some(data_guard),
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data_guard.as_ref().unwrap()[..]
    }

    /// Mutable access to the page image; marks the release as dirty.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.is_dirty = true;
        &mut self.data_guard.as_mut().unwrap()[..]
    }
}

impl Deref for WritePageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for WritePageGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        self.data_guard.take();
        self.state.unpin(self.page_id, self.is_dirty);
    }
}
