//! Frame store - the page buffers of the pool.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::FrameId;
use crate::storage::page::Page;

/// Fixed array of page buffers, index-aligned with the frame table.
///
/// Each buffer has its own lock so a pinned page can be read or written
/// without holding the pool's bookkeeping lock.
pub struct FrameStore {
    pages: Vec<RwLock<Page>>,
}

impl FrameStore {
    /// Allocate `pool_size` zeroed buffers.
    pub fn new(pool_size: usize) -> Self {
        Self {
            pages: (0..pool_size).map(|_| RwLock::new(Page::new())).collect(),
        }
    }

    /// Shared access to the page in `frame_id`.
    #[inline]
    pub fn read(&self, frame_id: FrameId) -> RwLockReadGuard<'_, Page> {
        self.pages[frame_id.0].read()
    }

    /// Exclusive access to the page in `frame_id`.
    #[inline]
    pub fn write(&self, frame_id: FrameId) -> RwLockWriteGuard<'_, Page> {
        self.pages[frame_id.0].write()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.pages.len()
    }
}
