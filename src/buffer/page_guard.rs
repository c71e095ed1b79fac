//! RAII pin guard for page access.
//!
//! A [`PageHandle`] is what the buffer pool hands out for a pinned page. It
//! borrows the pool, so it cannot outlive it, and it unpins the page when
//! dropped, carrying along whether the page was written through it.

use log::warn;
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{FrameId, PageId, Result};
use crate::storage::page::Page;
use crate::storage::FileHandle;

use super::buffer_pool_manager::BufferPoolManager;

/// One pin on a resident page.
///
/// The page stays in its frame for as long as the handle lives. Page bytes
/// are reached through [`read`](Self::read) and [`write`](Self::write),
/// which lock only that frame's buffer.
///
/// Dropping the handle is equivalent to
/// `bpm.unpin_page(file, page_id, dirty)`, where `dirty` is set once
/// [`write`](Self::write) or [`mark_dirty`](Self::mark_dirty) was called.
///
/// A handle whose page was disposed under it is stale: dropping or
/// releasing it no longer unpins anything, and [`read`](Self::read) and
/// [`write`](Self::write) panic, even if the page has since come back
/// into the pool.
///
/// # Example
/// ```
/// use clockpool::storage::{FileHandle, MemFile};
/// use clockpool::BufferPoolManager;
///
/// let bpm = BufferPoolManager::new(4);
/// let file = FileHandle::new(MemFile::new());
///
/// let (page_id, mut handle) = bpm.allocate_page(&file).unwrap();
/// handle.write().as_mut_slice()[0] = 0xAB;
/// drop(handle); // unpinned, marked dirty
///
/// let handle = bpm.fetch_page(&file, page_id).unwrap();
/// assert_eq!(handle.read().as_slice()[0], 0xAB);
/// ```
pub struct PageHandle<'a> {
    /// Reference back to the pool for unpin on drop.
    bpm: &'a BufferPoolManager,
    file: FileHandle,
    page_id: PageId,
    /// Frame holding this page.
    frame_id: FrameId,
    /// Frame generation at the time of pinning.
    generation: u64,
    dirty: bool,
    /// Set once the pin has been handed back or handed off.
    released: bool,
}

impl<'a> PageHandle<'a> {
    /// Called by the pool after it pinned `page_id` in `frame_id`.
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        file: FileHandle,
        page_id: PageId,
        frame_id: FrameId,
        generation: u64,
    ) -> Self {
        Self {
            bpm,
            file,
            page_id,
            frame_id,
            generation,
            dirty: false,
            released: false,
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    #[inline]
    pub fn file(&self) -> &FileHandle {
        &self.file
    }

    /// Shared access to the page bytes.
    ///
    /// # Panics
    /// Panics if the handle is stale.
    pub fn read(&self) -> RwLockReadGuard<'_, Page> {
        self.assert_current();
        self.bpm.frames.read(self.frame_id)
    }

    /// Exclusive access to the page bytes. Marks the page dirty.
    ///
    /// # Panics
    /// Panics if the handle is stale.
    pub fn write(&mut self) -> RwLockWriteGuard<'_, Page> {
        self.assert_current();
        self.dirty = true;
        self.bpm.frames.write(self.frame_id)
    }

    fn assert_current(&self) {
        assert!(
            self.bpm.is_current(self.frame_id, self.generation),
            "stale page handle: {} no longer occupies {}",
            self.page_id,
            self.frame_id
        );
    }

    /// Mark the page dirty without touching it.
    #[inline]
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Whether dropping this handle will mark the page dirty.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Unpin now and report the outcome, instead of on drop.
    ///
    /// # Errors
    /// `Error::PageNotResident` if the handle is stale.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.unpin()
    }

    fn unpin(&self) -> Result<()> {
        self.bpm.unpin_handle(
            &self.file,
            self.page_id,
            self.frame_id,
            self.generation,
            self.dirty,
        )
    }

    /// Give up the guard but leave the page pinned.
    ///
    /// The caller takes over the pin and must return it with
    /// [`BufferPoolManager::unpin_page`]. A dirty mark recorded on this
    /// handle is lost; pass it to `unpin_page` instead.
    pub fn keep_pinned(mut self) -> PageId {
        self.released = true;
        self.page_id
    }
}

impl Drop for PageHandle<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.unpin() {
            // The page was disposed or unpinned behind the handle's back
            warn!("Dropping stale handle for {}: {}", self.page_id, e);
        }
    }
}
