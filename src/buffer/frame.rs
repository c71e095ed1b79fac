//! Frame descriptors - per-frame bookkeeping.
//!
//! A [`FrameDescriptor`] records which page a frame holds and how it is
//! being used:
//! - Owning file and page number (if any)
//! - Pin count for reference counting
//! - Dirty flag for write-back tracking
//! - Reference bit for the clock replacer
//!
//! The page bytes themselves live in the [`FrameStore`](super::frame_store::FrameStore),
//! at the same index.

use std::ops::{Index, IndexMut};

use crate::common::{FileId, FrameId, PageId};
use crate::storage::FileHandle;

/// Metadata for one frame of the buffer pool.
///
/// # Invariant
/// A frame that is not `valid` has no file, no page, a zero pin count and
/// is clean. [`clear`](Self::clear) is the only way back to that state.
///
/// `generation` changes on every [`set`](Self::set) and
/// [`clear`](Self::clear), so a handle that remembers it can tell whether
/// the frame still holds the page it pinned.
#[derive(Debug)]
pub struct FrameDescriptor {
    frame_id: FrameId,
    generation: u64,
    file: Option<FileHandle>,
    page_id: Option<PageId>,
    pin_count: u32,
    dirty: bool,
    referenced: bool,
    valid: bool,
}

impl FrameDescriptor {
    /// Create an unused descriptor.
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            generation: 0,
            file: None,
            page_id: None,
            pin_count: 0,
            dirty: false,
            referenced: false,
            valid: false,
        }
    }

    /// Install `page_id` of `file` as a freshly pinned, clean page.
    pub fn set(&mut self, file: FileHandle, page_id: PageId) {
        self.generation += 1;
        self.file = Some(file);
        self.page_id = Some(page_id);
        self.pin_count = 1;
        self.dirty = false;
        self.referenced = true;
        self.valid = true;
    }

    /// Return the frame to the unused state.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.file = None;
        self.page_id = None;
        self.pin_count = 0;
        self.dirty = false;
        self.referenced = false;
        self.valid = false;
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Occupancy generation of the frame.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Identity of the owning file, if the frame is tagged with one.
    #[inline]
    pub fn file_id(&self) -> Option<FileId> {
        self.file.as_ref().map(FileHandle::id)
    }

    #[inline]
    pub fn page_id(&self) -> Option<PageId> {
        self.page_id
    }

    /// Owning file and page of a valid frame.
    pub fn resident(&self) -> Option<(&FileHandle, PageId)> {
        if !self.valid {
            return None;
        }
        Some((self.file.as_ref()?, self.page_id?))
    }

    /// Whether the frame is tagged with `file`, valid or not.
    #[inline]
    pub fn belongs_to(&self, file: FileId) -> bool {
        self.file_id() == Some(file)
    }

    // ========================================================================
    // Pinning
    // ========================================================================

    /// Take another hold on the frame. Also sets the reference bit.
    /// Returns the new pin count.
    #[inline]
    pub fn pin(&mut self) -> u32 {
        self.pin_count += 1;
        self.referenced = true;
        self.pin_count
    }

    /// Release one hold. Returns the new pin count.
    ///
    /// # Panics
    /// Panics if the pin count is already 0. Callers check
    /// [`is_pinned`](Self::is_pinned) first and report
    /// [`Error::PageNotPinned`](crate::Error::PageNotPinned) instead.
    #[inline]
    pub fn unpin(&mut self) -> u32 {
        assert!(self.pin_count > 0, "pin count underflow on {}", self.frame_id);
        self.pin_count -= 1;
        self.pin_count
    }

    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count > 0
    }

    // ========================================================================
    // Flags
    // ========================================================================

    #[inline]
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    #[inline]
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    pub fn is_referenced(&self) -> bool {
        self.referenced
    }

    #[inline]
    pub fn clear_referenced(&mut self) {
        self.referenced = false;
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Tag an invalid frame with a file without making it valid.
    ///
    /// Only reachable from tests that exercise the bookkeeping checks.
    #[cfg(test)]
    pub(crate) fn corrupt_with(&mut self, file: FileHandle) {
        self.file = Some(file);
        self.valid = false;
    }
}

/// The frame descriptor table: one [`FrameDescriptor`] per frame.
#[derive(Debug)]
pub struct FrameTable {
    descriptors: Vec<FrameDescriptor>,
}

impl FrameTable {
    /// Allocate `pool_size` unused descriptors.
    pub fn new(pool_size: usize) -> Self {
        Self {
            descriptors: (0..pool_size)
                .map(|i| FrameDescriptor::new(FrameId::new(i)))
                .collect(),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FrameDescriptor> {
        self.descriptors.iter()
    }

    /// Number of frames holding a valid page.
    pub fn resident_count(&self) -> usize {
        self.descriptors.iter().filter(|d| d.is_valid()).count()
    }
}

impl Index<FrameId> for FrameTable {
    type Output = FrameDescriptor;

    #[inline]
    fn index(&self, frame_id: FrameId) -> &FrameDescriptor {
        &self.descriptors[frame_id.0]
    }
}

impl IndexMut<FrameId> for FrameTable {
    #[inline]
    fn index_mut(&mut self, frame_id: FrameId) -> &mut FrameDescriptor {
        &mut self.descriptors[frame_id.0]
    }
}
