//! Buffer Pool Manager - the core page caching layer.
//!
//! The [`BufferPoolManager`] provides:
//! - Page caching between paged files and memory
//! - Pin-based reference counting through [`PageHandle`]
//! - Clock (second-chance) replacement with dirty write-back
//! - Page allocation, disposal and per-file flushing

use log::{debug, trace, warn};
use parking_lot::Mutex;

use crate::buffer::frame::FrameTable;
use crate::buffer::frame_store::FrameStore;
use crate::buffer::page_index::PageIndex;
use crate::buffer::replacer::ClockReplacer;
use crate::buffer::{BufferPoolStats, FrameSnapshot, PageHandle, PoolDump};
use crate::common::{Error, FrameId, PageId, Result};
use crate::storage::FileHandle;

/// Bookkeeping guarded by the pool lock.
struct PoolState {
    table: FrameTable,
    index: PageIndex,
    clock: ClockReplacer,
}

/// Manages a fixed pool of frames caching pages of any number of files.
///
/// # Architecture
/// ```text
/// ┌──────────────────────────────────────────────────────────────┐
/// │                     BufferPoolManager                        │
/// │  ┌─────────────── state: Mutex<PoolState> ───────────────┐   │
/// │  │ ┌──────────────┐  ┌──────────────┐  ┌──────────────┐  │   │
/// │  │ │  PageIndex   │  │  FrameTable  │  │ClockReplacer │  │   │
/// │  │ │(file,page)→F │─▶│ [D0][D1]...  │◀─│    hand      │  │   │
/// │  │ └──────────────┘  └──────────────┘  └──────────────┘  │   │
/// │  └───────────────────────────────────────────────────────┘   │
/// │  ┌──────────── frames: FrameStore ──────────────────────┐    │
/// │  │  RwLock<Page> × N, index-aligned with FrameTable     │    │
/// │  └──────────────────────────────────────────────────────┘    │
/// └──────────────────────────────────────────────────────────────┘
/// ```
///
/// # Locking
/// Every call takes the state lock once, for its whole duration, so calls
/// are totally ordered. Page bytes are locked per frame by the
/// [`PageHandle`] that pinned them; opening a handle's guard briefly takes
/// the state lock first to check the handle is still current. The lock
/// order is state, then page, so code holding a page guard must not call
/// [`flush_page`](Self::flush_page) for that same page, nor touch the pool
/// while another thread may be flushing it.
///
/// # Usage
/// ```
/// use clockpool::storage::{FileHandle, MemFile};
/// use clockpool::BufferPoolManager;
///
/// let bpm = BufferPoolManager::new(8);
/// let file = FileHandle::new(MemFile::new());
///
/// let (page_id, mut handle) = bpm.allocate_page(&file)?;
/// handle.write().as_mut_slice()[0] = 0xAB;
/// drop(handle);
///
/// bpm.flush_file(&file)?;
/// assert!(!bpm.contains_page(&file, page_id));
/// # Ok::<(), clockpool::Error>(())
/// ```
pub struct BufferPoolManager {
    /// Page buffers, one per frame.
    pub(super) frames: FrameStore,

    /// Frame table, page index and clock hand.
    state: Mutex<PoolState>,

    /// Performance statistics.
    stats: BufferPoolStats,

    /// Number of frames in the pool (immutable after construction).
    pool_size: usize,
}

impl BufferPoolManager {
    /// Create a new buffer pool with `pool_size` frames.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        Self {
            frames: FrameStore::new(pool_size),
            state: Mutex::new(PoolState {
                table: FrameTable::new(pool_size),
                index: PageIndex::with_pool_size(pool_size),
                clock: ClockReplacer::new(pool_size),
            }),
            stats: BufferPoolStats::new(),
            pool_size,
        }
    }

    // ========================================================================
    // Public API: Pin and unpin
    // ========================================================================

    /// Pin `page_id` of `file`, reading it in if it is not resident.
    ///
    /// # Errors
    /// - `Error::PoolExhausted` if every frame is pinned
    /// - `Error::Io` if writing back the victim or reading the page fails;
    ///   a failed read leaves no trace in the index
    /// - `Error::IndexCorruption` if the index already maps the page
    pub fn fetch_page(&self, file: &FileHandle, page_id: PageId) -> Result<PageHandle<'_>> {
        let (frame_id, generation) = {
            let mut state = self.state.lock();

            let frame_id = match state.index.lookup(file.id(), page_id) {
                Some(frame_id) => {
                    state.table[frame_id].pin();
                    BufferPoolStats::bump(&self.stats.cache_hits);
                    trace!("Hit {} of {} in {}", page_id, file.id(), frame_id);
                    frame_id
                }
                None => {
                    BufferPoolStats::bump(&self.stats.cache_misses);
                    self.load_page(&mut state, file, page_id)?
                }
            };
            (frame_id, state.table[frame_id].generation())
        };

        Ok(PageHandle::new(self, file.clone(), page_id, frame_id, generation))
    }

    /// Release one pin on `page_id` of `file`.
    ///
    /// A `true` `is_dirty` marks the page dirty; a `false` never clears it.
    ///
    /// # Errors
    /// - `Error::PageNotResident` if the page is not in the pool
    /// - `Error::PageNotPinned` if its pin count is already zero
    pub fn unpin_page(&self, file: &FileHandle, page_id: PageId, is_dirty: bool) -> Result<()> {
        let mut state = self.state.lock();

        let frame_id = state
            .index
            .lookup(file.id(), page_id)
            .ok_or(Error::PageNotResident {
                file: file.id(),
                page: page_id,
            })?;

        Self::release_pin(&mut state, file, page_id, frame_id, is_dirty)
    }

    /// Unpin on behalf of a handle that pinned `frame_id` at `generation`.
    ///
    /// Fails with `Error::PageNotResident`, leaving the frame alone, once
    /// the frame has been cleared or reused since the pin was taken.
    pub(super) fn unpin_handle(
        &self,
        file: &FileHandle,
        page_id: PageId,
        frame_id: FrameId,
        generation: u64,
        is_dirty: bool,
    ) -> Result<()> {
        let mut state = self.state.lock();

        if state.table[frame_id].generation() != generation {
            return Err(Error::PageNotResident {
                file: file.id(),
                page: page_id,
            });
        }

        Self::release_pin(&mut state, file, page_id, frame_id, is_dirty)
    }

    /// Whether `frame_id` still holds what was pinned at `generation`.
    pub(super) fn is_current(&self, frame_id: FrameId, generation: u64) -> bool {
        self.state.lock().table[frame_id].generation() == generation
    }

    fn release_pin(
        state: &mut PoolState,
        file: &FileHandle,
        page_id: PageId,
        frame_id: FrameId,
        is_dirty: bool,
    ) -> Result<()> {
        let desc = &mut state.table[frame_id];
        if !desc.is_pinned() {
            return Err(Error::PageNotPinned {
                file: file.id(),
                page: page_id,
            });
        }

        desc.unpin();
        if is_dirty {
            desc.mark_dirty();
        }
        Ok(())
    }

    // ========================================================================
    // Public API: Create and dispose pages
    // ========================================================================

    /// Reserve a new page on `file` and pin it in a zeroed frame.
    ///
    /// # Errors
    /// - `Error::Io` if the file cannot allocate (no frame is touched)
    /// - `Error::PoolExhausted`, `Error::Io` (victim write-back) or
    ///   `Error::IndexCorruption` after the page was reserved. The page then
    ///   stays allocated in the file; nothing rolls that back.
    pub fn allocate_page(&self, file: &FileHandle) -> Result<(PageId, PageHandle<'_>)> {
        let mut state = self.state.lock();

        let page_id = file.allocate_page()?;
        BufferPoolStats::bump(&self.stats.pages_allocated);

        let frame_id = self
            .install_new_page(&mut state, file, page_id)
            .inspect_err(|e| {
                warn!(
                    "{} of {} allocated on disk but not cached: {}",
                    page_id,
                    file.id(),
                    e
                );
            })?;
        let generation = state.table[frame_id].generation();
        drop(state);

        trace!("Allocated {} of {} in {}", page_id, file.id(), frame_id);
        let handle = PageHandle::new(self, file.clone(), page_id, frame_id, generation);
        Ok((page_id, handle))
    }

    /// Drop `page_id` of `file` from the pool and free it in the file.
    ///
    /// A resident copy is discarded even if pinned or dirty; callers must not
    /// dispose pages they still hold.
    ///
    /// # Errors
    /// `Error::Io` if the file fails to free the page. The cached copy is
    /// gone either way.
    pub fn dispose_page(&self, file: &FileHandle, page_id: PageId) -> Result<()> {
        let mut state = self.state.lock();

        if let Some(frame_id) = state.index.remove(file.id(), page_id) {
            let desc = &mut state.table[frame_id];
            if desc.is_pinned() {
                debug!("Disposing {} with pin count {}", page_id, desc.pin_count());
            }
            desc.clear();
        }

        file.dispose_page(page_id)?;
        BufferPoolStats::bump(&self.stats.pages_disposed);
        debug!("Disposed {} of {}", page_id, file.id());
        Ok(())
    }

    // ========================================================================
    // Public API: Flush pages
    // ========================================================================

    /// Write back and evict every page of `file`.
    ///
    /// Frames are swept in order. The sweep stops at the first error, so
    /// frames before the failing one are already written back and released
    /// while later ones are untouched.
    ///
    /// # Errors
    /// - `Error::PagePinned` if a page of `file` is pinned
    /// - `Error::Io` if a write-back fails
    /// - `Error::InvalidFrameState` if a frame is tagged with `file` but
    ///   holds no valid page
    pub fn flush_file(&self, file: &FileHandle) -> Result<()> {
        let mut state = self.state.lock();
        let PoolState { table, index, .. } = &mut *state;
        let file_id = file.id();

        for i in 0..self.pool_size {
            let frame_id = FrameId::new(i);
            let desc = &mut table[frame_id];

            if !desc.belongs_to(file_id) {
                continue;
            }

            let page_id = match (desc.is_valid(), desc.page_id()) {
                (true, Some(page_id)) => page_id,
                _ => return Err(Error::InvalidFrameState { frame: frame_id }),
            };

            if desc.is_pinned() {
                return Err(Error::PagePinned {
                    file: file_id,
                    page: page_id,
                });
            }

            if desc.is_dirty() {
                debug!("Flushing {} from {}", page_id, frame_id);
                file.write_page(page_id, &self.frames.read(frame_id))?;
                BufferPoolStats::bump(&self.stats.pages_written);
                desc.clear_dirty();
            }

            index.remove(file_id, page_id);
            desc.clear();
        }

        Ok(())
    }

    /// Write back `page_id` of `file` if it is resident and dirty.
    ///
    /// The page stays resident and keeps its pins.
    ///
    /// # Errors
    /// `Error::Io` if the write fails; the page stays dirty.
    pub fn flush_page(&self, file: &FileHandle, page_id: PageId) -> Result<()> {
        let mut state = self.state.lock();

        let Some(frame_id) = state.index.lookup(file.id(), page_id) else {
            return Ok(());
        };

        let desc = &mut state.table[frame_id];
        if desc.is_dirty() {
            debug!("Flushing {} from {}", page_id, frame_id);
            file.write_page(page_id, &self.frames.read(frame_id))?;
            BufferPoolStats::bump(&self.stats.pages_written);
            desc.clear_dirty();
        }
        Ok(())
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    /// Get buffer pool statistics.
    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    /// Get the pool size.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Number of frames holding a page.
    pub fn resident_count(&self) -> usize {
        self.state.lock().table.resident_count()
    }

    /// Whether `page_id` of `file` is resident.
    pub fn contains_page(&self, file: &FileHandle, page_id: PageId) -> bool {
        self.state.lock().index.lookup(file.id(), page_id).is_some()
    }

    /// Pin count of `page_id` of `file`, or `None` if it is not resident.
    pub fn pin_count(&self, file: &FileHandle, page_id: PageId) -> Option<u32> {
        let state = self.state.lock();
        let frame_id = state.index.lookup(file.id(), page_id)?;
        Some(state.table[frame_id].pin_count())
    }

    /// Snapshot of every frame, for debugging.
    pub fn dump(&self) -> PoolDump {
        let state = self.state.lock();
        PoolDump {
            frames: state.table.iter().map(FrameSnapshot::from).collect(),
            hand: state.clock.hand(),
        }
    }

    // ========================================================================
    // Internal: Frame setup
    // ========================================================================

    /// Get an unused frame from the clock, recording any eviction.
    fn claim_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        let PoolState {
            table,
            index,
            clock,
        } = state;

        let victim = clock.allocate_frame(table, index, &self.frames)?;
        if let Some(evicted) = victim.evicted {
            BufferPoolStats::bump(&self.stats.evictions);
            if evicted.written_back {
                BufferPoolStats::bump(&self.stats.pages_written);
                debug!("Wrote back {} of {} on eviction", evicted.page, evicted.file);
            }
        }
        Ok(victim.frame_id)
    }

    /// Read `page_id` into a fresh frame and publish it, pinned once.
    fn load_page(&self, state: &mut PoolState, file: &FileHandle, page_id: PageId) -> Result<FrameId> {
        let frame_id = self.claim_frame(state)?;

        // The frame stays unused until the read has succeeded
        if let Err(e) = file.read_page(page_id, &mut self.frames.write(frame_id)) {
            debug!("Reading {} of {} failed: {}", page_id, file.id(), e);
            return Err(e.into());
        }
        BufferPoolStats::bump(&self.stats.pages_read);

        self.publish(state, file, page_id, frame_id)?;
        trace!("Loaded {} of {} into {}", page_id, file.id(), frame_id);
        Ok(frame_id)
    }

    /// Set up a zeroed frame for a page that was just allocated.
    fn install_new_page(
        &self,
        state: &mut PoolState,
        file: &FileHandle,
        page_id: PageId,
    ) -> Result<FrameId> {
        let frame_id = self.claim_frame(state)?;
        self.frames.write(frame_id).reset();
        self.publish(state, file, page_id, frame_id)?;
        Ok(frame_id)
    }

    /// Index `frame_id` under `(file, page_id)` and mark it pinned.
    fn publish(
        &self,
        state: &mut PoolState,
        file: &FileHandle,
        page_id: PageId,
        frame_id: FrameId,
    ) -> Result<()> {
        if let Err(e) = state.index.insert(file.id(), page_id, frame_id) {
            state.table[frame_id].clear();
            return Err(e);
        }
        state.table[frame_id].set(file.clone(), page_id);
        Ok(())
    }
}

impl Drop for BufferPoolManager {
    /// Write back every dirty page, pinned or not. Failures are logged.
    fn drop(&mut self) {
        let state = self.state.get_mut();

        for desc in state.table.iter().filter(|d| d.is_dirty()) {
            let Some((file, page_id)) = desc.resident() else {
                continue;
            };

            let frame_id = desc.frame_id();
            match file.write_page(page_id, &self.frames.read(frame_id)) {
                Ok(()) => debug!("Flushed {} from {} on shutdown", page_id, frame_id),
                Err(e) => warn!(
                    "Lost dirty {} of {} from {} on shutdown: {}",
                    page_id,
                    file.id(),
                    frame_id,
                    e
                ),
            }
        }
    }
}
