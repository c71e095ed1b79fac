//! CLOCK (second-chance) replacement.
//!
//! The hand sweeps the frame table in order. A frame with its reference
//! bit set is spared once (the bit is cleared); pinned frames are skipped;
//! the first unpinned, unreferenced frame is the victim. Invalid frames are
//! taken immediately.

use log::trace;

use crate::buffer::frame::FrameTable;
use crate::buffer::frame_store::FrameStore;
use crate::buffer::page_index::PageIndex;
use crate::common::{Error, FileId, FrameId, PageId, Result};

/// Clock hand plus the victim selection policy.
///
/// The hand is plain per-pool state: two pools never share one.
#[derive(Debug)]
pub struct ClockReplacer {
    hand: usize,
    pool_size: usize,
}

/// A frame handed out by [`ClockReplacer::allocate_frame`], already reset
/// to the unused state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Victim {
    pub frame_id: FrameId,
    /// The page that occupied the frame, if one had to be evicted.
    pub evicted: Option<EvictedPage>,
}

/// A page pushed out of the pool to make room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictedPage {
    pub file: FileId,
    pub page: PageId,
    /// Whether the page was dirty and got written back first.
    pub written_back: bool,
}

impl ClockReplacer {
    /// Create a replacer for `pool_size` frames.
    ///
    /// The hand starts on the last frame.
    pub fn new(pool_size: usize) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");
        Self {
            hand: pool_size - 1,
            pool_size,
        }
    }

    /// Frame the next search starts at.
    #[inline]
    pub fn hand(&self) -> FrameId {
        FrameId::new(self.hand)
    }

    #[inline]
    fn advance(&mut self) {
        self.hand = (self.hand + 1) % self.pool_size;
    }

    /// Pick a frame for a new page, evicting its current page if needed.
    ///
    /// A dirty victim is written back through its own file before its index
    /// entry is removed. The returned frame is invalid and unpinned.
    ///
    /// # Errors
    /// - `Error::Io` if writing back a dirty victim fails. The victim keeps
    ///   its page, dirty bit and index entry, and the hand stays on it.
    /// - `Error::PoolExhausted` after `2 * pool_size` frames were passed
    ///   over. One sweep clears every reference bit, so a second sweep
    ///   without a victim means every frame is pinned.
    /// - `Error::InvalidFrameState` if a valid frame has no owner.
    pub fn allocate_frame(
        &mut self,
        table: &mut FrameTable,
        index: &mut PageIndex,
        store: &FrameStore,
    ) -> Result<Victim> {
        let mut examined = 0;

        while examined < 2 * self.pool_size {
            let frame_id = FrameId::new(self.hand);
            let desc = &mut table[frame_id];

            if !desc.is_valid() {
                self.advance();
                return Ok(Victim {
                    frame_id,
                    evicted: None,
                });
            }

            if desc.is_referenced() {
                desc.clear_referenced();
                examined += 1;
                self.advance();
                continue;
            }

            if desc.is_pinned() {
                examined += 1;
                self.advance();
                continue;
            }

            let (file, page) = match desc.resident() {
                Some((file, page)) => (file.clone(), page),
                None => return Err(Error::InvalidFrameState { frame: frame_id }),
            };

            let written_back = desc.is_dirty();
            if written_back {
                trace!("Writing back dirty {} from {}", page, frame_id);
                file.write_page(page, &store.read(frame_id))?;
                desc.clear_dirty();
            }

            index.remove(file.id(), page);
            desc.clear();
            self.advance();

            trace!("Evicted {} of {} from {}", page, file.id(), frame_id);
            return Ok(Victim {
                frame_id,
                evicted: Some(EvictedPage {
                    file: file.id(),
                    page,
                    written_back,
                }),
            });
        }

        Err(Error::PoolExhausted)
    }
}
