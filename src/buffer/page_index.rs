//! Page index - maps resident pages to the frames holding them.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::common::config::page_index_capacity;
use crate::common::{Error, FileId, FrameId, PageId, Result};

/// Lookup table from `(file, page)` to frame.
///
/// Entries are only ever added and removed explicitly by the buffer pool;
/// there is no expiry.
#[derive(Debug, Default)]
pub struct PageIndex {
    entries: HashMap<(FileId, PageId), FrameId>,
}

impl PageIndex {
    /// Create an index sized for a pool of `pool_size` frames.
    pub fn with_pool_size(pool_size: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(page_index_capacity(pool_size)),
        }
    }

    /// Map `(file, page)` to `frame_id`.
    ///
    /// # Errors
    /// `Error::IndexCorruption` if the key is already present; the existing
    /// entry is left in place.
    pub fn insert(&mut self, file: FileId, page: PageId, frame_id: FrameId) -> Result<()> {
        match self.entries.entry((file, page)) {
            Entry::Occupied(_) => Err(Error::IndexCorruption { file, page }),
            Entry::Vacant(slot) => {
                slot.insert(frame_id);
                Ok(())
            }
        }
    }

    /// Frame holding `(file, page)`, if resident.
    #[inline]
    pub fn lookup(&self, file: FileId, page: PageId) -> Option<FrameId> {
        self.entries.get(&(file, page)).copied()
    }

    /// Drop the entry for `(file, page)`, returning the frame it mapped to.
    #[inline]
    pub fn remove(&mut self, file: FileId, page: PageId) -> Option<FrameId> {
        self.entries.remove(&(file, page))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
