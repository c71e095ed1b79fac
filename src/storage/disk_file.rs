//! Disk file - a [`PagedFile`] backed by one OS file.

use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use parking_lot::Mutex;

use crate::common::config::PAGE_SIZE;
use crate::common::{PageId, Result};
use crate::storage::page::Page;
use crate::storage::PagedFile;

/// A paged file stored as one OS file of contiguous pages.
///
/// # File Layout
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// │ (4KB)   │ (4KB)   │ (4KB)   │         │ (4KB)   │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096     8192    ...    N×4096
/// ```
///
/// # Disposal
/// Disposed page numbers go on an in-memory free list and are handed out
/// again by [`allocate_page`](PagedFile::allocate_page) before the file
/// grows. The free list is not persisted: after a reopen every page below
/// the file length counts as allocated.
///
/// # Durability
/// Writes and allocations are followed by `fsync()`.
pub struct DiskFile {
    inner: Mutex<DiskState>,
}

struct DiskState {
    file: File,
    /// Number of page slots in the file.
    page_count: u32,
    /// Disposed page numbers available for reuse.
    free_pages: BTreeSet<PageId>,
}

impl DiskState {
    fn check_allocated(&self, page_id: PageId) -> io::Result<()> {
        if page_id.0 >= self.page_count {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is beyond the end of the file", page_id),
            ));
        }
        if self.free_pages.contains(&page_id) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} has been disposed", page_id),
            ));
        }
        Ok(())
    }

    fn write_at(&mut self, page_id: PageId, bytes: &[u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(page_id.offset(PAGE_SIZE)))?;
        self.file.write_all(bytes)?;
        self.file.sync_all()
    }
}

impl DiskFile {
    /// Create a new paged file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self::from_parts(file, 0))
    }

    /// Open an existing paged file.
    ///
    /// A trailing partial page (e.g. from a torn extension) is ignored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let file_size = file.metadata()?.len();
        let page_count = (file_size / PAGE_SIZE as u64) as u32;

        Ok(Self::from_parts(file, page_count))
    }

    /// Open an existing paged file, or create it if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    fn from_parts(file: File, page_count: u32) -> Self {
        Self {
            inner: Mutex::new(DiskState {
                file,
                page_count,
                free_pages: BTreeSet::new(),
            }),
        }
    }

    /// Number of page slots in the file, including disposed ones.
    pub fn page_count(&self) -> u32 {
        self.inner.lock().page_count
    }

    /// Number of disposed pages waiting to be reused.
    pub fn free_page_count(&self) -> usize {
        self.inner.lock().free_pages.len()
    }

    /// Total size of the file in bytes.
    pub fn file_size(&self) -> u64 {
        PageId::new(self.page_count()).offset(PAGE_SIZE)
    }
}

impl PagedFile for DiskFile {
    fn read_page(&self, page_id: PageId, page: &mut Page) -> io::Result<()> {
        let mut state = self.inner.lock();
        state.check_allocated(page_id)?;

        state.file.seek(SeekFrom::Start(page_id.offset(PAGE_SIZE)))?;
        state.file.read_exact(page.as_mut_slice())
    }

    fn write_page(&self, page_id: PageId, page: &Page) -> io::Result<()> {
        let mut state = self.inner.lock();
        state.check_allocated(page_id)?;
        state.write_at(page_id, page.as_slice())
    }

    fn allocate_page(&self) -> io::Result<PageId> {
        let mut state = self.inner.lock();

        let page_id = match state.free_pages.pop_first() {
            Some(page_id) => page_id,
            None => {
                if state.page_count == u32::MAX {
                    return Err(io::Error::other("page number space exhausted"));
                }
                PageId::new(state.page_count)
            }
        };

        // Reused or fresh, the page starts out zeroed on disk
        let zeros = [0u8; PAGE_SIZE];
        if let Err(e) = state.write_at(page_id, &zeros) {
            if page_id.0 < state.page_count {
                state.free_pages.insert(page_id);
            }
            return Err(e);
        }

        if page_id.0 == state.page_count {
            state.page_count += 1;
        }
        Ok(page_id)
    }

    fn dispose_page(&self, page_id: PageId) -> io::Result<()> {
        let mut state = self.inner.lock();
        state.check_allocated(page_id)?;
        state.free_pages.insert(page_id);
        Ok(())
    }
}
