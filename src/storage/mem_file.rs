//! In-memory paged file with I/O accounting.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::common::PageId;
use crate::storage::page::Page;
use crate::storage::PagedFile;

/// A volatile [`PagedFile`] kept entirely in memory.
///
/// Every call is counted (successful or not), and reads, writes, allocations
/// and disposals can be switched to fail with an injected I/O error. This
/// makes it the collaborator of choice when the buffer pool's I/O behaviour
/// itself is under observation.
///
/// # Example
/// ```
/// use clockpool::storage::{MemFile, PagedFile};
/// use clockpool::Page;
///
/// let file = MemFile::with_pages(2);
/// let mut page = Page::new();
/// file.read_page(clockpool::PageId::new(1), &mut page).unwrap();
/// assert_eq!(file.counters().reads, 1);
/// ```
#[derive(Default)]
pub struct MemFile {
    /// Slot per page number; `None` marks a disposed page.
    pages: Mutex<Vec<Option<Box<Page>>>>,
    reads: AtomicU64,
    writes: AtomicU64,
    allocations: AtomicU64,
    disposals: AtomicU64,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_allocations: AtomicBool,
    fail_disposals: AtomicBool,
}

/// Number of calls a [`MemFile`] has received, per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoCounters {
    pub reads: u64,
    pub writes: u64,
    pub allocations: u64,
    pub disposals: u64,
}

fn injected(op: &str) -> io::Error {
    io::Error::other(format!("injected {} failure", op))
}

impl MemFile {
    /// Create an empty file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a file with `count` zeroed pages, numbered from 0.
    ///
    /// The pre-allocation is not counted.
    pub fn with_pages(count: u32) -> Self {
        let file = Self::new();
        {
            let mut pages = file.pages.lock();
            pages.extend((0..count).map(|_| Some(Box::new(Page::new()))));
        }
        file
    }

    /// Snapshot of the call counters.
    pub fn counters(&self) -> IoCounters {
        IoCounters {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            allocations: self.allocations.load(Ordering::Relaxed),
            disposals: self.disposals.load(Ordering::Relaxed),
        }
    }

    /// Make subsequent reads fail (or succeed again).
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Relaxed);
    }

    /// Make subsequent writes fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Make subsequent allocations fail (or succeed again).
    pub fn fail_allocations(&self, fail: bool) {
        self.fail_allocations.store(fail, Ordering::Relaxed);
    }

    /// Make subsequent disposals fail (or succeed again).
    pub fn fail_disposals(&self, fail: bool) {
        self.fail_disposals.store(fail, Ordering::Relaxed);
    }

    /// Copy of the stored bytes of `page_id`, bypassing the counters.
    ///
    /// Returns `None` for unallocated or disposed pages.
    pub fn stored_bytes(&self, page_id: PageId) -> Option<Vec<u8>> {
        let pages = self.pages.lock();
        pages
            .get(page_id.0 as usize)
            .and_then(|slot| slot.as_ref())
            .map(|page| page.as_slice().to_vec())
    }

    /// Number of live (allocated, not disposed) pages.
    pub fn live_pages(&self) -> usize {
        self.pages.lock().iter().filter(|slot| slot.is_some()).count()
    }
}

fn missing(page_id: PageId) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} is not allocated", page_id),
    )
}

impl PagedFile for MemFile {
    fn read_page(&self, page_id: PageId, page: &mut Page) -> io::Result<()> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(injected("read"));
        }

        let pages = self.pages.lock();
        match pages.get(page_id.0 as usize) {
            Some(Some(stored)) => {
                page.copy_from(stored);
                Ok(())
            }
            _ => Err(missing(page_id)),
        }
    }

    fn write_page(&self, page_id: PageId, page: &Page) -> io::Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(injected("write"));
        }

        let mut pages = self.pages.lock();
        match pages.get_mut(page_id.0 as usize) {
            Some(Some(stored)) => {
                stored.copy_from(page);
                Ok(())
            }
            _ => Err(missing(page_id)),
        }
    }

    fn allocate_page(&self) -> io::Result<PageId> {
        self.allocations.fetch_add(1, Ordering::Relaxed);
        if self.fail_allocations.load(Ordering::Relaxed) {
            return Err(injected("allocation"));
        }

        let mut pages = self.pages.lock();
        // Lowest disposed slot first, like DiskFile
        if let Some(slot) = pages.iter().position(|slot| slot.is_none()) {
            pages[slot] = Some(Box::new(Page::new()));
            return Ok(PageId::new(slot as u32));
        }

        let next = u32::try_from(pages.len())
            .map_err(|_| io::Error::other("page number space exhausted"))?;
        pages.push(Some(Box::new(Page::new())));
        Ok(PageId::new(next))
    }

    fn dispose_page(&self, page_id: PageId) -> io::Result<()> {
        self.disposals.fetch_add(1, Ordering::Relaxed);
        if self.fail_disposals.load(Ordering::Relaxed) {
            return Err(injected("dispose"));
        }

        let mut pages = self.pages.lock();
        match pages.get_mut(page_id.0 as usize) {
            Some(slot) if slot.is_some() => {
                *slot = None;
                Ok(())
            }
            _ => Err(missing(page_id)),
        }
    }
}
