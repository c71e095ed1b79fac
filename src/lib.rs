//! clockpool - a disk-backed page cache with clock replacement.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Query execution (caller)                       │
//! │   fetch_page / unpin_page / allocate_page / dispose_page /      │
//! │   flush_file                                                    │
//! └─────────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   Buffer Pool (buffer/)                         │
//! │   BufferPoolManager                                             │
//! │     ├── PageIndex      (file, page) → frame                     │
//! │     ├── FrameTable     pin count, dirty, reference bit          │
//! │     ├── FrameStore     one 4KB buffer per frame                 │
//! │     └── ClockReplacer  second-chance victim selection           │
//! └─────────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   Storage (storage/)                            │
//! │   PagedFile trait ── DiskFile | MemFile                         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, FrameId, FileId, Error, config)
//! - [`buffer`] - Buffer pool management and clock replacement
//! - [`storage`] - The paged file contract and implementations
//!
//! # Quick Start
//! ```no_run
//! use clockpool::storage::{DiskFile, FileHandle};
//! use clockpool::BufferPoolManager;
//!
//! let file = FileHandle::new(DiskFile::open_or_create("my_table.db")?);
//! let bpm = BufferPoolManager::new(clockpool::DEFAULT_POOL_SIZE);
//!
//! let (page_id, mut page) = bpm.allocate_page(&file)?;
//! page.write().as_mut_slice()[..5].copy_from_slice(b"hello");
//! drop(page);
//!
//! let page = bpm.fetch_page(&file, page_id)?;
//! assert_eq!(&page.read().as_slice()[..5], b"hello");
//! # Ok::<(), clockpool::Error>(())
//! ```

pub mod buffer;
pub mod common;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::{DEFAULT_POOL_SIZE, PAGE_SIZE};
pub use common::{Error, FileId, FrameId, PageId, Result};

pub use buffer::{BufferPoolManager, BufferPoolStats, PageHandle, PoolDump, StatsSnapshot};
pub use storage::page::Page;
pub use storage::{DiskFile, FileHandle, MemFile, PagedFile};
