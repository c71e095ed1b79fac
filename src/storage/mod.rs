//! Storage layer - the paged file contract and its implementations.
//!
//! The buffer pool talks to storage only through [`PagedFile`]:
//! - [`PagedFile`] / [`FileHandle`] - The contract and a shared handle to it
//! - [`DiskFile`] - A single OS file of contiguous pages
//! - [`MemFile`] - A volatile in-memory file with I/O counters
//! - [`page`] - The raw page buffer

mod disk_file;
mod mem_file;
pub mod page;
mod paged_file;

pub use disk_file::DiskFile;
pub use mem_file::{IoCounters, MemFile};
pub use paged_file::{FileHandle, PagedFile};
