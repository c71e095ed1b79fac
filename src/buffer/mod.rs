//! Buffer pool management.
//!
//! The buffer pool is the in-memory cache between the query layer and
//! paged files. It manages a fixed pool of frames, each holding one page.
//!
//! # Components
//! - [`BufferPoolManager`] - The main page cache
//! - [`PageHandle`] - RAII pin guard for page access
//! - [`BufferPoolStats`] - Performance statistics
//! - [`PoolDump`] - Frame occupancy snapshot for debugging
//!
//! Internally the pool keeps a frame table (per-frame bookkeeping), a page
//! index (`(file, page)` to frame), a frame store (the page buffers) and a
//! clock replacer.

mod buffer_pool_manager;
mod dump;
mod frame;
mod frame_store;
mod page_guard;
mod page_index;
mod replacer;
mod stats;

pub use buffer_pool_manager::BufferPoolManager;
pub use dump::{FrameSnapshot, PoolDump};
pub use page_guard::PageHandle;
pub use stats::{BufferPoolStats, StatsSnapshot};
