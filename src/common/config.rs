//! Configuration constants for the buffer pool.

/// Size of a page in bytes (4KB).
///
/// Every frame in the pool holds exactly one page of this size, and every
/// [`PagedFile`](crate::storage::PagedFile) reads and writes in units of it.
pub const PAGE_SIZE: usize = 4096;

/// Number of frames used when the caller has no better figure.
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Page index capacity relative to the pool size.
///
/// The index never holds more than one entry per frame; the slack keeps
/// the hash map from rehashing when the pool is full.
pub const PAGE_INDEX_LOAD_FACTOR: f64 = 1.2;

/// Initial capacity of the page index for a pool of `pool_size` frames.
pub fn page_index_capacity(pool_size: usize) -> usize {
    (pool_size as f64 * PAGE_INDEX_LOAD_FACTOR) as usize + 1
}
