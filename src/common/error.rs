//! Error types for the buffer pool.

use thiserror::Error;

use super::{FileId, FrameId, PageId};

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors the buffer pool reports to its caller.
///
/// Nothing is retried internally; every variant reaches the immediate
/// caller of the failing operation.
#[derive(Debug, Error)]
pub enum Error {
    /// Every frame stayed pinned across two full clock sweeps.
    #[error("No evictable frame available in buffer pool")]
    PoolExhausted,

    /// The paged file failed to read, write, allocate or dispose a page.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The page had to be resident but is not in the pool.
    #[error("{page} of {file} is not resident")]
    PageNotResident { file: FileId, page: PageId },

    /// Unpin was called on a page whose pin count is already zero.
    #[error("{page} of {file} is not pinned")]
    PageNotPinned { file: FileId, page: PageId },

    /// A flush ran into a page somebody still holds.
    #[error("{page} of {file} is pinned")]
    PagePinned { file: FileId, page: PageId },

    /// The page index disagrees with the frame table (e.g. duplicate key).
    #[error("Page index corrupted at {page} of {file}")]
    IndexCorruption { file: FileId, page: PageId },

    /// A frame is tagged with a file but holds no valid page.
    #[error("{frame} is tagged with a file but holds no valid page")]
    InvalidFrameState { frame: FrameId },
}
