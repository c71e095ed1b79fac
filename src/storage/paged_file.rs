//! The paged file contract consumed by the buffer pool.

use std::fmt;
use std::io;
use std::ops::Deref;
use std::sync::Arc;

use crate::common::{FileId, PageId};
use crate::storage::page::Page;

/// A file addressed in fixed-size pages.
///
/// This is the only thing the buffer pool knows about storage. Methods take
/// `&self` because the pool keeps shared handles to every file that owns a
/// resident page; implementations serialize their own I/O.
///
/// Failures are plain `io::Error`s. The pool wraps them in
/// [`Error::Io`](crate::Error::Io) and never retries.
pub trait PagedFile: Send + Sync {
    /// Fill `page` with the on-disk bytes of `page_id`.
    ///
    /// Fails on I/O error or when `page_id` is not an allocated page.
    fn read_page(&self, page_id: PageId, page: &mut Page) -> io::Result<()>;

    /// Persist `page` as the contents of `page_id`.
    fn write_page(&self, page_id: PageId, page: &Page) -> io::Result<()>;

    /// Reserve a new page number.
    fn allocate_page(&self) -> io::Result<PageId>;

    /// Release `page_id` for reuse.
    fn dispose_page(&self, page_id: PageId) -> io::Result<()>;
}

/// Shared handle to an open [`PagedFile`].
///
/// Cloning is cheap (one `Arc` increment). The handle's [`FileId`] is the
/// address of the shared file object, so every clone of one handle has the
/// same identity and distinct files never collide while both are open.
///
/// # Example
/// ```
/// use clockpool::storage::{FileHandle, MemFile};
///
/// let a = FileHandle::new(MemFile::new());
/// let b = FileHandle::new(MemFile::new());
/// assert_eq!(a.id(), a.clone().id());
/// assert_ne!(a.id(), b.id());
/// ```
#[derive(Clone)]
pub struct FileHandle {
    inner: Arc<dyn PagedFile>,
}

impl FileHandle {
    /// Wrap a file, taking ownership of it.
    pub fn new<F: PagedFile + 'static>(file: F) -> Self {
        Self {
            inner: Arc::new(file),
        }
    }

    /// Wrap a file that is already shared, e.g. to keep a typed handle on
    /// a [`MemFile`](crate::storage::MemFile) for inspecting its counters.
    pub fn from_arc<F: PagedFile + 'static>(file: Arc<F>) -> Self {
        Self { inner: file }
    }

    /// Identity of the underlying file.
    #[inline]
    pub fn id(&self) -> FileId {
        FileId(Arc::as_ptr(&self.inner) as *const () as usize)
    }
}

impl Deref for FileHandle {
    type Target = dyn PagedFile;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl PartialEq for FileHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for FileHandle {}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FileHandle").field(&self.id()).finish()
    }
}
