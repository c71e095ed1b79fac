//! Paged file identity.

use std::fmt;

/// Opaque identity of an open paged file.
///
/// Derived from the address of the shared file object (see
/// [`FileHandle::id`](crate::storage::FileHandle::id)). Two handles compare
/// equal exactly when they point at the same open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub usize);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File({:#x})", self.0)
    }
}
