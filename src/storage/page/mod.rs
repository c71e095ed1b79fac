//! Page type.
//!
//! The buffer pool treats a [`Page`] as an opaque 4KB buffer; headers and
//! record layouts are interpreted by the layers above it.

#[allow(clippy::module_inception)]
mod page;

pub use page::Page;
