//! Storage layer errors.

use thiserror::Error;

use crate::storage::PageId;

/// Storage layer errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Page not found in storage.
    ///
    /// This occurs when attempting to read or write a page that has not been
    /// allocated yet. Use `allocate_page` to create new pages.
    #[error("page not found: {0}")]
    PageNotFound(PageId),

    /// Invalid buffer size provided to read_page or write_page.
    ///
    /// Buffers must be exactly PAGE_SIZE bytes.
    #[error("invalid buffer size: expected {expected}, got {actual}")]
    InvalidBufferSize {
        /// Expected buffer size (PAGE_SIZE)
        expected: usize,
        /// Actual buffer size provided
        actual: usize,
    },

    /// I/O error from underlying file system.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Storage is full (cannot allocate new pages).
    ///
    /// Returned by `MemoryStorage::with_max_pages` once the limit is reached.
    #[error("storage is full")]
    StorageFull,

    /// Data corruption detected.
    ///
    /// This indicates that the storage file has an invalid format or size.
    #[error("data corruption: {0}")]
    Corrupted(String),

    /// The page is already on the free list.
    #[error("page {0} is already free")]
    PageAlreadyFree(PageId),

    /// A file entry with this name is already registered.
    #[error("file entry already exists: {0}")]
    FileEntryExists(String),

    /// No file entry is registered under this name.
    #[error("file entry not found: {0}")]
    FileEntryNotFound(String),

    /// The file name is empty or too long.
    #[error("invalid file name: {0:?}")]
    InvalidFileName(String),
}
