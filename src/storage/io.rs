//! Page I/O backend implementations.
//!
//! This module provides the `Storage` trait for page-based I/O operations,
//! along with MemoryStorage and FileStorage implementations.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use super::page::PageId;
use crate::storage::error::StorageError;

/// Page I/O backend trait for page-based storage.
///
/// Storage reads and writes raw page images using caller-owned buffers. It
/// does not cache pages and does not interpret page contents; caching is the
/// buffer pool's job and allocation policy (free lists) belongs to the
/// [`DiskManager`](crate::storage::DiskManager).
///
/// Implementations:
/// - `io::MemoryStorage`: In-memory storage
/// - `io::FileStorage`: Single file of contiguous pages
///
/// # Thread Safety
///
/// Implementations must be thread-safe (Sync + Send) so a pool can be shared
/// by reference.
pub trait Storage: Send + Sync {
    /// Reads a page into caller-provided buffer.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::PageNotFound` if the page has not been allocated.
    /// Returns `StorageError::InvalidBufferSize` if `buf.len() != PAGE_SIZE`.
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Writes a page from caller-provided buffer.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::PageNotFound` if the page has not been allocated.
    /// Returns `StorageError::InvalidBufferSize` if `buf.len() != PAGE_SIZE`.
    fn write_page(&self, page_id: PageId, buf: &[u8]) -> Result<(), StorageError>;

    /// Grows the storage by one zeroed page and returns its PageId.
    ///
    /// The first call on an empty storage returns `PageId(0)`; ids are
    /// assigned sequentially.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::StorageFull` if storage limit is reached.
    fn allocate_page(&self) -> Result<PageId, StorageError>;

    /// Returns the total number of allocated pages.
    fn page_count(&self) -> usize;

    /// Syncs all pending writes to physical disk (fsync).
    ///
    /// For io::MemoryStorage, this is a no-op.
    fn sync_all(&self) -> Result<(), StorageError>;
}

/// Rejects buffers that are not exactly one page long.
fn check_buffer_size(len: usize) -> Result<(), StorageError> {
    if len != super::PAGE_SIZE {
        return Err(StorageError::InvalidBufferSize {
            expected: super::PAGE_SIZE,
            actual: len,
        });
    }
    Ok(())
}
