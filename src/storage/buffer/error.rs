//! Buffer pool errors.

use thiserror::Error;

use crate::storage::StorageError;

/// Buffer pool errors.
///
/// This error type wraps storage-level errors and adds buffer-pool-specific
/// error conditions.
#[derive(Debug, Error)]
pub enum BufferPoolError {
    /// No free frames available and all pages are pinned.
    ///
    /// This occurs when the buffer pool is full and no unpinned pages
    /// are available for eviction. Either increase the pool size or
    /// ensure pages are being unpinned after use.
    #[error("buffer pool exhausted: all frames are pinned")]
    NoFreeFrames,

    /// Underlying storage error.
    ///
    /// This includes `StorageError::PageNotFound` when attempting to fetch
    /// a page that doesn't exist in storage.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Invalid buffer pool configuration.
    #[error("configuration error: {message}")]
    Config {
        /// What is wrong with the configuration.
        message: String,
    },
}
