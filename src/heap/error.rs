//! Error types for the heap module.

use thiserror::Error;

use crate::storage::{BufferPoolError, PageError, PageId, StorageError};

use super::page::RecordId;

/// Broad classes of heap failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller passed something the heap cannot accept.
    InvalidArgument,
    /// The heap's own structures are inconsistent.
    InvalidState,
    /// A lower layer ran out of frames, pages or I/O.
    ResourceExhausted,
}

/// Errors from heap operations.
#[derive(Debug, Error)]
pub enum HeapError {
    /// Record does not fit in a single page.
    #[error("record of {size} bytes exceeds the maximum of {max}")]
    RecordTooLarge {
        /// Size of the rejected record.
        size: usize,
        /// Largest record a page can hold.
        max: usize,
    },
    /// RID does not name a live record of this file.
    #[error("invalid record id {0}")]
    InvalidRecordId(RecordId),
    /// Record size mismatch for in-place update.
    #[error("record size mismatch: expected {expected} bytes, got {actual}")]
    RecordSizeMismatch {
        /// Expected size (existing record).
        expected: usize,
        /// Actual size (new record).
        actual: usize,
    },
    /// A directory entry points at a data page with no records.
    #[error("directory entry for page {0} refers to an empty data page")]
    EmptyDataPage(PageId),
    /// No directory entry exists for a data page.
    #[error("no directory entry for data page {0}")]
    DirectoryEntryNotFound(PageId),
    /// A page does not have the layout the heap expects.
    #[error("heap corruption: {0}")]
    Corrupted(String),
    /// Unexpected slot-level failure.
    #[error("page error: {0}")]
    Page(#[from] PageError),
    /// Buffer pool failure.
    #[error("buffer pool error: {0}")]
    BufferPool(#[from] BufferPoolError),
    /// Disk manager failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl HeapError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            HeapError::RecordTooLarge { .. }
            | HeapError::InvalidRecordId(_)
            | HeapError::RecordSizeMismatch { .. }
            | HeapError::Storage(
                StorageError::InvalidFileName(_)
                | StorageError::FileEntryExists(_)
                | StorageError::FileEntryNotFound(_),
            ) => ErrorKind::InvalidArgument,
            HeapError::EmptyDataPage(_)
            | HeapError::DirectoryEntryNotFound(_)
            | HeapError::Corrupted(_)
            | HeapError::Page(_) => ErrorKind::InvalidState,
            HeapError::BufferPool(_) | HeapError::Storage(_) => ErrorKind::ResourceExhausted,
        }
    }
}
