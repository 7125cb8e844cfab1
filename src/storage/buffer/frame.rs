//! Buffer pool frames and their bookkeeping.

use parking_lot::Mutex;

use crate::storage::{PAGE_SIZE, PageId};

/// Index into the pool's frame array.
pub(crate) type FrameId = usize;

/// One in-memory page slot.
///
/// The page bytes sit behind their own mutex so guards can read and write
/// them without taking the pool state lock.
pub(crate) struct Frame {
    pub(crate) data: Mutex<Box<[u8]>>,
}

impl Frame {
    pub(crate) fn new() -> Self {
        Self {
            data: Mutex::new(vec![0u8; PAGE_SIZE].into_boxed_slice()),
        }
    }
}

/// Per-frame metadata, guarded by the pool state lock.
#[derive(Debug, Default)]
pub(crate) struct FrameMetadata {
    /// Page held by this frame, or None if the frame is free.
    pub(crate) page_id: Option<PageId>,
    /// Number of live guards on this frame.
    pub(crate) pin_count: u32,
    /// Whether the frame differs from the page on disk.
    pub(crate) is_dirty: bool,
    /// The page was freed while pinned; deallocate on the last unpin.
    pub(crate) pending_free: bool,
}

impl FrameMetadata {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Clears the metadata when the frame is returned to the free list.
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}
