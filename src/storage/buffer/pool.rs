//! Buffer pool for caching pages in memory.
//!
//! The buffer pool sits between the disk manager and the heap layer, caching
//! pages in a fixed number of frames under a pin/unpin discipline.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::storage::{DiskManager, PageId, Storage};

use super::config::BufferPoolConfig;
use super::error::BufferPoolError;
use super::frame::{Frame, FrameId, FrameMetadata};
use super::guard::PageGuard;
use super::replacer::{LruReplacer, Replacer};

/// Buffer pool for caching pages in memory.
///
/// The buffer pool maintains a fixed number of frames (in-memory page slots)
/// and maps pages from storage to these frames on demand. When all frames
/// are in use, the replacement policy selects an unpinned victim frame for
/// eviction; dirty victims are written back first.
///
/// Every successful [`fetch_page`](Self::fetch_page) or
/// [`new_page`](Self::new_page) returns a [`PageGuard`] holding one pin. The
/// pin is released when the guard is dropped.
///
/// # Latch Hierarchy
///
/// Locks are acquired in this order:
/// 1. State mutex (page_table, frame_metadata, free_list, replacer)
/// 2. Frame data mutex
/// 3. Disk manager state
///
/// Guard closures hold only a frame mutex and never reach the state lock.
pub struct BufferPool<S: Storage, R: Replacer = LruReplacer> {
    disk: DiskManager<S>,

    /// Frame array - each frame's data is protected by its own mutex.
    frames: Vec<Frame>,

    state: Mutex<BufferPoolState<R>>,

    pool_size: usize,
}

/// Mutable state protected by the state mutex.
struct BufferPoolState<R: Replacer> {
    /// Maps PageId -> FrameId for quick lookup.
    page_table: HashMap<PageId, FrameId>,

    /// Metadata for each frame (indexed by FrameId).
    frame_metadata: Vec<FrameMetadata>,

    /// Free frames (not currently holding any page).
    free_list: Vec<FrameId>,

    /// Replacement policy for selecting eviction victims.
    replacer: R,
}

impl<S: Storage> BufferPool<S, LruReplacer> {
    /// Creates a pool with an LRU replacer from a configuration.
    ///
    /// # Errors
    ///
    /// Returns `BufferPoolError::Config` if the configuration is invalid.
    pub fn with_config(storage: S, config: &BufferPoolConfig) -> Result<Self, BufferPoolError> {
        config.validate()?;
        Ok(Self::new(
            storage,
            LruReplacer::new(config.pool_size),
            config.pool_size,
        ))
    }
}

impl<S: Storage, R: Replacer> BufferPool<S, R> {
    /// Creates a new buffer pool.
    ///
    /// # Panics
    ///
    /// Panics if `pool_size` is 0.
    pub fn new(storage: S, replacer: R, pool_size: usize) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let frames = (0..pool_size).map(|_| Frame::new()).collect();
        let frame_metadata = (0..pool_size).map(|_| FrameMetadata::new()).collect();

        // Popped from the back, so frame 0 is handed out first.
        let free_list = (0..pool_size).rev().collect();

        let state = BufferPoolState {
            page_table: HashMap::with_capacity(pool_size),
            frame_metadata,
            free_list,
            replacer,
        };

        Self {
            disk: DiskManager::new(storage),
            frames,
            state: Mutex::new(state),
            pool_size,
        }
    }

    /// Pins a page, reading it from disk on a miss.
    ///
    /// # Errors
    ///
    /// - `BufferPoolError::NoFreeFrames` if the pool is full and all pages are pinned
    /// - `BufferPoolError::Storage` if the page doesn't exist or I/O fails
    pub fn fetch_page(&self, page_id: PageId) -> Result<PageGuard<'_, S, R>, BufferPoolError> {
        let mut state = self.state.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let meta = &mut state.frame_metadata[frame_id];
            if meta.pending_free {
                return Err(crate::storage::StorageError::PageNotFound(page_id).into());
            }
            meta.pin_count += 1;
            if meta.pin_count == 1 {
                state.replacer.pin(frame_id);
            }
            tracing::trace!(%page_id, frame_id, "page hit");
            return Ok(PageGuard::new(self, frame_id, page_id));
        }

        let frame_id = self.allocate_frame(&mut state)?;
        let read_result = {
            let mut data = self.frames[frame_id].data.lock();
            self.disk.read_page(page_id, &mut data)
        };
        if let Err(e) = read_result {
            state.free_list.push(frame_id);
            return Err(e.into());
        }

        Self::install(&mut state, frame_id, page_id);
        tracing::trace!(%page_id, frame_id, "page miss");
        Ok(PageGuard::new(self, frame_id, page_id))
    }

    /// Allocates a new page on disk and pins a zeroed frame for it.
    ///
    /// # Errors
    ///
    /// - `BufferPoolError::NoFreeFrames` if the pool is full and all pages are pinned
    /// - `BufferPoolError::Storage` if disk allocation fails
    pub fn new_page(&self) -> Result<PageGuard<'_, S, R>, BufferPoolError> {
        let mut state = self.state.lock();

        let frame_id = self.allocate_frame(&mut state)?;
        let page_id = match self.disk.allocate_page() {
            Ok(page_id) => page_id,
            Err(e) => {
                state.free_list.push(frame_id);
                return Err(e.into());
            }
        };

        self.frames[frame_id].data.lock().fill(0);
        Self::install(&mut state, frame_id, page_id);
        Ok(PageGuard::new(self, frame_id, page_id))
    }

    /// Drops a page from the pool and returns it to the disk manager.
    ///
    /// The cached copy is discarded without write-back. If the page is still
    /// pinned, the frame stays readable by its holders and the page is
    /// deallocated when the last pin is released.
    ///
    /// # Errors
    ///
    /// Returns `BufferPoolError::Storage` if the disk manager rejects the page.
    pub fn free_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        let mut state = self.state.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let meta = &mut state.frame_metadata[frame_id];
            if meta.pending_free {
                return Err(crate::storage::StorageError::PageAlreadyFree(page_id).into());
            }
            if meta.pin_count > 0 {
                meta.pending_free = true;
                tracing::debug!(%page_id, pin_count = meta.pin_count, "deferred page free");
                return Ok(());
            }
            self.disk.deallocate_page(page_id)?;
            state.page_table.remove(&page_id);
            state.frame_metadata[frame_id].reset();
            state.replacer.remove(frame_id);
            state.free_list.push(frame_id);
        } else {
            self.disk.deallocate_page(page_id)?;
        }

        tracing::debug!(%page_id, "freed page");
        Ok(())
    }

    /// Releases one pin on a page (called from `PageGuard::drop`).
    ///
    /// Unpinning a page that holds no pin is logged and otherwise ignored.
    pub(super) fn unpin_page(&self, page_id: PageId, is_dirty: bool) {
        let mut state = self.state.lock();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            tracing::warn!(%page_id, "unpin of page not in buffer pool");
            return;
        };

        let meta = &mut state.frame_metadata[frame_id];
        if meta.pin_count == 0 {
            tracing::warn!(%page_id, "unpin of page with pin count 0");
            return;
        }

        meta.pin_count -= 1;
        meta.is_dirty |= is_dirty;
        if meta.pin_count > 0 {
            return;
        }

        if meta.pending_free {
            state.page_table.remove(&page_id);
            state.frame_metadata[frame_id].reset();
            state.free_list.push(frame_id);
            match self.disk.deallocate_page(page_id) {
                Ok(()) => tracing::debug!(%page_id, "freed page on last unpin"),
                Err(e) => tracing::warn!(%page_id, error = %e, "deferred page free failed"),
            }
        } else {
            state.replacer.unpin(frame_id);
        }
    }

    /// Writes a page back to disk if it is cached and dirty.
    ///
    /// # Errors
    ///
    /// Returns `BufferPoolError::Storage` if the write fails.
    pub fn flush_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        let mut state = self.state.lock();
        if let Some(&frame_id) = state.page_table.get(&page_id) {
            self.write_back(&mut state, frame_id, page_id)?;
        }
        Ok(())
    }

    /// Writes every dirty page back to disk and syncs the storage.
    ///
    /// # Errors
    ///
    /// Returns `BufferPoolError::Storage` if any write fails.
    pub fn flush_all(&self) -> Result<(), BufferPoolError> {
        let mut state = self.state.lock();
        let cached: Vec<(PageId, FrameId)> = state
            .page_table
            .iter()
            .map(|(&page_id, &frame_id)| (page_id, frame_id))
            .collect();
        for (page_id, frame_id) in cached {
            self.write_back(&mut state, frame_id, page_id)?;
        }
        self.disk.sync_all()?;
        Ok(())
    }

    /// Returns the number of frames in the buffer pool.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Returns the number of frames with no pin on them.
    pub fn unpinned_frame_count(&self) -> usize {
        self.pool_size - self.pinned_frame_count()
    }

    /// Returns the number of frames holding at least one pin.
    pub fn pinned_frame_count(&self) -> usize {
        let state = self.state.lock();
        state
            .frame_metadata
            .iter()
            .filter(|meta| meta.pin_count > 0)
            .count()
    }

    /// Returns the number of pages currently in the buffer pool.
    pub fn page_count(&self) -> usize {
        self.state.lock().page_table.len()
    }

    /// Returns the disk manager behind this pool.
    pub fn disk(&self) -> &DiskManager<S> {
        &self.disk
    }

    pub(super) fn frame(&self, frame_id: FrameId) -> &Frame {
        &self.frames[frame_id]
    }

    fn install(state: &mut BufferPoolState<R>, frame_id: FrameId, page_id: PageId) {
        state.page_table.insert(page_id, frame_id);
        let meta = &mut state.frame_metadata[frame_id];
        meta.page_id = Some(page_id);
        meta.pin_count = 1;
        meta.is_dirty = false;
        meta.pending_free = false;
    }

    fn write_back(
        &self,
        state: &mut BufferPoolState<R>,
        frame_id: FrameId,
        page_id: PageId,
    ) -> Result<(), BufferPoolError> {
        let meta = &state.frame_metadata[frame_id];
        if !meta.is_dirty || meta.pending_free {
            return Ok(());
        }
        {
            let data = self.frames[frame_id].data.lock();
            self.disk.write_page(page_id, &data)?;
        }
        state.frame_metadata[frame_id].is_dirty = false;
        tracing::debug!(%page_id, frame_id, "wrote back dirty page");
        Ok(())
    }

    /// Takes a free frame, evicting an unpinned page if necessary.
    ///
    /// A victim whose write-back fails stays cached and evictable.
    fn allocate_frame(&self, state: &mut BufferPoolState<R>) -> Result<FrameId, BufferPoolError> {
        if let Some(frame_id) = state.free_list.pop() {
            return Ok(frame_id);
        }

        let frame_id = state
            .replacer
            .evict()
            .ok_or(BufferPoolError::NoFreeFrames)?;

        if let Some(old_page_id) = state.frame_metadata[frame_id].page_id {
            if let Err(e) = self.write_back(state, frame_id, old_page_id) {
                state.replacer.unpin(frame_id);
                return Err(e);
            }
            state.page_table.remove(&old_page_id);
            tracing::debug!(page_id = %old_page_id, frame_id, "evicted page");
        }
        state.frame_metadata[frame_id].reset();

        Ok(frame_id)
    }
}
