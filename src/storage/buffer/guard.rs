//! RAII guard for page access.
//!
//! A guard holds one pin on a page and releases it when dropped, so every
//! path out of a function, including `?`, leaves the pin count balanced.

use super::pool::BufferPool;
use super::replacer::{LruReplacer, Replacer};
use crate::storage::{PageId, Storage};

/// A pinned page in the buffer pool.
///
/// Page bytes are reached through [`read`](Self::read) and
/// [`write`](Self::write), which lock the frame only for the duration of the
/// closure. Closures must not call back into the pool.
///
/// # Example
///
/// ```
/// use heapfile::storage::{BufferPool, BufferPoolConfig, MemoryStorage};
///
/// # fn main() -> Result<(), heapfile::storage::BufferPoolError> {
/// let pool = BufferPool::with_config(MemoryStorage::new(), &BufferPoolConfig::default())?;
///
/// let mut guard = pool.new_page()?;
/// guard.write(|data| data[0] = 42);
/// let page_id = guard.page_id();
/// drop(guard);
///
/// let guard = pool.fetch_page(page_id)?;
/// assert_eq!(guard.read(|data| data[0]), 42);
/// # Ok(())
/// # }
/// ```
pub struct PageGuard<'a, S: Storage, R: Replacer = LruReplacer> {
    pool: &'a BufferPool<S, R>,
    frame_id: usize,
    page_id: PageId,
    is_dirty: bool,
}

impl<'a, S: Storage, R: Replacer> PageGuard<'a, S, R> {
    pub(super) fn new(pool: &'a BufferPool<S, R>, frame_id: usize, page_id: PageId) -> Self {
        Self {
            pool,
            frame_id,
            page_id,
            is_dirty: false,
        }
    }

    /// Returns the `PageId` of the guarded page.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Runs `f` over the page bytes.
    pub fn read<T>(&self, f: impl FnOnce(&[u8]) -> T) -> T {
        let data = self.pool.frame(self.frame_id).data.lock();
        f(&data)
    }

    /// Runs `f` over the mutable page bytes and marks the page dirty.
    pub fn write<T>(&mut self, f: impl FnOnce(&mut [u8]) -> T) -> T {
        self.is_dirty = true;
        let mut data = self.pool.frame(self.frame_id).data.lock();
        f(&mut data)
    }

    /// Marks the page dirty without touching it.
    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    /// Returns whether this guard will unpin the page as dirty.
    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }
}

impl<S: Storage, R: Replacer> std::fmt::Debug for PageGuard<'_, S, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageGuard")
            .field("page_id", &self.page_id)
            .field("frame_id", &self.frame_id)
            .field("is_dirty", &self.is_dirty)
            .finish()
    }
}

impl<S: Storage, R: Replacer> Drop for PageGuard<'_, S, R> {
    fn drop(&mut self) {
        self.pool.unpin_page(self.page_id, self.is_dirty);
    }
}
