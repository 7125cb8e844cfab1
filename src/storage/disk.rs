//! Disk manager: page allocation on top of a [`Storage`] backend.
//!
//! The storage backend only knows how to grow. The disk manager adds a free
//! list so deallocated pages are handed out again, a small library mapping
//! file names to their head page, and I/O counters.
//!
//! The free list and the file library live in memory for the lifetime of the
//! manager.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::error::StorageError;
use super::io::Storage;
use super::page::{PAGE_SIZE, PageId};

/// Maximum length in bytes of a file entry name.
pub const MAX_FILE_NAME_LEN: usize = 50;

/// Snapshot of the disk manager's I/O counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoStats {
    /// Pages read from storage.
    pub reads: u64,
    /// Pages written to storage.
    pub writes: u64,
    /// Pages handed out by `allocate_page`.
    pub allocations: u64,
    /// Pages returned through `deallocate_page`.
    pub deallocations: u64,
}

#[derive(Default)]
struct IoCounters {
    reads: AtomicU64,
    writes: AtomicU64,
    allocations: AtomicU64,
    deallocations: AtomicU64,
}

#[derive(Default)]
struct DiskState {
    /// Pages available for reuse, oldest first.
    free_list: VecDeque<PageId>,
    /// Same pages as `free_list`, for double-free detection.
    free_set: HashSet<PageId>,
    /// File name -> head page.
    file_entries: HashMap<String, PageId>,
}

/// Allocates, frees, reads and writes pages of one storage backend.
pub struct DiskManager<S: Storage> {
    storage: S,
    state: Mutex<DiskState>,
    counters: IoCounters,
}

impl<S: Storage> DiskManager<S> {
    /// Wraps a storage backend.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            state: Mutex::new(DiskState::default()),
            counters: IoCounters::default(),
        }
    }

    /// Returns the underlying storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Reads a page into `buf`.
    pub fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<(), StorageError> {
        self.storage.read_page(page_id, buf)?;
        self.counters.reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Writes `buf` to a page.
    pub fn write_page(&self, page_id: PageId, buf: &[u8]) -> Result<(), StorageError> {
        self.storage.write_page(page_id, buf)?;
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Allocates a page, reusing a freed page when one is available.
    ///
    /// Reused pages are zeroed, like freshly grown ones.
    pub fn allocate_page(&self) -> Result<PageId, StorageError> {
        let mut state = self.state.lock();
        let page_id = match state.free_list.pop_front() {
            Some(page_id) => {
                state.free_set.remove(&page_id);
                page_id
            }
            None => self.storage.allocate_page()?,
        };
        self.counters.allocations.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(%page_id, "allocated page");
        Ok(page_id)
    }

    /// Returns a page to the free list.
    ///
    /// The page is zeroed on disk so it reads back as a Free page.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::PageNotFound` for a page the storage never
    /// allocated and `StorageError::PageAlreadyFree` for a double free.
    pub fn deallocate_page(&self, page_id: PageId) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        if page_id.page_num() >= self.storage.page_count() as u64 {
            return Err(StorageError::PageNotFound(page_id));
        }
        if state.free_set.contains(&page_id) {
            return Err(StorageError::PageAlreadyFree(page_id));
        }

        self.write_page(page_id, &[0u8; PAGE_SIZE])?;
        state.free_list.push_back(page_id);
        state.free_set.insert(page_id);
        self.counters.deallocations.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(%page_id, "deallocated page");
        Ok(())
    }

    /// Returns the number of pages on the free list.
    pub fn free_page_count(&self) -> usize {
        self.state.lock().free_list.len()
    }

    /// Returns the number of pages in use (allocated and not free).
    pub fn live_page_count(&self) -> usize {
        self.storage.page_count() - self.free_page_count()
    }

    /// Looks up the head page registered under `name`.
    pub fn get_file_entry(&self, name: &str) -> Option<PageId> {
        self.state.lock().file_entries.get(name).copied()
    }

    /// Registers `name` as pointing at `head`.
    pub fn add_file_entry(&self, name: &str, head: PageId) -> Result<(), StorageError> {
        if name.is_empty() || name.len() > MAX_FILE_NAME_LEN {
            return Err(StorageError::InvalidFileName(name.to_string()));
        }
        let mut state = self.state.lock();
        if state.file_entries.contains_key(name) {
            return Err(StorageError::FileEntryExists(name.to_string()));
        }
        state.file_entries.insert(name.to_string(), head);
        Ok(())
    }

    /// Removes the entry registered under `name`.
    pub fn delete_file_entry(&self, name: &str) -> Result<(), StorageError> {
        self.state
            .lock()
            .file_entries
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::FileEntryNotFound(name.to_string()))
    }

    /// Returns the number of registered file entries.
    pub fn file_entry_count(&self) -> usize {
        self.state.lock().file_entries.len()
    }

    /// Returns a snapshot of the I/O counters.
    pub fn io_stats(&self) -> IoStats {
        IoStats {
            reads: self.counters.reads.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            allocations: self.counters.allocations.load(Ordering::Relaxed),
            deallocations: self.counters.deallocations.load(Ordering::Relaxed),
        }
    }

    /// Syncs the storage backend.
    pub fn sync_all(&self) -> Result<(), StorageError> {
        self.storage.sync_all()
    }
}
