//! File-backed storage implementation.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::{Storage, check_buffer_size};
use crate::storage::error::StorageError;
use crate::storage::page::{PAGE_SIZE, PageId};

/// File-backed storage implementation.
///
/// Stores pages as contiguous 1KB blocks in a single file.
///
/// # File Layout
///
/// ```text
/// +------------------+------------------+------------------+
/// | Page 0 (1KB)     | Page 1 (1KB)     | Page 2 (1KB)     | ...
/// +------------------+------------------+------------------+
/// ^ offset 0         ^ offset 1024      ^ offset 2048
/// ```
///
/// # Concurrency
///
/// A mutex around the file handle serializes seek + read/write pairs.
///
/// # Durability
///
/// The `sync_all()` method calls `File::sync_all()` to ensure data reaches disk.
/// Without calling sync_all, data may be lost on crash.
pub struct FileStorage {
    /// Path to the storage file
    path: PathBuf,
    /// File handle, locked for each I/O
    file: Mutex<File>,
    /// Number of pages currently in the file
    page_count: AtomicU64,
}

impl FileStorage {
    /// Opens or creates a storage file at the given path.
    ///
    /// If the file exists, its page count is calculated from file size.
    /// If the file doesn't exist, it is created empty.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Corrupted` if the file size is not a multiple
    /// of PAGE_SIZE.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let file_size = file.metadata()?.len();
        if file_size % PAGE_SIZE as u64 != 0 {
            return Err(StorageError::Corrupted(format!(
                "file size {} is not a multiple of page size {}",
                file_size, PAGE_SIZE
            )));
        }

        let page_count = file_size / PAGE_SIZE as u64;

        Ok(Self {
            path,
            file: Mutex::new(file),
            page_count: AtomicU64::new(page_count),
        })
    }

    /// Returns the path to the storage file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check_exists(&self, page_id: PageId) -> Result<(), StorageError> {
        if page_id.page_num() >= self.page_count.load(Ordering::Acquire) {
            return Err(StorageError::PageNotFound(page_id));
        }
        Ok(())
    }
}

impl Storage for FileStorage {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<(), StorageError> {
        check_buffer_size(buf.len())?;
        self.check_exists(page_id)?;

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(page_id.byte_offset()))?;
        file.read_exact(buf)?;

        Ok(())
    }

    fn write_page(&self, page_id: PageId, buf: &[u8]) -> Result<(), StorageError> {
        check_buffer_size(buf.len())?;
        self.check_exists(page_id)?;

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(page_id.byte_offset()))?;
        file.write_all(buf)?;

        Ok(())
    }

    fn allocate_page(&self) -> Result<PageId, StorageError> {
        let mut file = self.file.lock();

        let page_num = self.page_count.load(Ordering::Acquire);
        let page_id = PageId::new(page_num);

        // Extend file with zeroed page
        file.seek(SeekFrom::Start(page_id.byte_offset()))?;
        file.write_all(&[0u8; PAGE_SIZE])?;

        self.page_count.store(page_num + 1, Ordering::Release);

        Ok(page_id)
    }

    fn page_count(&self) -> usize {
        self.page_count.load(Ordering::Acquire) as usize
    }

    fn sync_all(&self) -> Result<(), StorageError> {
        self.file.lock().sync_all()?;
        Ok(())
    }
}
