//! In-memory page storage implementation.

use parking_lot::Mutex;

use super::{Storage, check_buffer_size};
use crate::storage::error::StorageError;
use crate::storage::page::{PAGE_SIZE, PageId};

/// In-memory page storage for testing and development.
///
/// PageIds are assigned sequentially as Vec indices. An optional page limit
/// lets tests drive the allocation failure paths.
pub struct MemoryStorage {
    pages: Mutex<Vec<Box<[u8]>>>,
    max_pages: Option<usize>,
}

impl MemoryStorage {
    /// Creates a new empty in-memory storage with no page limit.
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(Vec::new()),
            max_pages: None,
        }
    }

    /// Creates a storage that refuses to grow beyond `max_pages` pages.
    pub fn with_max_pages(max_pages: usize) -> Self {
        Self {
            pages: Mutex::new(Vec::new()),
            max_pages: Some(max_pages),
        }
    }
}

impl Storage for MemoryStorage {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<(), StorageError> {
        check_buffer_size(buf.len())?;

        let pages = self.pages.lock();
        let page = pages
            .get(page_id.page_num() as usize)
            .ok_or(StorageError::PageNotFound(page_id))?;

        buf.copy_from_slice(page);
        Ok(())
    }

    fn write_page(&self, page_id: PageId, buf: &[u8]) -> Result<(), StorageError> {
        check_buffer_size(buf.len())?;

        let mut pages = self.pages.lock();
        let page = pages
            .get_mut(page_id.page_num() as usize)
            .ok_or(StorageError::PageNotFound(page_id))?;

        page.copy_from_slice(buf);
        Ok(())
    }

    fn allocate_page(&self) -> Result<PageId, StorageError> {
        let mut pages = self.pages.lock();
        if self.max_pages.is_some_and(|max| pages.len() >= max) {
            return Err(StorageError::StorageFull);
        }
        let page_id = PageId::new(pages.len() as u64);
        pages.push(vec![0u8; PAGE_SIZE].into_boxed_slice());
        Ok(page_id)
    }

    fn page_count(&self) -> usize {
        self.pages.lock().len()
    }

    fn sync_all(&self) -> Result<(), StorageError> {
        // No-op for in-memory storage
        Ok(())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests as generic;
    use super::*;

    #[test]
    fn test_basic_operations() {
        generic::test_basic_operations(MemoryStorage::new());
    }

    #[test]
    fn test_buffer_size_validation() {
        generic::test_buffer_size_validation(MemoryStorage::new());
    }

    #[test]
    fn test_page_not_found() {
        generic::test_page_not_found(MemoryStorage::new());
    }

    #[test]
    fn test_page_count() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.page_count(), 0);

        generic::allocate_and_write(&storage, 7);
        assert_eq!(storage.page_count(), 1);

        let page_id = generic::allocate_and_write(&storage, 9);
        assert_eq!(storage.page_count(), 2);
        generic::verify_test_data(&storage, page_id, 9);
    }

    #[test]
    fn test_max_pages() {
        let storage = MemoryStorage::with_max_pages(2);
        storage.allocate_page().unwrap();
        storage.allocate_page().unwrap();

        assert!(matches!(
            storage.allocate_page(),
            Err(StorageError::StorageFull)
        ));
        assert_eq!(storage.page_count(), 2);
    }
}
