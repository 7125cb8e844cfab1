//! Integration tests for the storage backends and disk manager.

use std::sync::Arc;
use std::thread;

use heapfile::storage::{
    DiskManager, FileStorage, MemoryStorage, PAGE_SIZE, PageId, Storage, StorageError,
};
use tempfile::tempdir;

/// Generic test runner for any Storage implementation.
fn test_storage_basic_operations<S: Storage>(storage: S) {
    assert_eq!(storage.page_count(), 0);

    let id0 = storage.allocate_page().unwrap();
    let id1 = storage.allocate_page().unwrap();
    let id2 = storage.allocate_page().unwrap();

    assert_eq!(id0.page_num(), 0);
    assert_eq!(id1.page_num(), 1);
    assert_eq!(id2.page_num(), 2);
    assert_eq!(storage.page_count(), 3);

    for (id, value) in [(id0, 10u8), (id1, 20u8), (id2, 30u8)] {
        let mut buf = [0u8; PAGE_SIZE];
        buf[0] = value;
        storage.write_page(id, &buf).unwrap();
    }

    let mut buf = [0u8; PAGE_SIZE];
    for (id, value) in [(id0, 10u8), (id1, 20u8), (id2, 30u8)] {
        storage.read_page(id, &mut buf).unwrap();
        assert_eq!(buf[0], value);
    }

    storage.sync_all().unwrap();
}

#[test]
fn test_memory_storage_basic() {
    test_storage_basic_operations(MemoryStorage::new());
}

#[test]
fn test_file_storage_basic() {
    let dir = tempdir().unwrap();
    let storage = FileStorage::open(dir.path().join("test.db")).unwrap();
    test_storage_basic_operations(storage);
}

/// Writers on separate threads touching disjoint pages.
fn test_threaded_writes<S: Storage + 'static>(storage: S) {
    let storage = Arc::new(storage);
    for _ in 0..10 {
        storage.allocate_page().unwrap();
    }

    thread::scope(|scope| {
        for i in 0..10u64 {
            let storage = Arc::clone(&storage);
            scope.spawn(move || {
                let mut buf = [0u8; PAGE_SIZE];
                buf[0] = i as u8;
                storage.write_page(PageId::new(i), &buf).unwrap();
            });
        }
    });

    storage.sync_all().unwrap();
    for i in 0..10u64 {
        let mut buf = [0u8; PAGE_SIZE];
        storage.read_page(PageId::new(i), &mut buf).unwrap();
        assert_eq!(buf[0], i as u8);
    }
}

#[test]
fn test_memory_threaded_writes() {
    test_threaded_writes(MemoryStorage::new());
}

#[test]
fn test_file_threaded_writes() {
    let dir = tempdir().unwrap();
    test_threaded_writes(FileStorage::open(dir.path().join("test.db")).unwrap());
}

#[test]
fn test_buffer_size_validation() {
    let storage = MemoryStorage::new();
    let page_id = storage.allocate_page().unwrap();

    let mut small_buf = [0u8; 100];
    assert!(matches!(
        storage.read_page(page_id, &mut small_buf),
        Err(StorageError::InvalidBufferSize {
            expected: PAGE_SIZE,
            actual: 100
        })
    ));
    assert!(matches!(
        storage.write_page(page_id, &small_buf),
        Err(StorageError::InvalidBufferSize {
            expected: PAGE_SIZE,
            actual: 100
        })
    ));
}

#[test]
fn test_file_persistence_across_instances() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");

    {
        let storage = FileStorage::open(&path).unwrap();
        for i in 0..5 {
            let page_id = storage.allocate_page().unwrap();
            let mut buf = [0u8; PAGE_SIZE];
            buf[0] = (i * 10) as u8;
            storage.write_page(page_id, &buf).unwrap();
        }
        storage.sync_all().unwrap();
    }

    {
        let storage = FileStorage::open(&path).unwrap();
        assert_eq!(storage.page_count(), 5);
        for i in 5..10 {
            let page_id = storage.allocate_page().unwrap();
            let mut buf = [0u8; PAGE_SIZE];
            buf[0] = (i * 10) as u8;
            storage.write_page(page_id, &buf).unwrap();
        }
        storage.sync_all().unwrap();
    }

    let storage = FileStorage::open(&path).unwrap();
    assert_eq!(storage.page_count(), 10);
    for i in 0..10u64 {
        let mut buf = [0u8; PAGE_SIZE];
        storage.read_page(PageId::new(i), &mut buf).unwrap();
        assert_eq!(buf[0], (i * 10) as u8);
    }
}

#[test]
fn test_disk_manager_recycles_pages_on_file() {
    let dir = tempdir().unwrap();
    let disk = DiskManager::new(FileStorage::open(dir.path().join("test.db")).unwrap());

    let pages: Vec<PageId> = (0..4).map(|_| disk.allocate_page().unwrap()).collect();
    disk.write_page(pages[1], &[0xAB; PAGE_SIZE]).unwrap();
    disk.deallocate_page(pages[1]).unwrap();
    disk.deallocate_page(pages[2]).unwrap();
    assert!(matches!(
        disk.deallocate_page(pages[2]),
        Err(StorageError::PageAlreadyFree(_))
    ));
    assert_eq!(disk.live_page_count(), 2);

    // Freed pages come back oldest first, zeroed, before the file grows.
    assert_eq!(disk.allocate_page().unwrap(), pages[1]);
    assert_eq!(disk.allocate_page().unwrap(), pages[2]);
    assert_eq!(disk.allocate_page().unwrap(), PageId::new(4));

    let mut buf = [0xFFu8; PAGE_SIZE];
    disk.read_page(pages[1], &mut buf).unwrap();
    assert!(buf.iter().all(|&b| b == 0));

    let stats = disk.io_stats();
    assert_eq!(stats.allocations, 7);
    assert_eq!(stats.deallocations, 2);
}
