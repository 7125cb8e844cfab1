//! Heap file: an unordered collection of records addressed by [`RecordId`].

use std::fmt;

use crate::storage::{
    BufferPool, LruReplacer, MAX_RECORD_SIZE, PageGuard, PageId, Replacer, Storage,
};

use super::directory::{DirectoryPage, read_dir};
use super::error::HeapError;
use super::page::{DataPage, RecordId, fetch_data_page, write_data};
use super::scan::HeapScan;

/// A heap file stored in a buffer pool.
///
/// The file is identified by its head directory page. A named file is
/// registered in the disk manager's file library and outlives the handle; a
/// temporary file has no name and frees all of its pages when the handle is
/// dropped.
///
/// No page stays pinned between calls.
///
/// # Example
///
/// ```
/// use heapfile::heap::HeapFile;
/// use heapfile::storage::{BufferPool, BufferPoolConfig, MemoryStorage};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = BufferPool::with_config(MemoryStorage::new(), &BufferPoolConfig::default())?;
/// let file = HeapFile::open(&pool, "people")?;
///
/// let rid = file.insert_record(b"ada lovelace")?;
/// assert_eq!(file.select_record(rid)?, b"ada lovelace");
/// assert_eq!(file.record_count()?, 1);
/// # Ok(())
/// # }
/// ```
pub struct HeapFile<'a, S: Storage, R: Replacer = LruReplacer> {
    pool: &'a BufferPool<S, R>,
    head_id: PageId,
    name: Option<String>,
    deleted: bool,
}

impl<'a, S: Storage, R: Replacer> HeapFile<'a, S, R> {
    /// Opens the named file, creating it if the library has no such entry.
    ///
    /// # Errors
    ///
    /// Returns `HeapError::Storage` with `InvalidFileName` for an empty or
    /// overlong name, and `HeapError::Corrupted` if the registered head page
    /// is not a directory page.
    pub fn open(pool: &'a BufferPool<S, R>, name: &str) -> Result<Self, HeapError> {
        if let Some(head_id) = pool.disk().get_file_entry(name) {
            let file = Self {
                pool,
                head_id,
                name: Some(name.to_string()),
                deleted: false,
            };
            file.fetch_directory(head_id)?;
            tracing::info!(file = name, head = %head_id, "opened heap file");
            return Ok(file);
        }

        let head_id = Self::create_head(pool)?;
        if let Err(e) = pool.disk().add_file_entry(name, head_id) {
            pool.free_page(head_id)?;
            return Err(e.into());
        }
        tracing::info!(file = name, head = %head_id, "created heap file");
        Ok(Self {
            pool,
            head_id,
            name: Some(name.to_string()),
            deleted: false,
        })
    }

    /// Creates a temporary file, freed when the handle is dropped.
    pub fn create_temp(pool: &'a BufferPool<S, R>) -> Result<Self, HeapError> {
        let head_id = Self::create_head(pool)?;
        tracing::debug!(head = %head_id, "created temporary heap file");
        Ok(Self {
            pool,
            head_id,
            name: None,
            deleted: false,
        })
    }

    fn create_head(pool: &'a BufferPool<S, R>) -> Result<PageId, HeapError> {
        let mut guard = pool.new_page()?;
        let head_id = guard.page_id();
        guard.write(|data| {
            DirectoryPage::init(data, head_id);
        });
        Ok(head_id)
    }

    /// Returns the file name, or `None` for a temporary file.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns true for a file with no library entry.
    pub fn is_temporary(&self) -> bool {
        self.name.is_none()
    }

    /// Returns the head directory page.
    pub fn head_page_id(&self) -> PageId {
        self.head_id
    }

    pub(super) fn pool(&self) -> &'a BufferPool<S, R> {
        self.pool
    }

    /// Frees every page of the file and removes its library entry.
    pub fn delete_file(mut self) -> Result<(), HeapError> {
        self.deleted = true;
        self.free_all_pages()?;
        if let Some(name) = &self.name {
            self.pool.disk().delete_file_entry(name)?;
            tracing::info!(file = %name, "deleted heap file");
        }
        Ok(())
    }

    fn free_all_pages(&self) -> Result<(), HeapError> {
        let mut current = Some(self.head_id);
        while let Some(dir_id) = current {
            let (data_pages, next) = {
                let guard = self.fetch_directory(dir_id)?;
                read_dir(&guard, |dir| {
                    let pages: Vec<PageId> = dir.entries().map(|(_, entry)| entry.page_id).collect();
                    (pages, dir.next_page())
                })?
            };
            for page_id in data_pages {
                self.pool.free_page(page_id)?;
            }
            self.pool.free_page(dir_id)?;
            current = next;
        }
        Ok(())
    }

    /// Inserts a record and returns its id.
    ///
    /// # Errors
    ///
    /// Returns `HeapError::RecordTooLarge` if the record cannot fit in a page.
    pub fn insert_record(&self, record: &[u8]) -> Result<RecordId, HeapError> {
        if record.len() > MAX_RECORD_SIZE {
            return Err(HeapError::RecordTooLarge {
                size: record.len(),
                max: MAX_RECORD_SIZE,
            });
        }

        let (page_id, is_new) = self.get_avail_page(record.len())?;
        let result = self.insert_into(page_id, record);
        if result.is_err() && is_new {
            // The fresh page still has a zero-count entry.
            if let Err(e) = self.update_dir_entry(page_id, 0, 0) {
                tracing::warn!(%page_id, error = %e, "failed to remove empty data page");
            }
        }
        result
    }

    fn insert_into(&self, page_id: PageId, record: &[u8]) -> Result<RecordId, HeapError> {
        let mut guard = self.pool.fetch_page(page_id)?;
        let (slot_id, free_space) = write_data(&mut guard, |page| {
            page.insert_record(record)
                .map(|slot_id| (slot_id, page.free_space()))
        })??;

        if let Err(e) = self.update_dir_entry(page_id, 1, free_space) {
            let undo = write_data(&mut guard, |page| page.delete_record(slot_id));
            if let Err(undo) = undo.and_then(|r| r.map_err(HeapError::from)) {
                tracing::warn!(%page_id, slot_id, error = %undo, "failed to undo insert");
            }
            return Err(e);
        }
        Ok(RecordId::new(page_id, slot_id))
    }

    /// Returns a copy of the record at `rid`.
    ///
    /// # Errors
    ///
    /// Returns `HeapError::InvalidRecordId` if `rid` does not name a live
    /// record of this file.
    pub fn select_record(&self, rid: RecordId) -> Result<Vec<u8>, HeapError> {
        self.check_owned(rid)?;
        let guard = fetch_data_page(self.pool, rid)?;
        guard
            .read(|data| {
                DataPage::try_new(data)
                    .and_then(|page| page.record(rid.slot_id).map(<[u8]>::to_vec))
            })
            .ok_or(HeapError::InvalidRecordId(rid))
    }

    /// Overwrites the record at `rid` in place.
    ///
    /// # Errors
    ///
    /// Returns `HeapError::InvalidRecordId` for a dead RID and
    /// `HeapError::RecordSizeMismatch` if the length differs.
    pub fn update_record(&self, rid: RecordId, record: &[u8]) -> Result<(), HeapError> {
        self.check_owned(rid)?;
        let mut guard = fetch_data_page(self.pool, rid)?;
        let existing = live_record_len(&guard, rid)?;
        if existing != record.len() {
            return Err(HeapError::RecordSizeMismatch {
                expected: existing,
                actual: record.len(),
            });
        }
        write_data(&mut guard, |page| page.update_record(rid.slot_id, record))??;
        Ok(())
    }

    /// Deletes the record at `rid`.
    ///
    /// A data page left empty is removed from the file.
    ///
    /// # Errors
    ///
    /// Returns `HeapError::InvalidRecordId` if `rid` does not name a live record.
    pub fn delete_record(&self, rid: RecordId) -> Result<(), HeapError> {
        self.check_owned(rid)?;
        let mut guard = fetch_data_page(self.pool, rid)?;
        live_record_len(&guard, rid)?;

        let (record, free_space) = write_data(&mut guard, |page| {
            let record = page.record(rid.slot_id).map(<[u8]>::to_vec).unwrap_or_default();
            page.delete_record(rid.slot_id)
                .map(|_| (record, page.free_space()))
        })??;

        if let Err(e) = self.update_dir_entry(rid.page_id, -1, free_space) {
            // Freed slots are reused last-in first-out, so this restores `rid`.
            let undo = write_data(&mut guard, |page| page.insert_record(&record));
            if let Err(undo) = undo.and_then(|r| r.map_err(HeapError::from)) {
                tracing::warn!(%rid, error = %undo, "failed to undo delete");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Fails with `InvalidRecordId` unless this file's directory lists the
    /// page of `rid`.
    fn check_owned(&self, rid: RecordId) -> Result<(), HeapError> {
        match self.find_dir_entry(rid.page_id) {
            Ok(_) => Ok(()),
            Err(HeapError::DirectoryEntryNotFound(_)) => Err(HeapError::InvalidRecordId(rid)),
            Err(e) => Err(e),
        }
    }

    /// Returns the number of records, summed over the directory.
    pub fn record_count(&self) -> Result<usize, HeapError> {
        let mut total = 0;
        let mut current = Some(self.head_id);
        while let Some(dir_id) = current {
            let guard = self.fetch_directory(dir_id)?;
            let (count, next) = read_dir(&guard, |dir| {
                let count: usize = dir
                    .entries()
                    .map(|(_, entry)| entry.record_count as usize)
                    .sum();
                (count, dir.next_page())
            })?;
            total += count;
            current = next;
        }
        Ok(total)
    }

    /// Starts a sequential scan over every record.
    pub fn open_scan(&self) -> Result<HeapScan<'_, 'a, S, R>, HeapError> {
        HeapScan::new(self)
    }
}

/// Returns the length of the live record at `rid` on its pinned page.
fn live_record_len<S: Storage, R: Replacer>(
    guard: &PageGuard<'_, S, R>,
    rid: RecordId,
) -> Result<usize, HeapError> {
    guard
        .read(|data| {
            DataPage::try_new(data).and_then(|page| page.record(rid.slot_id).map(<[u8]>::len))
        })
        .ok_or(HeapError::InvalidRecordId(rid))
}

impl<S: Storage, R: Replacer> fmt::Display for HeapFile<'_, S, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "<temp>"),
        }
    }
}

impl<S: Storage, R: Replacer> fmt::Debug for HeapFile<'_, S, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapFile")
            .field("name", &self.name)
            .field("head_id", &self.head_id)
            .finish()
    }
}

impl<S: Storage, R: Replacer> Drop for HeapFile<'_, S, R> {
    fn drop(&mut self) {
        if self.deleted || self.name.is_some() {
            return;
        }
        if let Err(e) = self.free_all_pages() {
            tracing::warn!(head = %self.head_id, error = %e, "failed to free temporary heap file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::ErrorKind;
    use crate::storage::{BufferPoolError, StorageError};
    use crate::storage::tests::test_pool;

    #[test]
    fn test_insert_select_update_delete() {
        let pool = test_pool(8);
        let file = HeapFile::create_temp(&pool).unwrap();

        let rid = file.insert_record(b"first").unwrap();
        assert_eq!(file.select_record(rid).unwrap(), b"first");
        assert_eq!(file.record_count().unwrap(), 1);

        file.update_record(rid, b"FIRST").unwrap();
        assert_eq!(file.select_record(rid).unwrap(), b"FIRST");

        file.delete_record(rid).unwrap();
        assert_eq!(file.record_count().unwrap(), 0);
        assert!(matches!(
            file.select_record(rid),
            Err(HeapError::InvalidRecordId(r)) if r == rid
        ));
        assert!(matches!(
            file.delete_record(rid),
            Err(HeapError::InvalidRecordId(_))
        ));
        assert_eq!(pool.pinned_frame_count(), 0);
    }

    #[test]
    fn test_record_size_limits() {
        let pool = test_pool(8);
        let file = HeapFile::create_temp(&pool).unwrap();

        let err = file.insert_record(&[0u8; MAX_RECORD_SIZE + 1]).unwrap_err();
        assert!(matches!(err, HeapError::RecordTooLarge { size, .. } if size == MAX_RECORD_SIZE + 1));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(file.record_count().unwrap(), 0);

        let big = vec![7u8; MAX_RECORD_SIZE];
        let rid = file.insert_record(&big).unwrap();
        assert_eq!(file.select_record(rid).unwrap(), big);

        // A full page sends the next record to a new one.
        let other = file.insert_record(b"x").unwrap();
        assert_ne!(other.page_id, rid.page_id);
        assert_eq!(pool.pinned_frame_count(), 0);
    }

    #[test]
    fn test_invalid_record_ids() {
        let pool = test_pool(8);
        let file = HeapFile::create_temp(&pool).unwrap();
        let rid = file.insert_record(b"live").unwrap();

        let bad = [
            RecordId::new(PageId::INVALID, 0),
            RecordId::new(PageId::new(500), 0),
            RecordId::new(rid.page_id, rid.slot_id + 1),
            RecordId::new(file.head_page_id(), 0),
        ];
        for rid in bad {
            let err = file.select_record(rid).unwrap_err();
            assert!(matches!(err, HeapError::InvalidRecordId(r) if r == rid), "{rid}");
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
            assert!(file.update_record(rid, b"live").is_err());
            assert!(file.delete_record(rid).is_err());
        }
        assert_eq!(file.record_count().unwrap(), 1);
        assert_eq!(pool.pinned_frame_count(), 0);
    }

    #[test]
    fn test_update_requires_same_length() {
        let pool = test_pool(8);
        let file = HeapFile::create_temp(&pool).unwrap();
        let rid = file.insert_record(b"four").unwrap();

        let err = file.update_record(rid, b"seven!!").unwrap_err();
        assert!(matches!(
            err,
            HeapError::RecordSizeMismatch {
                expected: 4,
                actual: 7
            }
        ));
        assert_eq!(file.select_record(rid).unwrap(), b"four");
    }

    #[test]
    fn test_deleted_slot_is_reused() {
        let pool = test_pool(8);
        let file = HeapFile::create_temp(&pool).unwrap();
        let a = file.insert_record(b"aaaa").unwrap();
        let b = file.insert_record(b"bbbb").unwrap();

        file.delete_record(a).unwrap();
        assert_eq!(file.insert_record(b"cccc").unwrap(), a);
        assert_eq!(file.select_record(b).unwrap(), b"bbbb");
        assert_eq!(file.record_count().unwrap(), 2);
    }

    #[test]
    fn test_last_delete_frees_data_page() {
        let pool = test_pool(8);
        let file = HeapFile::create_temp(&pool).unwrap();
        let rid = file.insert_record(b"lonely").unwrap();
        assert_eq!(pool.disk().live_page_count(), 2);

        file.delete_record(rid).unwrap();
        assert_eq!(pool.disk().live_page_count(), 1);
        assert!(matches!(
            file.select_record(rid),
            Err(HeapError::InvalidRecordId(_))
        ));
    }

    #[test]
    fn test_temporary_file_freed_on_drop() {
        let pool = test_pool(8);
        {
            let file = HeapFile::create_temp(&pool).unwrap();
            assert!(file.is_temporary());
            for i in 0..300u32 {
                file.insert_record(&i.to_le_bytes()).unwrap();
            }
            assert!(pool.disk().live_page_count() > 2);
        }
        assert_eq!(pool.disk().live_page_count(), 0);
        assert_eq!(pool.pinned_frame_count(), 0);
    }

    #[test]
    fn test_delete_file_releases_everything() {
        let pool = test_pool(8);
        let file = HeapFile::open(&pool, "doomed").unwrap();
        for i in 0..300u32 {
            file.insert_record(&i.to_le_bytes()).unwrap();
        }
        assert_eq!(pool.disk().file_entry_count(), 1);

        file.delete_file().unwrap();
        assert_eq!(pool.disk().file_entry_count(), 0);
        assert_eq!(pool.disk().get_file_entry("doomed"), None);
        assert_eq!(pool.disk().live_page_count(), 0);
    }

    #[test]
    fn test_reopen_named_file() {
        let pool = test_pool(8);
        let (head, rid) = {
            let file = HeapFile::open(&pool, "kept").unwrap();
            assert!(!file.is_temporary());
            (file.head_page_id(), file.insert_record(b"survivor").unwrap())
        };

        let file = HeapFile::open(&pool, "kept").unwrap();
        assert_eq!(file.head_page_id(), head);
        assert_eq!(file.record_count().unwrap(), 1);
        assert_eq!(file.select_record(rid).unwrap(), b"survivor");
        assert_eq!(pool.disk().file_entry_count(), 1);
    }

    #[test]
    fn test_open_rejects_bad_names() {
        let pool = test_pool(8);
        let long = "n".repeat(51);
        for name in ["", long.as_str()] {
            let err = HeapFile::open(&pool, name).unwrap_err();
            assert!(matches!(
                err,
                HeapError::Storage(StorageError::InvalidFileName(_))
            ));
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
        assert_eq!(pool.disk().live_page_count(), 0);
        assert!(HeapFile::open(&pool, &"n".repeat(50)).is_ok());
    }

    #[test]
    fn test_open_rejects_non_directory_head() {
        let pool = test_pool(8);
        let page_id = pool.new_page().unwrap().page_id();
        pool.disk().add_file_entry("bogus", page_id).unwrap();

        let err = HeapFile::open(&pool, "bogus").unwrap_err();
        assert!(matches!(err, HeapError::Corrupted(_)));
        assert_eq!(pool.pinned_frame_count(), 0);
    }

    #[test]
    fn test_display() {
        let pool = test_pool(8);
        let named = HeapFile::open(&pool, "accounts").unwrap();
        let temp = HeapFile::create_temp(&pool).unwrap();
        assert_eq!(named.to_string(), "accounts");
        assert_eq!(named.name(), Some("accounts"));
        assert_eq!(temp.to_string(), "<temp>");
        assert_eq!(temp.name(), None);
    }

    #[test]
    fn test_no_free_frames_surfaces_as_resource_exhausted() {
        let pool = test_pool(1);
        {
            let _pinned = pool.new_page().unwrap();
            let err = HeapFile::create_temp(&pool).unwrap_err();
            assert!(matches!(
                err,
                HeapError::BufferPool(BufferPoolError::NoFreeFrames)
            ));
            assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
        }
        assert_eq!(pool.pinned_frame_count(), 0);
    }

    #[test]
    fn test_insert_rolls_back_when_frames_run_out() {
        // One frame cannot hold a data page and its directory page at once.
        let pool = test_pool(1);
        let file = HeapFile::create_temp(&pool).unwrap();

        let err = file.insert_record(b"nowhere").unwrap_err();
        assert!(matches!(
            err,
            HeapError::BufferPool(BufferPoolError::NoFreeFrames)
        ));
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
        assert_eq!(pool.pinned_frame_count(), 0);
        assert_eq!(file.record_count().unwrap(), 0);
        assert_eq!(pool.disk().live_page_count(), 1);
    }

    #[test]
    fn test_delete_restores_record_when_frames_run_out() {
        let pool = test_pool(2);
        let file = HeapFile::create_temp(&pool).unwrap();
        let rid = file.insert_record(b"sticky").unwrap();

        {
            // Leaves one frame: enough for the data page, not its directory.
            let _pinned = pool.new_page().unwrap();
            let err = file.delete_record(rid).unwrap_err();
            assert!(matches!(
                err,
                HeapError::BufferPool(BufferPoolError::NoFreeFrames)
            ));
            assert_eq!(pool.pinned_frame_count(), 1);
        }

        assert_eq!(file.select_record(rid).unwrap(), b"sticky");
        assert_eq!(file.record_count().unwrap(), 1);
        assert_eq!(pool.pinned_frame_count(), 0);
    }

    #[test]
    fn test_record_ids_of_other_files_are_rejected() {
        let pool = test_pool(8);
        let a = HeapFile::create_temp(&pool).unwrap();
        let b = HeapFile::create_temp(&pool).unwrap();
        a.insert_record(b"aaaa").unwrap();
        let b_rid = b.insert_record(b"bbbb").unwrap();

        let err = a.select_record(b_rid).unwrap_err();
        assert!(matches!(err, HeapError::InvalidRecordId(rid) if rid == b_rid));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = a.update_record(b_rid, b"AAAA").unwrap_err();
        assert!(matches!(err, HeapError::InvalidRecordId(_)));
        let err = a.delete_record(b_rid).unwrap_err();
        assert!(matches!(err, HeapError::InvalidRecordId(_)));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        assert_eq!(b.select_record(b_rid).unwrap(), b"bbbb");
        assert_eq!(a.record_count().unwrap(), 1);
        assert_eq!(b.record_count().unwrap(), 1);
        assert_eq!(pool.pinned_frame_count(), 0);
    }
}
