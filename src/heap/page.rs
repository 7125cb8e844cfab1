//! Record identifiers and the data page view.

use std::fmt;

use crate::storage::{
    BufferPool, BufferPoolError, PageError, PageGuard, PageId, PageType, Replacer, SlotId,
    SlottedPage, Storage, StorageError,
};

use super::error::HeapError;

/// Global identifier for a record (page + slot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    /// Page containing the record.
    pub page_id: PageId,
    /// Slot within the page.
    pub slot_id: SlotId,
}

impl RecordId {
    /// Creates a new record identifier.
    pub fn new(page_id: PageId, slot_id: SlotId) -> Self {
        Self { page_id, slot_id }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.page_id, self.slot_id)
    }
}

/// A slotted page of type [`PageType::Data`] holding raw record payloads.
pub struct DataPage<T> {
    page: SlottedPage<T>,
}

impl<T: AsRef<[u8]>> DataPage<T> {
    /// Views `data` as a data page, or returns `None` if it is another type.
    pub fn try_new(data: T) -> Option<Self> {
        let page = SlottedPage::new(data);
        (page.page_type() == PageType::Data).then_some(Self { page })
    }

    /// Returns the page's own id.
    pub fn page_id(&self) -> PageId {
        self.page.page_id()
    }

    /// Returns the record in `slot_id`, if live.
    pub fn record(&self, slot_id: SlotId) -> Option<&[u8]> {
        self.page.read(slot_id)
    }

    /// Returns the number of live records.
    pub fn record_count(&self) -> usize {
        self.page.record_count()
    }

    /// Returns the reclaimable free bytes on the page.
    pub fn free_space(&self) -> usize {
        self.page.free_space()
    }

    /// Returns the first live slot.
    pub fn first_record(&self) -> Option<SlotId> {
        self.page.first_record()
    }

    /// Returns the first live slot after `slot_id`.
    pub fn next_record(&self, slot_id: SlotId) -> Option<SlotId> {
        self.page.next_record(slot_id)
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> DataPage<T> {
    /// Formats `data` as an empty data page.
    pub fn init(data: T, page_id: PageId) -> Self {
        let mut page = SlottedPage::new(data);
        page.init(PageType::Data, page_id);
        Self { page }
    }

    /// Stores a record and returns its slot.
    pub fn insert_record(&mut self, record: &[u8]) -> Result<SlotId, PageError> {
        self.page.insert(record)
    }

    /// Overwrites a record with one of the same length.
    pub fn update_record(&mut self, slot_id: SlotId, record: &[u8]) -> Result<(), PageError> {
        self.page.update(slot_id, record)
    }

    /// Deletes a record and returns the bytes it held.
    pub fn delete_record(&mut self, slot_id: SlotId) -> Result<usize, PageError> {
        self.page.delete(slot_id)
    }
}

/// Pins the data page named by `rid`.
///
/// A RID whose page is the invalid sentinel or does not exist yields
/// `InvalidRecordId`; other pool failures pass through.
pub(super) fn fetch_data_page<S: Storage, R: Replacer>(
    pool: &BufferPool<S, R>,
    rid: RecordId,
) -> Result<PageGuard<'_, S, R>, HeapError> {
    if !rid.page_id.is_valid() {
        return Err(HeapError::InvalidRecordId(rid));
    }
    match pool.fetch_page(rid.page_id) {
        Ok(guard) => Ok(guard),
        Err(BufferPoolError::Storage(StorageError::PageNotFound(_))) => {
            Err(HeapError::InvalidRecordId(rid))
        }
        Err(e) => Err(e.into()),
    }
}

/// Runs `f` over a pinned data page, or fails with `Corrupted` if the page
/// is not a data page.
pub(super) fn read_data<S: Storage, R: Replacer, U>(
    guard: &PageGuard<'_, S, R>,
    f: impl FnOnce(&DataPage<&[u8]>) -> U,
) -> Result<U, HeapError> {
    guard.read(|data| DataPage::try_new(data).map(|page| f(&page)))
        .ok_or_else(|| not_a_data_page(guard.page_id()))
}

/// Mutable counterpart of [`read_data`].
pub(super) fn write_data<S: Storage, R: Replacer, U>(
    guard: &mut PageGuard<'_, S, R>,
    f: impl FnOnce(&mut DataPage<&mut [u8]>) -> U,
) -> Result<U, HeapError> {
    let page_id = guard.page_id();
    guard
        .write(|data| DataPage::try_new(data).map(|mut page| f(&mut page)))
        .ok_or_else(|| not_a_data_page(page_id))
}

fn not_a_data_page(page_id: PageId) -> HeapError {
    HeapError::Corrupted(format!("page {page_id} is not a data page"))
}
