//! Slotted page implementation.
//!
//! A slotted page manages variable-length records within a fixed page.
//! The page layout consists of:
//!
//! ```text
//! +------------------+ offset 0
//! | PageHeader (32B) |
//! +------------------+ offset 32
//! | Slot Array       | (grows downward)
//! +------------------+
//! | Free Space       |
//! +------------------+
//! | Records          | (grows upward from bottom)
//! +------------------+ offset PAGE_SIZE
//! ```
//!
//! Records are stored from the bottom of the page upward, while the slot array
//! grows downward from the header. Both data pages and directory pages of a
//! heap file use this layout; the header's page type tells them apart.

use thiserror::Error;

use super::{PAGE_HEADER_SIZE, PAGE_SIZE, PageHeader, PageId, PageType};

/// Size of each slot entry in bytes.
pub const SLOT_SIZE: usize = 4;

/// Maximum record size that can fit in a single page.
///
/// This accounts for the header and one slot entry.
pub const MAX_RECORD_SIZE: usize = PAGE_SIZE - PAGE_HEADER_SIZE - SLOT_SIZE;

/// Slot identifier within a page.
pub type SlotId = u16;

/// Errors from slot-level page operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageError {
    /// Page is full, cannot insert data.
    #[error("page full: need {required} bytes, have {available} available")]
    PageFull {
        /// Bytes required for the data and slot.
        required: usize,
        /// Bytes available in free space.
        available: usize,
    },
    /// Slot not found or already deleted.
    #[error("slot {0} not found or deleted")]
    SlotNotFound(SlotId),
    /// Record size mismatch for in-place update.
    #[error("record size mismatch: expected {expected} bytes, got {actual}")]
    RecordSizeMismatch {
        /// Expected size (existing record).
        expected: usize,
        /// Actual size (new record).
        actual: usize,
    },
}

/// A slot entry in the slot array.
///
/// Layout (4 bytes):
/// - `offset`: u16 (2 bytes, offset to record data, 0 = deleted)
/// - `length`: u16 (2 bytes, record length, or next free slot when deleted)
#[derive(Debug, Clone, Copy)]
pub struct SlotEntry {
    /// Offset to record data from start of page (0 = deleted).
    pub offset: u16,
    /// Length of record in bytes.
    pub length: u16,
}

impl SlotEntry {
    /// Creates a free slot entry linked to the next free slot.
    ///
    /// Use `u16::MAX` to indicate end of free list.
    pub const fn free(next: u16) -> Self {
        Self {
            offset: 0,
            length: next,
        }
    }

    /// Creates a slot entry for a record.
    pub const fn new(offset: u16, length: u16) -> Self {
        Self { offset, length }
    }

    /// Returns true if this slot is empty (deleted).
    pub fn is_empty(&self) -> bool {
        self.offset == 0
    }

    /// Returns the next free slot ID. Only meaningful for empty slots.
    pub fn next_free(&self) -> u16 {
        debug_assert!(self.is_empty());
        self.length
    }

    /// Reads a slot entry from bytes.
    pub fn read_from(data: &[u8]) -> Self {
        Self {
            offset: u16::from_le_bytes([data[0], data[1]]),
            length: u16::from_le_bytes([data[2], data[3]]),
        }
    }

    /// Writes a slot entry to bytes.
    pub fn write_to(&self, data: &mut [u8]) {
        data[0..2].copy_from_slice(&self.offset.to_le_bytes());
        data[2..4].copy_from_slice(&self.length.to_le_bytes());
    }
}

/// A view over one page image using the slotted layout.
///
/// The type parameter `T` allows this to wrap:
/// - `&[u8]` - read-only view
/// - `&mut [u8]` - mutable view
/// - `Vec<u8>` - owned data
///
/// # Example
///
/// ```
/// use heapfile::storage::{PAGE_SIZE, PageId, PageType, SlottedPage};
///
/// let mut data = vec![0u8; PAGE_SIZE];
/// let mut page = SlottedPage::new(&mut data);
/// page.init(PageType::Data, PageId::new(0));
///
/// let slot_id = page.insert(b"hello world").unwrap();
/// assert_eq!(page.read(slot_id), Some(b"hello world".as_slice()));
/// ```
pub struct SlottedPage<T> {
    data: T,
}

// Read-only methods (available for any T: AsRef<[u8]>)
impl<T: AsRef<[u8]>> SlottedPage<T> {
    /// Creates a new page view over the given data.
    ///
    /// # Panics
    ///
    /// Panics if `data.as_ref().len() != PAGE_SIZE`.
    pub fn new(data: T) -> Self {
        assert_eq!(
            data.as_ref().len(),
            PAGE_SIZE,
            "SlottedPage requires exactly {} bytes, got {}",
            PAGE_SIZE,
            data.as_ref().len()
        );
        Self { data }
    }

    fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// Returns the page header.
    pub fn header(&self) -> PageHeader {
        PageHeader::read_from(&self.data()[..PAGE_HEADER_SIZE])
    }

    /// Returns the page type recorded in the header.
    pub fn page_type(&self) -> PageType {
        self.header().page_type
    }

    /// Returns the page's own id as recorded in the header.
    pub fn page_id(&self) -> PageId {
        self.header().page_id
    }

    /// Returns the next page link.
    pub fn next_page(&self) -> Option<PageId> {
        self.header().next_page
    }

    fn get_slot(&self, slot_id: SlotId) -> SlotEntry {
        let offset = PAGE_HEADER_SIZE + (slot_id as usize) * SLOT_SIZE;
        SlotEntry::read_from(&self.data()[offset..offset + SLOT_SIZE])
    }

    fn live_bytes(&self) -> usize {
        let header = self.header();
        (0..header.slot_count)
            .map(|slot_id| self.get_slot(slot_id))
            .filter(|slot| !slot.is_empty())
            .map(|slot| slot.length as usize)
            .sum()
    }

    /// Returns the free space available for new records and slots.
    ///
    /// This includes space held by deleted records, which an insert reclaims
    /// by compacting the page.
    pub fn free_space(&self) -> usize {
        let header = self.header();
        PAGE_SIZE - header.free_start as usize - self.live_bytes()
    }

    /// Checks if a record of given size can be inserted.
    ///
    /// This accounts for both the record data and a potential new slot entry.
    pub fn can_insert(&self, record_size: usize) -> bool {
        let header = self.header();
        let need_new_slot = header.first_free_slot == u16::MAX;
        let slot_overhead = if need_new_slot { SLOT_SIZE } else { 0 };
        self.free_space() >= record_size + slot_overhead
    }

    /// Reads a record by slot ID.
    ///
    /// Returns `None` if the slot is out of bounds or deleted.
    pub fn read(&self, slot_id: SlotId) -> Option<&[u8]> {
        let header = self.header();
        if slot_id >= header.slot_count {
            return None;
        }

        let slot = self.get_slot(slot_id);
        if slot.is_empty() {
            return None;
        }

        let start = slot.offset as usize;
        let end = start + slot.length as usize;
        Some(&self.data()[start..end])
    }

    /// Returns the first live slot in physical slot order.
    pub fn first_record(&self) -> Option<SlotId> {
        self.next_live_from(0)
    }

    /// Returns the first live slot after `slot_id`.
    ///
    /// `slot_id` itself does not need to be live, so a cursor stays usable
    /// after the record under it is deleted.
    pub fn next_record(&self, slot_id: SlotId) -> Option<SlotId> {
        self.next_live_from(slot_id.checked_add(1)?)
    }

    fn next_live_from(&self, start: SlotId) -> Option<SlotId> {
        let header = self.header();
        (start..header.slot_count).find(|&slot_id| !self.get_slot(slot_id).is_empty())
    }

    /// Returns an iterator over all valid (non-deleted) records.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &[u8])> {
        let header = self.header();
        (0..header.slot_count)
            .filter_map(move |slot_id| self.read(slot_id).map(|data| (slot_id, data)))
    }

    /// Returns the number of valid (non-deleted) records in this page.
    pub fn record_count(&self) -> usize {
        self.header().record_count as usize
    }
}

// Mutable methods (available for T: AsRef<[u8]> + AsMut<[u8]>)
impl<T: AsRef<[u8]> + AsMut<[u8]>> SlottedPage<T> {
    fn data_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    /// Initializes this page as a new empty page of the given type.
    ///
    /// This zeroes the page and writes a fresh header.
    pub fn init(&mut self, page_type: PageType, page_id: PageId) {
        self.data_mut().fill(0);
        self.set_header(&PageHeader::new(page_type, page_id));
    }

    fn set_header(&mut self, header: &PageHeader) {
        header.write_to(&mut self.data_mut()[..PAGE_HEADER_SIZE]);
    }

    fn set_slot(&mut self, slot_id: SlotId, entry: &SlotEntry) {
        let offset = PAGE_HEADER_SIZE + (slot_id as usize) * SLOT_SIZE;
        entry.write_to(&mut self.data_mut()[offset..offset + SLOT_SIZE]);
    }

    /// Sets the next page link.
    pub fn set_next_page(&mut self, next: Option<PageId>) {
        let mut header = self.header();
        header.next_page = next;
        self.set_header(&header);
    }

    /// Inserts a record and returns its slot ID.
    ///
    /// Deleted slots are reused most-recently-freed first. If the contiguous
    /// free space is too small but deleted records left enough room, the
    /// page is compacted first.
    ///
    /// # Errors
    ///
    /// Returns `PageError::PageFull` if there is not enough space.
    pub fn insert(&mut self, record_data: &[u8]) -> Result<SlotId, PageError> {
        let record_size = record_data.len();
        if !self.can_insert(record_size) {
            return Err(PageError::PageFull {
                required: record_size + SLOT_SIZE,
                available: self.free_space(),
            });
        }

        let reuse_slot = self.header().first_free_slot != u16::MAX;
        let slot_overhead = if reuse_slot { 0 } else { SLOT_SIZE };
        if (self.header().contiguous_free_space() as usize) < record_size + slot_overhead {
            self.compact();
        }

        let mut header = self.header();

        let slot_id = if reuse_slot {
            let slot_id = header.first_free_slot;
            header.first_free_slot = self.get_slot(slot_id).next_free();
            slot_id
        } else {
            let slot_id = header.slot_count;
            header.slot_count += 1;
            header.free_start += SLOT_SIZE as u16;
            slot_id
        };

        header.free_end -= record_size as u16;
        header.record_count += 1;
        let record_offset = header.free_end;

        let start = record_offset as usize;
        let end = start + record_size;
        self.data_mut()[start..end].copy_from_slice(record_data);

        self.set_slot(slot_id, &SlotEntry::new(record_offset, record_size as u16));
        self.set_header(&header);

        Ok(slot_id)
    }

    /// Deletes a record by slot ID and returns the number of bytes it held.
    ///
    /// The slot joins the free list; the record bytes are reclaimed lazily
    /// by [`compact`](Self::compact).
    ///
    /// # Errors
    ///
    /// Returns `PageError::SlotNotFound` if the slot doesn't exist or is already deleted.
    pub fn delete(&mut self, slot_id: SlotId) -> Result<usize, PageError> {
        let mut header = self.header();
        if slot_id >= header.slot_count {
            return Err(PageError::SlotNotFound(slot_id));
        }

        let slot = self.get_slot(slot_id);
        if slot.is_empty() {
            return Err(PageError::SlotNotFound(slot_id));
        }

        self.set_slot(slot_id, &SlotEntry::free(header.first_free_slot));
        header.first_free_slot = slot_id;
        header.record_count -= 1;
        self.set_header(&header);

        Ok(slot.length as usize)
    }

    /// Overwrites a record in place.
    ///
    /// # Errors
    ///
    /// Returns `PageError::SlotNotFound` if the slot doesn't exist or is deleted.
    /// Returns `PageError::RecordSizeMismatch` if the new data has a different length.
    pub fn update(&mut self, slot_id: SlotId, new_data: &[u8]) -> Result<(), PageError> {
        let header = self.header();
        if slot_id >= header.slot_count {
            return Err(PageError::SlotNotFound(slot_id));
        }

        let slot = self.get_slot(slot_id);
        if slot.is_empty() {
            return Err(PageError::SlotNotFound(slot_id));
        }

        if new_data.len() != slot.length as usize {
            return Err(PageError::RecordSizeMismatch {
                expected: slot.length as usize,
                actual: new_data.len(),
            });
        }

        let start = slot.offset as usize;
        self.data_mut()[start..start + new_data.len()].copy_from_slice(new_data);
        Ok(())
    }

    /// Compacts the page by removing gaps between records.
    ///
    /// Live records are rewritten contiguously from the bottom of the page;
    /// slot numbers and the free-slot list are left untouched.
    pub fn compact(&mut self) {
        let header = self.header();

        let mut records: Vec<(SlotId, Vec<u8>)> = Vec::new();
        for slot_id in 0..header.slot_count {
            let slot = self.get_slot(slot_id);
            if !slot.is_empty() {
                let start = slot.offset as usize;
                let end = start + slot.length as usize;
                records.push((slot_id, self.data()[start..end].to_vec()));
            }
        }

        let mut new_free_end = PAGE_SIZE as u16;
        for (slot_id, record_data) in &records {
            new_free_end -= record_data.len() as u16;
            let start = new_free_end as usize;
            self.data_mut()[start..start + record_data.len()].copy_from_slice(record_data);
            self.set_slot(
                *slot_id,
                &SlotEntry::new(new_free_end, record_data.len() as u16),
            );
        }

        let mut header = self.header();
        header.free_end = new_free_end;
        self.set_header(&header);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::storage::PAGE_VERSION;

    fn create_page() -> Vec<u8> {
        let mut data = vec![0u8; PAGE_SIZE];
        SlottedPage::new(&mut data).init(PageType::Data, PageId::new(3));
        data
    }

    #[test]
    fn test_init_writes_header() {
        let data = create_page();
        let page = SlottedPage::new(&data[..]);

        let header = page.header();
        assert_eq!(header.page_type, PageType::Data);
        assert_eq!(header.page_version, PAGE_VERSION);
        assert_eq!(header.slot_count, 0);
        assert_eq!(page.page_id(), PageId::new(3));
        assert_eq!(page.next_page(), None);
        assert_eq!(page.record_count(), 0);
    }

    #[test]
    fn test_insert_and_read() {
        let mut data = create_page();
        let mut page = SlottedPage::new(&mut data);

        let record = b"hello world";
        let slot_id = page.insert(record).unwrap();

        assert_eq!(slot_id, 0);
        assert_eq!(page.read(slot_id), Some(record.as_slice()));
        assert_eq!(page.record_count(), 1);
    }

    #[test]
    fn test_multiple_inserts() {
        let mut data = create_page();
        let mut page = SlottedPage::new(&mut data);

        let records: Vec<&[u8]> = vec![b"first", b"second", b"third"];
        let slot_ids: Vec<_> = records.iter().map(|r| page.insert(r).unwrap()).collect();

        assert_eq!(slot_ids, vec![0, 1, 2]);
        for (slot_id, expected) in slot_ids.iter().zip(records.iter()) {
            assert_eq!(page.read(*slot_id), Some(*expected));
        }
        assert_eq!(page.record_count(), 3);
    }

    #[test]
    fn test_read_invalid_slot() {
        let mut data = create_page();
        let page = SlottedPage::new(&mut data);

        assert!(page.read(0).is_none());
        assert!(page.read(100).is_none());
    }

    #[test]
    fn test_delete() {
        let mut data = create_page();
        let mut page = SlottedPage::new(&mut data);

        let slot0 = page.insert(b"record0").unwrap();
        let slot1 = page.insert(b"record1").unwrap();

        assert_eq!(page.delete(slot0), Ok(7));

        assert!(page.read(slot0).is_none());
        assert_eq!(page.read(slot1), Some(b"record1".as_slice()));
        assert_eq!(page.record_count(), 1);
    }

    #[test]
    fn test_delete_invalid_slot() {
        let mut data = create_page();
        let mut page = SlottedPage::new(&mut data);

        assert_eq!(page.delete(0), Err(PageError::SlotNotFound(0)));

        let slot = page.insert(b"test").unwrap();
        page.delete(slot).unwrap();

        assert_eq!(page.delete(slot), Err(PageError::SlotNotFound(slot)));
    }

    #[test]
    fn test_slot_reuse_is_lifo() {
        let mut data = create_page();
        let mut page = SlottedPage::new(&mut data);

        let slot0 = page.insert(b"record0").unwrap();
        let slot1 = page.insert(b"record1").unwrap();
        let _slot2 = page.insert(b"record2").unwrap();

        page.delete(slot0).unwrap();
        page.delete(slot1).unwrap();

        assert_eq!(page.insert(b"again1").unwrap(), slot1);
        assert_eq!(page.insert(b"again0").unwrap(), slot0);
        assert_eq!(page.read(slot0), Some(b"again0".as_slice()));
    }

    #[test]
    fn test_update_same_size() {
        let mut data = create_page();
        let mut page = SlottedPage::new(&mut data);

        let slot = page.insert(b"hello").unwrap();
        page.update(slot, b"world").unwrap();

        assert_eq!(page.read(slot), Some(b"world".as_slice()));
    }

    #[test]
    fn test_update_size_mismatch() {
        let mut data = create_page();
        let mut page = SlottedPage::new(&mut data);

        let slot = page.insert(b"hello").unwrap();
        assert_eq!(
            page.update(slot, b"hi"),
            Err(PageError::RecordSizeMismatch {
                expected: 5,
                actual: 2
            })
        );
        assert_eq!(page.read(slot), Some(b"hello".as_slice()));
    }

    #[test]
    fn test_update_invalid_slot() {
        let mut data = create_page();
        let mut page = SlottedPage::new(&mut data);

        assert_eq!(page.update(0, b"test"), Err(PageError::SlotNotFound(0)));
    }

    #[test]
    fn test_page_full() {
        let mut data = create_page();
        let mut page = SlottedPage::new(&mut data);

        let large_record = vec![0u8; 200];
        let mut count = 0;
        while page.insert(&large_record).is_ok() {
            count += 1;
        }

        assert_eq!(count, 4);
        assert!(matches!(
            page.insert(&large_record),
            Err(PageError::PageFull { .. })
        ));
    }

    #[test]
    fn test_free_space_counts_deleted_records() {
        let mut data = create_page();
        let mut page = SlottedPage::new(&mut data);

        let large_record = vec![7u8; 300];
        let slot0 = page.insert(&large_record).unwrap();
        let slot1 = page.insert(&large_record).unwrap();
        let slot2 = page.insert(&large_record).unwrap();
        assert!(!page.can_insert(300));

        let free_before = page.free_space();
        page.delete(slot1).unwrap();
        assert_eq!(page.free_space(), free_before + 300);

        // The insert has to compact to find contiguous room.
        let slot3 = page.insert(&[9u8; 300]).unwrap();
        assert_eq!(slot3, slot1);
        assert_eq!(page.read(slot0), Some(large_record.as_slice()));
        assert_eq!(page.read(slot2), Some(large_record.as_slice()));
        assert_eq!(page.read(slot3), Some([9u8; 300].as_slice()));
    }

    #[test]
    fn test_compact_keeps_slots() {
        let mut data = create_page();
        let mut page = SlottedPage::new(&mut data);

        let slot0 = page.insert(b"aaaa").unwrap();
        let slot1 = page.insert(b"bbbb").unwrap();
        let slot2 = page.insert(b"cccc").unwrap();

        page.delete(slot1).unwrap();
        let free_before = page.free_space();
        page.compact();

        assert_eq!(page.free_space(), free_before);
        assert_eq!(page.read(slot0), Some(b"aaaa".as_slice()));
        assert!(page.read(slot1).is_none());
        assert_eq!(page.read(slot2), Some(b"cccc".as_slice()));
        assert_eq!(page.insert(b"dddd").unwrap(), slot1);
    }

    #[test]
    fn test_first_and_next_record() {
        let mut data = create_page();
        let mut page = SlottedPage::new(&mut data);

        assert_eq!(page.first_record(), None);

        page.insert(b"first").unwrap();
        let slot1 = page.insert(b"second").unwrap();
        page.insert(b"third").unwrap();
        page.delete(0).unwrap();

        assert_eq!(page.first_record(), Some(1));
        assert_eq!(page.next_record(1), Some(2));
        assert_eq!(page.next_record(2), None);

        // A cursor on a deleted slot still advances.
        page.delete(slot1).unwrap();
        assert_eq!(page.next_record(slot1), Some(2));
        assert_eq!(page.next_record(u16::MAX), None);
    }

    #[test]
    fn test_iter() {
        let mut data = create_page();
        let mut page = SlottedPage::new(&mut data);

        page.insert(b"first").unwrap();
        let slot1 = page.insert(b"second").unwrap();
        page.insert(b"third").unwrap();

        page.delete(slot1).unwrap();

        let records: Vec<_> = page.iter().collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], (0, b"first".as_slice()));
        assert_eq!(records[1], (2, b"third".as_slice()));
    }

    #[test]
    fn test_next_page_link() {
        let mut data = create_page();
        let mut page = SlottedPage::new(&mut data);

        page.set_next_page(Some(PageId::new(11)));
        assert_eq!(page.next_page(), Some(PageId::new(11)));
        page.set_next_page(None);
        assert_eq!(page.next_page(), None);
    }

    #[test]
    fn test_max_record_size() {
        let mut data = create_page();
        let mut page = SlottedPage::new(&mut data);

        let max_record = vec![0u8; MAX_RECORD_SIZE];
        let slot = page.insert(&max_record).unwrap();
        assert_eq!(page.read(slot).map(|r| r.len()), Some(MAX_RECORD_SIZE));

        assert!(matches!(
            page.insert(&[0u8; 1]),
            Err(PageError::PageFull { .. })
        ));
    }

    #[test]
    fn test_free_space_calculation() {
        let mut data = create_page();
        let mut page = SlottedPage::new(&mut data);

        let initial_free = page.free_space();
        assert_eq!(initial_free, PAGE_SIZE - PAGE_HEADER_SIZE);

        let record = b"test data";
        page.insert(record).unwrap();

        let expected_free = initial_free - record.len() - SLOT_SIZE;
        assert_eq!(page.free_space(), expected_free);
    }

    #[test]
    fn test_empty_record() {
        let mut data = create_page();
        let mut page = SlottedPage::new(&mut data);

        let slot = page.insert(b"").unwrap();
        assert_eq!(page.read(slot), Some(b"".as_slice()));
        assert_eq!(page.record_count(), 1);
    }
}
