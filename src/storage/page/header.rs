//! Page header format for the storage layer.
//!
//! Every page starts with the same header. It identifies the page type,
//! describes the slot array and free space, and carries the page's own id
//! and the link to the next page in whatever chain the page belongs to.
//!
//! **Note:** The storage I/O layer does not interpret this header; it reads
//! and writes raw page buffers. Header interpretation is the responsibility
//! of [`SlottedPage`](super::SlottedPage) and the heap layer above it.

use super::{PAGE_SIZE, PageId};

/// Size of the page header in bytes.
pub const PAGE_HEADER_SIZE: usize = 32;

/// Current page layout version.
pub const PAGE_VERSION: u8 = 1;

/// Page type identifiers.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// Uninitialized or free page.
    Free = 0,
    /// Heap data page holding record payloads.
    Data = 1,
    /// Heap directory page holding data page entries.
    Directory = 2,
}

impl PageType {
    /// Creates a PageType from a raw u8 value.
    ///
    /// Returns `None` if the value doesn't match any known page type.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(PageType::Free),
            1 => Some(PageType::Data),
            2 => Some(PageType::Directory),
            _ => None,
        }
    }
}

/// Page header stored at the beginning of each page.
///
/// Layout (32 bytes total):
/// - `page_type`: u8 (1 byte)
/// - `page_version`: u8 (1 byte)
/// - `slot_count`: u16 (2 bytes)
/// - `free_start`: u16 (2 bytes)
/// - `free_end`: u16 (2 bytes)
/// - `first_free_slot`: u16 (2 bytes)
/// - `record_count`: u16 (2 bytes)
/// - `reserved`: [u8; 4]
/// - `page_id`: u64 (8 bytes)
/// - `next_page`: u64 (8 bytes, `u64::MAX` = none)
#[derive(Debug, Clone, Copy)]
pub struct PageHeader {
    /// Type of this page.
    pub page_type: PageType,
    /// Layout version number.
    pub page_version: u8,
    /// Number of slots in the slot array (including deleted slots).
    pub slot_count: u16,
    /// Offset where free space starts (end of slot array).
    pub free_start: u16,
    /// Offset where free space ends (start of record area).
    pub free_end: u16,
    /// Index of first free (deleted) slot, or `u16::MAX` if none.
    pub first_free_slot: u16,
    /// Number of live (non-deleted) slots.
    pub record_count: u16,
    /// Id of the page this header belongs to.
    pub page_id: PageId,
    /// Next page in the chain, if any.
    pub next_page: Option<PageId>,
}

impl PageHeader {
    /// Creates a new header for an empty page of the given type.
    pub fn new(page_type: PageType, page_id: PageId) -> Self {
        Self {
            page_type,
            page_version: PAGE_VERSION,
            slot_count: 0,
            free_start: PAGE_HEADER_SIZE as u16,
            free_end: PAGE_SIZE as u16,
            first_free_slot: u16::MAX,
            record_count: 0,
            page_id,
            next_page: None,
        }
    }

    /// Returns the amount of contiguous free space available.
    pub fn contiguous_free_space(&self) -> u16 {
        self.free_end.saturating_sub(self.free_start)
    }

    /// Reads a header from a page byte slice.
    pub fn read_from(data: &[u8]) -> Self {
        Self {
            page_type: PageType::from_u8(data[0]).unwrap_or(PageType::Free),
            page_version: data[1],
            slot_count: u16::from_le_bytes([data[2], data[3]]),
            free_start: u16::from_le_bytes([data[4], data[5]]),
            free_end: u16::from_le_bytes([data[6], data[7]]),
            first_free_slot: u16::from_le_bytes([data[8], data[9]]),
            record_count: u16::from_le_bytes([data[10], data[11]]),
            // Bytes 12..16 are reserved
            page_id: PageId::new(read_u64(&data[16..24])),
            next_page: PageId::from_raw_link(read_u64(&data[24..32])),
        }
    }

    /// Writes the header to a page byte slice.
    pub fn write_to(&self, data: &mut [u8]) {
        data[0] = self.page_type as u8;
        data[1] = self.page_version;
        data[2..4].copy_from_slice(&self.slot_count.to_le_bytes());
        data[4..6].copy_from_slice(&self.free_start.to_le_bytes());
        data[6..8].copy_from_slice(&self.free_end.to_le_bytes());
        data[8..10].copy_from_slice(&self.first_free_slot.to_le_bytes());
        data[10..12].copy_from_slice(&self.record_count.to_le_bytes());
        data[12..16].fill(0);
        data[16..24].copy_from_slice(&self.page_id.page_num().to_le_bytes());
        data[24..32].copy_from_slice(&PageId::to_raw_link(self.next_page).to_le_bytes());
    }
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}
