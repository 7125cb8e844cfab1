//! Page identifier, size constants and on-page layouts.

mod header;
pub mod slotted;

pub use header::{PAGE_HEADER_SIZE, PAGE_VERSION, PageHeader, PageType};
pub use slotted::{MAX_RECORD_SIZE, PageError, SLOT_SIZE, SlotEntry, SlotId, SlottedPage};

use std::fmt;

/// 1KB page size.
///
/// Small pages keep the directory chain of a heap file several pages long
/// even for modest files, which is what the heap layer is exercised on.
pub const PAGE_SIZE: usize = 1024;

/// Unique identifier for a page within the storage system.
///
/// PageId is a 64-bit value encoding the page number within the storage
/// backend. `PageId::INVALID` is only used inside page images to mean
/// "no page"; APIs use `Option<PageId>` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u64);

impl PageId {
    /// Sentinel stored on disk for a missing page link.
    pub const INVALID: PageId = PageId(u64::MAX);

    /// Creates a new PageId from a page number.
    pub const fn new(page_num: u64) -> Self {
        Self(page_num)
    }

    /// Returns the page number.
    pub const fn page_num(&self) -> u64 {
        self.0
    }

    /// Returns false for the `INVALID` sentinel.
    pub const fn is_valid(&self) -> bool {
        self.0 != u64::MAX
    }

    /// Calculates the byte offset for this page in a storage file.
    pub const fn byte_offset(&self) -> u64 {
        self.0 * PAGE_SIZE as u64
    }

    /// Decodes an on-page link, mapping the sentinel to `None`.
    pub(crate) fn from_raw_link(raw: u64) -> Option<Self> {
        let id = PageId(raw);
        id.is_valid().then_some(id)
    }

    /// Encodes an optional link for storage inside a page.
    pub(crate) fn to_raw_link(link: Option<PageId>) -> u64 {
        link.unwrap_or(PageId::INVALID).0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "INVALID")
        }
    }
}
