//! Page directory of a heap file.
//!
//! A heap file is anchored by its head directory page. Directory pages form
//! a singly linked chain through the page header's next link; each holds one
//! fixed-size [`DirectoryEntry`] per data page, stored as a record in the
//! directory page's slot array.
//!
//! ```text
//! head dir page ──next──> dir page ──next──> dir page ──> None
//!   │ │ │                   │ │
//!   v v v                   v v
//!  data pages              data pages
//! ```
//!
//! Removing an entry frees its slot without moving the others, so an entry's
//! slot number is stable for as long as the entry exists.

use crate::storage::{
    PageError, PageGuard, PageId, PageType, Replacer, SLOT_SIZE, SlotId, SlottedPage, Storage,
};

use super::error::HeapError;
use super::file::HeapFile;
use super::page::DataPage;

/// Encoded size of a directory entry.
pub const DIRECTORY_ENTRY_SIZE: usize = 12;

/// Directory record describing one data page.
///
/// Layout (12 bytes):
/// - `page_id`: u64
/// - `record_count`: u16
/// - `free_space`: u16
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// The data page this entry describes.
    pub page_id: PageId,
    /// Live records on the data page.
    pub record_count: u16,
    /// Reclaimable free bytes on the data page.
    pub free_space: u16,
}

impl DirectoryEntry {
    /// Decodes an entry.
    pub fn read_from(data: &[u8]) -> Self {
        let mut page_id = [0u8; 8];
        page_id.copy_from_slice(&data[0..8]);
        Self {
            page_id: PageId::new(u64::from_le_bytes(page_id)),
            record_count: u16::from_le_bytes([data[8], data[9]]),
            free_space: u16::from_le_bytes([data[10], data[11]]),
        }
    }

    /// Encodes the entry.
    pub fn to_bytes(&self) -> [u8; DIRECTORY_ENTRY_SIZE] {
        let mut buf = [0u8; DIRECTORY_ENTRY_SIZE];
        buf[0..8].copy_from_slice(&self.page_id.page_num().to_le_bytes());
        buf[8..10].copy_from_slice(&self.record_count.to_le_bytes());
        buf[10..12].copy_from_slice(&self.free_space.to_le_bytes());
        buf
    }

    /// Returns true if a record of `len` bytes fits on the data page.
    pub fn has_room_for(&self, len: usize) -> bool {
        self.free_space as usize >= len + SLOT_SIZE
    }
}

/// A slotted page of type [`PageType::Directory`].
pub struct DirectoryPage<T> {
    page: SlottedPage<T>,
}

impl<T: AsRef<[u8]>> DirectoryPage<T> {
    /// Views `data` as a directory page, or returns `None` if it is another type.
    pub fn try_new(data: T) -> Option<Self> {
        let page = SlottedPage::new(data);
        (page.page_type() == PageType::Directory).then_some(Self { page })
    }

    /// Returns the entry in `slot_id`, if present.
    pub fn entry(&self, slot_id: SlotId) -> Option<DirectoryEntry> {
        self.page.read(slot_id).map(DirectoryEntry::read_from)
    }

    /// Iterates entries in slot order.
    pub fn entries(&self) -> impl Iterator<Item = (SlotId, DirectoryEntry)> + '_ {
        self.page
            .iter()
            .map(|(slot_id, data)| (slot_id, DirectoryEntry::read_from(data)))
    }

    /// Returns the slot of the entry for `page_id`.
    pub fn find(&self, page_id: PageId) -> Option<SlotId> {
        self.entries()
            .find(|(_, entry)| entry.page_id == page_id)
            .map(|(slot_id, _)| slot_id)
    }

    /// Returns the first entry slot.
    pub fn first_entry(&self) -> Option<SlotId> {
        self.page.first_record()
    }

    /// Returns the first entry slot after `slot_id`.
    pub fn next_entry(&self, slot_id: SlotId) -> Option<SlotId> {
        self.page.next_record(slot_id)
    }

    /// Returns the number of entries.
    pub fn entry_count(&self) -> usize {
        self.page.record_count()
    }

    /// Returns true if no further entry fits.
    pub fn is_full(&self) -> bool {
        !self.page.can_insert(DIRECTORY_ENTRY_SIZE)
    }

    /// Returns the next directory page.
    pub fn next_page(&self) -> Option<PageId> {
        self.page.next_page()
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> DirectoryPage<T> {
    /// Formats `data` as an empty directory page.
    pub fn init(data: T, page_id: PageId) -> Self {
        let mut page = SlottedPage::new(data);
        page.init(PageType::Directory, page_id);
        Self { page }
    }

    /// Appends an entry.
    pub fn insert_entry(&mut self, entry: &DirectoryEntry) -> Result<SlotId, PageError> {
        self.page.insert(&entry.to_bytes())
    }

    /// Overwrites the entry in `slot_id`.
    pub fn set_entry(&mut self, slot_id: SlotId, entry: &DirectoryEntry) -> Result<(), PageError> {
        self.page.update(slot_id, &entry.to_bytes())
    }

    /// Removes the entry in `slot_id`.
    pub fn remove_entry(&mut self, slot_id: SlotId) -> Result<(), PageError> {
        self.page.delete(slot_id).map(|_| ())
    }

    /// Sets the next directory page.
    pub fn set_next_page(&mut self, next: Option<PageId>) {
        self.page.set_next_page(next);
    }
}

/// Runs `f` over a pinned directory page, or fails with `Corrupted` if the
/// page is not a directory page.
pub(super) fn read_dir<S: Storage, R: Replacer, U>(
    guard: &PageGuard<'_, S, R>,
    f: impl FnOnce(&DirectoryPage<&[u8]>) -> U,
) -> Result<U, HeapError> {
    guard
        .read(|data| DirectoryPage::try_new(data).map(|page| f(&page)))
        .ok_or_else(|| not_a_directory_page(guard.page_id()))
}

/// Mutable counterpart of [`read_dir`].
pub(super) fn write_dir<S: Storage, R: Replacer, U>(
    guard: &mut PageGuard<'_, S, R>,
    f: impl FnOnce(&mut DirectoryPage<&mut [u8]>) -> U,
) -> Result<U, HeapError> {
    let page_id = guard.page_id();
    guard
        .write(|data| DirectoryPage::try_new(data).map(|mut page| f(&mut page)))
        .ok_or_else(|| not_a_directory_page(page_id))
}

fn not_a_directory_page(page_id: PageId) -> HeapError {
    HeapError::Corrupted(format!("page {page_id} is not a directory page"))
}

// Directory maintenance. Every helper leaves pin counts as it found them,
// on success and on failure.
impl<'a, S: Storage, R: Replacer> HeapFile<'a, S, R> {
    /// Pins a directory page of this file.
    pub(super) fn fetch_directory(&self, page_id: PageId) -> Result<PageGuard<'a, S, R>, HeapError> {
        let guard = self.pool().fetch_page(page_id)?;
        read_dir(&guard, |_| ())?;
        Ok(guard)
    }

    /// Finds a data page with room for a `len`-byte record, first fit in
    /// chain then slot order, creating a new data page if none has room.
    ///
    /// Returns the page and whether it was just created.
    pub(super) fn get_avail_page(&self, len: usize) -> Result<(PageId, bool), HeapError> {
        let mut current = Some(self.head_page_id());
        while let Some(dir_id) = current {
            let guard = self.fetch_directory(dir_id)?;
            let (found, next) = read_dir(&guard, |dir| {
                let found = dir
                    .entries()
                    .find(|(_, entry)| entry.has_room_for(len))
                    .map(|(_, entry)| entry.page_id);
                (found, dir.next_page())
            })?;
            if let Some(page_id) = found {
                return Ok((page_id, false));
            }
            current = next;
        }

        Ok((self.insert_page()?, true))
    }

    /// Locates the directory entry for `page_id`.
    ///
    /// Returns the directory page, still pinned, and the entry's slot.
    pub(super) fn find_dir_entry(
        &self,
        page_id: PageId,
    ) -> Result<(PageGuard<'a, S, R>, SlotId), HeapError> {
        let mut current = Some(self.head_page_id());
        while let Some(dir_id) = current {
            let guard = self.fetch_directory(dir_id)?;
            let (found, next) = read_dir(&guard, |dir| (dir.find(page_id), dir.next_page()))?;
            if let Some(slot_id) = found {
                return Ok((guard, slot_id));
            }
            current = next;
        }
        Err(HeapError::DirectoryEntryNotFound(page_id))
    }

    /// Applies a record count change and a new free byte count to the entry
    /// for `page_id`.
    ///
    /// An entry whose count drops to zero is removed along with its data page.
    pub(super) fn update_dir_entry(
        &self,
        page_id: PageId,
        delta: i32,
        free_space: usize,
    ) -> Result<(), HeapError> {
        let (mut dir_guard, slot_id) = self.find_dir_entry(page_id)?;
        let entry = read_dir(&dir_guard, |dir| dir.entry(slot_id))?
            .ok_or(HeapError::DirectoryEntryNotFound(page_id))?;

        let record_count = i32::from(entry.record_count) + delta;
        if record_count < 0 || record_count > i32::from(u16::MAX) {
            return Err(HeapError::Corrupted(format!(
                "record count of data page {page_id} would become {record_count}"
            )));
        }
        if record_count == 0 {
            return self.delete_page(page_id, dir_guard, slot_id);
        }

        let updated = DirectoryEntry {
            page_id,
            record_count: record_count as u16,
            free_space: free_space as u16,
        };
        write_dir(&mut dir_guard, |dir| dir.set_entry(slot_id, &updated))??;
        Ok(())
    }

    /// Allocates an empty data page and records it in the directory.
    ///
    /// The entry goes on the tail directory page; a new tail is linked in
    /// when the current one is full.
    pub(super) fn insert_page(&self) -> Result<PageId, HeapError> {
        let (data_id, free_space) = {
            let mut guard = self.pool().new_page()?;
            let data_id = guard.page_id();
            let free_space = guard.write(|data| DataPage::init(data, data_id).free_space());
            (data_id, free_space)
        };
        let entry = DirectoryEntry {
            page_id: data_id,
            record_count: 0,
            free_space: free_space as u16,
        };

        match self.append_entry(&entry) {
            Ok(()) => Ok(data_id),
            Err(e) => {
                self.pool().free_page(data_id)?;
                Err(e)
            }
        }
    }

    fn append_entry(&self, entry: &DirectoryEntry) -> Result<(), HeapError> {
        let mut tail = self.fetch_directory(self.head_page_id())?;
        while let Some(next) = read_dir(&tail, |dir| dir.next_page())? {
            drop(tail);
            tail = self.fetch_directory(next)?;
        }

        if !read_dir(&tail, |dir| dir.is_full())? {
            write_dir(&mut tail, |dir| dir.insert_entry(entry))??;
            return Ok(());
        }

        let mut new_tail = self.pool().new_page()?;
        let new_id = new_tail.page_id();
        new_tail.write(|data| {
            let mut dir = DirectoryPage::init(data, new_id);
            dir.insert_entry(entry)
        })?;
        write_dir(&mut tail, |dir| dir.set_next_page(Some(new_id)))?;
        tracing::debug!(file = %self, page_id = %new_id, "added directory page");
        Ok(())
    }

    /// Removes the entry in `slot_id` of the pinned directory page and frees
    /// the data page it describes.
    ///
    /// A non-head directory page left empty is unlinked and freed. Once the
    /// entry is gone the removal stands: later failures to free a page are
    /// logged and leave the page allocated.
    pub(super) fn delete_page(
        &self,
        page_id: PageId,
        mut dir_guard: PageGuard<'a, S, R>,
        slot_id: SlotId,
    ) -> Result<(), HeapError> {
        let dir_id = dir_guard.page_id();
        let (entry_count, next) = read_dir(&dir_guard, |dir| (dir.entry_count(), dir.next_page()))?;
        let unlink = entry_count == 1 && dir_id != self.head_page_id();

        let prev_guard = if unlink {
            Some(self.find_prev_directory(dir_id)?)
        } else {
            None
        };

        write_dir(&mut dir_guard, |dir| dir.remove_entry(slot_id))??;
        if let Err(e) = self.pool().free_page(page_id) {
            tracing::warn!(file = %self, %page_id, error = %e, "failed to free data page");
        }
        tracing::debug!(file = %self, %page_id, "removed data page");

        if let Some(mut prev_guard) = prev_guard {
            prev_guard.write(|data| {
                if let Some(mut prev) = DirectoryPage::try_new(data) {
                    prev.set_next_page(next);
                }
            });
            drop(prev_guard);
            drop(dir_guard);
            match self.pool().free_page(dir_id) {
                Ok(()) => tracing::debug!(file = %self, page_id = %dir_id, "removed directory page"),
                Err(e) => {
                    tracing::warn!(file = %self, page_id = %dir_id, error = %e, "failed to free directory page");
                }
            }
        }
        Ok(())
    }

    fn find_prev_directory(&self, target: PageId) -> Result<PageGuard<'a, S, R>, HeapError> {
        let mut current = self.head_page_id();
        loop {
            let guard = self.fetch_directory(current)?;
            let next = read_dir(&guard, |dir| dir.next_page())?;
            if next == Some(target) {
                return Ok(guard);
            }
            drop(guard);
            current = next.ok_or_else(|| {
                HeapError::Corrupted(format!("directory page {target} is not in the chain"))
            })?;
        }
    }
}
