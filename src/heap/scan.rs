//! Sequential scan over a heap file.
//!
//! [`HeapScan`] is a two-level iteration: directory entries on the outside,
//! data page slots on the inside. It pins exactly the directory page and the
//! data page it is positioned on.

use crate::storage::{LruReplacer, PageGuard, Replacer, SlotId, Storage};

use super::directory::read_dir;
use super::error::HeapError;
use super::file::HeapFile;
use super::page::{RecordId, read_data};

/// Iterator over every record of a [`HeapFile`].
///
/// Records come back in directory order, then slot order within each data
/// page. For a file filled by same-size inserts with no deletes, that is
/// insertion order.
///
/// Records may be deleted through the file while a scan is open, including
/// the record the scan last returned.
///
/// Pins are released by [`close`](Self::close), by reaching the end, or by
/// dropping the scan.
pub struct HeapScan<'f, 'a, S: Storage, R: Replacer = LruReplacer> {
    file: &'f HeapFile<'a, S, R>,
    /// Directory page being walked; `None` once the scan is finished.
    dir_page: Option<PageGuard<'a, S, R>>,
    /// Entry slot on `dir_page`; `None` before the first entry.
    entry: Option<SlotId>,
    /// Data page of the current entry.
    data_page: Option<PageGuard<'a, S, R>>,
    /// Last record returned from `data_page`; `None` once the page is used up.
    cur_rid: Option<RecordId>,
}

impl<'f, 'a, S: Storage, R: Replacer> HeapScan<'f, 'a, S, R> {
    /// Opens a scan positioned before the first record.
    ///
    /// Pins the head directory page.
    pub fn new(file: &'f HeapFile<'a, S, R>) -> Result<Self, HeapError> {
        let dir_page = file.fetch_directory(file.head_page_id())?;
        Ok(Self {
            file,
            dir_page: Some(dir_page),
            entry: None,
            data_page: None,
            cur_rid: None,
        })
    }

    /// Returns the next record and its id, or `None` when the file is
    /// exhausted.
    ///
    /// # Errors
    ///
    /// Returns `HeapError::EmptyDataPage` if a directory entry refers to a
    /// data page with no records.
    pub fn get_next(&mut self) -> Result<Option<(RecordId, Vec<u8>)>, HeapError> {
        loop {
            if let Some(record) = self.next_on_data_page()? {
                return Ok(Some(record));
            }

            let Some(dir_page) = &self.dir_page else {
                return Ok(None);
            };

            let entry = self.entry;
            let next_entry = read_dir(dir_page, |dir| {
                let slot_id = match entry {
                    None => dir.first_entry(),
                    Some(slot_id) => dir.next_entry(slot_id),
                };
                slot_id.and_then(|slot_id| dir.entry(slot_id).map(|entry| (slot_id, entry)))
            })?;

            if let Some((slot_id, entry)) = next_entry {
                // Nothing below moves the position until the fetch succeeds,
                // so a failed call can be retried.
                self.data_page = None;
                self.cur_rid = None;

                let data_page = self.file.pool().fetch_page(entry.page_id)?;
                let first = read_data(&data_page, |page| {
                    page.first_record()
                        .and_then(|slot_id| page.record(slot_id).map(|r| (slot_id, r.to_vec())))
                })?;
                let Some((first_slot, record)) = first else {
                    return Err(HeapError::EmptyDataPage(entry.page_id));
                };

                let rid = RecordId::new(entry.page_id, first_slot);
                self.entry = Some(slot_id);
                self.data_page = Some(data_page);
                self.cur_rid = Some(rid);
                return Ok(Some((rid, record)));
            }

            let next_dir = read_dir(dir_page, |dir| dir.next_page())?;
            match next_dir {
                Some(page_id) => {
                    self.data_page = None;
                    self.cur_rid = None;
                    let next = self.file.fetch_directory(page_id)?;
                    self.dir_page = Some(next);
                    self.entry = None;
                }
                None => {
                    self.close();
                    return Ok(None);
                }
            }
        }
    }

    /// Advances within the current data page.
    fn next_on_data_page(&mut self) -> Result<Option<(RecordId, Vec<u8>)>, HeapError> {
        let (Some(data_page), Some(rid)) = (&self.data_page, self.cur_rid) else {
            return Ok(None);
        };

        let next = read_data(data_page, |page| {
            page.next_record(rid.slot_id)
                .and_then(|slot_id| page.record(slot_id).map(|r| (slot_id, r.to_vec())))
        })?;

        match next {
            Some((slot_id, record)) => {
                let rid = RecordId::new(rid.page_id, slot_id);
                self.cur_rid = Some(rid);
                Ok(Some((rid, record)))
            }
            None => {
                self.cur_rid = None;
                Ok(None)
            }
        }
    }

    /// Releases the pages held by the scan. Safe to call more than once.
    pub fn close(&mut self) {
        self.data_page = None;
        self.dir_page = None;
        self.entry = None;
        self.cur_rid = None;
    }
}

impl<S: Storage, R: Replacer> Iterator for HeapScan<'_, '_, S, R> {
    type Item = Result<(RecordId, Vec<u8>), HeapError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.get_next().transpose()
    }
}
