//! Heap files: unordered collections of variable-length records.
//!
//! - [`HeapFile`]: record insert/select/update/delete and scans
//! - [`HeapScan`]: two-level sequential iterator
//! - [`RecordId`]: stable `(page, slot)` record address
//! - [`DirectoryEntry`], [`DirectoryPage`], [`DataPage`]: on-page views
//!
//! A heap file is a chain of directory pages whose entries point at data
//! pages. Inserts go to the first data page with room, following the chain
//! from the head; data pages are created and removed as they fill and empty.

mod directory;
mod error;
mod file;
mod page;
mod scan;

pub use directory::{DIRECTORY_ENTRY_SIZE, DirectoryEntry, DirectoryPage};
pub use error::{ErrorKind, HeapError};
pub use file::HeapFile;
pub use page::{DataPage, RecordId};
pub use scan::HeapScan;
