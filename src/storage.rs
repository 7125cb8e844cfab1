//! Storage layer: page I/O, page layout, disk management and buffering.
//!
//! # Architecture
//!
//! ```text
//! +-------------------+
//! | Buffer Pool       |  <- buffer
//! +-------------------+
//!          |
//!          v
//! +-------------------+
//! | Disk Manager      |  <- disk
//! +-------------------+
//!          |
//!          v
//! +-------------------+
//! | Storage Trait     |  <- io
//! +-------------------+
//!       /      \
//!      v        v
//! +--------------+ +-------------+
//! | MemoryStorage| | FileStorage |
//! +--------------+ +-------------+
//! ```
//!
//! All pages are `PAGE_SIZE` bytes. The layout inside a page is described
//! by [`page`]; the layers below the heap never interpret page contents.

pub mod buffer;
pub mod disk;
pub mod error;
pub mod io;
pub mod page;

pub use buffer::{BufferPool, BufferPoolConfig, BufferPoolError, LruReplacer, PageGuard, Replacer};
pub use disk::{DiskManager, IoStats, MAX_FILE_NAME_LEN};
pub use error::StorageError;
pub use io::{FileStorage, MemoryStorage, Storage};
pub use page::{
    MAX_RECORD_SIZE, PAGE_HEADER_SIZE, PAGE_SIZE, PAGE_VERSION, PageError, PageHeader, PageId,
    PageType, SLOT_SIZE, SlotId, SlottedPage,
};
