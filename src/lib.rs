//! A heap-file record store over a pin-counted buffer pool.
//!
//! [`heap`] holds heap files and scans; [`storage`] holds the page layout,
//! page I/O backends, disk manager and buffer pool they run on.

pub mod heap;
pub mod storage;
