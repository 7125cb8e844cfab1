//! Buffer pool for caching pages in memory.
//!
//! # Components
//!
//! - [`BufferPool`]: Main interface for page access
//! - [`PageGuard`]: RAII guard holding one pin
//! - [`Replacer`]: Trait for page replacement policies
//! - [`LruReplacer`]: LRU (Least Recently Used) implementation
//! - [`BufferPoolConfig`]: Pool sizing
//!
//! # Example
//!
//! ```
//! use heapfile::storage::{BufferPool, LruReplacer, MemoryStorage};
//!
//! # fn main() -> Result<(), heapfile::storage::BufferPoolError> {
//! let pool = BufferPool::new(MemoryStorage::new(), LruReplacer::new(16), 16);
//!
//! let mut guard = pool.new_page()?;
//! guard.write(|data| data[0] = 42);
//! let page_id = guard.page_id();
//! drop(guard);
//!
//! assert_eq!(pool.unpinned_frame_count(), 16);
//! assert_eq!(pool.fetch_page(page_id)?.read(|data| data[0]), 42);
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod frame;
mod guard;
mod pool;
mod replacer;

pub use config::BufferPoolConfig;
pub use error::BufferPoolError;
pub use guard::PageGuard;
pub use pool::BufferPool;
pub use replacer::{LruReplacer, Replacer};
