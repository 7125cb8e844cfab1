//! Buffer pool configuration.

use super::error::BufferPoolError;

/// Configuration for the buffer pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferPoolConfig {
    /// Number of frames in the buffer pool.
    ///
    /// This determines the maximum number of pages that can be cached in memory
    /// simultaneously. With 1KB pages:
    /// - 16 frames = 16KB (tight pools in tests)
    /// - 64 frames = 64KB (default)
    /// - 1024 frames = 1MB
    pub pool_size: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self { pool_size: 64 }
    }
}

impl BufferPoolConfig {
    /// Creates a configuration with the given number of frames.
    pub fn new(pool_size: usize) -> Self {
        Self { pool_size }
    }

    /// Sets the number of frames.
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Checks that the configuration describes a usable pool.
    pub fn validate(&self) -> Result<(), BufferPoolError> {
        if self.pool_size == 0 {
            return Err(BufferPoolError::Config {
                message: "pool_size must be > 0".to_string(),
            });
        }
        Ok(())
    }
}
