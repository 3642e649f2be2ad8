use crate::error::SzError;

/// Largest number of workers a ring may hold.
pub const MAX_THREADS: usize = 32;

/// Default uncompressed block size (1 MiB).
pub const DEFAULT_BLOCK_SIZE: usize = 1 << 20;

/// Worst-case output size of a block of `block_size` bytes.
///
/// Leaves room for codecs whose output may exceed their input, such as
/// deflate on incompressible data.
#[must_use]
pub const fn dest_block_bound(block_size: usize) -> usize {
    block_size
        .saturating_add(block_size / 16)
        .saturating_add(64)
}

/// Sizing of a block pipeline ring.
///
/// # Examples
///
/// ```
/// use mtcoder::MtCoderConfig;
///
/// let config = MtCoderConfig::default()
///     .with_num_threads(4)
///     .with_block_size(64 * 1024);
/// assert!(config.validate().is_ok());
/// assert!(config.dest_block_size > config.block_size);
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MtCoderConfig {
    /// Number of workers in the ring, `1..=MAX_THREADS`.
    pub num_threads: usize,
    /// Bytes read from the input per block.
    pub block_size: usize,
    /// Capacity of each worker's output buffer.
    pub dest_block_size: usize,
}

impl MtCoderConfig {
    /// Sets the worker count.
    #[must_use]
    pub const fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Sets the block size and resizes the output buffers to match.
    #[must_use]
    pub const fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self.dest_block_size = dest_block_bound(block_size);
        self
    }

    /// Overrides the output buffer capacity.
    #[must_use]
    pub const fn with_dest_block_size(mut self, dest_block_size: usize) -> Self {
        self.dest_block_size = dest_block_size;
        self
    }

    /// Checks the configured sizes.
    ///
    /// # Errors
    ///
    /// [`SzError::Param`] when the worker count is outside `1..=MAX_THREADS`
    /// or either buffer size is zero.
    pub const fn validate(&self) -> Result<(), SzError> {
        if self.num_threads == 0
            || self.num_threads > MAX_THREADS
            || self.block_size == 0
            || self.dest_block_size == 0
        {
            return Err(SzError::Param);
        }
        Ok(())
    }
}

impl Default for MtCoderConfig {
    fn default() -> Self {
        Self {
            num_threads: 1,
            block_size: DEFAULT_BLOCK_SIZE,
            dest_block_size: dest_block_bound(DEFAULT_BLOCK_SIZE),
        }
    }
}

/// Allocates a zeroed buffer of `len` bytes, reporting failure instead of
/// aborting.
pub(crate) fn alloc_buffer(len: usize) -> Result<Vec<u8>, SzError> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(len).map_err(|_| SzError::Mem)?;
    buffer.resize(len, 0);
    Ok(buffer)
}
