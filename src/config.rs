use snafu::ensure;

use crate::error::{ConfigError, InvalidAlignmentSnafu, ZeroRegionSizeSnafu};

/// Payload size of a region when the request itself is smaller: 32 KiB.
pub const DEFAULT_REGION_SIZE: usize = 32 * 1024;

/// Granularity every allocation size is rounded up to.
pub const DEFAULT_ALIGNMENT: usize = 4;

/// Tunables of an [`Allocator`](crate::Allocator).
///
/// ```
/// use chunkalloc::Config;
///
/// let config = Config::new().with_region_size(4096).with_alignment(8);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.region_size(), 4096);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    region_size: usize,
    alignment: usize,
}

impl Config {
    pub const fn new() -> Self {
        Self {
            region_size: DEFAULT_REGION_SIZE,
            alignment: DEFAULT_ALIGNMENT,
        }
    }

    /// Minimum payload of every region requested from the page source.
    #[must_use]
    pub const fn with_region_size(mut self, region_size: usize) -> Self {
        self.region_size = region_size;
        self
    }

    /// Allocation sizes are rounded up to a multiple of `alignment`, which
    /// must be a power of two.
    #[must_use]
    pub const fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    #[inline]
    pub const fn region_size(&self) -> usize {
        self.region_size
    }

    #[inline]
    pub const fn alignment(&self) -> usize {
        self.alignment
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(self.region_size > 0, ZeroRegionSizeSnafu);
        ensure!(
            self.alignment.is_power_of_two(),
            InvalidAlignmentSnafu {
                alignment: self.alignment
            }
        );
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
