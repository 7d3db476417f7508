//! Error types returned by the allocator.

use snafu::Snafu;

/// Why [`Allocator::allocate`](crate::Allocator::allocate) gave up.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AllocError {
    /// The page source refused to map a new region, or the region size
    /// needed for `size` bytes does not fit in a `usize`.
    #[snafu(display("could not reserve a region for {size} bytes"))]
    Reservation { size: usize },

    /// A chunk passed the first-fit check but could not be split. This means
    /// the free list is inconsistent with the search filter.
    #[snafu(display("chunk of {chunk_size} bytes cannot be split for {size} bytes"))]
    SplitPrecondition { chunk_size: usize, size: usize },
}

/// Why [`Allocator::release`](crate::Allocator::release) refused a pointer.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ReleaseError {
    #[snafu(display("cannot release a null pointer"))]
    Null,

    /// The pointer was never returned by `allocate`, or was already released.
    #[snafu(display("{addr:#x} is not an allocation in use"))]
    NotInUse { addr: usize },
}

/// Rejected [`Config`](crate::Config) values.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("region size must not be zero"))]
    ZeroRegionSize,

    #[snafu(display("alignment must be a non-zero power of two, got {alignment}"))]
    InvalidAlignment { alignment: usize },
}
