use std::{cmp, ops::Range, ptr::NonNull};

use log::debug;
use snafu::OptionExt as _;

use crate::{
    chunk::{Chunk, HEADER_SIZE},
    error::{AllocError, ReservationSnafu},
    kernel::PageSource,
};

/// A mapping obtained from a [`PageSource`].
///
/// When reserved, a region is a single chunk spanning the whole mapping. That
/// chunk may later be split and its fragments merged back, but the region
/// itself is only ever given back as a whole, when the allocator is dropped.
/// Chunks never merge across two regions, even when the mappings happen to
/// be adjacent: each mapping is a separate allocation.
///
/// ```text
/// base                                                     base + len
/// +--------+------------------------------------------------+
/// | Header |        payload: max(request, region_size)      |
/// +--------+------------------------------------------------+
/// ```
#[derive(Debug)]
pub(crate) struct Region {
    base: NonNull<u8>,
    len: usize,
}

impl Region {
    /// Maps a region able to hold at least `minimum` payload bytes and
    /// returns it along with the chunk covering it.
    pub fn reserve<P: PageSource>(
        source: &mut P,
        minimum: usize,
        region_size: usize,
    ) -> Result<(Self, Chunk), AllocError> {
        let payload = cmp::max(minimum, region_size);
        let len = payload
            .checked_add(HEADER_SIZE)
            .context(ReservationSnafu { size: minimum })?;

        let base = source
            .request_memory(len)
            .context(ReservationSnafu { size: minimum })?;

        debug!("reserved region {:#x} of {} bytes", base.as_ptr().addr(), len);

        // The mapping is fresh, writable and `len` bytes long.
        let chunk = unsafe { Chunk::init(base, payload) };

        Ok((Self { base, len }, chunk))
    }

    /// Unmaps the region.
    ///
    /// **SAFETY**: no chunk of this region may be used afterwards.
    pub unsafe fn unreserve<P: PageSource>(self, source: &mut P) {
        debug!("unreserving region {:#x} of {} bytes", self.base.as_ptr().addr(), self.len);
        unsafe { source.return_memory(self.base, self.len) }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Addresses covered by the mapping.
    #[inline]
    pub fn span(&self) -> Range<usize> {
        let base = self.base.as_ptr().addr();
        base..base + self.len
    }
}
