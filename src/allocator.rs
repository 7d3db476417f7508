use std::{cmp, ops::Range, ptr::NonNull};

use log::{debug, warn};
use snafu::OptionExt as _;

use crate::{
    chunk::{Chunk, HEADER_SIZE},
    config::Config,
    error::{
        AllocError, ConfigError, NotInUseSnafu, NullSnafu, ReleaseError, ReservationSnafu,
        SplitPreconditionSnafu,
    },
    freelist::{Fit, FreeList},
    kernel::{Kernel, PageSource},
    region::Region,
    usedlist::UsedList,
    utils::align,
};

/// First-fit allocator over regions mapped from a [`PageSource`].
///
/// Every region starts as one big free chunk. Requests are served by carving
/// chunks off the high end of free chunks, and released chunks are merged with
/// free neighbours:
///
/// ```text
///                            Free List
///               +---------------------------------------+
///               |                                       |
/// +-------------|------------------------+      +-------v-------------------+
/// | +-----------+---+ +------+ +------+  |      | +------------+ +------+   |
/// | |     Free      | | Used | | Used |  | ...  | |    Free    | | Used |   |
/// | +---------------+ +--^---+ +--^---+  |      | +------------+ +--^---+   |
/// +----------------------|--------|------+      +-------------------|-------+
///                        +--------+---------------------------------+
///                                        Used List
/// ```
///
/// The allocator is single threaded: every mutating operation takes
/// `&mut self`. Wrap it in a lock to share it, as [`crate::memalloc`] does.
pub struct Allocator<P: PageSource = Kernel> {
    config: Config,
    source: P,
    free_list: FreeList,
    used_list: UsedList,
    regions: Vec<Region>,
}

// Chunk handles point into regions this allocator owns exclusively.
unsafe impl<P: PageSource + Send> Send for Allocator<P> {}

impl Allocator {
    /// Allocator over kernel mappings with the default [`Config`].
    pub const fn new() -> Self {
        Self::from_parts(Config::new(), Kernel)
    }

    pub fn with_config(config: Config) -> Result<Self, ConfigError> {
        Self::with_source(config, Kernel)
    }
}

impl Default for Allocator {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: PageSource> Allocator<P> {
    pub fn with_source(config: Config, source: P) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_parts(config, source))
    }

    const fn from_parts(config: Config, source: P) -> Self {
        Self {
            config,
            source,
            free_list: FreeList::new(),
            used_list: UsedList::new(),
            regions: Vec::new(),
        }
    }

    /// Hands out `size` usable bytes, rounded up to the alignment unit.
    ///
    /// Zero sized requests get one alignment unit. The free list is searched
    /// first-fit; if nothing fits, a new region of at least `size` bytes is
    /// reserved. The returned memory is exclusively owned by the caller until
    /// it is passed to [`Allocator::release`], and never moves.
    ///
    /// Chunks are only aligned to the alignment unit, so the returned pointer
    /// carries no stronger alignment guarantee.
    pub fn allocate(&mut self, size: usize) -> Result<NonNull<u8>, AllocError> {
        let needed = self.normalize(size)?;

        let chunk = match self.take_free(needed)? {
            Some(chunk) => chunk,
            None => self.grow(needed)?,
        };

        unsafe { self.used_list.push(chunk) };
        debug!("allocate({size}) -> {:#x}, {needed} bytes", chunk.payload().as_ptr().addr());

        Ok(chunk.payload())
    }

    /// Gives back memory obtained from [`Allocator::allocate`].
    ///
    /// The pointer is looked up in the used list before its header is read,
    /// so a pointer that is not a live allocation of this allocator (double
    /// release, foreign or interior pointer) is reported as
    /// [`ReleaseError::NotInUse`] and leaves the allocator untouched.
    pub fn release(&mut self, ptr: *mut u8) -> Result<(), ReleaseError> {
        let ptr = NonNull::new(ptr).context(NullSnafu)?;
        let addr = ptr.as_ptr().addr();

        let chunk = self
            .used_list
            .remove(addr.wrapping_sub(HEADER_SIZE))
            .context(NotInUseSnafu { addr })?;

        let region = self.region_of(chunk);
        // The chunk came out of the used list, so it holds a valid header and
        // belongs to no list.
        let merged = unsafe { self.free_list.insert(chunk, region) };
        debug!("release({addr:#x}) -> free chunk {:#x}", merged.addr());

        Ok(())
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of allocations currently handed out.
    #[inline]
    pub fn used_len(&self) -> usize {
        self.used_list.len()
    }

    /// Number of regions reserved from the page source so far.
    #[inline]
    pub fn regions(&self) -> usize {
        self.regions.len()
    }

    /// Bytes mapped from the page source so far, headers included.
    pub fn reserved_bytes(&self) -> usize {
        self.regions.iter().map(Region::len).sum()
    }

    /// Free chunks in list order, i.e. by ascending address, as
    /// `(header address, payload size)`.
    pub fn free_chunks(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.free_list
            .iter()
            .map(|chunk| (chunk.addr(), unsafe { chunk.size() }))
    }

    /// Whether `ptr` is a live allocation of this allocator.
    pub fn is_in_use(&self, ptr: *const u8) -> bool {
        self.usable_size(ptr).is_some()
    }

    /// Usable size of a live allocation: the normalized request size, or a
    /// little more if a region had to be taken whole.
    pub fn usable_size(&self, ptr: *const u8) -> Option<usize> {
        let chunk = self.used_list.get(ptr.addr().wrapping_sub(HEADER_SIZE))?;
        Some(unsafe { chunk.size() })
    }

    fn normalize(&self, size: usize) -> Result<usize, AllocError> {
        let alignment = self.config.alignment();
        align(cmp::max(size, alignment), alignment).context(ReservationSnafu { size })
    }

    /// Serves `size` bytes from the free list, if any chunk fits.
    fn take_free(&mut self, size: usize) -> Result<Option<Chunk>, AllocError> {
        match self.free_list.first_fit(size) {
            Some(Fit::Split(chunk)) => Self::split(chunk, size).map(Some),
            Some(Fit::Whole { prev, chunk }) => {
                self.free_list.take(prev, chunk);
                Ok(Some(chunk))
            }
            None => Ok(None),
        }
    }

    /// Reserves a new region and serves `size` bytes from it.
    fn grow(&mut self, size: usize) -> Result<Chunk, AllocError> {
        let (region, chunk) = Region::reserve(&mut self.source, size, self.config.region_size())
            .inspect_err(|err| warn!("{err}"))?;
        let span = region.span();
        self.regions.push(region);

        // A region too small to split off `size` bytes and still keep a
        // payload is handed out whole, like an exactly sized one.
        let region_size = unsafe { chunk.size() };
        if region_size <= size + HEADER_SIZE {
            return Ok(chunk);
        }

        // A fresh region never merges, not even with a free chunk of an
        // adjacent mapping, so the split stays inside this region.
        let chunk = unsafe { self.free_list.insert(chunk, span) };
        Self::split(chunk, size)
    }

    /// Address range of the region `chunk` was carved from.
    fn region_of(&self, chunk: Chunk) -> Range<usize> {
        let addr = chunk.addr();
        let span = self
            .regions
            .iter()
            .map(Region::span)
            .find(|span| span.contains(&addr));
        debug_assert!(span.is_some(), "chunk {addr:#x} outside every region");

        // Without a known region the chunk merges with nothing.
        span.unwrap_or(addr..addr)
    }

    fn split(chunk: Chunk, size: usize) -> Result<Chunk, AllocError> {
        let tail = unsafe { chunk.split(size) };
        debug_assert!(tail.is_some(), "free chunk {:#x} failed to split", chunk.addr());

        tail.with_context(|| SplitPreconditionSnafu {
            chunk_size: unsafe { chunk.size() },
            size,
        })
    }
}

impl<P: PageSource> Drop for Allocator<P> {
    fn drop(&mut self) {
        for region in self.regions.drain(..) {
            // Dropping the allocator ends the lifetime of every chunk.
            unsafe { region.unreserve(&mut self.source) }
        }
    }
}
