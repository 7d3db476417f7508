use std::{mem, ptr::{self, NonNull}};

use log::trace;

/// Size of the metadata placed in front of every chunk payload.
pub const HEADER_SIZE: usize = mem::size_of::<Header>();

/// In-memory layout of a chunk header. It is never read through a `&Header`
/// because chunks are only aligned to the allocator's alignment unit, which
/// may be smaller than the alignment of `usize`. See [`Chunk`] accessors.
#[repr(C)]
struct Header {
    /// Usable bytes after the header.
    size: usize,
    /// Next chunk of whichever list holds this one, null at the end.
    next: *mut u8,
}

const SIZE_OFFSET: usize = mem::offset_of!(Header, size);
const NEXT_OFFSET: usize = mem::offset_of!(Header, next);

/// Handle to a chunk living inside a mapped region.
///
/// A chunk is the unit the allocator keeps track of: a header immediately
/// followed by `size` bytes of payload. The payload address is what callers
/// receive, so the header is always found at a fixed negative offset.
///
/// ```text
/// +---------------------+ <------+ <- Chunk::addr
/// |        size         |        |
/// +---------------------+        | -> Header (HEADER_SIZE bytes)
/// |        next         |        |
/// +---------------------+ <------+ <- Chunk::payload
/// |       Payload       |        |
/// |         ...         |        | -> `size` bytes
/// |         ...         |        |
/// +---------------------+ <------+ <- Chunk::end
/// ```
///
/// The handle itself is just an address; two handles are equal when they name
/// the same header, which is the identity the used list searches by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Chunk(NonNull<u8>);

impl Chunk {
    /// Writes a fresh header at `addr` with the given payload `size` and no
    /// successor.
    ///
    /// **SAFETY**: `addr..addr + HEADER_SIZE + size` must be writable memory
    /// owned by the allocator.
    pub unsafe fn init(addr: NonNull<u8>, size: usize) -> Self {
        let chunk = Self(addr);
        unsafe {
            chunk.set_size(size);
            chunk.set_next(None);
        }
        chunk
    }

    #[inline]
    pub fn addr(self) -> usize {
        self.0.as_ptr().addr()
    }

    #[inline]
    pub fn as_ptr(self) -> *mut u8 {
        self.0.as_ptr()
    }

    /// Address handed to the caller of `allocate`.
    #[inline]
    pub fn payload(self) -> NonNull<u8> {
        // The header and its payload belong to one mapping, so this can't wrap.
        unsafe { self.0.add(HEADER_SIZE) }
    }

    #[inline]
    pub unsafe fn size(self) -> usize {
        unsafe { ptr::read_unaligned(self.0.as_ptr().add(SIZE_OFFSET).cast::<usize>()) }
    }

    #[inline]
    pub unsafe fn set_size(self, size: usize) {
        unsafe { ptr::write_unaligned(self.0.as_ptr().add(SIZE_OFFSET).cast::<usize>(), size) }
    }

    #[inline]
    pub unsafe fn next(self) -> Option<Self> {
        let next = unsafe { ptr::read_unaligned(self.0.as_ptr().add(NEXT_OFFSET).cast::<*mut u8>()) };
        NonNull::new(next).map(Self)
    }

    #[inline]
    pub unsafe fn set_next(self, next: Option<Self>) {
        let next = next.map_or(ptr::null_mut(), Self::as_ptr);
        unsafe { ptr::write_unaligned(self.0.as_ptr().add(NEXT_OFFSET).cast::<*mut u8>(), next) }
    }

    /// First address past the payload. A chunk starting here is physically
    /// adjacent to this one.
    #[inline]
    pub unsafe fn end(self) -> usize {
        self.addr() + HEADER_SIZE + unsafe { self.size() }
    }

    /// Carves a chunk of exactly `size` payload bytes out of the high end of
    /// this one.
    ///
    /// ```text
    ///  before:  | H |            self.size             |
    ///  after:   | H | self.size - H - size | H | size |
    ///                                      ^
    ///                                      +-- returned chunk
    /// ```
    ///
    /// The returned chunk is not linked anywhere and `self` keeps whatever
    /// successor it had. Returns `None` unless `HEADER_SIZE + size` is strictly
    /// smaller than the current size, so the remainder keeps a non-empty payload.
    ///
    /// **SAFETY**: `self` must hold a valid header.
    pub unsafe fn split(self, size: usize) -> Option<Self> {
        let chunk_size = unsafe { self.size() };
        let carved = HEADER_SIZE.checked_add(size)?;
        if carved >= chunk_size {
            return None;
        }

        unsafe {
            // Header of the tail chunk sits `size` bytes before the old end of
            // this chunk's payload, minus its own header: addr + chunk_size - size.
            let tail = self.0.add(chunk_size - size);
            self.set_size(chunk_size - carved);

            trace!(
                "split chunk {:#x}: kept {} bytes, carved {} bytes at {:#x}",
                self.addr(),
                chunk_size - carved,
                size,
                tail.as_ptr().addr(),
            );

            Some(Self::init(tail, size))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::alloc::{self, Layout};

    use super::*;

    /// Runs `test_fn` over a zeroed heap buffer of `size` bytes.
    pub(crate) fn with_test_heap<F>(size: usize, test_fn: F)
    where
        F: FnOnce(NonNull<u8>),
    {
        unsafe {
            let layout = Layout::from_size_align(size, 16).unwrap();
            let heap = NonNull::new(alloc::alloc_zeroed(layout)).unwrap();
            test_fn(heap);
            alloc::dealloc(heap.as_ptr(), layout);
        }
    }

    #[test]
    fn init_writes_header() {
        with_test_heap(128, |heap| unsafe {
            let chunk = Chunk::init(heap, 128 - HEADER_SIZE);

            assert_eq!(chunk.size(), 128 - HEADER_SIZE);
            assert_eq!(chunk.next(), None);
            assert_eq!(chunk.payload().as_ptr(), heap.as_ptr().add(HEADER_SIZE));
            assert_eq!(chunk.end(), heap.as_ptr().addr() + 128);
        });
    }

    #[test]
    fn split_carves_from_the_tail() {
        with_test_heap(256, |heap| unsafe {
            let chunk = Chunk::init(heap, 256 - HEADER_SIZE);
            let end = chunk.end();

            let tail = chunk.split(64).unwrap();

            assert_eq!(tail.size(), 64);
            assert_eq!(tail.end(), end);
            assert_eq!(chunk.end(), tail.addr());
            assert_eq!(chunk.size(), 256 - HEADER_SIZE - HEADER_SIZE - 64);
            assert_eq!(tail.next(), None);
        });
    }

    #[test]
    fn split_keeps_successor_of_the_remainder() {
        with_test_heap(256, |heap| unsafe {
            let first = Chunk::init(heap, 128 - HEADER_SIZE);
            let second = Chunk::init(heap.add(128), 128 - HEADER_SIZE);
            first.set_next(Some(second));

            let tail = first.split(32).unwrap();

            assert_eq!(first.next(), Some(second));
            assert_eq!(tail.next(), None);
        });
    }

    #[test]
    fn split_requires_room_for_a_remainder() {
        with_test_heap(128, |heap| unsafe {
            let chunk = Chunk::init(heap, 64);

            // Exactly the same size, and a remainder that would be empty.
            assert_eq!(chunk.split(64), None);
            assert_eq!(chunk.split(64 - HEADER_SIZE), None);
            assert_eq!(chunk.size(), 64);

            assert!(chunk.split(64 - HEADER_SIZE - 4).is_some());
            assert_eq!(chunk.size(), 4);
        });
    }

    #[test]
    fn unaligned_headers_round_trip() {
        with_test_heap(128, |heap| unsafe {
            // Four byte granularity puts headers off `usize` alignment.
            let chunk = Chunk::init(heap.add(4), 60);
            let other = Chunk::init(heap.add(4 + HEADER_SIZE + 60), 20);
            chunk.set_next(Some(other));

            assert_eq!(chunk.size(), 60);
            assert_eq!(chunk.next(), Some(other));
            assert_eq!(chunk.end(), other.addr());
        });
    }
}
