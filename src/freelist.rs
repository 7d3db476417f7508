use std::ops::Range;

use log::trace;

use crate::{
    chunk::{Chunk, HEADER_SIZE},
    list::{ChunkList, Iter},
};

/// Outcome of a first-fit search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fit {
    /// The chunk is large enough to carve the request out of its tail and
    /// still keep a non-empty remainder. It stays in the list.
    Split(Chunk),
    /// The chunk has exactly the requested size and must be taken whole.
    /// `prev` is its predecessor, needed to unlink it.
    Whole { prev: Option<Chunk>, chunk: Chunk },
}

/// Linked list of chunks nobody is using.
///
/// Unlike the used list, this one is kept sorted by address. That makes
/// physical neighbours list neighbours too, so merging a released chunk with
/// whatever free memory surrounds it only needs to look one step each way.
///
/// ```text
///   Region A                                 Region B
/// +-----------------------------------+    +---------------------------+
/// | Free | Used | Used | Free  | Used |    | Free       | Used | Used |
/// +--|------------------^-------------+    +-^-------------------------+
///    |                  |   |                |
///    +------------------+   +----------------+
///                   free list, ascending addresses
/// ```
///
/// Invariant: addresses strictly increase along the list and no chunk ends
/// exactly where a successor from the same region starts. Chunks of two
/// regions stay apart even if the mappings touch.
pub(crate) struct FreeList {
    items: ChunkList,
}

impl FreeList {
    pub const fn new() -> Self {
        Self { items: ChunkList::new() }
    }

    pub fn iter(&self) -> Iter<'_> {
        self.items.iter()
    }

    /// First-fit search for a chunk that can serve `size` bytes.
    ///
    /// A chunk qualifies for splitting only when it exceeds `size` by more
    /// than one header; a chunk of exactly `size` bytes is taken whole.
    /// Chunks in between are skipped, since splitting them would leave a
    /// remainder with no room for a payload.
    pub fn first_fit(&self, size: usize) -> Option<Fit> {
        let needed = size.checked_add(HEADER_SIZE)?;
        let mut prev = None;

        for chunk in &self.items {
            let chunk_size = unsafe { chunk.size() };
            if chunk_size > needed {
                return Some(Fit::Split(chunk));
            } else if chunk_size == size {
                return Some(Fit::Whole { prev, chunk });
            }
            prev = Some(chunk);
        }

        None
    }

    /// Removes a chunk previously returned as [`Fit::Whole`].
    pub fn take(&mut self, prev: Option<Chunk>, chunk: Chunk) {
        // `first_fit` got both from this list and nothing ran in between.
        unsafe { self.items.unlink_after(prev, chunk) }
    }

    /// Inserts `chunk` at its address-ordered position and merges it with any
    /// physically adjacent free neighbours inside `region`.
    ///
    /// Successors are absorbed first, repeatedly, as long as one starts where
    /// the chunk ends. Then, if the predecessor ends where the chunk starts,
    /// the predecessor absorbs the chunk. Neither happens at the edges of
    /// `region`. Returns the chunk that now holds the inserted memory: `chunk`
    /// itself or its predecessor.
    ///
    /// **SAFETY**: `chunk` must hold a valid header, not be in any list, lie
    /// inside `region` and not overlap any chunk of this list.
    pub unsafe fn insert(&mut self, chunk: Chunk, region: Range<usize>) -> Chunk {
        let mut prev = None;
        for free in &self.items {
            debug_assert_ne!(free, chunk, "chunk {:#x} is already free", chunk.addr());
            if free > chunk {
                break;
            }
            prev = Some(free);
        }

        unsafe {
            self.items.insert_after(prev, chunk);

            while let Some(next) = chunk.next() {
                if next.addr() != chunk.end() || chunk.end() >= region.end {
                    break;
                }
                self.absorb(chunk, next);
            }

            match prev {
                Some(prev) if prev.end() == chunk.addr() && chunk.addr() > region.start => {
                    self.absorb(prev, chunk);
                    prev
                }
                _ => chunk,
            }
        }
    }

    /// Grows `chunk` over its list successor `next` and unlinks `next`.
    unsafe fn absorb(&mut self, chunk: Chunk, next: Chunk) {
        unsafe {
            let merged = chunk.size() + HEADER_SIZE + next.size();
            trace!(
                "coalesce chunk {:#x} with {:#x}: {} bytes",
                chunk.addr(),
                next.addr(),
                merged
            );
            self.items.unlink_after(Some(chunk), next);
            chunk.set_size(merged);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::ptr::NonNull;

    use super::*;
    use crate::chunk::tests::with_test_heap;

    const HEAP: usize = 1024;

    /// Lays out `count` back to back chunks of `block` bytes each, header included.
    unsafe fn carve(heap: NonNull<u8>, count: usize, block: usize) -> Vec<Chunk> {
        (0..count)
            .map(|i| unsafe { Chunk::init(heap.add(i * block), block - HEADER_SIZE) })
            .collect()
    }

    fn span(heap: NonNull<u8>, len: usize) -> Range<usize> {
        let base = heap.as_ptr().addr();
        base..base + len
    }

    fn snapshot(list: &FreeList) -> Vec<(usize, usize)> {
        list.iter().map(|chunk| (chunk.addr(), unsafe { chunk.size() })).collect()
    }

    #[test]
    fn insert_keeps_address_order() {
        with_test_heap(HEAP, |heap| unsafe {
            // Every other chunk so nothing is adjacent.
            let c = carve(heap, 8, 64);
            let mut list = FreeList::new();

            list.insert(c[4], span(heap, HEAP));
            list.insert(c[0], span(heap, HEAP));
            list.insert(c[6], span(heap, HEAP));
            list.insert(c[2], span(heap, HEAP));

            let addrs: Vec<_> = list.iter().collect();
            assert_eq!(addrs, [c[0], c[2], c[4], c[6]]);
            assert_eq!(list.iter().len(), 4);
        });
    }

    #[test]
    fn insert_absorbs_adjacent_successors() {
        with_test_heap(HEAP, |heap| unsafe {
            let c = carve(heap, 4, 64);
            let mut list = FreeList::new();

            list.insert(c[1], span(heap, HEAP));
            assert_eq!(list.insert(c[0], span(heap, HEAP)), c[0]);

            assert_eq!(snapshot(&list), [(c[0].addr(), 128 - HEADER_SIZE)]);
        });
    }

    #[test]
    fn insert_merges_into_adjacent_predecessor() {
        with_test_heap(HEAP, |heap| unsafe {
            let c = carve(heap, 4, 64);
            let mut list = FreeList::new();

            list.insert(c[0], span(heap, HEAP));
            assert_eq!(list.insert(c[1], span(heap, HEAP)), c[0]);

            assert_eq!(snapshot(&list), [(c[0].addr(), 128 - HEADER_SIZE)]);
        });
    }

    #[test]
    fn insert_bridges_both_neighbours() {
        with_test_heap(HEAP, |heap| unsafe {
            let c = carve(heap, 4, 64);
            let mut list = FreeList::new();

            list.insert(c[0], span(heap, HEAP));
            list.insert(c[2], span(heap, HEAP));
            list.insert(c[3], span(heap, HEAP));
            assert_eq!(list.iter().len(), 2);

            list.insert(c[1], span(heap, HEAP));

            assert_eq!(snapshot(&list), [(c[0].addr(), 256 - HEADER_SIZE)]);
        });
    }

    #[test]
    fn first_fit_prefers_list_order() {
        with_test_heap(HEAP, |heap| unsafe {
            let c = carve(heap, 8, 128);
            let mut list = FreeList::new();
            list.insert(c[0], span(heap, HEAP));
            list.insert(c[4], span(heap, HEAP));

            assert_eq!(list.first_fit(32), Some(Fit::Split(c[0])));
        });
    }

    #[test]
    fn first_fit_takes_exact_chunks_whole() {
        with_test_heap(HEAP, |heap| unsafe {
            let c = carve(heap, 8, 128);
            let mut list = FreeList::new();
            list.insert(c[0], span(heap, HEAP));
            list.insert(c[2], span(heap, HEAP));
            c[0].set_size(32);

            assert_eq!(list.first_fit(32), Some(Fit::Whole { prev: None, chunk: c[0] }));

            // Too small to split and not exact: skipped in favour of c[2].
            assert_eq!(list.first_fit(28), Some(Fit::Split(c[2])));

            list.take(None, c[0]);
            assert_eq!(list.iter().collect::<Vec<_>>(), [c[2]]);
        });
    }

    #[test]
    fn first_fit_needs_strictly_more_than_a_header() {
        with_test_heap(HEAP, |heap| unsafe {
            let c = carve(heap, 1, 128);
            let mut list = FreeList::new();
            list.insert(c[0], span(heap, HEAP));

            let payload = 128 - HEADER_SIZE;
            assert_eq!(list.first_fit(payload - HEADER_SIZE), None);
            assert_eq!(list.first_fit(payload - HEADER_SIZE - 4), Some(Fit::Split(c[0])));
            assert_eq!(list.first_fit(payload + 4), None);
            assert_eq!(list.first_fit(usize::MAX), None);
        });
    }

    #[test]
    fn no_merge_across_region_edges() {
        with_test_heap(HEAP, |heap| unsafe {
            let c = carve(heap, 4, 64);
            let low = span(heap, 128);
            let high = span(heap.add(128), 128);
            let mut list = FreeList::new();

            list.insert(c[1], low.clone());
            list.insert(c[3], high.clone());
            // c[2] starts `high` right where c[1] ends `low`.
            assert_eq!(list.insert(c[2], high), c[2]);
            assert_eq!(list.insert(c[0], low), c[0]);

            assert_eq!(
                snapshot(&list),
                [
                    (c[0].addr(), 128 - HEADER_SIZE),
                    (c[2].addr(), 128 - HEADER_SIZE),
                ]
            );
        });
    }
}
