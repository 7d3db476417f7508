use std::marker::PhantomData;

use crate::chunk::Chunk;

/// Intrusive singly linked list of [`Chunk`].
///
/// The links live inside the chunk headers themselves, so the list never
/// allocates: it only owns a pointer to the first header and a length.
/// Both the free list and the used list are built on top of this.
///
/// ```text
///  head
///   |
/// +-v-------+-----+      +---------+-----+      +---------+-----+
/// | H: next --------+--->| H: next --------+--->| H: null |     |
/// +---------+-----+      +---------+-----+      +---------+-----+
/// ```
///
/// A chunk must be in at most one list at a time; nothing here checks it.
pub(crate) struct ChunkList {
    head: Option<Chunk>,
    len: usize,
}

pub(crate) struct Iter<'a> {
    current: Option<Chunk>,
    remaining: usize,
    marker: PhantomData<&'a ChunkList>,
}

impl ChunkList {
    pub const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Links `chunk` right after `prev`, or at the front when `prev` is `None`.
    ///
    /// **SAFETY**: `chunk` must hold a valid header and not be linked in any
    /// list; `prev`, if given, must be a member of this list.
    pub unsafe fn insert_after(&mut self, prev: Option<Chunk>, chunk: Chunk) {
        unsafe {
            match prev {
                Some(prev) => {
                    chunk.set_next(prev.next());
                    prev.set_next(Some(chunk));
                }
                None => {
                    chunk.set_next(self.head);
                    self.head = Some(chunk);
                }
            }
        }
        self.len += 1;
    }

    #[inline]
    pub unsafe fn push_front(&mut self, chunk: Chunk) {
        unsafe { self.insert_after(None, chunk) }
    }

    /// Unlinks `chunk`, whose predecessor is `prev` (`None` for the head).
    /// The removed chunk is left with no successor.
    ///
    /// **SAFETY**: `chunk` must be a member of this list and `prev` must be
    /// exactly the member linking to it.
    pub unsafe fn unlink_after(&mut self, prev: Option<Chunk>, chunk: Chunk) {
        unsafe {
            let next = chunk.next();
            match prev {
                Some(prev) => {
                    debug_assert_eq!(prev.next(), Some(chunk));
                    prev.set_next(next);
                }
                None => {
                    debug_assert_eq!(self.head, Some(chunk));
                    self.head = next;
                }
            }
            chunk.set_next(None);
        }
        self.len -= 1;
    }

    /// Returns the first member matching `pred` along with its predecessor,
    /// so that it can be handed to [`ChunkList::unlink_after`].
    pub fn find<F>(&self, mut pred: F) -> Option<(Option<Chunk>, Chunk)>
    where
        F: FnMut(Chunk) -> bool,
    {
        let mut prev = None;
        for chunk in self {
            if pred(chunk) {
                return Some((prev, chunk));
            }
            prev = Some(chunk);
        }

        None
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            current: self.head,
            remaining: self.len,
            marker: PhantomData,
        }
    }
}

impl Iterator for Iter<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk = self.current?;

        // Members of a list always hold a valid header.
        self.current = unsafe { chunk.next() };
        self.remaining -= 1;

        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a ChunkList {
    type Item = Chunk;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
