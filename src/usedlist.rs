use crate::{chunk::Chunk, list::ChunkList};

/// Chunks currently handed out to callers, newest first.
///
/// Order carries no meaning here. The list exists so that `release` can tell
/// a pointer it gave out from anything else before touching its header.
pub(crate) struct UsedList {
    items: ChunkList,
}

impl UsedList {
    pub const fn new() -> Self {
        Self { items: ChunkList::new() }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// **SAFETY**: `chunk` must hold a valid header and not be in any list.
    pub unsafe fn push(&mut self, chunk: Chunk) {
        unsafe { self.items.push_front(chunk) }
    }

    /// Looks a chunk up by the address of its header.
    ///
    /// Only member headers are read, so `addr` may be anything.
    pub fn get(&self, addr: usize) -> Option<Chunk> {
        self.items.iter().find(|chunk| chunk.addr() == addr)
    }

    /// Unlinks and returns the member whose header is at `addr`, if any.
    pub fn remove(&mut self, addr: usize) -> Option<Chunk> {
        let (prev, chunk) = self.items.find(|chunk| chunk.addr() == addr)?;
        unsafe { self.items.unlink_after(prev, chunk) };
        Some(chunk)
    }
}
