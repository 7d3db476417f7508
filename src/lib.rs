//! # chunkalloc - a first-fit chunk allocator over raw page mappings
//!
//! Memory is reserved from the operating system in coarse regions
//! (`mmap` on unix, `VirtualAlloc` on Windows) and carved into chunks. Every
//! chunk carries a small header in front of the bytes handed to the caller:
//!
//! ```text
//!   +--------+------------------------------+
//!   | size   |                              |
//!   | next   |      size usable bytes       |
//!   +--------+------------------------------+
//!   ^        ^
//!   |        +-- pointer returned by allocate
//!   +-- header, found again by release at a fixed offset
//! ```
//!
//! Chunks live in one of two intrusive lists threaded through those headers:
//! the free list, sorted by address so that physically adjacent chunks can be
//! merged back together, and the used list, which `release` consults to tell
//! live allocations apart from anything else.
//!
//! ## Crate Structure
//!
//! ```text
//!   chunkalloc
//!   ├── allocator  - Allocator: allocate / release, splitting, growth
//!   ├── chunk      - Chunk header and tail splitting (internal)
//!   ├── config     - Region size and alignment unit
//!   ├── error      - AllocError, ReleaseError, ConfigError
//!   ├── freelist   - Address-ordered free list with coalescing (internal)
//!   ├── kernel     - PageSource trait and the OS implementation
//!   ├── list       - Intrusive singly linked chunk list (internal)
//!   ├── region     - Regions reserved from a PageSource (internal)
//!   └── usedlist   - Chunks handed out to callers (internal)
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use chunkalloc::{Allocator, Config};
//!
//! let mut allocator = Allocator::with_config(Config::new().with_region_size(4096)).unwrap();
//!
//! let ptr = allocator.allocate(64).unwrap();
//! unsafe { ptr.as_ptr().write_bytes(0xAA, 64) };
//!
//! allocator.release(ptr.as_ptr()).unwrap();
//! assert_eq!(allocator.used_len(), 0);
//! ```
//!
//! The free functions [`memalloc`] and [`memfree`] work on one process-wide
//! allocator with the default configuration.
//!
//! ## Limitations
//!
//! - An [`Allocator`] is single threaded; only the process-wide one is behind
//!   a lock.
//! - Regions are never returned to the OS while their allocator lives.
//! - Sizes are rounded to the alignment unit only (4 bytes by default), so
//!   returned pointers are not suitable for types with stricter alignment.

use std::ptr;

use log::warn;
use spin::Mutex;

mod allocator;
mod chunk;
mod config;
mod error;
mod freelist;
mod kernel;
mod list;
mod region;
mod usedlist;
mod utils;

pub use allocator::Allocator;
pub use chunk::HEADER_SIZE;
pub use config::{Config, DEFAULT_ALIGNMENT, DEFAULT_REGION_SIZE};
pub use error::{AllocError, ConfigError, ReleaseError};
pub use kernel::{Kernel, PageSource};

static GLOBAL: Mutex<Allocator> = Mutex::new(Allocator::new());

/// Allocates `size` bytes from the process-wide allocator.
///
/// Returns a null pointer if no memory could be reserved.
pub fn memalloc(size: usize) -> *mut u8 {
    match GLOBAL.lock().allocate(size) {
        Ok(ptr) => ptr.as_ptr(),
        Err(err) => {
            warn!("memalloc({size}): {err}");
            ptr::null_mut()
        }
    }
}

/// Releases memory obtained from [`memalloc`].
///
/// Pointers that are not live allocations, including null and already
/// released ones, are ignored.
pub fn memfree(ptr: *mut u8) {
    match GLOBAL.lock().release(ptr) {
        Ok(()) | Err(ReleaseError::Null) => {}
        Err(err) => warn!("memfree: {err}"),
    }
}
