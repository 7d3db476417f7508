use std::ptr::NonNull;

/// Where the allocator gets its memory from.
///
/// The allocator's top level view has nothing to do with the concrete
/// syscalls offered by each kernel, so mapping memory is abstracted behind
/// this trait. [`Kernel`] is the real implementation; tests plug in sources
/// that count or refuse requests.
pub trait PageSource {
    /// Maps `len` bytes of zeroed, readable and writable memory. Returns
    /// `None` if the underlying syscall fails.
    fn request_memory(&mut self, len: usize) -> Option<NonNull<u8>>;

    /// Gives a mapping back to the kernel.
    ///
    /// # Safety
    ///
    /// `addr` and `len` must describe exactly one mapping previously returned
    /// by [`PageSource::request_memory`] on this source, and nothing may use
    /// that memory afterwards.
    unsafe fn return_memory(&mut self, addr: NonNull<u8>, len: usize);
}

/// Anonymous private mappings straight from the operating system:
/// [`libc::mmap`] on unix, `VirtualAlloc` on Windows.
#[derive(Debug, Default, Clone, Copy)]
pub struct Kernel;

#[cfg(unix)]
mod unix {
    use std::{io, ptr::NonNull};

    use log::warn;

    use super::{Kernel, PageSource};

    impl PageSource for Kernel {
        fn request_memory(&mut self, len: usize) -> Option<NonNull<u8>> {
            let addr = unsafe {
                libc::mmap(
                    std::ptr::null_mut(),
                    len,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                    -1,
                    0,
                )
            };

            if addr == libc::MAP_FAILED {
                warn!("mmap of {len} bytes failed: {}", io::Error::last_os_error());
                return None;
            }
            NonNull::new(addr.cast())
        }

        unsafe fn return_memory(&mut self, addr: NonNull<u8>, len: usize) {
            if unsafe { libc::munmap(addr.as_ptr().cast(), len) } != 0 {
                warn!(
                    "munmap of {:#x} ({len} bytes) failed: {}",
                    addr.as_ptr().addr(),
                    io::Error::last_os_error()
                );
            }
        }
    }
}

#[cfg(windows)]
mod windows {
    use std::ptr::NonNull;

    use log::warn;
    use windows::Win32::System::Memory;

    use super::{Kernel, PageSource};

    impl PageSource for Kernel {
        fn request_memory(&mut self, len: usize) -> Option<NonNull<u8>> {
            let flags = Memory::MEM_RESERVE | Memory::MEM_COMMIT;
            let addr = unsafe { Memory::VirtualAlloc(None, len, flags, Memory::PAGE_READWRITE) };

            if addr.is_null() {
                warn!("VirtualAlloc of {len} bytes failed");
            }
            NonNull::new(addr.cast())
        }

        unsafe fn return_memory(&mut self, addr: NonNull<u8>, len: usize) {
            // MEM_RELEASE frees the whole reservation and requires a size of 0.
            let freed = unsafe { Memory::VirtualFree(addr.as_ptr().cast(), 0, Memory::MEM_RELEASE) };
            if let Err(err) = freed {
                warn!(
                    "VirtualFree of {:#x} ({len} bytes) failed: {err}",
                    addr.as_ptr().addr()
                );
            }
        }
    }
}
