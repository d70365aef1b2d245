//! Page allocation straight from the OS.
//!
//! Stacks map read/write pages, executable memory maps read/write/execute
//! pages. Both go through [`allocate`] and [`free`].
use std::{
    alloc::{Layout, handle_alloc_error},
    ptr::NonNull,
};

use crate::MemoryError;

#[cfg(unix)]
#[allow(unused)]
mod unix {
    use core::ffi::c_void;

    pub const PROT_NONE: i32 = 0x0;
    pub const PROT_READ: i32 = 0x1;
    pub const PROT_WRITE: i32 = 0x2;
    pub const PROT_EXEC: i32 = 0x4;

    pub const MAP_SHARED: i32 = 0x01;
    pub const MAP_PRIVATE: i32 = 0x02;

    #[cfg(target_os = "linux")]
    pub const MAP_ANON: i32 = 0x20;
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    pub const MAP_ANON: i32 = 0x1000;

    pub const MAP_FAILED: isize = -1;

    /// posix mmap and munmap
    /// # Safety
    /// see valid mmap and munmap usage online
    unsafe extern "C" {
        pub fn mmap(
            addr: *mut c_void,
            length: usize,
            prot: i32,
            flags: i32,
            fd: i32,
            offset: isize,
        ) -> *mut c_void;

        pub fn munmap(addr: *mut c_void, length: usize) -> i32;
    }

    /// anonymous private mapping with the given protection
    /// # Safety
    /// null must be checked
    #[inline]
    pub unsafe fn anonymous_mmap(len: usize, prot: i32) -> *mut u8 {
        // SAFETY: safe if contract holds
        let p = unsafe {
            mmap(
                core::ptr::null_mut(),
                len,
                prot,
                MAP_PRIVATE | MAP_ANON,
                -1,
                0,
            )
        };
        if (p as isize) == MAP_FAILED {
            core::ptr::null_mut()
        } else {
            p as *mut u8
        }
    }

    /// # Safety
    /// must be allocated by mmap with the same length
    #[inline]
    pub unsafe fn anonymous_munmap(ptr: *mut u8, len: usize) {
        // SAFETY: safe if contract holds
        let _ = unsafe { munmap(ptr.cast(), len) };
    }
}

#[cfg(windows)]
#[allow(unused, clippy::upper_case_acronyms)]
mod windows {
    use core::ffi::c_void;

    pub const MEM_COMMIT: u32 = 0x0000_1000;
    pub const MEM_RESERVE: u32 = 0x0000_2000;
    pub const MEM_RELEASE: u32 = 0x0000_8000;

    pub const PAGE_READWRITE: u32 = 0x04;
    pub const PAGE_EXECUTE_READWRITE: u32 = 0x40;

    #[link(name = "kernel32")]
    unsafe extern "system" {
        pub fn VirtualAlloc(
            address: *mut c_void,
            size: usize,
            allocation_type: u32,
            protect: u32,
        ) -> *mut c_void;

        pub fn VirtualFree(
            address: *mut c_void,
            size: usize,
            free_type: u32,
        ) -> i32;
    }
}

/// Granularity of every mapping made here.
///
/// This is a fixed 4 KiB rather than the host page size. On hosts with larger
/// pages the OS rounds the mapping up further and the tail past the reported
/// capacity goes unused.
pub const PAGE_SIZE: usize = 4096;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Protection {
    /// read + write
    Data,
    /// read + write + execute
    Executable,
}

/// Round `size` up to a whole number of pages. Zero still takes one page.
/// `None` when the rounded size does not fit in a `usize`.
#[inline]
pub const fn round_up_to_page(size: usize) -> Option<usize> {
    let size = if size == 0 { 1 } else { size };
    size.checked_next_multiple_of(PAGE_SIZE)
}

/// Map at least `requested_size` bytes of page aligned, zero filled memory.
///
/// Returns the mapping and its real capacity in bytes. A mapping must be
/// released with [`free`] using that capacity.
pub fn allocate(
    requested_size: usize,
    protection: Protection,
) -> Result<(NonNull<u8>, usize), MemoryError> {
    let capacity = round_up_to_page(requested_size).ok_or(
        MemoryError::MapFailed {
            size: requested_size,
        },
    )?;
    let ptr = map_pages(capacity, protection)
        .ok_or(MemoryError::MapFailed { size: capacity })?;
    log::debug!(
        "mapped {capacity} bytes ({protection:?}) at {:p}",
        ptr.as_ptr()
    );
    Ok((ptr, capacity))
}

/// Release a mapping.
///
/// # Safety
/// `ptr` and `size` must be exactly a pointer and capacity returned by
/// [`allocate`], and the mapping must not be used afterwards.
pub unsafe fn free(ptr: NonNull<u8>, size: usize) {
    log::debug!("unmapping {size} bytes at {:p}", ptr.as_ptr());
    // SAFETY: guaranteed by the caller
    unsafe { unmap_pages(ptr, size) };
}

/// Growth paths cannot hand a failure back to their caller: report it and
/// abort through the global allocation error handler.
#[cold]
pub(crate) fn allocation_failed(err: MemoryError, size: usize) -> ! {
    log::error!("{err}");
    let layout = Layout::from_size_align(size, PAGE_SIZE)
        .unwrap_or_else(|_| Layout::new::<u8>());
    handle_alloc_error(layout)
}

#[cfg(unix)]
fn map_pages(size: usize, protection: Protection) -> Option<NonNull<u8>> {
    let prot = match protection {
        Protection::Data => unix::PROT_READ | unix::PROT_WRITE,
        Protection::Executable => {
            unix::PROT_READ | unix::PROT_WRITE | unix::PROT_EXEC
        }
    };
    // SAFETY: a fresh anonymous mapping, null is checked below
    let ptr = unsafe { unix::anonymous_mmap(size, prot) };
    NonNull::new(ptr)
}

#[cfg(unix)]
unsafe fn unmap_pages(ptr: NonNull<u8>, size: usize) {
    // SAFETY: ptr must be from an mmap allocation of `size` bytes
    unsafe { unix::anonymous_munmap(ptr.as_ptr(), size) };
}

#[cfg(windows)]
fn map_pages(size: usize, protection: Protection) -> Option<NonNull<u8>> {
    let protect = match protection {
        Protection::Data => windows::PAGE_READWRITE,
        Protection::Executable => windows::PAGE_EXECUTE_READWRITE,
    };
    // SAFETY: a fresh reservation, null is checked below
    let ptr = unsafe {
        windows::VirtualAlloc(
            core::ptr::null_mut(),
            size,
            windows::MEM_COMMIT | windows::MEM_RESERVE,
            protect,
        )
    };
    NonNull::new(ptr.cast())
}

#[cfg(windows)]
unsafe fn unmap_pages(ptr: NonNull<u8>, _size: usize) {
    // MEM_RELEASE requires a size of zero
    // SAFETY: ptr must be the base of a VirtualAlloc reservation
    let _ = unsafe {
        windows::VirtualFree(ptr.as_ptr().cast(), 0, windows::MEM_RELEASE)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding() {
        assert_eq!(round_up_to_page(0), Some(PAGE_SIZE));
        assert_eq!(round_up_to_page(1), Some(PAGE_SIZE));
        assert_eq!(round_up_to_page(PAGE_SIZE), Some(PAGE_SIZE));
        assert_eq!(round_up_to_page(PAGE_SIZE + 1), Some(2 * PAGE_SIZE));
        assert_eq!(round_up_to_page(3 * PAGE_SIZE - 1), Some(3 * PAGE_SIZE));
    }

    #[test]
    fn rounding_overflow() {
        assert_eq!(round_up_to_page(usize::MAX), None);
        assert_eq!(round_up_to_page(usize::MAX - PAGE_SIZE + 2), None);
        assert_eq!(
            allocate(usize::MAX, Protection::Data),
            Err(MemoryError::MapFailed { size: usize::MAX })
        );
    }

    #[test]
    fn data_pages_are_aligned_zeroed_and_writable() {
        let (ptr, capacity) =
            allocate(100, Protection::Data).expect("map data pages");
        assert_eq!(capacity, PAGE_SIZE);
        assert_eq!(ptr.as_ptr() as usize % PAGE_SIZE, 0);

        // SAFETY: the mapping is `capacity` bytes long and owned here
        let bytes =
            unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr(), capacity) };
        assert!(bytes.iter().all(|&b| b == 0));
        bytes[capacity - 1] = 0xAB;
        assert_eq!(bytes[capacity - 1], 0xAB);

        // SAFETY: allocated above with this capacity
        unsafe { free(ptr, capacity) };
    }

    #[test]
    fn executable_pages_map() {
        let (ptr, capacity) = allocate(PAGE_SIZE + 1, Protection::Executable)
            .expect("map executable pages");
        assert_eq!(capacity, 2 * PAGE_SIZE);
        assert_eq!(ptr.as_ptr() as usize % PAGE_SIZE, 0);
        // SAFETY: allocated above with this capacity
        unsafe { free(ptr, capacity) };
    }
}
