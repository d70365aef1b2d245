use std::{fmt, ptr, ptr::NonNull, slice};

use crate::{
    MemoryError,
    system::{self, Protection},
};

/// Machine code entry point with no arguments and an integer result.
pub type CompiledFn = unsafe extern "C" fn() -> i64;

/// A read/write/execute buffer that generated machine code is appended to.
pub struct ExecutableMemory {
    ptr: NonNull<u8>,
    capacity: usize,
    length: usize,
}

impl ExecutableMemory {
    /// Map at least `size` bytes of executable memory.
    pub fn new(size: usize) -> Result<Self, MemoryError> {
        let (ptr, capacity) = system::allocate(size, Protection::Executable)?;
        Ok(Self {
            ptr,
            capacity,
            length: 0,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The bytes written so far.
    #[inline]
    pub fn span(&self) -> &[u8] {
        // SAFETY: [0, length) lies inside the mapping owned by self
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.length) }
    }

    pub fn clear(&mut self) {
        self.length = 0;
    }

    /// Move the contents into a fresh mapping of at least `new_size` bytes.
    ///
    /// Contents past the new capacity are dropped. On error the current
    /// buffer is left as it was.
    pub fn resize(&mut self, new_size: usize) -> Result<(), MemoryError> {
        if new_size == 0 {
            return Err(MemoryError::ZeroSizedRequest);
        }
        let (new_ptr, new_capacity) =
            system::allocate(new_size, Protection::Executable)?;
        let kept = self.length.min(new_capacity);

        // SAFETY: both mappings hold at least `kept` bytes and are distinct
        unsafe {
            ptr::copy_nonoverlapping(self.ptr.as_ptr(), new_ptr.as_ptr(), kept)
        };
        // SAFETY: the old mapping came from `allocate` with this capacity
        unsafe { system::free(self.ptr, self.capacity) };

        log::debug!(
            "code buffer resized from {} to {new_capacity} bytes",
            self.capacity
        );
        self.ptr = new_ptr;
        self.capacity = new_capacity;
        self.length = kept;
        Ok(())
    }

    /// Append one byte.
    pub fn push(&mut self, byte: u8) {
        if self.length == self.capacity {
            self.grow(self.capacity.saturating_mul(2));
        }
        // SAFETY: length < capacity
        unsafe { self.ptr.as_ptr().add(self.length).write(byte) };
        self.length += 1;
    }

    /// Append a run of bytes. Always leaves at least one spare byte after
    /// the run.
    pub fn push_span(&mut self, bytes: &[u8]) {
        let needed = self.length.saturating_add(bytes.len());
        if needed >= self.capacity {
            let mut target = self.capacity;
            while needed >= target {
                target = target.saturating_mul(2);
            }
            self.grow(target);
        }
        // SAFETY: length + bytes.len() < capacity, and `bytes` cannot point
        // into our own mapping while we hold &mut self
        unsafe {
            ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                self.ptr.as_ptr().add(self.length),
                bytes.len(),
            )
        };
        self.length = needed;
    }

    /// Reinterpret the start of the buffer as a function.
    ///
    /// # Safety
    /// The buffer must hold a complete routine for the platform's C calling
    /// convention, and the returned pointer must not outlive `self` or a
    /// later `resize`.
    #[inline]
    pub unsafe fn as_callable(&self) -> CompiledFn {
        // SAFETY: guaranteed by the caller
        unsafe { std::mem::transmute::<*mut u8, CompiledFn>(self.ptr.as_ptr()) }
    }

    fn grow(&mut self, new_size: usize) {
        if let Err(err) = self.resize(new_size) {
            system::allocation_failed(err, new_size);
        }
    }
}

impl Drop for ExecutableMemory {
    fn drop(&mut self) {
        // SAFETY: the mapping is owned by self and released once
        unsafe { system::free(self.ptr, self.capacity) };
    }
}

impl fmt::Debug for ExecutableMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutableMemory")
            .field("ptr", &self.ptr)
            .field("length", &self.length)
            .field("capacity", &self.capacity)
            .finish()
    }
}
