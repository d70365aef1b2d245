use std::{fmt, mem, ptr, ptr::NonNull, slice};

use crate::{
    MemoryError, StackError, Value,
    system::{self, Protection},
};

const CELL_SIZE: usize = mem::size_of::<Value>();

/// A growable stack of cells backed by its own page mapping. Used for the
/// data, retain and call stacks.
///
/// Cells `[0, len)` are live, the rest of the mapping is spare capacity.
pub struct Stack {
    allocation: NonNull<Value>,
    /// size of the mapping in bytes
    mapped: usize,
    capacity: usize,
    length: usize,
}

impl Stack {
    /// Map a stack with room for at least `size` cells.
    pub fn new(size: usize) -> Result<Self, MemoryError> {
        let (allocation, mapped) =
            system::allocate(size.saturating_mul(CELL_SIZE), Protection::Data)?;
        Ok(Self {
            allocation: allocation.cast(),
            mapped,
            capacity: mapped / CELL_SIZE,
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

    /// Number of cells that fit before the next growth.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Push a value, doubling the mapping first when full. Returns the index
    /// the value was written to.
    pub fn push(&mut self, value: Value) -> usize {
        if self.length == self.capacity {
            self.grow();
        }
        let index = self.length;
        // SAFETY: index < capacity after growing
        unsafe { self.allocation.as_ptr().add(index).write(value) };
        self.length += 1;
        index
    }

    /// Pop the top value.
    pub fn pop(&mut self) -> Result<Value, StackError> {
        if self.length == 0 {
            return Err(StackError::Underflow);
        }
        self.length -= 1;
        // SAFETY: the cell below the old length is initialized
        Ok(unsafe { self.allocation.as_ptr().add(self.length).read() })
    }

    /// Top value without removing it.
    pub fn peek(&self) -> Result<Value, StackError> {
        self.as_slice().last().copied().ok_or(StackError::Underflow)
    }

    /// Read the cell at absolute position `index`.
    pub fn index(&self, index: usize) -> Result<Value, StackError> {
        self.as_slice()
            .get(index)
            .copied()
            .ok_or(StackError::OutOfBounds {
                index,
                len: self.length,
            })
    }

    /// The nth value from the top (0 is the top).
    pub fn nth_from_top(&self, n: usize) -> Option<Value> {
        let index = self.length.checked_sub(n + 1)?;
        self.as_slice().get(index).copied()
    }

    /// Live cells, bottom first.
    #[inline]
    pub fn as_slice(&self) -> &[Value] {
        // SAFETY: the first `length` cells are initialized and the mapping
        // lives as long as self
        unsafe { slice::from_raw_parts(self.allocation.as_ptr(), self.length) }
    }

    pub fn clear(&mut self) {
        self.length = 0;
    }

    fn grow(&mut self) {
        let requested = self.mapped.saturating_mul(2);
        let (allocation, mapped) =
            match system::allocate(requested, Protection::Data) {
                Ok(mapping) => mapping,
                Err(err) => system::allocation_failed(err, requested),
            };
        let allocation = allocation.cast::<Value>();

        // SAFETY: both mappings hold at least `length` cells and are distinct
        unsafe {
            ptr::copy_nonoverlapping(
                self.allocation.as_ptr(),
                allocation.as_ptr(),
                self.length,
            )
        };
        // SAFETY: the old mapping came from `allocate` with `mapped` bytes
        // and nothing points into it anymore
        unsafe { system::free(self.allocation.cast(), self.mapped) };

        log::debug!(
            "stack grew from {} to {} cells",
            self.capacity,
            mapped / CELL_SIZE
        );
        self.allocation = allocation;
        self.mapped = mapped;
        self.capacity = mapped / CELL_SIZE;
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        // SAFETY: the mapping is owned by this stack and released once
        unsafe { system::free(self.allocation.cast(), self.mapped) };
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack")
            .field("length", &self.length)
            .field("capacity", &self.capacity)
            .field("cells", &self.as_slice())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PAGE_SIZE;
    use proptest::prelude::*;

    #[test]
    fn push_returns_index() {
        let mut stack = Stack::new(16).expect("stack");
        assert!(stack.is_empty());
        assert_eq!(stack.push(Value::fixnum(1)), 0);
        assert_eq!(stack.push(Value::fixnum(2)), 1);
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.index(1), Ok(Value::fixnum(2)));
        assert_eq!(stack.peek(), Ok(Value::fixnum(2)));
    }

    #[test]
    fn capacity_is_page_rounded() {
        let stack = Stack::new(1).expect("stack");
        assert_eq!(stack.capacity(), PAGE_SIZE / CELL_SIZE);
    }

    #[test]
    fn oversized_stack_is_an_error() {
        assert_eq!(
            Stack::new(usize::MAX).map(|s| s.capacity()),
            Err(MemoryError::MapFailed { size: usize::MAX })
        );
        assert!(Stack::new(usize::MAX / 2).is_err());
    }

    #[test]
    fn pop_empty_is_underflow() {
        let mut stack = Stack::new(4).expect("stack");
        assert_eq!(stack.pop(), Err(StackError::Underflow));
        assert_eq!(stack.peek(), Err(StackError::Underflow));
        stack.push(Value::fixnum(3));
        assert_eq!(stack.pop(), Ok(Value::fixnum(3)));
        assert_eq!(stack.pop(), Err(StackError::Underflow));
    }

    #[test]
    fn index_out_of_bounds() {
        let mut stack = Stack::new(4).expect("stack");
        stack.push(Value::fixnum(3));
        assert_eq!(
            stack.index(1),
            Err(StackError::OutOfBounds { index: 1, len: 1 })
        );
    }

    #[test]
    fn nth_from_top() {
        let mut stack = Stack::new(4).expect("stack");
        for n in 0..3 {
            stack.push(Value::fixnum(n));
        }
        assert_eq!(stack.nth_from_top(0), Some(Value::fixnum(2)));
        assert_eq!(stack.nth_from_top(2), Some(Value::fixnum(0)));
        assert_eq!(stack.nth_from_top(3), None);
    }

    #[test]
    fn growth_preserves_contents() {
        let mut stack = Stack::new(1).expect("stack");
        let initial = stack.capacity();
        let count = initial * 3 + 5;
        for n in 0..count {
            assert_eq!(stack.push(Value::fixnum(n as i64)), n);
        }
        assert!(stack.capacity() >= count);
        assert!(stack.capacity() > initial);
        for n in 0..count {
            assert_eq!(stack.index(n), Ok(Value::fixnum(n as i64)));
        }
        stack.clear();
        assert!(stack.is_empty());
    }

    proptest! {
        #[test]
        fn lifo(values in proptest::collection::vec(-1000i64..1000, 0..2000)) {
            let mut stack = Stack::new(8).expect("stack");
            for &v in &values {
                stack.push(Value::fixnum(v));
                prop_assert_eq!(stack.index(stack.len() - 1), Ok(Value::fixnum(v)));
            }
            for &v in values.iter().rev() {
                prop_assert_eq!(stack.pop(), Ok(Value::fixnum(v)));
            }
            prop_assert!(stack.is_empty());
        }
    }
}
