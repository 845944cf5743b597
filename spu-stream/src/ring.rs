//! Byte ring buffer shared between the producer and the chunk interrupt.
//!
//! The buffer is split in two parts:
//!
//! - [`RingBuffer`] holds the cursors (`head`, `tail`, `length`). It is plain
//!   data and is always accessed under the stream's state lock.
//! - [`RingStorage`] holds the bytes. It is accessed without a lock, one
//!   region at a time, under the contract below.
//!
//! # Safety Contract
//!
//! - Only ONE context writes (the producer, through `&mut Stream`), and only
//!   into the free region starting at `head` that the cursors handed out.
//! - Only ONE context reads (the chunk interrupt and the upload it starts),
//!   and only the chunk just consumed from `tail`. The producer is not handed
//!   that chunk again until the upload has completed.
//! - `length` is the only source of truth; `head` and `tail` are derived
//!   positions and always lie in `[0, capacity)`.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cell::UnsafeCell;

use crate::error::{Result, StreamError};

/// Cursor state of a byte ring buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingBuffer {
    capacity: usize,
    /// Next write offset (advanced by the producer).
    head: usize,
    /// Next read offset (advanced by the consumer).
    tail: usize,
    /// Bytes currently buffered.
    length: usize,
}

impl RingBuffer {
    /// Create an empty ring of `capacity` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub const fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be non-zero");

        RingBuffer {
            capacity,
            head: 0,
            tail: 0,
            length: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently buffered.
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn is_full(&self) -> bool {
        self.length == self.capacity
    }

    pub fn head(&self) -> usize {
        self.head
    }

    pub fn tail(&self) -> usize {
        self.tail
    }

    /// Bytes that can still be committed before the buffer is full.
    pub fn free(&self) -> usize {
        self.capacity - self.length
    }

    /// Bytes that can be written at `head` without wrapping or overrunning
    /// the tail. Zero when full.
    ///
    /// When filling the whole free space would wrap, only the first region is
    /// reported; the second one is reported once the first has been committed.
    pub fn contiguous_free(&self) -> usize {
        self.free().min(self.capacity - self.head)
    }

    /// Mark up to `length` bytes at `head` as valid.
    ///
    /// Returns the number of bytes actually committed (clamped to the free
    /// space).
    pub fn commit(&mut self, length: usize) -> usize {
        let length = length.min(self.free());
        self.head = (self.head + length) % self.capacity;
        self.length += length;
        length
    }

    /// Consume exactly `length` bytes from `tail`.
    ///
    /// Returns the offset the consumed bytes started at, or `None` (and
    /// leaves the cursors untouched) if fewer than `length` bytes are
    /// buffered.
    pub fn consume(&mut self, length: usize) -> Option<usize> {
        if length > self.length {
            return None;
        }
        let start = self.tail;
        self.tail = (self.tail + length) % self.capacity;
        self.length -= length;
        Some(start)
    }
}

/// Heap-allocated byte region backing a [`RingBuffer`].
pub struct RingStorage {
    data: Box<[UnsafeCell<u8>]>,
}

// SAFETY: Access follows the module-level contract. Producer and consumer
// only ever touch disjoint regions, and which region is which is decided
// under the state lock that guards the cursors.
unsafe impl Sync for RingStorage {}
unsafe impl Send for RingStorage {}

impl RingStorage {
    /// Allocate `size` zeroed bytes, reporting allocation failure instead of
    /// aborting.
    pub fn try_new(size: usize) -> Result<Self> {
        let mut data: Vec<UnsafeCell<u8>> = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|_| StreamError::Allocation { bytes: size })?;
        data.resize_with(size, || UnsafeCell::new(0));

        Ok(RingStorage {
            data: data.into_boxed_slice(),
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn check_bounds(&self, offset: usize, length: usize) -> *mut u8 {
        assert!(
            offset <= self.data.len() && length <= self.data.len() - offset,
            "ring region {offset}+{length} out of bounds"
        );
        // SAFETY: `offset` is in bounds (or one past the end for an empty
        // region) and the pointer is derived from the whole slice.
        unsafe { UnsafeCell::raw_get(self.data.as_ptr().add(offset)) }
    }

    /// Borrow a region for reading.
    ///
    /// # Safety
    ///
    /// No mutable borrow of an overlapping region may be alive.
    pub unsafe fn region(&self, offset: usize, length: usize) -> &[u8] {
        let ptr = self.check_bounds(offset, length);
        unsafe { core::slice::from_raw_parts(ptr, length) }
    }

    /// Borrow a region for writing.
    ///
    /// # Safety
    ///
    /// No other borrow of an overlapping region may be alive.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn region_mut(&self, offset: usize, length: usize) -> &mut [u8] {
        let ptr = self.check_bounds(offset, length);
        unsafe { core::slice::from_raw_parts_mut(ptr, length) }
    }
}
