//! Flat `f32` storage shared between worker threads and the consumer.

use std::cell::UnsafeCell;

/// Heap-allocated buffer whose disjoint ranges are handed out to different
/// threads.
///
/// The buffer itself does no synchronization; callers guarantee that a range
/// is never written while another reference to it is alive.
pub(crate) struct HeapBuffer {
    data: Box<[UnsafeCell<f32>]>,
}

// SAFETY: access to each range is serialized by the instance state machine.
unsafe impl Sync for HeapBuffer {}

impl HeapBuffer {
    /// Allocate a zero-filled buffer of `len` elements
    pub(crate) fn new(len: usize) -> Self {
        let data = (0..len).map(|_| UnsafeCell::new(0.0)).collect();
        Self { data }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    fn ptr_at(&self, start: usize, len: usize) -> *mut f32 {
        assert!(start + len <= self.data.len(), "range out of bounds");
        // UnsafeCell<f32> has the same layout as f32.
        UnsafeCell::raw_get(self.data[start..].as_ptr())
    }

    /// # Safety
    /// No other reference to `start..start + len` may exist while the
    /// returned slice is alive.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn slice_mut(&self, start: usize, len: usize) -> &mut [f32] {
        std::slice::from_raw_parts_mut(self.ptr_at(start, len), len)
    }

    /// # Safety
    /// No mutable reference to `start..start + len` may exist while the
    /// returned slice is alive.
    pub(crate) unsafe fn slice(&self, start: usize, len: usize) -> &[f32] {
        std::slice::from_raw_parts(self.ptr_at(start, len), len)
    }
}
