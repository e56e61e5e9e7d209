//! Ring of the most recently distributed frames
//!
//! Offset 0 is the oldest frame. Ports with a deeper buffer read further
//! towards the newest end.

use std::fmt;

use contracts::ConstFrame;
use ringbuf::{traits::*, HeapRb};

pub struct FrameRing {
    ring: HeapRb<ConstFrame>,
    capacity: usize,
}

impl fmt::Debug for FrameRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameRing")
            .field("len", &self.ring.occupied_len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl FrameRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: HeapRb::new(capacity),
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Resize, keeping the newest frames when shrinking
    pub fn set_capacity(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        if capacity == self.capacity {
            return;
        }

        let mut ring = HeapRb::new(capacity);
        let skip = self.ring.occupied_len().saturating_sub(capacity);
        for frame in self.ring.pop_iter().skip(skip) {
            let _ = ring.try_push(frame);
        }

        self.ring = ring;
        self.capacity = capacity;
    }

    /// Append a frame, overwriting the oldest when full
    #[inline]
    pub fn push(&mut self, frame: ConstFrame) {
        if self.ring.is_full() {
            let _ = self.ring.try_pop();
        }
        let _ = self.ring.try_push(frame);
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ring.occupied_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Frame at `offset` from the oldest
    pub fn get(&self, offset: usize) -> Option<&ConstFrame> {
        self.ring.iter().nth(offset)
    }

    pub fn newest(&self) -> Option<&ConstFrame> {
        self.ring.iter().last()
    }

    pub fn clear(&mut self) {
        while self.ring.try_pop().is_some() {}
    }
}
