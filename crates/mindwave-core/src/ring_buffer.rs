//! Fixed-capacity ring buffer for sliding sample windows
//!
//! Array-backed with a head cursor and a length. Pushing into a full buffer
//! overwrites the oldest element; nothing is allocated after construction.

use serde::{Deserialize, Serialize};

/// FIFO window holding the most recent `capacity` values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingBuffer<T> {
    slots: Box<[T]>,
    /// Index of the oldest element
    head: usize,
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create an empty buffer. A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: vec![T::default(); capacity].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    /// Append a value, returning the evicted oldest value when full
    pub fn push(&mut self, value: T) -> Option<T> {
        let capacity = self.slots.len();
        if self.len < capacity {
            let tail = (self.head + self.len) % capacity;
            self.slots[tail] = value;
            self.len += 1;
            None
        } else {
            let evicted = self.slots[self.head];
            self.slots[self.head] = value;
            self.head = (self.head + 1) % capacity;
            Some(evicted)
        }
    }

    /// Most recently pushed value
    pub fn last(&self) -> Option<T> {
        if self.len == 0 {
            None
        } else {
            Some(self.slots[(self.head + self.len - 1) % self.slots.len()])
        }
    }

    /// Value at `index`, counted from the oldest element
    pub fn get(&self, index: usize) -> Option<T> {
        if index < self.len {
            Some(self.slots[(self.head + index) % self.slots.len()])
        } else {
            None
        }
    }

    /// Iterate from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.len).map(move |i| self.slots[(self.head + i) % self.slots.len()])
    }

    /// Copy the contents, oldest first
    pub fn snapshot(&self) -> Vec<T> {
        self.iter().collect()
    }

    /// Copy the contents into `out`, oldest first, reusing its allocation
    pub fn snapshot_into(&self, out: &mut Vec<T>) {
        out.clear();
        out.extend(self.iter());
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Drop all elements, keeping the allocation
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}
