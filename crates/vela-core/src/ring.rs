// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A bounded, oldest-first-evicting history buffer.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A circular buffer with a capacity chosen at runtime.
///
/// Pushing into a full buffer evicts the oldest entry, so the buffer never
/// holds more than `capacity` values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingBuffer<T> {
    data: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Creates a new, empty ring buffer. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            data: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Pushes a new value, returning the evicted oldest value if the buffer was full.
    pub fn push(&mut self, value: T) -> Option<T> {
        let evicted = if self.data.len() == self.capacity {
            self.data.pop_front()
        } else {
            None
        };
        self.data.push_back(value);
        evicted
    }

    /// Returns the number of elements currently in the buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the buffer holds no values.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns an iterator over the values in chronological order (oldest to newest).
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.data.iter()
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Copies the contents into a `Vec`, oldest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.data.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_push_and_iter() {
        let mut rb = RingBuffer::new(3);
        rb.push(1.0);
        rb.push(2.0);
        rb.push(3.0);
        let evicted = rb.push(4.0); // Overwrites 1.0

        assert_eq!(evicted, Some(1.0));
        let values: Vec<f64> = rb.iter().copied().collect();
        assert_eq!(values, vec![2.0, 3.0, 4.0]);
        assert_eq!(rb.len(), 3);
    }

    #[test]
    fn test_ring_buffer_never_exceeds_capacity() {
        let mut rb = RingBuffer::new(5);
        for i in 0..100 {
            rb.push(i);
            assert!(rb.len() <= 5);
        }
        assert_eq!(rb.to_vec(), vec![95, 96, 97, 98, 99]);
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let mut rb = RingBuffer::new(0);
        rb.push("a");
        rb.push("b");
        assert_eq!(rb.len(), 1);
        assert_eq!(rb.to_vec(), vec!["b"]);
    }
}
