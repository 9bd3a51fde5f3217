//! Size-indexed pool of [`RingBuffer`]s.
//!
//! Pooling is purely an allocation optimization; nothing about buffer
//! correctness depends on it.

use std::collections::HashMap;
use std::sync::Mutex;

use super::ring::RingBuffer;
use crate::util::ceil_to_power_of_two;

#[derive(Default)]
pub struct RingBufferPool {
    free: Mutex<HashMap<usize, Vec<RingBuffer>>>,
}

impl RingBufferPool {
    pub fn new() -> RingBufferPool {
        RingBufferPool {
            free: Mutex::new(HashMap::new()),
        }
    }

    /// Returns a reset buffer of capacity `ceil_to_power_of_two(cap)`,
    /// reusing a pooled one if available.
    pub fn get_with_size(&self, cap: usize) -> RingBuffer {
        let cap = ceil_to_power_of_two(cap.max(2));
        let mut free = self.free.lock().unwrap();
        if let Some(bucket) = free.get_mut(&cap) {
            if let Some(mut rb) = bucket.pop() {
                rb.reset();
                return rb;
            }
        }
        RingBuffer::new(cap)
    }

    /// Returns a buffer to the pool, resetting its cursors first.
    pub fn put(&self, mut rb: RingBuffer) {
        rb.reset();
        let cap = rb.capacity();
        let mut free = self.free.lock().unwrap();
        free.entry(cap).or_default().push(rb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_returns_empty_buffer_of_requested_capacity() {
        let pool = RingBufferPool::new();
        let mut rb = pool.get_with_size(10);
        assert_eq!(rb.capacity(), 16);
        rb.write(b"data");
        pool.put(rb);

        let rb2 = pool.get_with_size(10);
        assert_eq!(rb2.capacity(), 16);
        assert!(rb2.is_empty());
    }

    #[test]
    fn distinct_sizes_use_distinct_buckets() {
        let pool = RingBufferPool::new();
        let small = pool.get_with_size(4);
        let large = pool.get_with_size(64);
        assert_eq!(small.capacity(), 4);
        assert_eq!(large.capacity(), 64);
        pool.put(small);
        pool.put(large);
        assert_eq!(pool.get_with_size(4).capacity(), 4);
    }
}
