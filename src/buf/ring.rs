//! Fixed-capacity circular byte buffer with scatter-read support.

use std::io;
use std::os::fd::RawFd;

use crate::util::ceil_to_power_of_two;

/// A circular buffer of power-of-two capacity.
///
/// `r == w` is ambiguous between "empty" and "full"; `is_empty` resolves
/// it. Readable bytes occupy `[r, w)` modulo `cap` when not empty; when
/// `r == w` and not empty the buffer holds exactly `cap` bytes.
#[derive(Debug)]
pub struct RingBuffer {
    data: Vec<u8>,
    cap: usize,
    r: usize,
    w: usize,
    is_empty: bool,
}

impl RingBuffer {
    /// Allocates a buffer of capacity `ceil_to_power_of_two(cap).max(2)`.
    pub fn new(cap: usize) -> RingBuffer {
        let cap = ceil_to_power_of_two(cap.max(2));
        RingBuffer {
            data: vec![0u8; cap],
            cap,
            r: 0,
            w: 0,
            is_empty: true,
        }
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    pub fn length(&self) -> usize {
        if self.is_empty {
            0
        } else if self.w > self.r {
            self.w - self.r
        } else if self.w < self.r {
            self.cap - self.r + self.w
        } else {
            self.cap
        }
    }

    pub fn free(&self) -> usize {
        self.cap - self.length()
    }

    pub fn reset(&mut self) {
        self.r = 0;
        self.w = 0;
        self.is_empty = true;
    }

    /// Copies as much of `bytes` as fits into free space. Returns the
    /// number of bytes written.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.free());
        if n == 0 {
            return 0;
        }
        let first = n.min(self.cap - self.w);
        self.data[self.w..self.w + first].copy_from_slice(&bytes[..first]);
        if first < n {
            self.data[..n - first].copy_from_slice(&bytes[first..n]);
        }
        self.w = (self.w + n) % self.cap;
        self.is_empty = false;
        n
    }

    /// Copies up to `dst.len()` readable bytes into `dst`, consuming them.
    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        let n = self.peek_into(dst);
        self.discard(n);
        n
    }

    fn peek_into(&self, dst: &mut [u8]) -> usize {
        let (head, tail) = self.peek(dst.len());
        dst[..head.len()].copy_from_slice(head);
        dst[head.len()..head.len() + tail.len()].copy_from_slice(tail);
        head.len() + tail.len()
    }

    /// Returns up to `n` readable bytes as two slices without consuming
    /// them. The second slice is non-empty only when the readable region
    /// wraps past the end of the backing array.
    pub fn peek(&self, n: usize) -> (&[u8], &[u8]) {
        let len = n.min(self.length());
        if len == 0 {
            return (&[], &[]);
        }
        let first = len.min(self.cap - self.r);
        let head = &self.data[self.r..self.r + first];
        let tail = if first < len {
            &self.data[..len - first]
        } else {
            &[]
        };
        (head, tail)
    }

    pub fn peek_all(&self) -> (&[u8], &[u8]) {
        self.peek(self.length())
    }

    /// Drops up to `n` bytes from the head of the readable region.
    pub fn discard(&mut self, n: usize) {
        let n = n.min(self.length());
        if n == 0 {
            return;
        }
        self.r = (self.r + n) % self.cap;
        if self.r == self.w {
            self.is_empty = true;
        }
    }

    /// Reads directly from `fd` into the free region(s) of the buffer.
    ///
    /// Uses a single `read(2)` when the free region is contiguous and a
    /// vectored `readv(2)` when it wraps. Returns `Ok(0)` on end-of-file.
    /// `EAGAIN`/`EWOULDBLOCK` surfaces as `io::ErrorKind::WouldBlock`.
    pub fn copy_from_socket(&mut self, fd: RawFd) -> io::Result<usize> {
        let free = self.free();
        if free == 0 {
            return Ok(0);
        }
        let first_len = free.min(self.cap - self.w);
        let second_len = free - first_len;

        let n = if second_len == 0 {
            let buf = &mut self.data[self.w..self.w + first_len];
            syscall!(read(
                fd,
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len()
            ))? as usize
        } else {
            let (tail, head) = self.data.split_at_mut(self.w);
            let iov = [
                libc::iovec {
                    iov_base: head.as_mut_ptr() as *mut libc::c_void,
                    iov_len: first_len,
                },
                libc::iovec {
                    iov_base: tail.as_mut_ptr() as *mut libc::c_void,
                    iov_len: second_len,
                },
            ];
            syscall!(readv(fd, iov.as_ptr(), iov.len() as libc::c_int))? as usize
        };

        if n > 0 {
            self.w = (self.w + n) % self.cap;
            self.is_empty = false;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_capacity_up_to_power_of_two() {
        let rb = RingBuffer::new(10);
        assert_eq!(rb.capacity(), 16);
    }

    #[test]
    fn write_then_read_round_trip() {
        let mut rb = RingBuffer::new(16);
        assert_eq!(rb.write(b"hello"), 5);
        assert_eq!(rb.length(), 5);
        assert_eq!(rb.free(), 11);
        let mut dst = [0u8; 5];
        assert_eq!(rb.read(&mut dst), 5);
        assert_eq!(&dst, b"hello");
        assert!(rb.is_empty());
        assert_eq!(rb.length() + rb.free(), rb.capacity());
    }

    #[test]
    fn write_stops_at_capacity() {
        let mut rb = RingBuffer::new(4);
        assert_eq!(rb.write(b"abcdef"), 4);
        assert_eq!(rb.free(), 0);
        assert_eq!(rb.write(b"x"), 0);
    }

    #[test]
    fn wrap_around_round_trips_bytes_in_order() {
        let mut rb = RingBuffer::new(16);
        let mut scratch = [0u8; 10];

        assert_eq!(rb.write(&[b'A'; 10]), 10);
        assert_eq!(rb.read(&mut scratch), 10);
        assert_eq!(scratch, [b'A'; 10]);

        assert_eq!(rb.write(&[b'B'; 10]), 10);
        assert_eq!(rb.read(&mut scratch), 10);
        assert_eq!(scratch, [b'B'; 10]);
    }

    #[test]
    fn peek_does_not_consume() {
        let mut rb = RingBuffer::new(16);
        rb.write(b"abc");
        let (head, tail) = rb.peek(2);
        assert_eq!(head, b"ab");
        assert!(tail.is_empty());
        assert_eq!(rb.length(), 3);
    }

    #[test]
    fn full_buffer_r_equals_w_has_length_cap() {
        let mut rb = RingBuffer::new(4);
        rb.write(&[1, 2, 3, 4]);
        assert_eq!(rb.length(), 4);
        assert_eq!(rb.free(), 0);
        assert!(!rb.is_empty());
    }

    #[test]
    fn discard_more_than_available_clamps() {
        let mut rb = RingBuffer::new(8);
        rb.write(b"abc");
        rb.discard(100);
        assert!(rb.is_empty());
        assert_eq!(rb.length(), 0);
    }

    #[test]
    fn reset_clears_cursors() {
        let mut rb = RingBuffer::new(8);
        rb.write(b"abc");
        rb.reset();
        assert!(rb.is_empty());
        assert_eq!(rb.free(), rb.capacity());
    }
}
