//! Unbounded FIFO of byte-slice chunks used as an overflow tail.

use std::collections::VecDeque;

struct Chunk {
    data: Vec<u8>,
    offset: usize,
}

impl Chunk {
    fn remaining(&self) -> &[u8] {
        &self.data[self.offset..]
    }
}

/// An ordered sequence of byte chunks, each with an internal read offset.
#[derive(Default)]
pub struct ListBuffer {
    chunks: VecDeque<Chunk>,
    length: usize,
}

impl ListBuffer {
    pub fn new() -> ListBuffer {
        ListBuffer {
            chunks: VecDeque::new(),
            length: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Appends `bytes` as a new chunk at the tail.
    pub fn push_back(&mut self, bytes: Vec<u8>) {
        if bytes.is_empty() {
            return;
        }
        self.length += bytes.len();
        self.chunks.push_back(Chunk {
            data: bytes,
            offset: 0,
        });
    }

    /// Returns up to `n` bytes from the head as an ordered vector of
    /// slices, without consuming them.
    pub fn peek(&self, n: usize) -> Vec<&[u8]> {
        let mut out = Vec::new();
        let mut remaining = n.min(self.length);
        for chunk in self.chunks.iter() {
            if remaining == 0 {
                break;
            }
            let slice = chunk.remaining();
            let take = slice.len().min(remaining);
            out.push(&slice[..take]);
            remaining -= take;
        }
        out
    }

    /// Drops up to `n` bytes from the head, removing fully-consumed
    /// chunks.
    pub fn discard(&mut self, n: usize) {
        let mut remaining = n.min(self.length);
        while remaining > 0 {
            let Some(front) = self.chunks.front_mut() else {
                break;
            };
            let avail = front.remaining().len();
            if avail <= remaining {
                remaining -= avail;
                self.length -= avail;
                self.chunks.pop_front();
            } else {
                front.offset += remaining;
                self.length -= remaining;
                remaining = 0;
            }
        }
    }

    pub fn reset(&mut self) {
        self.chunks.clear();
        self.length = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_then_discard_round_trips_bytes() {
        let mut lb = ListBuffer::new();
        lb.push_back(b"hello".to_vec());
        lb.push_back(b"world".to_vec());
        assert_eq!(lb.length(), 10);

        let peeked: Vec<u8> = lb.peek(10).concat();
        assert_eq!(peeked, b"helloworld");

        lb.discard(7);
        assert_eq!(lb.length(), 3);
        let rest: Vec<u8> = lb.peek(10).concat();
        assert_eq!(rest, b"rld");
    }

    #[test]
    fn discard_across_chunk_boundary() {
        let mut lb = ListBuffer::new();
        lb.push_back(vec![1, 2, 3]);
        lb.push_back(vec![4, 5, 6]);
        lb.discard(3);
        assert_eq!(lb.length(), 3);
        assert_eq!(lb.peek(3).concat(), vec![4, 5, 6]);
    }

    #[test]
    fn discard_more_than_available_clamps() {
        let mut lb = ListBuffer::new();
        lb.push_back(vec![1, 2, 3]);
        lb.discard(100);
        assert!(lb.is_empty());
    }

    #[test]
    fn empty_push_is_noop() {
        let mut lb = ListBuffer::new();
        lb.push_back(Vec::new());
        assert!(lb.is_empty());
    }
}
