//! The per-direction outbound FIFO. Single-producer/single-consumer: only
//! the owning Worker ever touches one.

use bytes::{Buf, BytesMut};

#[derive(Default)]
pub struct OutboundBuffer {
    buf: BytesMut,
}

impl OutboundBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes not yet sent.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn append(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Marks the first `n` bytes as sent. Once everything appended has been
    /// consumed, the backing storage is released back to an empty state.
    pub fn consume(&mut self, n: usize) {
        self.buf.advance(n);
        if self.buf.is_empty() {
            self.buf.clear();
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_consume_empties_buffer() {
        let mut buf = OutboundBuffer::new();
        buf.append(b"hello");
        buf.consume(buf.len());
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_consume_leaves_remainder() {
        let mut buf = OutboundBuffer::new();
        buf.append(b"abc");
        buf.append(b"def");
        buf.consume(3);
        assert_eq!(buf.as_slice(), b"def");
    }

    #[test]
    fn empty_buffer_has_zero_size() {
        let buf = OutboundBuffer::new();
        assert!(buf.is_empty());
        assert_eq!(buf.len(), 0);
    }
}
