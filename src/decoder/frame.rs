//! Frame framing: `[tag: u8][len: u32 big-endian, includes itself][len - 4 bytes payload]`.

use bytes::{Bytes, BytesMut};

/// One decoded frontend message, header stripped.
pub struct Frame {
    pub tag: u8,
    pub payload: Bytes,
}

/// Splits a byte stream into complete frames, buffering a partial trailing
/// frame across calls so callers never lose bytes that arrive split across
/// two reads.
#[derive(Default)]
pub struct FrameReader {
    tail: BytesMut,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `data` to the buffered tail and extracts every complete frame
    /// now available, in wire order. Leaves any partial trailing frame in the
    /// tail for the next call.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Frame> {
        self.tail.extend_from_slice(data);

        let mut frames = Vec::new();
        loop {
            if self.tail.len() < 5 {
                break;
            }

            let tag = self.tail[0];
            let msg_len = u32::from_be_bytes([self.tail[1], self.tail[2], self.tail[3], self.tail[4]]) as usize;

            let Some(_payload_len) = msg_len.checked_sub(4) else {
                // Length field shorter than itself: no principled way to resync.
                self.tail.clear();
                break;
            };

            let frame_len = 1 + msg_len;
            if self.tail.len() < frame_len {
                break;
            }

            let mut frame_bytes = self.tail.split_to(frame_len);
            let payload = frame_bytes.split_off(5).freeze();
            frames.push(Frame { tag, payload });
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tag: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(tag);
        out.extend_from_slice(&((payload.len() + 4) as u32).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn single_complete_frame() {
        let mut reader = FrameReader::new();
        let wire = frame(b'Q', b"SELECT 1;\0");
        let frames = reader.feed(&wire);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].tag, b'Q');
        assert_eq!(&frames[0].payload[..], b"SELECT 1;\0");
    }

    #[test]
    fn truncated_frame_is_buffered_not_dropped() {
        let mut reader = FrameReader::new();
        let wire = frame(b'Q', b"SELECT 1;\0");
        let (first, second) = wire.split_at(wire.len() - 3);

        let frames = reader.feed(first);
        assert!(frames.is_empty());

        let frames = reader.feed(second);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0].payload[..], b"SELECT 1;\0");
    }

    #[test]
    fn multiple_frames_in_one_read() {
        let mut reader = FrameReader::new();
        let mut wire = frame(b'Q', b"SELECT 1;\0");
        wire.extend_from_slice(&frame(b'S', b""));

        let frames = reader.feed(&wire);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].tag, b'Q');
        assert_eq!(frames[1].tag, b'S');
    }

    #[test]
    fn corrupt_length_clears_tail_without_panicking() {
        let mut reader = FrameReader::new();
        let mut wire = vec![b'Q'];
        wire.extend_from_slice(&1u32.to_be_bytes()); // len < 4
        wire.extend_from_slice(b"garbage");

        let frames = reader.feed(&wire);
        assert!(frames.is_empty());
    }
}
