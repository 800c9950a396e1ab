//! Terminator framing.
//!
//! A frame is one encoded document followed by a single [`TERMINATOR`] byte.
//! Writers must emit each frame in one piece; a frame split by another
//! writer's bytes is not recoverable and simply fails to decode.

use bytes::{Bytes, BytesMut};

/// Byte that ends every frame.
pub const TERMINATOR: u8 = 0;

/// Append the terminator to an encoded body.
pub fn encode_frame(mut body: Vec<u8>) -> Bytes {
    // ---
    body.push(TERMINATOR);
    Bytes::from(body)
}

/// Accumulates stream bytes and yields complete frame bodies.
///
/// Bodies are returned without their terminator. Bytes after the last
/// terminator stay buffered until the next [`push`](Self::push). Empty
/// bodies (two terminators in a row) are skipped.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: BytesMut,
}

impl FrameBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every frame they complete.
    pub fn push(&mut self, data: &[u8]) -> Vec<Bytes> {
        // ---
        self.buf.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == TERMINATOR) {
            let mut frame = self.buf.split_to(pos + 1);
            frame.truncate(pos);
            if !frame.is_empty() {
                frames.push(frame.freeze());
            }
        }
        frames
    }

    /// Number of buffered bytes not yet part of a complete frame.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }
}
