use bytes::{Buf, BytesMut};

use crate::codec::{DecodeError, DecodeResult};

/// Resumable view over a connection's incoming byte stream.
///
/// The transport appends bytes as they arrive; decoders consume them
/// through the read position. `checkpoint` permanently retires everything
/// consumed so far, while `rewind` throws away the progress of a partial
/// parse attempt so the same bytes can be replayed once more data is
/// available. Bytes behind the checkpoint are never re-read, so the
/// buffer stays bounded by the largest in-flight frame.
pub struct StreamCursor {
    buf: BytesMut,
    pos: usize,
}

impl StreamCursor {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
            pos: 0,
        }
    }

    /// Append freshly received bytes to the end of the stream.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes available beyond the read position.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Read position, relative to the last checkpoint.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Look at the next byte without consuming it.
    pub fn peek_u8(&self) -> DecodeResult<u8> {
        if self.remaining() == 0 {
            return Err(DecodeError::Underflow);
        }
        Ok(self.buf[self.pos])
    }

    /// Consume one byte.
    pub fn read_u8(&mut self) -> DecodeResult<u8> {
        let byte = self.peek_u8()?;
        self.pos += 1;
        Ok(byte)
    }

    /// Consume exactly `n` bytes. On underflow the position is left
    /// untouched.
    pub fn read_bytes(&mut self, n: usize) -> DecodeResult<&[u8]> {
        if self.remaining() < n {
            return Err(DecodeError::Underflow);
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.buf[start..self.pos])
    }

    /// Rewind to the last checkpoint, discarding all progress since.
    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    /// Rewind to an earlier position recorded with `position`.
    pub fn rewind_to(&mut self, pos: usize) {
        debug_assert!(pos <= self.pos);
        self.pos = pos;
    }

    /// Bytes consumed since the last checkpoint.
    pub fn consumed(&self) -> &[u8] {
        &self.buf[..self.pos]
    }

    /// Retire everything consumed so far. Retired bytes are gone for
    /// good; a later `rewind` replays nothing before this point.
    pub fn checkpoint(&mut self) {
        self.buf.advance(self.pos);
        self.pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peek_does_not_consume() {
        let mut cur = StreamCursor::new();
        cur.extend(&[0xFE, 0x01]);
        assert_eq!(cur.peek_u8().unwrap(), 0xFE);
        assert_eq!(cur.peek_u8().unwrap(), 0xFE);
        assert_eq!(cur.position(), 0);
        assert_eq!(cur.read_u8().unwrap(), 0xFE);
        assert_eq!(cur.position(), 1);
    }

    #[test]
    fn test_rewind_replays_uncheckpointed_bytes() {
        let mut cur = StreamCursor::new();
        cur.extend(&[1, 2, 3]);
        assert_eq!(cur.read_u8().unwrap(), 1);
        assert_eq!(cur.read_u8().unwrap(), 2);
        cur.rewind();
        assert_eq!(cur.read_u8().unwrap(), 1);
        assert_eq!(cur.remaining(), 2);
    }

    #[test]
    fn test_checkpoint_retires_bytes() {
        let mut cur = StreamCursor::new();
        cur.extend(&[1, 2, 3]);
        assert_eq!(cur.read_u8().unwrap(), 1);
        assert_eq!(cur.consumed(), &[1]);
        cur.checkpoint();
        assert_eq!(cur.position(), 0);
        assert_eq!(cur.remaining(), 2);
        cur.rewind();
        // Byte 1 is gone; the next read sees 2.
        assert_eq!(cur.read_u8().unwrap(), 2);
    }

    #[test]
    fn test_read_bytes_underflow_leaves_position() {
        let mut cur = StreamCursor::new();
        cur.extend(&[1, 2]);
        assert_eq!(cur.read_bytes(3), Err(DecodeError::Underflow));
        assert_eq!(cur.position(), 0);
        assert_eq!(cur.read_bytes(2).unwrap(), &[1, 2]);
    }

    #[test]
    fn test_extend_after_partial_read() {
        let mut cur = StreamCursor::new();
        cur.extend(&[1]);
        assert_eq!(cur.read_u8().unwrap(), 1);
        assert_eq!(cur.read_u8(), Err(DecodeError::Underflow));
        cur.rewind();
        cur.extend(&[2]);
        assert_eq!(cur.read_bytes(2).unwrap(), &[1, 2]);
    }
}
