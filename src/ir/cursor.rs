//! Forward-only reader over an in-memory IR byte buffer.
//!
//! Every read past the end yields `DecodeError::EndOfStream`; callers layer
//! `MalformedData` on top when the bytes are present but inconsistent.

use crate::error::DecodeError;

/// Sequential reader over a borrowed byte slice. Big-endian, as the IR wire
/// format is.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current read offset from the start of the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let b = *self
            .buf
            .get(self.pos)
            .ok_or(DecodeError::EndOfStream { offset: self.pos })?;
        self.pos += 1;
        Ok(b)
    }

    pub fn read_i8(&mut self) -> Result<i8, DecodeError> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16, DecodeError> {
        Ok(i16::from_be_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, DecodeError> {
        Ok(i64::from_be_bytes(self.read_array()?))
    }

    /// Borrows the next `len` bytes. Fails without advancing if fewer remain.
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if len > self.remaining() {
            return Err(DecodeError::EndOfStream { offset: self.buf.len() });
        }
        let s = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(s)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let s = self.read_slice(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(s);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_big_endian_and_tracks_position() {
        let bytes = [0x01, 0x00, 0x02, 0xFF, 0xFF, 0xFF, 0xFE, 0x7F];
        let mut c = ByteCursor::new(&bytes);
        assert_eq!(c.read_u8().expect("u8"), 1);
        assert_eq!(c.read_u16().expect("u16"), 2);
        assert_eq!(c.read_i32().expect("i32"), -2);
        assert_eq!(c.position(), 7);
        assert_eq!(c.remaining(), 1);
        assert_eq!(c.read_i8().expect("i8"), 0x7F);
        assert!(c.is_exhausted());
    }

    #[test]
    fn test_read_past_end_is_end_of_stream() {
        let bytes = [0x00, 0x01];
        let mut c = ByteCursor::new(&bytes);
        let err = c.read_i32().expect_err("should run out");
        assert!(err.is_end_of_stream());
        // a failed multi-byte read does not consume the partial bytes
        assert_eq!(c.position(), 0);
        assert_eq!(c.read_u16().expect("u16"), 1);
        assert_eq!(
            c.read_u8().expect_err("empty"),
            DecodeError::EndOfStream { offset: 2 }
        );
    }

    #[test]
    fn test_read_slice_longer_than_buffer() {
        let bytes = b"abc";
        let mut c = ByteCursor::new(bytes);
        assert!(c.read_slice(4).expect_err("too long").is_end_of_stream());
        assert_eq!(c.read_slice(3).expect("slice"), b"abc");
    }
}
