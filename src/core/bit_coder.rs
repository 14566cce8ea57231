//! Byte-level writer/reader traits shared by every stage of the codec.
//!
//! Multi-byte values travel in the writer's native byte order; the stream
//! header records which order that was, and the reader byte-swaps when its
//! own native order differs (see [`ByteReader::swap`]).

use std::vec;

pub trait ByteWriter {
    fn write_u8(&mut self, value: u8);

    fn write_u16(&mut self, value: u16) {
        for b in value.to_ne_bytes() {
            self.write_u8(b);
        }
    }

    fn write_u32(&mut self, value: u32) {
        for b in value.to_ne_bytes() {
            self.write_u8(b);
        }
    }

    fn write_u64(&mut self, value: u64) {
        for b in value.to_ne_bytes() {
            self.write_u8(b);
        }
    }

    fn write_i32(&mut self, value: i32) {
        self.write_u32(value as u32);
    }

    fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    fn write_f64(&mut self, value: f64) {
        self.write_u64(value.to_bits());
    }
}

impl ByteWriter for Vec<u8> {
    fn write_u8(&mut self, value: u8) {
        self.push(value);
    }

    fn write_u16(&mut self, value: u16) {
        self.extend_from_slice(&value.to_ne_bytes());
    }

    fn write_u32(&mut self, value: u32) {
        self.extend_from_slice(&value.to_ne_bytes());
    }

    fn write_u64(&mut self, value: u64) {
        self.extend_from_slice(&value.to_ne_bytes());
    }
}

/// A sink that counts bytes without storing them. The predictor selector
/// re-encodes an object through one of these once per candidate to compare
/// output sizes before committing to the real stream.
#[derive(Debug, Default)]
pub struct TrialWriter {
    len: usize,
}

impl TrialWriter {
    pub fn new() -> Self {
        Self { len: 0 }
    }

    /// the number of bytes the trial encode produced so far.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl ByteWriter for TrialWriter {
    fn write_u8(&mut self, _value: u8) {
        self.len += 1;
    }

    fn write_u16(&mut self, _value: u16) {
        self.len += 2;
    }

    fn write_u32(&mut self, _value: u32) {
        self.len += 4;
    }

    fn write_u64(&mut self, _value: u64) {
        self.len += 8;
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ReaderErr {
    #[error("not enough data to read")]
    NotEnoughData,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait ByteReader {
    fn read_u8(&mut self) -> Result<u8, ReaderErr>;

    /// whether multi-byte values need a byte swap to reach the reader's
    /// native order. Established from the stream header's endianness byte.
    fn swap(&self) -> bool {
        false
    }

    fn read_u16(&mut self) -> Result<u16, ReaderErr> {
        let out = [self.read_u8()?, self.read_u8()?];
        let v = u16::from_ne_bytes(out);
        Ok(if self.swap() { v.swap_bytes() } else { v })
    }

    fn read_u32(&mut self) -> Result<u32, ReaderErr> {
        let out = [
            self.read_u8()?,
            self.read_u8()?,
            self.read_u8()?,
            self.read_u8()?,
        ];
        let v = u32::from_ne_bytes(out);
        Ok(if self.swap() { v.swap_bytes() } else { v })
    }

    fn read_u64(&mut self) -> Result<u64, ReaderErr> {
        let mut out = [0_u8; 8];
        for b in out.iter_mut() {
            *b = self.read_u8()?;
        }
        let v = u64::from_ne_bytes(out);
        Ok(if self.swap() { v.swap_bytes() } else { v })
    }

    fn read_i32(&mut self) -> Result<i32, ReaderErr> {
        Ok(self.read_u32()? as i32)
    }

    fn read_f32(&mut self) -> Result<f32, ReaderErr> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    fn read_f64(&mut self) -> Result<f64, ReaderErr> {
        Ok(f64::from_bits(self.read_u64()?))
    }
}

impl ByteReader for vec::IntoIter<u8> {
    fn read_u8(&mut self) -> Result<u8, ReaderErr> {
        self.next().ok_or(ReaderErr::NotEnoughData)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_scalars() {
        let mut buffer = Vec::new();
        buffer.write_u8(0xAB);
        buffer.write_u16(0x1234);
        buffer.write_u32(0xDEADBEEF);
        buffer.write_u64(0x0123_4567_89AB_CDEF);
        buffer.write_i32(-42);
        buffer.write_f32(1.5);
        buffer.write_f64(-0.25);

        let mut reader = buffer.into_iter();
        assert_eq!(reader.read_u8().unwrap(), 0xAB);
        assert_eq!(reader.read_u16().unwrap(), 0x1234);
        assert_eq!(reader.read_u32().unwrap(), 0xDEADBEEF);
        assert_eq!(reader.read_u64().unwrap(), 0x0123_4567_89AB_CDEF);
        assert_eq!(reader.read_i32().unwrap(), -42);
        assert_eq!(reader.read_f32().unwrap(), 1.5);
        assert_eq!(reader.read_f64().unwrap(), -0.25);
        assert!(matches!(reader.read_u8(), Err(ReaderErr::NotEnoughData)));
    }

    #[test]
    fn trial_writer_counts_like_a_real_sink() {
        fn emit<W: ByteWriter>(w: &mut W) {
            w.write_u8(7);
            w.write_u32(99);
            w.write_f64(3.25);
            w.write_u16(13);
        }
        let mut real = Vec::new();
        let mut trial = TrialWriter::new();
        emit(&mut real);
        emit(&mut trial);
        assert_eq!(real.len(), trial.len());
    }
}
