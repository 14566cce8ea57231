//! Length-prefixed block framing over a raw byte sink/source.
//!
//! The stream is a sequence of blocks, each a 4-byte length prefix followed
//! by that many raw bytes. A zero-length block is the explicit stream
//! terminator. The prefix is always little-endian: it frames the header that
//! carries the endianness negotiation, so it cannot be subject to it.

use std::io;

use super::bit_coder::{ByteReader, ByteWriter, ReaderErr};
use crate::error::Err;

/// Staging capacity of the writer; one block per full staging buffer.
pub const BLOCK_CAPACITY: usize = 4096;

/// Accumulates codec output and flushes it to the sink one block at a time.
/// Sink errors are latched and surfaced by [`BlockWriter::finish`], which
/// keeps the [`ByteWriter`] trait infallible for the hot encode path.
pub struct BlockWriter<W: io::Write> {
    sink: W,
    staging: Vec<u8>,
    deferred: Option<io::Error>,
}

impl<W: io::Write> BlockWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            staging: Vec::with_capacity(BLOCK_CAPACITY),
            deferred: None,
        }
    }

    fn flush_block(&mut self) {
        if self.staging.is_empty() || self.deferred.is_some() {
            return;
        }
        let prefix = (self.staging.len() as u32).to_le_bytes();
        let res = self
            .sink
            .write_all(&prefix)
            .and_then(|_| self.sink.write_all(&self.staging));
        if let Err(e) = res {
            self.deferred = Some(e);
        }
        self.staging.clear();
    }

    /// Flushes any pending bytes, then always emits the zero-length
    /// terminator block, even when nothing was ever written.
    pub fn finish(mut self) -> Result<W, Err> {
        self.flush_block();
        if self.deferred.is_none() {
            if let Err(e) = self
                .sink
                .write_all(&0_u32.to_le_bytes())
                .and_then(|_| self.sink.flush())
            {
                self.deferred = Some(e);
            }
        }
        match self.deferred.take() {
            Some(e) => Err(Err::WriteFailed(e)),
            None => Ok(self.sink),
        }
    }
}

impl<W: io::Write> ByteWriter for BlockWriter<W> {
    fn write_u8(&mut self, value: u8) {
        self.staging.push(value);
        if self.staging.len() == BLOCK_CAPACITY {
            self.flush_block();
        }
    }
}

/// Reads the block stream back, refilling transparently from one block to
/// the next. Reading past the terminator is a corrupt-stream condition.
pub struct BlockReader<R: io::Read> {
    src: R,
    buf: Vec<u8>,
    pos: usize,
    finished: bool,
    swap: bool,
}

impl<R: io::Read> BlockReader<R> {
    pub fn new(src: R) -> Self {
        Self {
            src,
            buf: Vec::new(),
            pos: 0,
            finished: false,
            swap: false,
        }
    }

    /// Set after the header's endianness byte has been read.
    pub fn set_swap(&mut self, swap: bool) {
        self.swap = swap;
    }

    /// True once the zero-length terminator block has been consumed.
    pub fn at_end(&mut self) -> bool {
        if self.pos < self.buf.len() {
            return false;
        }
        if !self.finished {
            // peek the next block; errors are reported on the next read.
            if self.refill().is_err() {
                return false;
            }
        }
        self.finished && self.pos >= self.buf.len()
    }

    fn refill(&mut self) -> Result<(), ReaderErr> {
        let mut prefix = [0_u8; 4];
        self.read_exact(&mut prefix)?;
        let len = i32::from_le_bytes(prefix);
        if len <= 0 {
            self.finished = true;
            self.buf.clear();
            self.pos = 0;
            return Ok(());
        }
        self.buf.resize(len as usize, 0);
        self.pos = 0;
        let mut filled = 0;
        while filled < self.buf.len() {
            let n = self.src.read(&mut self.buf[filled..])?;
            if n == 0 {
                // a short block is fatal
                return Err(ReaderErr::NotEnoughData);
            }
            filled += n;
        }
        Ok(())
    }

    fn read_exact(&mut self, out: &mut [u8]) -> Result<(), ReaderErr> {
        let mut filled = 0;
        while filled < out.len() {
            let n = self.src.read(&mut out[filled..])?;
            if n == 0 {
                return Err(ReaderErr::NotEnoughData);
            }
            filled += n;
        }
        Ok(())
    }
}

impl<R: io::Read> ByteReader for BlockReader<R> {
    fn read_u8(&mut self) -> Result<u8, ReaderErr> {
        if self.pos >= self.buf.len() {
            if self.finished {
                return Err(ReaderErr::NotEnoughData);
            }
            self.refill()?;
            if self.finished {
                return Err(ReaderErr::NotEnoughData);
            }
        }
        let b = self.buf[self.pos];
        self.pos += 1;
        Ok(b)
    }

    fn swap(&self) -> bool {
        self.swap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_within_one_block() {
        let mut writer = BlockWriter::new(Vec::new());
        for i in 0..100_u32 {
            writer.write_u32(i);
        }
        let bytes = writer.finish().unwrap();
        // one data block plus the terminator
        assert_eq!(bytes.len(), 4 + 400 + 4);

        let mut reader = BlockReader::new(&bytes[..]);
        for i in 0..100_u32 {
            assert_eq!(reader.read_u32().unwrap(), i);
        }
        assert!(reader.at_end());
    }

    #[test]
    fn payload_spans_multiple_blocks() {
        let n = BLOCK_CAPACITY * 3 + 17;
        let mut writer = BlockWriter::new(Vec::new());
        for i in 0..n {
            writer.write_u8((i % 251) as u8);
        }
        let bytes = writer.finish().unwrap();

        let mut reader = BlockReader::new(&bytes[..]);
        for i in 0..n {
            assert_eq!(reader.read_u8().unwrap(), (i % 251) as u8);
        }
        assert!(matches!(reader.read_u8(), Err(ReaderErr::NotEnoughData)));
    }

    #[test]
    fn empty_stream_still_carries_terminator() {
        let writer = BlockWriter::new(Vec::new());
        let bytes = writer.finish().unwrap();
        assert_eq!(bytes, 0_u32.to_le_bytes());

        let mut reader = BlockReader::new(&bytes[..]);
        assert!(matches!(reader.read_u8(), Err(ReaderErr::NotEnoughData)));
    }

    #[test]
    fn short_block_is_fatal() {
        let mut writer = BlockWriter::new(Vec::new());
        for i in 0..64_u8 {
            writer.write_u8(i);
        }
        let mut bytes = writer.finish().unwrap();
        bytes.truncate(40); // cut into the first block's payload

        let mut reader = BlockReader::new(&bytes[..]);
        let mut res = Ok(0);
        for _ in 0..64 {
            res = reader.read_u8();
            if res.is_err() {
                break;
            }
        }
        assert!(matches!(res, Err(ReaderErr::NotEnoughData)));
    }
}
