//! Definitions shared between the encoder and the decoder. Anything that
//! both sides must agree on byte for byte lives here.

pub mod geom;
pub mod knots;
pub mod prediction;
pub mod quant;

use crate::core::bit_coder::{ByteReader, ByteWriter};
use crate::error::Err;

/// Magic tag opening every stream, right after the endianness byte.
pub const MAGIC: [u8; 2] = *b"IC";

/// Current format version.
pub const FORMAT_VERSION: i32 = 1;

/// Hard bound on object/attribute nesting, both encoding and decoding.
pub const MAX_NESTING: usize = 256;

/// Field-bitmap bits of an object record.
pub(crate) mod field {
    pub const BBOX: u8 = 1 << 0;
    pub const COUNT: u8 = 1 << 1;
    pub const TAGS: u8 = 1 << 2;
    pub const NAME: u8 = 1 << 3;
    pub const ATTRIBUTES: u8 = 1 << 4;
    pub const DEPENDENCIES: u8 = 1 << 5;
    pub const ALL: u8 = BBOX | COUNT | TAGS | NAME | ATTRIBUTES | DEPENDENCIES;
}

/// One continuation byte precedes every element of a repeated section;
/// `false` terminates the section. This replaces explicit counts throughout
/// the format.
pub(crate) fn write_continuation<W>(writer: &mut W, more: bool)
where
    W: ByteWriter,
{
    writer.write_u8(more as u8);
}

pub(crate) fn read_continuation<R>(reader: &mut R) -> Result<bool, Err>
where
    R: ByteReader,
{
    match reader.read_u8().map_err(Err::from)? {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(Err::StreamCorrupted("invalid continuation byte")),
    }
}

/// Strings travel as a u16 length followed by UTF-8 bytes.
pub(crate) fn write_str<W>(writer: &mut W, s: &str) -> Result<(), Err>
where
    W: ByteWriter,
{
    if s.len() > u16::MAX as usize {
        return Err(Err::GeneralError("string too long for the stream"));
    }
    writer.write_u16(s.len() as u16);
    for &b in s.as_bytes() {
        writer.write_u8(b);
    }
    Ok(())
}

pub(crate) fn read_str<R>(reader: &mut R) -> Result<String, Err>
where
    R: ByteReader,
{
    let len = reader.read_u16().map_err(Err::from)? as usize;
    let mut bytes = Vec::with_capacity(len);
    for _ in 0..len {
        bytes.push(reader.read_u8().map_err(Err::from)?);
    }
    String::from_utf8(bytes).map_err(|_| Err::StreamCorrupted("string is not valid utf-8"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continuation_framing() {
        let mut buffer = Vec::new();
        for _ in 0..5 {
            write_continuation(&mut buffer, true);
        }
        write_continuation(&mut buffer, false);

        let mut reader = buffer.into_iter();
        let mut seen = 0;
        while read_continuation(&mut reader).unwrap() {
            seen += 1;
        }
        assert_eq!(seen, 5);

        let mut bad = vec![7_u8].into_iter();
        assert!(read_continuation(&mut bad).is_err());
    }

    #[test]
    fn string_roundtrip() {
        let mut buffer = Vec::new();
        write_str(&mut buffer, "cyl01/profile").unwrap();
        write_str(&mut buffer, "").unwrap();
        let mut reader = buffer.into_iter();
        assert_eq!(read_str(&mut reader).unwrap(), "cyl01/profile");
        assert_eq!(read_str(&mut reader).unwrap(), "");
    }
}
