pub(crate) mod header;
pub(crate) mod knots;
pub(crate) mod object;
pub(crate) mod points;

use std::io;

use tracing::debug;

use crate::core::bit_coder::ByteReader;
use crate::core::block::BlockReader;
use crate::core::object::Object;
use crate::error::Err;
use crate::shared::quant::normalize_quant_step;

/// All mutable decoder state for one call.
pub(crate) struct DecoderContext {
    /// canonicalized quantization step from the header.
    pub(crate) step: Option<f32>,
    pub(crate) depth: usize,
}

/// Decompresses one object tree from the source, mirroring the encoder's
/// traversal exactly. The partially built tree of a failed decode is
/// dropped on unwind.
pub fn decompress<R>(src: R) -> Result<Object, Err>
where
    R: io::Read,
{
    let mut reader = BlockReader::new(src);

    let endian = reader.read_u8().map_err(Err::from)?;
    if endian > 1 {
        return Err(Err::NotThisFormat);
    }
    reader.set_swap((endian == 1) != cfg!(target_endian = "big"));

    let header = header::decode_header(&mut reader)?;
    let step = normalize_quant_step(header.quant_error)?;
    debug!(quant = ?step, "header read, decoding the object tree");

    let mut ctx = DecoderContext { step, depth: 0 };
    let obj = object::decode_object(&mut ctx, &mut reader)?;

    if !reader.at_end() {
        return Err(Err::StreamCorrupted("trailing data after the object tree"));
    }
    debug!("decompression finished");
    Ok(obj)
}
