use crate::core::bit_coder::ByteWriter;
use crate::error::Err;
use crate::shared::quant::QUANT_NONE;
use crate::shared::{FORMAT_VERSION, MAGIC};

use super::CompressionArgs;

pub(crate) fn encode_header<W>(args: &CompressionArgs, writer: &mut W) -> Result<(), Err>
where
    W: ByteWriter,
{
    // the writer's native byte order; everything after this byte is subject
    // to swapping on the reading side.
    writer.write_u8(cfg!(target_endian = "big") as u8);

    for &b in MAGIC.iter() {
        writer.write_u8(b);
    }

    writer.write_i32(FORMAT_VERSION);
    writer.write_f32(args.step.unwrap_or(QUANT_NONE));

    // default predictors: surface, curve, triangular surface, trivariate,
    // multivariate.
    args.srf_pred.write_to(writer);
    args.crv_pred.write_to(writer);
    args.trisrf_pred.write_to(writer);
    args.trivar_pred.write_to(writer);
    args.mv_pred.write_to(writer);

    Ok(())
}
