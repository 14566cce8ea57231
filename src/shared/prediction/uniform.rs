//! The uniform predictor: a per-channel chain difference against the value
//! one (or, for rational weights, two) steps back. It is the only predictor
//! for trivariates, multivariates and triangular surfaces, the fallback for
//! everything else, and the weight-channel predictor under every geometric
//! scheme.

use crate::core::bit_coder::{ByteReader, ByteWriter};
use crate::core::geometry::CtlPtBlock;
use crate::error::Err;
use crate::shared::quant::{Quantizer, Residuals};

use super::{CurveSchemeImpl, WEIGHT_STEP};

fn predict(recon: &[f64], i: usize, step: usize) -> f64 {
    if i >= step {
        recon[i - step]
    } else if i > 0 {
        recon[i - 1]
    } else {
        0.0
    }
}

/// Encodes one coordinate channel as a residual stream.
pub(crate) fn encode_channel<W>(
    vals: &[f64],
    step: usize,
    q: &Quantizer,
    writer: &mut W,
) -> Result<(), Err>
where
    W: ByteWriter,
{
    let mut recon = Vec::with_capacity(vals.len());
    let mut residuals = Residuals::with_mode(q.is_quantized());
    for (i, &v) in vals.iter().enumerate() {
        let pred = predict(&recon, i, step);
        let r = q.quantize(v - pred)?;
        residuals.push(r);
        recon.push(pred + q.reconstruct(r));
    }
    residuals.write_to(writer);
    Ok(())
}

/// Decodes one coordinate channel by integrating its residual stream.
pub(crate) fn decode_channel<R>(
    count: usize,
    step: usize,
    q: &Quantizer,
    reader: &mut R,
) -> Result<Vec<f64>, Err>
where
    R: ByteReader,
{
    let residuals = Residuals::read_from(reader, count, q.is_quantized())?;
    let mut recon = Vec::with_capacity(count);
    for i in 0..count {
        let pred = predict(&recon, i, step);
        recon.push(pred + q.reconstruct(residuals.get(i)));
    }
    Ok(recon)
}

/// Convenience for the rational-weight channel shared by every scheme.
pub(crate) fn encode_weights<W>(blk: &CtlPtBlock, q: &Quantizer, writer: &mut W) -> Result<(), Err>
where
    W: ByteWriter,
{
    if blk.pt_type.rational {
        encode_channel(&blk.coords[0], WEIGHT_STEP, q, writer)?;
    }
    Ok(())
}

pub(crate) fn decode_weights<R>(
    blk: &mut CtlPtBlock,
    q: &Quantizer,
    reader: &mut R,
) -> Result<(), Err>
where
    R: ByteReader,
{
    if blk.pt_type.rational {
        let n = blk.num_points();
        blk.coords[0] = decode_channel(n, WEIGHT_STEP, q, reader)?;
    }
    Ok(())
}

/// The curve-facing face of the chain predictor.
pub(crate) struct UniformCurve;

impl CurveSchemeImpl for UniformCurve {
    fn encode<W: ByteWriter>(
        &self,
        blk: &CtlPtBlock,
        q: &Quantizer,
        writer: &mut W,
    ) -> Result<(), Err> {
        for axis in 1..=blk.pt_type.dim as usize {
            encode_channel(&blk.coords[axis], 1, q, writer)?;
        }
        Ok(())
    }

    fn decode<R: ByteReader>(
        &self,
        blk: &mut CtlPtBlock,
        q: &Quantizer,
        reader: &mut R,
    ) -> Result<(), Err> {
        let n = blk.num_points();
        for axis in 1..=blk.pt_type.dim as usize {
            blk.coords[axis] = decode_channel(n, 1, q, reader)?;
        }
        Ok(())
    }
}
