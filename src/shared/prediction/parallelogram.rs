//! The parallelogram predictor for surface control meshes: a per-channel
//! 2-D finite difference completing the parallelogram spanned by the three
//! already-reconstructed neighbors, with a 1-D chain fallback along the
//! first row and column.

use crate::core::bit_coder::{ByteReader, ByteWriter};
use crate::error::Err;
use crate::shared::quant::{Quantizer, Residuals};

fn predict(recon: &[f64], u: usize, v: usize, ulen: usize) -> f64 {
    let at = |u: usize, v: usize| recon[v * ulen + u];
    if u > 0 && v > 0 {
        at(u - 1, v) + at(u, v - 1) - at(u - 1, v - 1)
    } else if u > 0 {
        at(u - 1, v)
    } else if v > 0 {
        at(u, v - 1)
    } else {
        0.0
    }
}

/// Encodes one channel of a `ulen`×`vlen` mesh stored row-major
/// (`index = v * ulen + u`).
pub(crate) fn encode_channel<W>(
    vals: &[f64],
    ulen: usize,
    vlen: usize,
    q: &Quantizer,
    writer: &mut W,
) -> Result<(), Err>
where
    W: ByteWriter,
{
    debug_assert_eq!(vals.len(), ulen * vlen);
    let mut recon = Vec::with_capacity(vals.len());
    let mut residuals = Residuals::with_mode(q.is_quantized());
    for v in 0..vlen {
        for u in 0..ulen {
            let pred = predict(&recon, u, v, ulen);
            let r = q.quantize(vals[v * ulen + u] - pred)?;
            residuals.push(r);
            recon.push(pred + q.reconstruct(r));
        }
    }
    residuals.write_to(writer);
    Ok(())
}

pub(crate) fn decode_channel<R>(
    ulen: usize,
    vlen: usize,
    q: &Quantizer,
    reader: &mut R,
) -> Result<Vec<f64>, Err>
where
    R: ByteReader,
{
    let count = ulen * vlen;
    let residuals = Residuals::read_from(reader, count, q.is_quantized())?;
    let mut recon = Vec::with_capacity(count);
    for v in 0..vlen {
        for u in 0..ulen {
            let pred = predict(&recon, u, v, ulen);
            recon.push(pred + q.reconstruct(residuals.get(v * ulen + u)));
        }
    }
    Ok(recon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planar_mesh_has_zero_residuals_past_the_borders() {
        // an affine mesh is predicted perfectly by the parallelogram rule
        let (ulen, vlen) = (4, 3);
        let mut vals = Vec::new();
        for v in 0..vlen {
            for u in 0..ulen {
                vals.push(2.0 * u as f64 - 3.0 * v as f64 + 1.0);
            }
        }
        let q = Quantizer::new(Some(0.01), 10.0);
        let mut buffer = Vec::new();
        encode_channel(&vals, ulen, vlen, &q, &mut buffer).unwrap();
        // max-index prefix + one byte per value on the narrow path
        assert_eq!(buffer.len(), 4 + ulen * vlen);

        let mut reader = buffer.into_iter();
        let out = decode_channel(ulen, vlen, &q, &mut reader).unwrap();
        for (a, b) in vals.iter().zip(&out) {
            assert!((a - b).abs() <= 0.01 * 10.0);
        }
    }

    #[test]
    fn roundtrip_is_exact_without_quantization() {
        let (ulen, vlen) = (3, 3);
        let vals: Vec<f64> = (0..9).map(|i| ((i * 7) % 5) as f64 * 0.25).collect();
        let q = Quantizer::None;
        let mut buffer = Vec::new();
        encode_channel(&vals, ulen, vlen, &q, &mut buffer).unwrap();
        let mut reader = buffer.into_iter();
        assert_eq!(decode_channel(ulen, vlen, &q, &mut reader).unwrap(), vals);
    }
}
