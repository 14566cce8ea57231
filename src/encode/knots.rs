//! Knot-vector records on the encode side.
//!
//! Canonical vectors carry no per-value payload at all; general vectors
//! carry break values as a second-difference residual chain, quantized one
//! decade finer than the control points because knot errors compound
//! through basis evaluation.

use crate::core::bit_coder::ByteWriter;
use crate::core::geometry::KnotVector;
use crate::error::Err;
use crate::shared::knots::{classify, extract_breaks, KnotMap};
use crate::shared::quant::{Quantizer, Residuals};

/// Break-residual step: one tenth of the point quantization error.
pub(crate) fn knot_delta(step: Option<f32>) -> Option<f32> {
    step.map(|s| s / 10.0)
}

pub(crate) fn encode_knot_vector<W>(
    kv: &KnotVector,
    step: Option<f32>,
    writer: &mut W,
) -> Result<(), Err>
where
    W: ByteWriter,
{
    let map = classify(kv, step.is_none());
    map.write_to(writer);

    let init = kv.knots[0];
    let span = kv.knots[kv.knots.len() - 1] - init;
    writer.write_f64(span);
    writer.write_f64(init);
    if map != KnotMap::General {
        return Ok(());
    }

    let breaks = extract_breaks(&kv.knots)?;
    let nb = breaks.len();
    writer.write_i32(nb as i32);
    for &m in &breaks.mults {
        writer.write_u8(m);
    }
    let delta_k = knot_delta(step);
    writer.write_f32(delta_k.unwrap_or(0.0));

    // with quantization active the breaks are normalized into [0, 1] so the
    // finer step is meaningful at any model scale; in raw mode they stay in
    // the source domain, which keeps the residual chain free of the
    // normalize/denormalize rounding.
    let q = Quantizer::new(delta_k, 1.0);
    let (b0, spacing): (f64, f64) = if q.is_quantized() {
        (0.0, if nb > 1 { 1.0 / (nb - 1) as f64 } else { 0.0 })
    } else {
        (init, if nb > 1 { span / (nb - 1) as f64 } else { 0.0 })
    };
    let norm = |v: f64| {
        if q.is_quantized() {
            if span > 0.0 {
                (v - init) / span
            } else {
                0.0
            }
        } else {
            v
        }
    };

    let mut residuals = Residuals::with_mode(q.is_quantized());
    let mut recon = Vec::with_capacity(nb);
    recon.push(b0);
    for i in 1..nb {
        // seeded with the uniform spacing, then constant curvature
        let pred = if i == 1 {
            recon[0] + spacing
        } else {
            2.0 * recon[i - 1] - recon[i - 2]
        };
        let r = q.quantize(norm(breaks.values[i]) - pred)?;
        residuals.push(r);
        recon.push(pred + q.reconstruct(r));
    }
    residuals.write_to(writer);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::knots::decode_knot_vector;
    use crate::shared::knots::uniform_open_knots;

    fn roundtrip(kv: &KnotVector, step: Option<f32>) -> KnotVector {
        let mut buffer = Vec::new();
        encode_knot_vector(kv, step, &mut buffer).unwrap();
        let mut reader = buffer.into_iter();
        decode_knot_vector(kv.order, kv.length(), kv.periodic, step, &mut reader).unwrap()
    }

    #[test]
    fn canonical_form_carries_no_break_payload() {
        let kv = KnotVector::new(4, false, uniform_open_knots(4, 7, 2.0, 6.0));
        let mut buffer = Vec::new();
        encode_knot_vector(&kv, None, &mut buffer).unwrap();
        // map byte + scale + init, nothing else
        assert_eq!(buffer.len(), 1 + 8 + 8);
        assert_eq!(roundtrip(&kv, None), kv);
    }

    #[test]
    fn general_vector_roundtrips_exactly_without_quantization() {
        let kv = KnotVector::new(
            3,
            false,
            vec![0.0, 0.0, 0.0, 0.5, 0.75, 3.0, 3.0, 4.0, 4.0, 4.0],
        );
        assert_eq!(roundtrip(&kv, None), kv);
    }

    #[test]
    fn general_vector_stays_within_the_finer_envelope() {
        let kv = KnotVector::new(
            2,
            false,
            vec![0.0, 0.0, 0.13, 0.31, 0.44, 0.78, 1.0, 1.0],
        );
        let step = Some(0.01_f32);
        let out = roundtrip(&kv, step);
        assert_eq!(out.knots.len(), kv.knots.len());
        let span = 1.0;
        for (a, b) in kv.knots.iter().zip(&out.knots) {
            // DeltaK applies to the normalized breaks; scale back by span
            assert!((a - b).abs() <= 0.001 * span * 4.0, "{} vs {}", a, b);
        }
    }
}
