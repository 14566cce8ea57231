//! Knot-vector records on the decode side: canonical forms regenerate
//! analytically, general forms integrate the break residual chain and
//! expand each break across its multiplicity.

use crate::core::bit_coder::ByteReader;
use crate::core::geometry::KnotVector;
use crate::encode::knots::knot_delta;
use crate::error::Err;
use crate::shared::knots::{uniform_float_knots, uniform_open_knots, Breaks, KnotMap};
use crate::shared::quant::{Quantizer, Residuals};

pub(crate) fn decode_knot_vector<R>(
    order: usize,
    length: usize,
    periodic: bool,
    step: Option<f32>,
    reader: &mut R,
) -> Result<KnotVector, Err>
where
    R: ByteReader,
{
    let map = KnotMap::read_from(reader)?;
    let span = reader.read_f64().map_err(Err::from)?;
    let init = reader.read_f64().map_err(Err::from)?;
    let total = length + order;

    let knots = match map {
        KnotMap::UniformOpen => {
            if length < order {
                return Err(Err::StreamCorrupted("uniform-open vector shorter than order"));
            }
            uniform_open_knots(order, length, init, span)
        }
        KnotMap::UniformFloat => uniform_float_knots(order, length, init, span),
        KnotMap::General => {
            let nb = reader.read_i32().map_err(Err::from)?;
            if nb <= 0 {
                return Err(Err::StreamCorrupted("non-positive break count"));
            }
            let nb = nb as usize;
            let mut mults = Vec::with_capacity(nb);
            let mut sum = 0_usize;
            for _ in 0..nb {
                let m = reader.read_u8().map_err(Err::from)?;
                if m == 0 {
                    return Err(Err::StreamCorrupted("zero knot multiplicity"));
                }
                sum += m as usize;
                mults.push(m);
            }
            if sum != total {
                return Err(Err::StreamCorrupted("knot multiplicities disagree with length"));
            }

            let written_delta = reader.read_f32().map_err(Err::from)?;
            let delta_k = match knot_delta(step) {
                // trust the written step; it is what the encoder used
                Some(_) => Some(written_delta),
                None => None,
            };
            let q = Quantizer::new(delta_k, 1.0);
            let residuals = Residuals::read_from(reader, nb - 1, q.is_quantized())?;

            let (b0, spacing): (f64, f64) = if q.is_quantized() {
                (0.0, if nb > 1 { 1.0 / (nb - 1) as f64 } else { 0.0 })
            } else {
                (init, if nb > 1 { span / (nb - 1) as f64 } else { 0.0 })
            };
            let mut recon = Vec::with_capacity(nb);
            recon.push(b0);
            for i in 1..nb {
                let pred = if i == 1 {
                    recon[0] + spacing
                } else {
                    2.0 * recon[i - 1] - recon[i - 2]
                };
                recon.push(pred + q.reconstruct(residuals.get(i - 1)));
            }

            let values = recon
                .into_iter()
                .map(|b| if q.is_quantized() { init + span * b } else { b })
                .collect();
            Breaks { values, mults }.expand()
        }
    };

    if knots.len() != total {
        return Err(Err::StreamCorrupted("regenerated knot vector has wrong length"));
    }
    Ok(KnotVector::new(order, periodic, knots))
}
