//! Canonical knot-vector forms and break-value extraction.
//!
//! The analytic constructors here are the single source of truth for both
//! the encoder's classification and the decoder's regeneration: a vector
//! that classifies as canonical is rebuilt by the very same code, so the
//! round trip is exact by construction.

use crate::core::bit_coder::{ByteReader, ByteWriter};
use crate::core::geometry::KnotVector;
use crate::error::Err;

/// Relative tolerance of canonical-form classification when quantization is
/// active. Without quantization the match must be bitwise.
const CLASSIFY_EPS: f64 = 1e-8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KnotMap {
    UniformOpen,
    UniformFloat,
    General,
}

impl KnotMap {
    pub(crate) fn get_id(&self) -> u8 {
        match self {
            KnotMap::UniformOpen => 0,
            KnotMap::UniformFloat => 1,
            KnotMap::General => 2,
        }
    }

    pub(crate) fn write_to<W>(&self, writer: &mut W)
    where
        W: ByteWriter,
    {
        writer.write_u8(self.get_id());
    }

    pub(crate) fn read_from<R>(reader: &mut R) -> Result<Self, Err>
    where
        R: ByteReader,
    {
        match reader.read_u8().map_err(Err::from)? {
            0 => Ok(KnotMap::UniformOpen),
            1 => Ok(KnotMap::UniformFloat),
            2 => Ok(KnotMap::General),
            _ => Err(Err::StreamCorrupted("unknown knot map byte")),
        }
    }
}

/// The uniform-open (clamped) vector of the given order over `length`
/// control points, spanning `[init, init + scale]`.
pub fn uniform_open_knots(order: usize, length: usize, init: f64, scale: f64) -> Vec<f64> {
    let total = length + order;
    let interior_spans = (length - order + 1) as f64;
    let mut knots = Vec::with_capacity(total);
    for i in 0..total {
        let t = if i < order {
            0.0
        } else if i >= length {
            1.0
        } else {
            (i - order + 1) as f64 / interior_spans
        };
        knots.push(init + scale * t);
    }
    knots
}

/// The fully uniform (floating/periodic) vector: every span equal, no
/// clamping, spanning `[init, init + scale]` across all knots.
pub fn uniform_float_knots(order: usize, length: usize, init: f64, scale: f64) -> Vec<f64> {
    let total = length + order;
    let spans = (total - 1) as f64;
    (0..total)
        .map(|i| init + scale * (i as f64 / spans))
        .collect()
}

fn matches_candidate(knots: &[f64], candidate: &[f64], exact: bool, span: f64) -> bool {
    if exact {
        return knots
            .iter()
            .zip(candidate)
            .all(|(a, b)| a.to_bits() == b.to_bits());
    }
    let tol = CLASSIFY_EPS * span.abs().max(1.0);
    knots
        .iter()
        .zip(candidate)
        .all(|(a, b)| (a - b).abs() <= tol)
}

/// Classifies a knot vector against the two canonical forms. `exact`
/// requests bitwise matching (quantization disabled).
pub fn classify(kv: &KnotVector, exact: bool) -> KnotMap {
    let length = kv.length();
    if kv.knots.len() < 2 || length < kv.order {
        return KnotMap::General;
    }
    let init = kv.knots[0];
    let span = kv.knots[kv.knots.len() - 1] - init;
    if span <= 0.0 {
        return KnotMap::General;
    }
    if !kv.periodic && length >= kv.order {
        let open = uniform_open_knots(kv.order, length, init, span);
        if matches_candidate(&kv.knots, &open, exact, span) {
            return KnotMap::UniformOpen;
        }
    }
    let float = uniform_float_knots(kv.order, length, init, span);
    if matches_candidate(&kv.knots, &float, exact, span) {
        return KnotMap::UniformFloat;
    }
    KnotMap::General
}

/// The distinct break values of a knot vector with their run lengths.
#[derive(Clone, Debug, PartialEq)]
pub struct Breaks {
    pub values: Vec<f64>,
    pub mults: Vec<u8>,
}

impl Breaks {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Expands the breaks back into the full knot array.
    pub fn expand(&self) -> Vec<f64> {
        let mut knots = Vec::new();
        for (&v, &m) in self.values.iter().zip(&self.mults) {
            for _ in 0..m {
                knots.push(v);
            }
        }
        knots
    }
}

/// Collects the strictly increasing break values and their multiplicities.
/// Exact equality defines a repeat; the knot-vector validation has already
/// rejected decreasing sequences.
pub fn extract_breaks(knots: &[f64]) -> Result<Breaks, Err> {
    let mut values: Vec<f64> = Vec::new();
    let mut mults: Vec<u8> = Vec::new();
    for &k in knots {
        match values.last() {
            Some(&last) if k == last => {
                let m = mults.last_mut().unwrap();
                if *m == u8::MAX {
                    return Err(Err::GeneralError("knot multiplicity exceeds 255"));
                }
                *m += 1;
            }
            _ => {
                values.push(k);
                mults.push(1);
            }
        }
    }
    Ok(Breaks { values, mults })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_open_shape() {
        let knots = uniform_open_knots(4, 6, 1.0, 2.0);
        assert_eq!(knots.len(), 10);
        assert_eq!(&knots[..4], &[1.0; 4]);
        assert_eq!(&knots[6..], &[3.0; 4]);
        assert_eq!(knots[4], 1.0 + 2.0 * (1.0 / 3.0));
        assert_eq!(knots[5], 1.0 + 2.0 * (2.0 / 3.0));
    }

    #[test]
    fn classify_canonical_forms_exactly() {
        let open = KnotVector::new(4, false, uniform_open_knots(4, 6, 0.0, 5.0));
        assert_eq!(classify(&open, true), KnotMap::UniformOpen);

        let float = KnotVector::new(3, true, uniform_float_knots(3, 5, -1.0, 2.0));
        assert_eq!(classify(&float, true), KnotMap::UniformFloat);

        let mut general = uniform_open_knots(4, 6, 0.0, 5.0);
        general[5] += 0.25;
        let general = KnotVector::new(4, false, general);
        assert_eq!(classify(&general, true), KnotMap::General);
    }

    #[test]
    fn classify_tolerates_noise_only_when_inexact() {
        let mut knots = uniform_open_knots(4, 8, 0.0, 1.0);
        knots[5] += 1e-12;
        let kv = KnotVector::new(4, false, knots);
        assert_eq!(classify(&kv, true), KnotMap::General);
        assert_eq!(classify(&kv, false), KnotMap::UniformOpen);
    }

    #[test]
    fn breaks_roundtrip() {
        let knots = vec![0.0, 0.0, 0.0, 1.0, 2.5, 2.5, 4.0, 4.0, 4.0];
        let breaks = extract_breaks(&knots).unwrap();
        assert_eq!(breaks.values, vec![0.0, 1.0, 2.5, 4.0]);
        assert_eq!(breaks.mults, vec![3, 1, 2, 3]);
        assert_eq!(breaks.expand(), knots);
    }
}
