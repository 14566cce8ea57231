//! The uniform scalar quantizer and the residual streams it feeds.
//!
//! Quantization maps a residual to an integer index at a fixed step of
//! `delta * range`, where `range` tracks the entity's coordinate magnitude
//! so the step stays meaningful regardless of model scale. When disabled,
//! residuals travel as raw `f64` at full precision. The choice is made once
//! per top-level call from the header's quantization error.

use crate::core::bit_coder::{ByteReader, ByteWriter};
use crate::error::Err;

/// Header sentinel meaning "no quantization".
pub const QUANT_NONE: f32 = 0.0;

/// Largest residual index the stream can carry per value.
const MAX_QUANT_INDEX: f64 = i32::MAX as f64;

/// Canonicalizes a user quantization error to the nearest power of one-tenth
/// not exceeding it (`0.034 -> 0.01`). `q <= 0` is the no-quantization
/// sentinel and maps to `None`; anything else outside `(0, 1)` is rejected
/// before a single byte is written. Idempotent, so the encoder and decoder
/// derive identical steps from the header value.
pub fn normalize_quant_step(q: f32) -> Result<Option<f32>, Err> {
    if q <= 0.0 {
        return Ok(None);
    }
    if !q.is_finite() || q >= 1.0 {
        return Err(Err::InvalidQuantizerValue(q));
    }
    // the 1e-6 guard absorbs the f32 representation error of exact powers
    // of ten, which would otherwise push e.g. 0.01 down a decade.
    let digits = (-(q as f64).log10() - 1e-6).ceil().max(1.0) as i32;
    Ok(Some(10_f64.powi(-digits) as f32))
}

/// Rounds `|x|` to the nearest power of ten; zero maps to one.
pub fn round_to_pow10(x: f64) -> f64 {
    if x == 0.0 {
        return 1.0;
    }
    10_f64.powi(x.abs().log10().round() as i32)
}

/// One residual value, in whichever domain the call selected.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Residual {
    Index(i32),
    Raw(f64),
}

/// The per-call quantization mode plus the per-entity dynamic range.
#[derive(Clone, Copy, Debug)]
pub enum Quantizer {
    None,
    Step { delta: f64, range: f64 },
}

impl Quantizer {
    pub fn new(step: Option<f32>, range: f64) -> Self {
        match step {
            None => Quantizer::None,
            Some(delta) => Quantizer::Step {
                delta: delta as f64,
                range,
            },
        }
    }

    pub fn is_quantized(&self) -> bool {
        matches!(self, Quantizer::Step { .. })
    }

    pub fn quantize(&self, err: f64) -> Result<Residual, Err> {
        match *self {
            Quantizer::None => Ok(Residual::Raw(err)),
            Quantizer::Step { delta, range } => {
                let idx = (err / (delta * range)).round();
                if idx.abs() > MAX_QUANT_INDEX {
                    return Err(Err::GeneralError("residual exceeds the index range"));
                }
                Ok(Residual::Index(idx as i32))
            }
        }
    }

    pub fn reconstruct(&self, r: Residual) -> f64 {
        match (*self, r) {
            (Quantizer::None, Residual::Raw(v)) => v,
            (Quantizer::Step { delta, range }, Residual::Index(i)) => i as f64 * delta * range,
            // a stream can only ever hold one residual domain per call
            _ => unreachable!("residual domain disagrees with the quantizer"),
        }
    }
}

/// A buffered residual array for one channel. The encoder needs the whole
/// array before writing: the largest absolute index decides between the
/// 1-byte and 4-byte wire layouts, and the decoder branches identically on
/// the stored maximum.
#[derive(Clone, Debug, PartialEq)]
pub enum Residuals {
    Indices(Vec<i32>),
    Raw(Vec<f64>),
}

impl Residuals {
    pub fn with_mode(quantized: bool) -> Self {
        if quantized {
            Residuals::Indices(Vec::new())
        } else {
            Residuals::Raw(Vec::new())
        }
    }

    pub fn push(&mut self, r: Residual) {
        match (self, r) {
            (Residuals::Indices(v), Residual::Index(i)) => v.push(i),
            (Residuals::Raw(v), Residual::Raw(x)) => v.push(x),
            _ => unreachable!("residual domain disagrees with the stream mode"),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Residuals::Indices(v) => v.len(),
            Residuals::Raw(v) => v.len(),
        }
    }

    pub fn get(&self, i: usize) -> Residual {
        match self {
            Residuals::Indices(v) => Residual::Index(v[i]),
            Residuals::Raw(v) => Residual::Raw(v[i]),
        }
    }

    /// True when every residual reconstructs to exactly zero; such arrays
    /// may be omitted from the stream by predictors that flag perfect rows.
    pub fn all_zero(&self) -> bool {
        match self {
            Residuals::Indices(v) => v.iter().all(|&i| i == 0),
            Residuals::Raw(v) => v.iter().all(|&x| x == 0.0),
        }
    }

    pub fn write_to<W>(&self, writer: &mut W)
    where
        W: ByteWriter,
    {
        match self {
            Residuals::Indices(v) => {
                let max = v.iter().map(|i| i.abs()).max().unwrap_or(0);
                writer.write_i32(max);
                if max <= i8::MAX as i32 {
                    for &i in v {
                        writer.write_u8(i as i8 as u8);
                    }
                } else {
                    for &i in v {
                        writer.write_i32(i);
                    }
                }
            }
            Residuals::Raw(v) => {
                for &x in v {
                    writer.write_f64(x);
                }
            }
        }
    }

    pub fn read_from<R>(reader: &mut R, count: usize, quantized: bool) -> Result<Self, Err>
    where
        R: ByteReader,
    {
        if !quantized {
            let mut v = Vec::with_capacity(count);
            for _ in 0..count {
                v.push(reader.read_f64().map_err(Err::from)?);
            }
            return Ok(Residuals::Raw(v));
        }
        let max = reader.read_i32().map_err(Err::from)?;
        if max < 0 {
            return Err(Err::StreamCorrupted("negative residual index bound"));
        }
        let mut v = Vec::with_capacity(count);
        if max <= i8::MAX as i32 {
            for _ in 0..count {
                v.push(reader.read_u8().map_err(Err::from)? as i8 as i32);
            }
        } else {
            for _ in 0..count {
                v.push(reader.read_i32().map_err(Err::from)?);
            }
        }
        Ok(Residuals::Indices(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_rounds_down_to_a_power_of_ten() {
        assert_eq!(normalize_quant_step(0.034).unwrap(), Some(0.01));
        assert_eq!(normalize_quant_step(0.5).unwrap(), Some(0.1));
        assert_eq!(normalize_quant_step(0.001).unwrap(), Some(0.001));
        assert_eq!(normalize_quant_step(0.009).unwrap(), Some(0.001));
        assert_eq!(normalize_quant_step(QUANT_NONE).unwrap(), None);
        assert_eq!(normalize_quant_step(-1.0).unwrap(), None);
        assert!(normalize_quant_step(1.0).is_err());
        assert!(normalize_quant_step(2.5).is_err());
        assert!(normalize_quant_step(f32::NAN).is_err());
    }

    #[test]
    fn normalize_is_idempotent() {
        for q in [0.9_f32, 0.5, 0.1, 0.034, 0.01, 0.0042, 0.001, 1e-4, 3e-7] {
            let once = normalize_quant_step(q).unwrap().unwrap();
            let twice = normalize_quant_step(once).unwrap().unwrap();
            assert_eq!(once, twice, "q = {}", q);
        }
    }

    #[test]
    fn pow10_rounding() {
        assert_eq!(round_to_pow10(0.0), 1.0);
        assert_eq!(round_to_pow10(1.0), 1.0);
        assert_eq!(round_to_pow10(8.0), 10.0);
        assert_eq!(round_to_pow10(-8.0), 10.0);
        assert_eq!(round_to_pow10(120.0), 100.0);
        assert_eq!(round_to_pow10(0.02), 0.01);
    }

    #[test]
    fn quantize_dequantize_within_step() {
        let q = Quantizer::new(Some(0.01), 10.0);
        for v in [-3.7_f64, -0.04, 0.0, 0.05, 1.23456, 9.99] {
            let r = q.quantize(v).unwrap();
            assert!((q.reconstruct(r) - v).abs() <= 0.01 * 10.0 / 2.0 + 1e-12);
        }
    }

    #[test]
    fn residual_stream_fast_and_wide_paths() {
        // all indices fit a signed byte: 1-byte layout
        let narrow = Residuals::Indices(vec![0, -5, 127, -128 + 1]);
        let mut buffer = Vec::new();
        narrow.write_to(&mut buffer);
        assert_eq!(buffer.len(), 4 + 4);
        let mut reader = buffer.into_iter();
        assert_eq!(
            Residuals::read_from(&mut reader, 4, true).unwrap(),
            narrow
        );

        // one large index forces the 4-byte layout for the whole array
        let wide = Residuals::Indices(vec![1, 130, -4]);
        let mut buffer = Vec::new();
        wide.write_to(&mut buffer);
        assert_eq!(buffer.len(), 4 + 12);
        let mut reader = buffer.into_iter();
        assert_eq!(Residuals::read_from(&mut reader, 3, true).unwrap(), wide);

        let raw = Residuals::Raw(vec![0.5, -2.25]);
        let mut buffer = Vec::new();
        raw.write_to(&mut buffer);
        let mut reader = buffer.into_iter();
        assert_eq!(Residuals::read_from(&mut reader, 2, false).unwrap(), raw);
    }
}
