//! File-level entry points and the compression handle.
//!
//! The byte sink/source is owned for the duration of one call and released
//! on every exit path, error paths included.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::core::object::Object;
use crate::decode::decompress;
use crate::encode::compress;
use crate::error::Err;
use crate::shared::quant::normalize_quant_step;

/// Compresses one object tree into a file. A failed call may leave a
/// partial file only after the quantization error validated; a bad
/// argument never creates one.
pub fn compress_to_file<P>(path: P, obj: &Object, quant_error: f32) -> Result<(), Err>
where
    P: AsRef<Path>,
{
    normalize_quant_step(quant_error)?;
    let file = File::create(path).map_err(Err::OpenFileFailed)?;
    compress(obj, BufWriter::new(file), quant_error)
}

/// Decompresses one object tree from a file.
pub fn decompress_from_file<P>(path: P) -> Result<Object, Err>
where
    P: AsRef<Path>,
{
    let file = File::open(path).map_err(Err::OpenFileFailed)?;
    decompress(BufReader::new(file))
}

/// A compression handle that owns its sink and its negotiated quantization
/// error. Each [`Compressor::compress`] call writes one complete stream,
/// using whatever error was last negotiated.
pub struct Compressor<W: Write> {
    sink: W,
    quant_error: f32,
}

impl<W: Write> Compressor<W> {
    /// The quantization error is validated eagerly, before anything is
    /// written anywhere.
    pub fn new(sink: W, quant_error: f32) -> Result<Self, Err> {
        normalize_quant_step(quant_error)?;
        Ok(Self { sink, quant_error })
    }

    /// Renegotiates the quantization error for subsequent streams.
    pub fn set_quantization(&mut self, quant_error: f32) -> Result<(), Err> {
        normalize_quant_step(quant_error)?;
        self.quant_error = quant_error;
        Ok(())
    }

    pub fn compress(&mut self, obj: &Object) -> Result<(), Err> {
        compress(obj, &mut self.sink, self.quant_error)
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::{CtlPtBlock, Curve, KnotVector};
    use crate::core::object::{Geometry, Object};
    use crate::shared::knots::uniform_open_knots;

    fn small_curve() -> Object {
        let points = [
            [0.0, 0.0, 0.0],
            [1.0, 2.0, 0.5],
            [2.0, 1.0, 1.0],
            [3.0, 3.0, 1.5],
        ];
        Object::with_name(
            Geometry::Curve(Curve {
                knots: KnotVector::new(4, false, uniform_open_knots(4, 4, 0.0, 1.0)),
                points: CtlPtBlock::from_points3(&points),
            }),
            "crv",
        )
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curve.nbc");
        let obj = small_curve();
        compress_to_file(&path, &obj, 0.0).unwrap();
        let back = decompress_from_file(&path).unwrap();
        assert_eq!(back, obj);
    }

    #[test]
    fn missing_file_is_open_failed() {
        let res = decompress_from_file("/nonexistent/path/file.nbc");
        assert!(matches!(res, Err(Err::OpenFileFailed(_))));
    }

    #[test]
    fn bad_quantizer_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never.nbc");
        let res = compress_to_file(&path, &small_curve(), 3.0);
        assert!(matches!(res, Err(Err::InvalidQuantizerValue(_))));
        assert!(!path.exists());
    }

    #[test]
    fn handle_renegotiates_quantization() {
        let mut comp = Compressor::new(Vec::new(), 0.0).unwrap();
        let obj = small_curve();
        comp.compress(&obj).unwrap();
        comp.set_quantization(0.01).unwrap();
        comp.compress(&obj).unwrap();
        assert!(comp.set_quantization(5.0).is_err());

        let bytes = comp.into_inner();
        // two complete streams, back to back
        let mut cursor = &bytes[..];
        let first = crate::decode::decompress(&mut cursor).unwrap();
        assert_eq!(first, obj);
    }
}
