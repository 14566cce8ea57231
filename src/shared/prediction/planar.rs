//! The 2-D planar predictor for curves: fit a plane through the first three
//! reconstructed control points, rotate every later point into that plane's
//! frame, and chain-difference there. Most profile and trim curves are
//! planar, which drives the in-plane deltas toward zero in one axis.

use crate::core::bit_coder::{ByteReader, ByteWriter};
use crate::core::geometry::CtlPtBlock;
use crate::error::Err;
use crate::shared::geom::{Mat3, Vec3};
use crate::shared::quant::Quantizer;

use super::{gather_points3, scatter_points3, CurveSchemeImpl, SeedSplitChannels};

/// Components of the fitted normal smaller than this snap to zero, so a
/// nearly axis-aligned plane maps to the axis-aligned frame.
const NORMAL_SNAP_EPS: f64 = 1e-10;

/// The plane frame from the first three reconstructed points, or `None`
/// when they are collinear.
fn plane_frame(recon: &[Vec3]) -> Option<Mat3> {
    let e1 = recon[1] - recon[0];
    let e2 = recon[2] - recon[0];
    let normal = e1.cross(e2).zero_snap(NORMAL_SNAP_EPS);
    if normal.norm() == 0.0 {
        return None;
    }
    Some(Mat3::align_z(normal.normalize()))
}

pub(crate) struct PlanarCurve;

impl CurveSchemeImpl for PlanarCurve {
    fn encode<W: ByteWriter>(
        &self,
        blk: &CtlPtBlock,
        q: &Quantizer,
        writer: &mut W,
    ) -> Result<(), Err> {
        let points = gather_points3(blk);
        let n = points.len();
        let mut channels = SeedSplitChannels::new(q);

        // the first three points chain in the original frame; they are what
        // the decoder derives the plane from.
        let mut recon: Vec<Vec3> = Vec::with_capacity(n);
        for (i, &p) in points.iter().take(3).enumerate() {
            let pred = if i == 0 { Vec3::zero() } else { recon[i - 1] };
            recon.push(channels.push_point(i, p, pred, q)?);
        }

        if n > 3 {
            let rot = plane_frame(&recon)
                .ok_or(Err::GeneralError("degenerate plane in planar prediction"))?;
            let inv = rot.transpose();
            let mut prev = rot.apply(recon[2]);
            for (i, &p) in points.iter().enumerate().skip(3) {
                let rotated = rot.apply(p);
                prev = channels.push_point(i, rotated, prev, q)?;
                recon.push(inv.apply(prev));
            }
        }

        channels.write_to(n, writer);
        Ok(())
    }

    fn decode<R: ByteReader>(
        &self,
        blk: &mut CtlPtBlock,
        q: &Quantizer,
        reader: &mut R,
    ) -> Result<(), Err> {
        let n = blk.num_points();
        let channels = SeedSplitChannels::read_from(n, q, reader)?;

        let mut recon: Vec<Vec3> = Vec::with_capacity(n);
        for i in 0..n.min(3) {
            let pred = if i == 0 { Vec3::zero() } else { recon[i - 1] };
            recon.push(channels.reconstruct(i, pred, q));
        }

        if n > 3 {
            let rot = plane_frame(&recon)
                .ok_or(Err::StreamCorrupted("degenerate plane in planar stream"))?;
            let inv = rot.transpose();
            let mut prev = rot.apply(recon[2]);
            for i in 3..n {
                prev = channels.reconstruct(i, prev, q);
                recon.push(inv.apply(prev));
            }
        }

        scatter_points3(&recon, blk);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::prediction::{CurveScheme, PredictorType};

    fn roundtrip(points: &[[f64; 3]], q: &Quantizer) -> Result<Vec<Vec3>, Err> {
        let blk = CtlPtBlock::from_points3(points);
        let scheme = CurveScheme::new(PredictorType::Planar2D).unwrap();
        let mut buffer = Vec::new();
        scheme.encode(&blk, q, &mut buffer)?;
        let mut out = CtlPtBlock::new(blk.pt_type, points.len());
        let mut reader = buffer.into_iter();
        scheme.decode(&mut out, q, &mut reader)?;
        Ok(gather_points3(&out))
    }

    #[test]
    fn planar_roundtrip_without_quantization() {
        // a tilted planar zig-zag
        let points = [
            [0.0, 0.0, 0.0],
            [1.0, 0.5, 0.5],
            [2.0, -0.25, -0.25],
            [3.0, 1.0, 1.0],
            [4.0, 0.0, 0.0],
            [5.0, 2.0, 2.0],
        ];
        let out = roundtrip(&points, &Quantizer::None).unwrap();
        for (a, b) in points.iter().zip(&out) {
            assert!((Vec3(*a) - *b).norm() < 1e-9);
        }
    }

    #[test]
    fn quantized_roundtrip_stays_bounded() {
        let points: Vec<[f64; 3]> = (0..12)
            .map(|i| {
                let t = i as f64 * 0.4;
                [t, t.sin(), 0.0]
            })
            .collect();
        let q = Quantizer::new(Some(0.001), 10.0);
        let out = roundtrip(&points, &q).unwrap();
        for (a, b) in points.iter().zip(&out) {
            // the residual envelope rotates with the frame
            assert!((Vec3(*a) - *b).norm() <= 0.001 * 10.0 * 3_f64.sqrt());
        }
    }

    #[test]
    fn collinear_setup_is_a_degenerate_plane() {
        let points: Vec<[f64; 3]> = (0..5).map(|i| [i as f64, 2.0 * i as f64, 0.0]).collect();
        let res = roundtrip(&points, &Quantizer::None);
        assert!(matches!(res, Err(Err::GeneralError(_))));
    }
}
