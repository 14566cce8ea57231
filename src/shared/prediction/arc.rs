//! The arc predictor for curves: fit a circle through the three preceding
//! reconstructed points in their local plane and place the prediction on
//! that circle, continuing the established turn direction at a chord length
//! blended from the two prior chords. Degenerate fits (collinear points,
//! vanishing radius) fall back to predicting the previous point.

use crate::core::bit_coder::{ByteReader, ByteWriter};
use crate::core::geometry::CtlPtBlock;
use crate::error::Err;
use crate::shared::geom::{circumcircle_xy, Mat3, Vec3};
use crate::shared::quant::Quantizer;

use super::{gather_points3, scatter_points3, CurveSchemeImpl};

/// Predicts point `i` from the reconstructed prefix. The residual lives in
/// the original 3-D frame: the 2-D circle solution is rotated back before
/// differencing.
fn predict(recon: &[Vec3], i: usize) -> Vec3 {
    if i == 0 {
        return Vec3::zero();
    }
    if i < 3 {
        return recon[i - 1];
    }
    let (a, b, c) = (recon[i - 3], recon[i - 2], recon[i - 1]);

    let e1 = b - a;
    let e2 = c - b;
    let normal = e1.cross(e2);
    let scale = e1.norm().max(e2.norm());
    if normal.norm() <= 1e-12 * scale * scale {
        // collinear: no circle to continue
        return c;
    }

    let rot = Mat3::align_z(normal.normalize());
    let (ra, rb, rc) = (rot.apply(a), rot.apply(b), rot.apply(c));
    let (ux, uy, r) = match circumcircle_xy(ra, rb, rc) {
        Some(fit) => fit,
        None => return c,
    };

    let h12 = (rb - ra).norm();
    let h23 = (rc - rb).norm();
    // the recent chord counts double in the blend
    let hord34 = (2.0 * h23 + h12) / 3.0;
    let half = (hord34 / (2.0 * r)).min(1.0);
    let delta = 2.0 * half.asin();

    // continue turning the way the last two chords turned
    let turn = (rb - ra).cross(rc - rb).get(2);
    if turn == 0.0 {
        return c;
    }
    let angle = if turn > 0.0 { delta } else { -delta };

    let spoke = rc - Vec3([ux, uy, rc.get(2)]);
    let (sin_a, cos_a) = angle.sin_cos();
    let pred2 = Vec3([ux, uy, rc.get(2)]) + spoke.rotate_z(cos_a, sin_a);
    rot.transpose().apply(pred2)
}

pub(crate) struct ArcCurve;

impl CurveSchemeImpl for ArcCurve {
    fn encode<W: ByteWriter>(
        &self,
        blk: &CtlPtBlock,
        q: &Quantizer,
        writer: &mut W,
    ) -> Result<(), Err> {
        let points = gather_points3(blk);
        let mut recon: Vec<Vec3> = Vec::with_capacity(points.len());
        let mut channels = super::SeedSplitChannels::new(q);
        for (i, &p) in points.iter().enumerate() {
            let pred = predict(&recon, i);
            recon.push(channels.push_point(i, p, pred, q)?);
        }
        channels.write_to(points.len(), writer);
        Ok(())
    }

    fn decode<R: ByteReader>(
        &self,
        blk: &mut CtlPtBlock,
        q: &Quantizer,
        reader: &mut R,
    ) -> Result<(), Err> {
        let n = blk.num_points();
        let channels = super::SeedSplitChannels::read_from(n, q, reader)?;
        let mut recon: Vec<Vec3> = Vec::with_capacity(n);
        for i in 0..n {
            let pred = predict(&recon, i);
            recon.push(channels.reconstruct(i, pred, q));
        }
        scatter_points3(&recon, blk);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::CtlPtBlock;
    use crate::shared::prediction::CurveScheme;
    use crate::shared::prediction::PredictorType;

    fn roundtrip(points: &[[f64; 3]], q: &Quantizer) -> CtlPtBlock {
        let blk = CtlPtBlock::from_points3(points);
        let scheme = CurveScheme::new(PredictorType::Arc).unwrap();
        let mut buffer = Vec::new();
        scheme.encode(&blk, q, &mut buffer).unwrap();
        let mut out = CtlPtBlock::new(blk.pt_type, points.len());
        let mut reader = buffer.into_iter();
        scheme.decode(&mut out, q, &mut reader).unwrap();
        out
    }

    #[test]
    fn arc_prediction_nails_points_on_a_circle() {
        // points sampled uniformly on a circle: after the third point the
        // predictor lands on the next sample up to fit precision.
        let points: Vec<[f64; 3]> = (0..8)
            .map(|i| {
                let t = i as f64 * 0.4;
                [4.0 * t.cos(), 4.0 * t.sin(), 2.0]
            })
            .collect();
        let pts: Vec<Vec3> = points.iter().map(|p| Vec3(*p)).collect();
        for i in 3..pts.len() {
            let pred = predict(&pts[..i], i);
            assert!((pred - pts[i]).norm() < 1e-9, "i = {}", i);
        }
    }

    #[test]
    fn collinear_points_fall_back_to_previous() {
        let pts: Vec<Vec3> = (0..5).map(|i| Vec3([i as f64, 0.0, 0.0])).collect();
        let pred = predict(&pts[..4], 4);
        assert_eq!(pred, pts[3]);
    }

    #[test]
    fn roundtrip_without_quantization() {
        let points: Vec<[f64; 3]> = (0..7)
            .map(|i| {
                let t = i as f64 * 0.5;
                [t.cos(), t.sin(), 0.25 * i as f64]
            })
            .collect();
        let out = roundtrip(&points, &Quantizer::None);
        for (a, b) in points.iter().zip(gather_points3(&out)) {
            assert!((Vec3(*a) - b).norm() < 1e-12);
        }
    }

    #[test]
    fn roundtrip_with_quantization_stays_bounded() {
        let points: Vec<[f64; 3]> = (0..9)
            .map(|i| {
                let t = i as f64 * 0.3;
                [5.0 * t.cos(), 5.0 * t.sin(), 1.0]
            })
            .collect();
        let q = Quantizer::new(Some(0.001), 10.0);
        let out = roundtrip(&points, &q);
        for (a, b) in points.iter().zip(gather_points3(&out)) {
            for axis in 0..3 {
                assert!((a[axis] - b.get(axis)).abs() <= 0.001 * 10.0);
            }
        }
    }
}
