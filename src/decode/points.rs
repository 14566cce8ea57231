//! Control-point block decoding: the exact inverse of the encode side,
//! branching on the same predictor byte and stored dynamic range.

use crate::core::bit_coder::ByteReader;
use crate::core::geometry::{CtlPtBlock, PointType};
use crate::error::Err;
use crate::shared::prediction::{
    angles, parallelogram, scatter_points3, uniform, CurveScheme, CurveSchemeImpl, PredictorType,
};
use crate::shared::quant::Quantizer;

pub(crate) fn decode_ctl_points<R>(
    pt_type: PointType,
    num_points: usize,
    pred: PredictorType,
    grid: Option<(usize, usize)>,
    step: Option<f32>,
    reader: &mut R,
) -> Result<CtlPtBlock, Err>
where
    R: ByteReader,
{
    let mut blk = CtlPtBlock::new(pt_type, num_points);
    let range = if step.is_some() {
        reader.read_f64().map_err(Err::from)?
    } else {
        1.0
    };
    let q = Quantizer::new(step, range);

    match pred {
        PredictorType::Uniform | PredictorType::Arc | PredictorType::Planar2D => {
            if pred != PredictorType::Uniform && pt_type.dim != 3 {
                return Err(Err::StreamCorrupted("geometric predictor on non-3d points"));
            }
            let scheme = CurveScheme::new(pred)?;
            scheme.decode(&mut blk, &q, reader)?;
        }
        PredictorType::Parallelogram => {
            let (ulen, vlen) =
                grid.ok_or(Err::StreamCorrupted("surface predictor without a mesh"))?;
            for axis in 1..=pt_type.dim as usize {
                blk.coords[axis] = parallelogram::decode_channel(ulen, vlen, &q, reader)?;
            }
        }
        PredictorType::Angles => {
            let (ulen, vlen) =
                grid.ok_or(Err::StreamCorrupted("surface predictor without a mesh"))?;
            if pt_type.dim != 3 {
                return Err(Err::StreamCorrupted("geometric predictor on non-3d points"));
            }
            if ulen < 3 {
                return Err(Err::StreamCorrupted("angle predictor on a narrow mesh"));
            }
            let points = angles::decode(ulen, vlen, &q, reader)?;
            scatter_points3(&points, &mut blk);
        }
        PredictorType::NoPredictor => {
            return Err(Err::StreamCorrupted("control points without a predictor"));
        }
    }

    uniform::decode_weights(&mut blk, &q, reader)?;
    Ok(blk)
}
