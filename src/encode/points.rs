//! Control-point block encoding and the online predictor selector.

use tracing::trace;

use crate::core::bit_coder::{ByteWriter, TrialWriter};
use crate::core::geometry::{CtlPtBlock, Curve, Surface};
use crate::error::Err;
use crate::shared::prediction::{
    angles, curve_candidates, gather_points3, parallelogram, surface_candidates, uniform,
    CurveScheme, CurveSchemeImpl, PredictorType,
};
use crate::shared::quant::{round_to_pow10, Quantizer};

use super::knots::encode_knot_vector;

/// Bias multiplier applied to the trial size of the previously chosen
/// predictor: a little hysteresis against churning through predictors over
/// a run of similar objects.
const PREV_PREDICTOR_BIAS: f64 = 0.9;

/// Writes a control-point block under the given predictor. The dynamic
/// range precedes the residual data when quantization is active; the
/// rational-weight channel always follows the coordinates, chained two
/// steps back.
pub(crate) fn encode_ctl_points<W>(
    blk: &CtlPtBlock,
    pred: PredictorType,
    grid: Option<(usize, usize)>,
    step: Option<f32>,
    writer: &mut W,
) -> Result<(), Err>
where
    W: ByteWriter,
{
    blk.validate()?;
    let range = round_to_pow10(blk.max_abs_coord());
    if step.is_some() {
        writer.write_f64(range);
    }
    let q = Quantizer::new(step, range);

    match pred {
        PredictorType::Uniform | PredictorType::Arc | PredictorType::Planar2D => {
            let scheme = CurveScheme::new(pred)?;
            scheme.encode(blk, &q, writer)?;
        }
        PredictorType::Parallelogram => {
            let (ulen, vlen) =
                grid.ok_or(Err::GeneralError("surface predictor without a mesh"))?;
            for axis in 1..=blk.pt_type.dim as usize {
                parallelogram::encode_channel(&blk.coords[axis], ulen, vlen, &q, writer)?;
            }
        }
        PredictorType::Angles => {
            let (ulen, vlen) =
                grid.ok_or(Err::GeneralError("surface predictor without a mesh"))?;
            let points = gather_points3(blk);
            angles::encode(&points, ulen, vlen, &q, writer)?;
        }
        PredictorType::NoPredictor => {
            return Err(Err::GeneralError("control points need a predictor"));
        }
    }

    uniform::encode_weights(blk, &q, writer)
}

/// Runs every candidate through a trial encode and keeps the cheapest,
/// biased toward the previous choice. Ties keep the earlier candidate, so
/// repeated runs are deterministic.
fn select<F>(
    candidates: Vec<PredictorType>,
    prev: Option<PredictorType>,
    mut trial: F,
) -> Result<PredictorType, Err>
where
    F: FnMut(PredictorType, &mut TrialWriter) -> Result<(), Err>,
{
    debug_assert!(!candidates.is_empty());
    if candidates.len() == 1 {
        return Ok(candidates[0]);
    }
    let mut best: Option<(f64, PredictorType)> = None;
    for cand in candidates {
        let mut probe = TrialWriter::new();
        if trial(cand, &mut probe).is_err() {
            // a candidate that cannot encode this object (e.g. a degenerate
            // plane fit) simply drops out of the running
            continue;
        }
        let mut size = probe.len() as f64;
        if prev == Some(cand) {
            size *= PREV_PREDICTOR_BIAS;
        }
        if best.map_or(true, |(b, _)| size < b) {
            best = Some((size, cand));
        }
    }
    best.map(|(_, cand)| cand)
        .ok_or(Err::GeneralError("no predictor could encode the object"))
}

pub(crate) fn select_curve_predictor(
    crv: &Curve,
    step: Option<f32>,
    prev: Option<PredictorType>,
) -> Result<PredictorType, Err> {
    let chosen = select(curve_candidates(&crv.points), prev, |cand, probe| {
        encode_knot_vector(&crv.knots, step, probe)?;
        encode_ctl_points(&crv.points, cand, None, step, probe)
    })?;
    trace!(predictor = chosen.get_id(), "curve predictor selected");
    Ok(chosen)
}

pub(crate) fn select_surface_predictor(
    srf: &Surface,
    step: Option<f32>,
    prev: Option<PredictorType>,
) -> Result<PredictorType, Err> {
    let grid = Some((srf.ulength, srf.vlength));
    let chosen = select(
        surface_candidates(&srf.points, srf.ulength),
        prev,
        |cand, probe| {
            encode_knot_vector(&srf.uknots, step, probe)?;
            encode_knot_vector(&srf.vknots, step, probe)?;
            encode_ctl_points(&srf.points, cand, grid, step, probe)
        },
    )?;
    trace!(predictor = chosen.get_id(), "surface predictor selected");
    Ok(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::{KnotVector, PointType};
    use crate::shared::knots::uniform_open_knots;

    fn circle_curve(n: usize) -> Curve {
        let points: Vec<[f64; 3]> = (0..n)
            .map(|i| {
                let t = i as f64 * 0.5;
                [3.0 * t.cos(), 3.0 * t.sin(), 0.0]
            })
            .collect();
        Curve {
            knots: KnotVector::new(4, false, uniform_open_knots(4, n, 0.0, 1.0)),
            points: CtlPtBlock::from_points3(&points),
        }
    }

    #[test]
    fn selection_is_deterministic() {
        let crv = circle_curve(12);
        let step = Some(0.001_f32);
        let a = select_curve_predictor(&crv, step, None).unwrap();
        let b = select_curve_predictor(&crv, step, None).unwrap();
        assert_eq!(a, b);
        let c = select_curve_predictor(&crv, step, Some(a)).unwrap();
        assert_eq!(a, c);
    }

    #[test]
    fn circular_data_prefers_the_arc_predictor() {
        let crv = circle_curve(16);
        let chosen = select_curve_predictor(&crv, Some(0.001), None).unwrap();
        assert_eq!(chosen, PredictorType::Arc);
    }

    #[test]
    fn single_candidate_skips_selection() {
        // 2-D points only admit the uniform predictor; selection is skipped
        let blk = CtlPtBlock::new(PointType::new(2, false), 6);
        let crv = Curve {
            knots: KnotVector::new(3, false, uniform_open_knots(3, 6, 0.0, 1.0)),
            points: blk,
        };
        let chosen =
            select_curve_predictor(&crv, None, Some(PredictorType::Arc)).unwrap();
        assert_eq!(chosen, PredictorType::Uniform);
    }
}
