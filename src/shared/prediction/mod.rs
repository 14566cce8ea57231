//! The predictive-coding strategies and their wire identities.
//!
//! Every predictor estimates a value from previously reconstructed
//! neighbors so only the residual needs to travel. The encoder mirrors the
//! decoder's integration step for step, which keeps both sides in
//! bit-identical state — the precondition for the round-trip guarantees.

pub mod angles;
pub mod arc;
pub mod parallelogram;
pub mod planar;
pub mod uniform;

use crate::core::bit_coder::{ByteReader, ByteWriter};
use crate::core::geometry::CtlPtBlock;
use crate::error::Err;
use crate::shared::geom::Vec3;
use crate::shared::quant::{Quantizer, Residuals};

/// Chain step of the rational-weight channel; weights are predicted two
/// points back under every geometric predictor.
pub(crate) const WEIGHT_STEP: usize = 2;

/// Seed points a geometric curve predictor stores before its rule can fire.
pub(crate) const SEED_LEN: usize = 3;

/// Wire ids of the predictors. Unknown ids on the wire are the
/// forward-compatibility guard [`Err::PredictorNotDefined`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PredictorType {
    NoPredictor,
    Uniform,
    Arc,
    Planar2D,
    Parallelogram,
    Angles,
}

impl PredictorType {
    pub(crate) fn get_id(&self) -> u8 {
        match self {
            PredictorType::NoPredictor => 0,
            PredictorType::Uniform => 1,
            PredictorType::Arc => 2,
            PredictorType::Planar2D => 3,
            PredictorType::Parallelogram => 4,
            PredictorType::Angles => 5,
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
        let id = reader.read_u8().map_err(Err::from)?;
        match id {
            0 => Ok(PredictorType::NoPredictor),
            1 => Ok(PredictorType::Uniform),
            2 => Ok(PredictorType::Arc),
            3 => Ok(PredictorType::Planar2D),
            4 => Ok(PredictorType::Parallelogram),
            5 => Ok(PredictorType::Angles),
            _ => Err(Err::PredictorNotDefined(id)),
        }
    }
}

/// Candidate predictors for a curve of the given control block. The
/// geometric predictors need full 3-D points and enough of them to fit.
pub(crate) fn curve_candidates(blk: &CtlPtBlock) -> Vec<PredictorType> {
    let mut out = vec![PredictorType::Uniform];
    if blk.pt_type.dim == 3 && blk.num_points() >= 4 {
        out.push(PredictorType::Arc);
        out.push(PredictorType::Planar2D);
    }
    out
}

/// Candidate predictors for a surface mesh of `ulength` columns.
pub(crate) fn surface_candidates(blk: &CtlPtBlock, ulength: usize) -> Vec<PredictorType> {
    let mut out = vec![PredictorType::Parallelogram];
    if blk.pt_type.dim == 3 && ulength >= 3 {
        out.push(PredictorType::Angles);
    }
    out
}

/// Collects the spatial channels of a 3-D block into point vectors.
pub(crate) fn gather_points3(blk: &CtlPtBlock) -> Vec<Vec3> {
    let n = blk.num_points();
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        out.push(Vec3([blk.coords[1][i], blk.coords[2][i], blk.coords[3][i]]));
    }
    out
}

/// Scatters reconstructed points back into a block's spatial channels.
pub(crate) fn scatter_points3(points: &[Vec3], blk: &mut CtlPtBlock) {
    for (i, p) in points.iter().enumerate() {
        for axis in 0..3 {
            blk.coords[axis + 1][i] = p.get(axis);
        }
    }
}

/// Residual channels of a geometric curve predictor, split between the
/// seed points and the predicted tail. Seed residuals are absolute-scale
/// and would force the whole channel onto the 4-byte index path; keeping
/// them in their own short stream lets a well-predicted tail stay on the
/// 1-byte path, which is also what makes trial sizes discriminate between
/// predictors.
pub(crate) struct SeedSplitChannels {
    heads: [Residuals; 3],
    tails: [Residuals; 3],
}

impl SeedSplitChannels {
    pub(crate) fn new(q: &Quantizer) -> Self {
        let mk = || Residuals::with_mode(q.is_quantized());
        Self {
            heads: [mk(), mk(), mk()],
            tails: [mk(), mk(), mk()],
        }
    }

    /// Quantizes one point's residual into the channels and returns its
    /// reconstruction, which both sides feed back into the prediction.
    pub(crate) fn push_point(
        &mut self,
        i: usize,
        actual: Vec3,
        pred: Vec3,
        q: &Quantizer,
    ) -> Result<Vec3, Err> {
        let mut rec = [0.0; 3];
        for axis in 0..3 {
            let r = q.quantize(actual.get(axis) - pred.get(axis))?;
            if i < SEED_LEN {
                self.heads[axis].push(r);
            } else {
                self.tails[axis].push(r);
            }
            rec[axis] = pred.get(axis) + q.reconstruct(r);
        }
        Ok(Vec3(rec))
    }

    pub(crate) fn write_to<W>(&self, n: usize, writer: &mut W)
    where
        W: ByteWriter,
    {
        debug_assert!(self.heads[0].len() == n.min(SEED_LEN));
        for axis in 0..3 {
            self.heads[axis].write_to(writer);
            if n > SEED_LEN {
                self.tails[axis].write_to(writer);
            }
        }
    }

    pub(crate) fn read_from<R>(n: usize, q: &Quantizer, reader: &mut R) -> Result<Self, Err>
    where
        R: ByteReader,
    {
        let mk = || Residuals::with_mode(q.is_quantized());
        let mut out = Self {
            heads: [mk(), mk(), mk()],
            tails: [mk(), mk(), mk()],
        };
        for axis in 0..3 {
            out.heads[axis] = Residuals::read_from(reader, n.min(SEED_LEN), q.is_quantized())?;
            if n > SEED_LEN {
                out.tails[axis] = Residuals::read_from(reader, n - SEED_LEN, q.is_quantized())?;
            }
        }
        Ok(out)
    }

    pub(crate) fn reconstruct(&self, i: usize, pred: Vec3, q: &Quantizer) -> Vec3 {
        let mut rec = [0.0; 3];
        for axis in 0..3 {
            let r = if i < SEED_LEN {
                self.heads[axis].get(i)
            } else {
                self.tails[axis].get(i - SEED_LEN)
            };
            rec[axis] = pred.get(axis) + q.reconstruct(r);
        }
        Vec3(rec)
    }
}

/// The curve prediction schemes behind one dispatch surface.
#[enum_dispatch::enum_dispatch(CurveSchemeImpl)]
pub(crate) enum CurveScheme {
    Uniform(uniform::UniformCurve),
    Arc(arc::ArcCurve),
    Planar2D(planar::PlanarCurve),
}

#[enum_dispatch::enum_dispatch]
pub(crate) trait CurveSchemeImpl {
    /// Encodes the spatial channels of a curve block. The weight channel is
    /// handled uniformly by the caller.
    fn encode<W: ByteWriter>(
        &self,
        blk: &CtlPtBlock,
        q: &Quantizer,
        writer: &mut W,
    ) -> Result<(), Err>;

    /// Decodes the spatial channels into a prepared block.
    fn decode<R: ByteReader>(
        &self,
        blk: &mut CtlPtBlock,
        q: &Quantizer,
        reader: &mut R,
    ) -> Result<(), Err>;
}

impl CurveScheme {
    pub(crate) fn new(ty: PredictorType) -> Result<Self, Err> {
        match ty {
            PredictorType::Uniform => Ok(CurveScheme::Uniform(uniform::UniformCurve)),
            PredictorType::Arc => Ok(CurveScheme::Arc(arc::ArcCurve)),
            PredictorType::Planar2D => Ok(CurveScheme::Planar2D(planar::PlanarCurve)),
            _ => Err(Err::StreamCorrupted("predictor is not valid for curves")),
        }
    }
}
