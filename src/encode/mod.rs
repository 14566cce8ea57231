pub(crate) mod header;
pub(crate) mod knots;
pub(crate) mod object;
pub(crate) mod points;

use std::io;

use tracing::debug;

use crate::core::block::BlockWriter;
use crate::core::object::Object;
use crate::error::Err;
use crate::shared::prediction::PredictorType;
use crate::shared::quant::normalize_quant_step;

/// Per-call compression arguments, constructed once per top-level call and
/// threaded through every recursive encode. Nothing here outlives the call
/// and nothing is shared between calls, so separate compressions may run
/// concurrently on separate threads.
#[derive(Clone, Debug)]
pub struct CompressionArgs {
    /// canonicalized quantization step; `None` disables quantization.
    pub(crate) step: Option<f32>,
    pub(crate) srf_pred: PredictorType,
    pub(crate) crv_pred: PredictorType,
    pub(crate) trisrf_pred: PredictorType,
    pub(crate) trivar_pred: PredictorType,
    pub(crate) mv_pred: PredictorType,
    #[allow(unused)] // recorded for symmetry with the decoder's arguments
    pub(crate) swap_endian: bool,
}

impl CompressionArgs {
    pub(crate) fn new(step: Option<f32>) -> Self {
        Self {
            step,
            srf_pred: PredictorType::Parallelogram,
            crv_pred: PredictorType::Arc,
            trisrf_pred: PredictorType::Uniform,
            trivar_pred: PredictorType::Uniform,
            mv_pred: PredictorType::Uniform,
            swap_endian: false,
        }
    }
}

/// All mutable encoder state: the hysteresis memory of the predictor
/// selector, the recursion depth, and the pointer stack guarding against
/// self-referencing containers.
pub(crate) struct EncoderContext {
    pub(crate) args: CompressionArgs,
    pub(crate) prev_crv: Option<PredictorType>,
    pub(crate) prev_srf: Option<PredictorType>,
    pub(crate) active: Vec<*const Object>,
}

impl EncoderContext {
    pub(crate) fn new(args: CompressionArgs) -> Self {
        Self {
            args,
            prev_crv: None,
            prev_srf: None,
            active: Vec::new(),
        }
    }
}

/// Compresses one object tree into the sink. The quantization error is
/// validated before a single byte is written, so a bad argument never
/// produces a partial stream.
pub fn compress<W>(obj: &Object, sink: W, quant_error: f32) -> Result<(), Err>
where
    W: io::Write,
{
    let step = normalize_quant_step(quant_error)?;
    let args = CompressionArgs::new(step);

    let mut writer = BlockWriter::new(sink);
    header::encode_header(&args, &mut writer)?;
    debug!(quant = ?step, "header written, walking the object tree");

    let mut ctx = EncoderContext::new(args);
    object::encode_object(obj, &mut ctx, &mut writer)?;

    writer.finish()?;
    debug!("compression finished");
    Ok(())
}
