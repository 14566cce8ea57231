use crate::core::bit_coder::ByteReader;
use crate::error::Err;
use crate::shared::prediction::PredictorType;
use crate::shared::{FORMAT_VERSION, MAGIC};

pub(crate) struct Header {
    #[allow(unused)] // kept for forward-compatibility decisions
    pub version: i32,
    pub quant_error: f32,
    #[allow(unused)]
    pub srf_pred: PredictorType,
    #[allow(unused)]
    pub crv_pred: PredictorType,
    #[allow(unused)]
    pub trisrf_pred: PredictorType,
    #[allow(unused)]
    pub trivar_pred: PredictorType,
    #[allow(unused)]
    pub mv_pred: PredictorType,
}

/// Reads everything after the endianness byte, which the driver consumes
/// itself to configure the reader's swapping.
pub(crate) fn decode_header<R>(reader: &mut R) -> Result<Header, Err>
where
    R: ByteReader,
{
    for &expected in MAGIC.iter() {
        if reader.read_u8().map_err(Err::from)? != expected {
            return Err(Err::NotThisFormat);
        }
    }

    let version = reader.read_i32().map_err(Err::from)?;
    if version != FORMAT_VERSION {
        return Err(Err::StreamCorrupted("unsupported format version"));
    }

    let quant_error = reader.read_f32().map_err(Err::from)?;

    let srf_pred = PredictorType::read_from(reader)?;
    let crv_pred = PredictorType::read_from(reader)?;
    let trisrf_pred = PredictorType::read_from(reader)?;
    let trivar_pred = PredictorType::read_from(reader)?;
    let mv_pred = PredictorType::read_from(reader)?;

    Ok(Header {
        version,
        quant_error,
        srf_pred,
        crv_pred,
        trisrf_pred,
        trivar_pred,
        mv_pred,
    })
}
