use std::io;

use crate::core::bit_coder::ReaderErr;

/// The single error type surfaced by every compress/decompress entry point.
/// All failures abort the current top-level call and unwind to the caller;
/// nothing is retried internally.
#[remain::sorted]
#[derive(thiserror::Error, Debug)]
pub enum Err {
    #[error("codec failure: {0}")]
    GeneralError(&'static str),
    #[error("invalid quantization error {0}; must lie in (0, 1) or be the no-quantization sentinel")]
    InvalidQuantizerValue(f32),
    #[error("stream does not carry the expected magic tag")]
    NotThisFormat,
    #[error("failed to open file: {0}")]
    OpenFileFailed(io::Error),
    #[error("predictor id {0} is not defined in this format version")]
    PredictorNotDefined(u8),
    #[error("read failed: {0}")]
    ReadFailed(io::Error),
    #[error("a list object transitively contains itself")]
    SelfReferencingList,
    #[error("corrupted stream: {0}")]
    StreamCorrupted(&'static str),
    #[error("write failed: {0}")]
    WriteFailed(io::Error),
}

impl From<ReaderErr> for Err {
    fn from(e: ReaderErr) -> Self {
        match e {
            ReaderErr::NotEnoughData => Err::StreamCorrupted("unexpected end of stream"),
            ReaderErr::Io(e) => Err::ReadFailed(e),
        }
    }
}
