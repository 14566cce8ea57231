//! nurbs-codec — a binary compression codec for NURBS/B-spline geometric
//! object trees: a length-prefixed streaming container, a uniform scalar
//! quantizer, a knot-vector codec with canonical-form detection, five
//! predictive-coding strategies with a cheapest-wins selector, and a
//! recursive object-tree walker, each with a faithful decoder.

/// Contains the shared definitions, native objects, and the byte coders.
pub mod core;

/// Contains compression techniques used by the encoder and the decoder.
pub(crate) mod shared;

/// Defines the encoder.
pub mod encode;

/// Defines the decoder.
pub mod decode;

/// File-level entry points and the compression handle.
pub mod io;

mod error;

pub use error::Err;
pub use shared::knots::{uniform_float_knots, uniform_open_knots};
pub use shared::quant::QUANT_NONE;

/// Contains the most commonly used traits, types, and objects.
pub mod prelude {
    pub use crate::core::bit_coder::{ByteReader, ByteWriter};
    pub use crate::core::geometry::{
        CtlPt, CtlPtBlock, Curve, KnotVector, Multivariate, PointType, Polygon, Surface,
        TriangularSurface, Trivariate,
    };
    pub use crate::core::object::{
        Attribute, AttrValue, BBox, Dependency, Geometry, Object, ObjectKind,
    };
    pub use crate::decode::decompress;
    pub use crate::encode::compress;
    pub use crate::io::{compress_to_file, decompress_from_file, Compressor};
    pub use crate::{uniform_float_knots, uniform_open_knots, Err, QUANT_NONE};
}
