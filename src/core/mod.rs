/// Byte-level writer/reader traits and the trial (size-counting) sink.
pub mod bit_coder;

/// Length-prefixed block framing over raw byte sinks/sources.
pub mod block;

/// Geometric payload types: knot vectors, control-point blocks, patches.
pub mod geometry;

/// The object tree: kinds, attributes, dependencies.
pub mod object;
