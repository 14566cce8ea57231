//! The angles predictor for surfaces: per-row rigid-rotation prediction.
//!
//! Tessellated surfaces of revolution advance each row by a constant turn
//! angle. Each V row becomes a block: the block rotates into the frame of
//! its averaged normal, the first two points travel literally (absolute,
//! then delta), and every later point is predicted by rotating the previous
//! reconstructed edge by the block's turn angle about the frame's Z axis.
//! The angle is matched once per block against two fixed candidate tables;
//! a block whose residuals all vanish is flagged perfect and carries no
//! residual array at all.

use std::f64::consts::PI;

use lazy_static::lazy_static;

use crate::core::bit_coder::{ByteReader, ByteWriter};
use crate::error::Err;
use crate::shared::geom::{Mat3, Vec3};
use crate::shared::quant::{Quantizer, Residual, Residuals};

lazy_static! {
    /// The two candidate turn-angle tables: full-circle divisions for
    /// closed rows and half-circle divisions for open profiles. Their
    /// contents define the wire format; the block stores table and entry
    /// indices, never the angle itself.
    static ref ANGLE_TABLES: [Vec<f64>; 2] = [
        (3..=18).map(|n| 2.0 * PI / n as f64).collect(),
        (2..=18).map(|n| PI / n as f64).collect(),
    ];
}

/// Cosine tolerance of the per-block table match.
const ANGLE_COS_TOL: f64 = 0.2;

mod flag {
    pub const PERFECT: u8 = 1 << 0;
    pub const NEGATIVE: u8 = 1 << 1;
    pub const FALLBACK: u8 = 1 << 2;
    pub const ALL: u8 = PERFECT | NEGATIVE | FALLBACK;
}

/// The matched angle choice of one block.
enum AngleChoice {
    Table { table: u8, entry: u8, negative: bool },
    Fallback(f64),
}

impl AngleChoice {
    fn theta(&self) -> f64 {
        match *self {
            AngleChoice::Table {
                table,
                entry,
                negative,
            } => {
                let a = ANGLE_TABLES[table as usize][entry as usize];
                if negative {
                    -a
                } else {
                    a
                }
            }
            AngleChoice::Fallback(theta) => theta,
        }
    }
}

/// Matches the block's initial turn cosine against the candidate tables;
/// the closest entry within tolerance wins.
fn match_angle(cos_turn: f64, negative: bool) -> Option<AngleChoice> {
    let mut best: Option<(f64, u8, u8)> = None;
    for (t, table) in ANGLE_TABLES.iter().enumerate() {
        for (e, &angle) in table.iter().enumerate() {
            let d = (angle.cos() - cos_turn).abs();
            if d <= ANGLE_COS_TOL && best.map_or(true, |(bd, _, _)| d < bd) {
                best = Some((d, t as u8, e as u8));
            }
        }
    }
    best.map(|(_, table, entry)| AngleChoice::Table {
        table,
        entry,
        negative,
    })
}

/// The signed initial turn of a rotated block, measured in its XY plane
/// from the first three points.
fn initial_turn(q0: Vec3, q1: Vec3, q2: Vec3) -> Option<(f64, bool)> {
    let v1 = q1 - q0;
    let v2 = q2 - q1;
    let n1 = (v1.get(0) * v1.get(0) + v1.get(1) * v1.get(1)).sqrt();
    let n2 = (v2.get(0) * v2.get(0) + v2.get(1) * v2.get(1)).sqrt();
    if n1 == 0.0 || n2 == 0.0 {
        return None;
    }
    let cos = (v1.get(0) * v2.get(0) + v1.get(1) * v2.get(1)) / (n1 * n2);
    let turn = v1.get(0) * v2.get(1) - v1.get(1) * v2.get(0);
    Some((cos.clamp(-1.0, 1.0), turn < 0.0))
}

/// The block normal averaged from the first three points; degenerate rows
/// fall back to +Z so the frame stays well defined.
fn block_normal(points: &[Vec3]) -> Vec3 {
    let e1 = points[1] - points[0];
    let e2 = points[2] - points[1];
    let n = e1.cross(e2);
    if n.norm() <= 1e-12 * e1.norm().max(e2.norm()).powi(2) {
        return Vec3([0.0, 0.0, 1.0]);
    }
    n.normalize()
}

fn predict_next(prev2: Vec3, prev1: Vec3, cos_t: f64, sin_t: f64) -> Vec3 {
    prev1 + (prev1 - prev2).rotate_z(cos_t, sin_t)
}

/// Encodes the spatial channels of a `ulen`×`vlen` mesh, one block per row.
pub(crate) fn encode<W>(
    points: &[Vec3],
    ulen: usize,
    vlen: usize,
    q: &Quantizer,
    writer: &mut W,
) -> Result<(), Err>
where
    W: ByteWriter,
{
    debug_assert!(ulen >= 3 && points.len() == ulen * vlen);
    for v in 0..vlen {
        encode_block(&points[v * ulen..(v + 1) * ulen], q, writer)?;
    }
    Ok(())
}

fn encode_block<W>(block: &[Vec3], q: &Quantizer, writer: &mut W) -> Result<(), Err>
where
    W: ByteWriter,
{
    let normal = block_normal(block);
    let rot = Mat3::align_z(normal);
    let rotated: Vec<Vec3> = block.iter().map(|&p| rot.apply(p)).collect();

    // the first two points travel literally: P0 absolute, P1 as a delta.
    let mut head = Residuals::with_mode(q.is_quantized());
    let mut recon: Vec<Vec3> = Vec::with_capacity(block.len());
    for (i, &p) in rotated.iter().take(2).enumerate() {
        let pred = if i == 0 { Vec3::zero() } else { recon[0] };
        let mut rec = [0.0; 3];
        for axis in 0..3 {
            let r = q.quantize(p.get(axis) - pred.get(axis))?;
            head.push(r);
            rec[axis] = pred.get(axis) + q.reconstruct(r);
        }
        recon.push(Vec3(rec));
    }

    let choice = match initial_turn(rotated[0], rotated[1], rotated[2]) {
        Some((cos_turn, negative)) => match match_angle(cos_turn, negative) {
            Some(c) => c,
            None => {
                let theta = cos_turn.acos();
                AngleChoice::Fallback(if negative { -theta } else { theta })
            }
        },
        None => AngleChoice::Fallback(0.0),
    };
    let (sin_t, cos_t) = choice.theta().sin_cos();

    let mut tail = Residuals::with_mode(q.is_quantized());
    for &p in rotated.iter().skip(2) {
        let pred = predict_next(recon[recon.len() - 2], recon[recon.len() - 1], cos_t, sin_t);
        let mut rec = [0.0; 3];
        for axis in 0..3 {
            let r = q.quantize(p.get(axis) - pred.get(axis))?;
            tail.push(r);
            rec[axis] = pred.get(axis) + q.reconstruct(r);
        }
        recon.push(Vec3(rec));
    }
    let perfect = tail.all_zero();

    for axis in 0..3 {
        writer.write_f64(normal.get(axis));
    }
    let mut flags = 0_u8;
    if perfect {
        flags |= flag::PERFECT;
    }
    match choice {
        AngleChoice::Table {
            table,
            entry,
            negative,
        } => {
            if negative {
                flags |= flag::NEGATIVE;
            }
            writer.write_u8(flags);
            writer.write_u8(table);
            writer.write_u8(entry);
        }
        AngleChoice::Fallback(theta) => {
            flags |= flag::FALLBACK;
            writer.write_u8(flags);
            writer.write_f64(theta);
        }
    }
    head.write_to(writer);
    if !perfect {
        tail.write_to(writer);
    }
    Ok(())
}

/// Decodes the spatial channels of a `ulen`×`vlen` mesh, one block per row.
pub(crate) fn decode<R>(
    ulen: usize,
    vlen: usize,
    q: &Quantizer,
    reader: &mut R,
) -> Result<Vec<Vec3>, Err>
where
    R: ByteReader,
{
    let mut out = Vec::with_capacity(ulen * vlen);
    for _ in 0..vlen {
        out.extend(decode_block(ulen, q, reader)?);
    }
    Ok(out)
}

fn decode_block<R>(ulen: usize, q: &Quantizer, reader: &mut R) -> Result<Vec<Vec3>, Err>
where
    R: ByteReader,
{
    let normal = Vec3([
        reader.read_f64().map_err(Err::from)?,
        reader.read_f64().map_err(Err::from)?,
        reader.read_f64().map_err(Err::from)?,
    ]);
    let flags = reader.read_u8().map_err(Err::from)?;
    if flags & !flag::ALL != 0 {
        return Err(Err::StreamCorrupted("unknown angle block flags"));
    }
    let perfect = flags & flag::PERFECT != 0;
    let theta = if flags & flag::FALLBACK != 0 {
        reader.read_f64().map_err(Err::from)?
    } else {
        let table = reader.read_u8().map_err(Err::from)? as usize;
        let entry = reader.read_u8().map_err(Err::from)? as usize;
        let angle = *ANGLE_TABLES
            .get(table)
            .and_then(|t| t.get(entry))
            .ok_or(Err::StreamCorrupted("angle table index out of range"))?;
        if flags & flag::NEGATIVE != 0 {
            -angle
        } else {
            angle
        }
    };
    let (sin_t, cos_t) = theta.sin_cos();

    let head = Residuals::read_from(reader, 6, q.is_quantized())?;
    let mut recon: Vec<Vec3> = Vec::with_capacity(ulen);
    for i in 0..2 {
        let pred = if i == 0 { Vec3::zero() } else { recon[0] };
        let mut rec = [0.0; 3];
        for axis in 0..3 {
            rec[axis] = pred.get(axis) + q.reconstruct(head.get(i * 3 + axis));
        }
        recon.push(Vec3(rec));
    }

    let tail = if perfect {
        None
    } else {
        Some(Residuals::read_from(
            reader,
            3 * (ulen - 2),
            q.is_quantized(),
        )?)
    };
    let zero = if q.is_quantized() {
        Residual::Index(0)
    } else {
        Residual::Raw(0.0)
    };
    for j in 2..ulen {
        let pred = predict_next(recon[j - 2], recon[j - 1], cos_t, sin_t);
        let mut rec = [0.0; 3];
        for axis in 0..3 {
            let r = match &tail {
                Some(t) => t.get((j - 2) * 3 + axis),
                None => zero,
            };
            rec[axis] = pred.get(axis) + q.reconstruct(r);
        }
        recon.push(Vec3(rec));
    }

    let inv = Mat3::align_z(normal).transpose();
    Ok(recon.into_iter().map(|p| inv.apply(p)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// one diamond row per level: a constant quarter turn, CCW.
    fn diamond_tower(vlen: usize) -> (Vec<Vec3>, usize) {
        let ring = [
            [1.0, 0.0],
            [0.0, 1.0],
            [-1.0, 0.0],
            [0.0, -1.0],
        ];
        let mut points = Vec::new();
        for v in 0..vlen {
            for p in ring {
                points.push(Vec3([p[0], p[1], v as f64]));
            }
        }
        (points, ring.len())
    }

    #[test]
    fn quarter_turn_matches_a_table_entry() {
        let cos_turn = (PI / 2.0).cos();
        let choice = match_angle(cos_turn, false).unwrap();
        match choice {
            AngleChoice::Table { table, entry, .. } => {
                assert!(((ANGLE_TABLES[table as usize][entry as usize]) - PI / 2.0).abs() < 1e-12);
            }
            AngleChoice::Fallback(_) => panic!("expected a table match"),
        }
        // in the gap between the widest table angles
        assert!(match_angle(-0.9, false).is_none());
    }

    #[test]
    fn regular_rows_roundtrip_and_flag_perfect() {
        let (points, ulen) = diamond_tower(3);
        let vlen = 3;
        let q = Quantizer::new(Some(0.01), 1.0);

        let mut buffer = Vec::new();
        encode(&points, ulen, vlen, &q, &mut buffer).unwrap();
        let perfect_len = buffer.len();

        let mut reader = buffer.into_iter();
        let out = decode(ulen, vlen, &q, &mut reader).unwrap();
        for (a, b) in points.iter().zip(&out) {
            for axis in 0..3 {
                assert!((a.get(axis) - b.get(axis)).abs() <= 0.01 * 3_f64.sqrt());
            }
        }

        // jitter one interior point: the row loses its perfect flag and
        // must now carry its residual array.
        let mut jittered = points.clone();
        jittered[2] = jittered[2] + Vec3([0.11, -0.07, 0.0]);
        let mut buffer = Vec::new();
        encode(&jittered, ulen, vlen, &q, &mut buffer).unwrap();
        assert!(buffer.len() > perfect_len);
    }

    #[test]
    fn roundtrip_without_quantization() {
        let (points, ulen) = diamond_tower(2);
        let q = Quantizer::None;
        let mut buffer = Vec::new();
        encode(&points, ulen, 2, &q, &mut buffer).unwrap();
        let mut reader = buffer.into_iter();
        let out = decode(ulen, 2, &q, &mut reader).unwrap();
        for (a, b) in points.iter().zip(&out) {
            assert!((*a - *b).norm() < 1e-12);
        }
    }

    #[test]
    fn irregular_rows_use_the_fallback_angle() {
        // a constant ~104 degree turn falls in the gap between the two
        // tables' widest entries, forcing the raw-angle fallback.
        let mut points = Vec::new();
        let mut dir: f64 = 0.0;
        let mut p = Vec3([0.0, 0.0, 0.0]);
        for _ in 0..6 {
            points.push(p);
            p = p + Vec3([dir.cos(), dir.sin(), 0.0]);
            dir += 1.82;
        }
        let q = Quantizer::new(Some(0.001), 10.0);
        let mut buffer = Vec::new();
        encode(&points, 6, 1, &q, &mut buffer).unwrap();
        let mut reader = buffer.into_iter();
        let out = decode(6, 1, &q, &mut reader).unwrap();
        for (a, b) in points.iter().zip(&out) {
            for axis in 0..3 {
                assert!((a.get(axis) - b.get(axis)).abs() <= 0.001 * 10.0 * 2.0);
            }
        }
    }
}
