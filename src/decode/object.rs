//! The object-tree walker, decode side. Mirrors the encoder's record
//! layout field for field; every count, length and id read from the wire
//! is validated before memory is committed to it.

use std::rc::Rc;

use tracing::trace;

use crate::core::bit_coder::ByteReader;
use crate::core::geometry::{
    CtlPt, Curve, Multivariate, PointType, Polygon, Surface, TriangularSurface, Trivariate,
};
use crate::core::object::{Attribute, AttrValue, BBox, Dependency, Geometry, Object, ObjectKind};
use crate::error::Err;
use crate::shared::prediction::{uniform, PredictorType};
use crate::shared::quant::Quantizer;
use crate::shared::{field, read_continuation, read_str, MAX_NESTING};

use super::knots::decode_knot_vector;
use super::points::decode_ctl_points;
use super::DecoderContext;

/// Sanity cap on any single direction length or element count read from
/// the wire; a corrupt stream must not drive allocations.
const MAX_COUNT: i32 = 1 << 24;

pub(crate) fn decode_object<R>(ctx: &mut DecoderContext, reader: &mut R) -> Result<Object, Err>
where
    R: ByteReader,
{
    if ctx.depth >= MAX_NESTING {
        return Err(Err::StreamCorrupted("object nesting too deep"));
    }
    ctx.depth += 1;
    let res = decode_object_record(ctx, reader);
    ctx.depth -= 1;
    res
}

fn decode_object_record<R>(ctx: &mut DecoderContext, reader: &mut R) -> Result<Object, Err>
where
    R: ByteReader,
{
    let pred = PredictorType::read_from(reader)?;
    let kind = ObjectKind::read_from(reader)?;
    trace!(kind = kind.get_id(), "decoding object");

    let bitmap = reader.read_u8().map_err(Err::from)?;
    if bitmap & !field::ALL != 0 {
        return Err(Err::StreamCorrupted("unknown field bitmap bits"));
    }

    let bbox = if bitmap & field::BBOX != 0 {
        let mut vals = [0.0_f64; 6];
        for v in vals.iter_mut() {
            *v = reader.read_f64().map_err(Err::from)?;
        }
        Some(BBox {
            min: [vals[0], vals[1], vals[2]],
            max: [vals[3], vals[4], vals[5]],
        })
    } else {
        None
    };
    let count = if bitmap & field::COUNT != 0 {
        Some(reader.read_i32().map_err(Err::from)?)
    } else {
        None
    };
    let tags = if bitmap & field::TAGS != 0 {
        Some(reader.read_i32().map_err(Err::from)?)
    } else {
        None
    };
    let name = if bitmap & field::NAME != 0 {
        Some(read_str(reader)?)
    } else {
        None
    };
    let attributes = if bitmap & field::ATTRIBUTES != 0 {
        decode_attributes(ctx, reader)?
    } else {
        Vec::new()
    };
    let dependencies = if bitmap & field::DEPENDENCIES != 0 {
        decode_dependencies(ctx, reader)?
    } else {
        Vec::new()
    };

    let geom = decode_payload(kind, pred, ctx, reader)?;

    Ok(Object {
        name,
        bbox,
        count,
        tags,
        attributes,
        dependencies,
        geom,
    })
}

fn read_count<R>(reader: &mut R, what: &'static str) -> Result<usize, Err>
where
    R: ByteReader,
{
    let v = reader.read_i32().map_err(Err::from)?;
    if v <= 0 || v > MAX_COUNT {
        return Err(Err::StreamCorrupted(what));
    }
    Ok(v as usize)
}

fn read_flag<R>(reader: &mut R) -> Result<bool, Err>
where
    R: ByteReader,
{
    match reader.read_u8().map_err(Err::from)? {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(Err::StreamCorrupted("invalid boolean byte")),
    }
}

fn decode_attributes<R>(ctx: &mut DecoderContext, reader: &mut R) -> Result<Vec<Attribute>, Err>
where
    R: ByteReader,
{
    let mut out = Vec::new();
    while read_continuation(reader)? {
        let name = read_str(reader)?;
        let tag = reader.read_u8().map_err(Err::from)?;
        let value = match tag {
            0 => AttrValue::None,
            1 => AttrValue::Int(reader.read_i32().map_err(Err::from)?),
            2 => AttrValue::Real(reader.read_f64().map_err(Err::from)?),
            3 => AttrValue::Uv([
                reader.read_f64().map_err(Err::from)?,
                reader.read_f64().map_err(Err::from)?,
            ]),
            4 => AttrValue::Str(read_str(reader)?),
            5 => AttrValue::Obj(Rc::new(decode_object(ctx, reader)?)),
            // pointer attributes are never written; their tags mean the
            // stream was not produced by this encoder
            6 | 7 => return Err(Err::StreamCorrupted("pointer attribute on the wire")),
            _ => return Err(Err::StreamCorrupted("unknown attribute type tag")),
        };
        out.push(Attribute { name, value });
    }
    Ok(out)
}

fn decode_str_list<R>(reader: &mut R) -> Result<Vec<String>, Err>
where
    R: ByteReader,
{
    let mut out = Vec::new();
    while read_continuation(reader)? {
        out.push(read_str(reader)?);
    }
    Ok(out)
}

fn decode_dependencies<R>(ctx: &mut DecoderContext, reader: &mut R) -> Result<Vec<Dependency>, Err>
where
    R: ByteReader,
{
    let mut out = Vec::new();
    while read_continuation(reader)? {
        let attributes = decode_attributes(ctx, reader)?;
        let param_names = decode_str_list(reader)?;
        let dependent_names = decode_str_list(reader)?;
        let eval_expr = if read_flag(reader)? {
            Some(read_str(reader)?)
        } else {
            None
        };
        let eval_index = reader.read_i32().map_err(Err::from)?;
        let num_visits = reader.read_i32().map_err(Err::from)?;
        out.push(Dependency {
            attributes,
            param_names,
            dependent_names,
            eval_expr,
            eval_index,
            num_visits,
        });
    }
    Ok(out)
}

fn decode_payload<R>(
    kind: ObjectKind,
    pred: PredictorType,
    ctx: &mut DecoderContext,
    reader: &mut R,
) -> Result<Geometry, Err>
where
    R: ByteReader,
{
    let step = ctx.step;
    match kind {
        ObjectKind::Curve => {
            let order = read_count(reader, "invalid curve order")?;
            let length = read_count(reader, "invalid curve length")?;
            let periodic = read_flag(reader)?;
            let pt_type = PointType::from_byte(reader.read_u8().map_err(Err::from)?)?;
            let knots = decode_knot_vector(order, length, periodic, step, reader)?;
            if !matches!(
                pred,
                PredictorType::Uniform | PredictorType::Arc | PredictorType::Planar2D
            ) {
                return Err(Err::StreamCorrupted("predictor is not valid for curves"));
            }
            let points = decode_ctl_points(pt_type, length, pred, None, step, reader)?;
            Ok(Geometry::Curve(Curve { knots, points }))
        }
        ObjectKind::Surface => {
            let uorder = read_count(reader, "invalid surface order")?;
            let vorder = read_count(reader, "invalid surface order")?;
            let ulength = read_count(reader, "invalid surface length")?;
            let vlength = read_count(reader, "invalid surface length")?;
            let uper = read_flag(reader)?;
            let vper = read_flag(reader)?;
            let pt_type = PointType::from_byte(reader.read_u8().map_err(Err::from)?)?;
            let uknots = decode_knot_vector(uorder, ulength, uper, step, reader)?;
            let vknots = decode_knot_vector(vorder, vlength, vper, step, reader)?;
            if !matches!(
                pred,
                PredictorType::Parallelogram | PredictorType::Angles
            ) {
                return Err(Err::StreamCorrupted("predictor is not valid for surfaces"));
            }
            let num = ulength
                .checked_mul(vlength)
                .filter(|&n| n <= MAX_COUNT as usize)
                .ok_or(Err::StreamCorrupted("surface mesh too large"))?;
            let points = decode_ctl_points(
                pt_type,
                num,
                pred,
                Some((ulength, vlength)),
                step,
                reader,
            )?;
            Ok(Geometry::Surface(Surface {
                uknots,
                vknots,
                ulength,
                vlength,
                points,
            }))
        }
        ObjectKind::Trivariate => {
            let mut orders = [0_usize; 3];
            let mut lengths = [0_usize; 3];
            let mut periodic = [false; 3];
            for o in orders.iter_mut() {
                *o = read_count(reader, "invalid trivariate order")?;
            }
            for l in lengths.iter_mut() {
                *l = read_count(reader, "invalid trivariate length")?;
            }
            for p in periodic.iter_mut() {
                *p = read_flag(reader)?;
            }
            let pt_type = PointType::from_byte(reader.read_u8().map_err(Err::from)?)?;
            let knots = [
                decode_knot_vector(orders[0], lengths[0], periodic[0], step, reader)?,
                decode_knot_vector(orders[1], lengths[1], periodic[1], step, reader)?,
                decode_knot_vector(orders[2], lengths[2], periodic[2], step, reader)?,
            ];
            if pred != PredictorType::Uniform {
                return Err(Err::StreamCorrupted("predictor is not valid for trivariates"));
            }
            let num = lengths[0]
                .checked_mul(lengths[1])
                .and_then(|n| n.checked_mul(lengths[2]))
                .filter(|&n| n <= MAX_COUNT as usize)
                .ok_or(Err::StreamCorrupted("trivariate mesh too large"))?;
            let points = decode_ctl_points(pt_type, num, pred, None, step, reader)?;
            Ok(Geometry::Trivariate(Trivariate {
                knots,
                lengths,
                points,
            }))
        }
        ObjectKind::TriangularSurface => {
            let order = read_count(reader, "invalid triangular order")?;
            let length = read_count(reader, "invalid triangular length")?;
            let pt_type = PointType::from_byte(reader.read_u8().map_err(Err::from)?)?;
            let knots = decode_knot_vector(order, length, false, step, reader)?;
            if pred != PredictorType::Uniform {
                return Err(Err::StreamCorrupted(
                    "predictor is not valid for triangular surfaces",
                ));
            }
            let num = TriangularSurface::expected_points(length);
            if num > MAX_COUNT as usize {
                return Err(Err::StreamCorrupted("triangular mesh too large"));
            }
            let points = decode_ctl_points(pt_type, num, pred, None, step, reader)?;
            Ok(Geometry::TriangularSurface(TriangularSurface {
                knots,
                length,
                points,
            }))
        }
        ObjectKind::Multivariate => {
            let dim = reader.read_i32().map_err(Err::from)?;
            if dim <= 0 || dim > 16 {
                return Err(Err::StreamCorrupted("invalid multivariate dimension"));
            }
            let dim = dim as usize;
            let mut knot_params = Vec::with_capacity(dim);
            for _ in 0..dim {
                let order = read_count(reader, "invalid multivariate order")?;
                let length = read_count(reader, "invalid multivariate length")?;
                let periodic = read_flag(reader)?;
                knot_params.push((order, length, periodic));
            }
            let pt_type = PointType::from_byte(reader.read_u8().map_err(Err::from)?)?;
            let mut knots = Vec::with_capacity(dim);
            let mut lengths = Vec::with_capacity(dim);
            for &(order, length, periodic) in &knot_params {
                knots.push(decode_knot_vector(order, length, periodic, step, reader)?);
                lengths.push(length);
            }
            if pred != PredictorType::Uniform {
                return Err(Err::StreamCorrupted(
                    "predictor is not valid for multivariates",
                ));
            }
            let mut num = 1_usize;
            for &l in &lengths {
                num = num
                    .checked_mul(l)
                    .filter(|&n| n <= MAX_COUNT as usize)
                    .ok_or(Err::StreamCorrupted("multivariate mesh too large"))?;
            }
            let points = decode_ctl_points(pt_type, num, pred, None, step, reader)?;
            Ok(Geometry::Multivariate(Multivariate {
                knots,
                lengths,
                points,
            }))
        }
        ObjectKind::PolygonMesh => decode_polygon_mesh(step, reader),
        ObjectKind::Point => Ok(Geometry::Point(read_f64s3(reader)?)),
        ObjectKind::Vector => Ok(Geometry::Vector(read_f64s3(reader)?)),
        ObjectKind::Plane => {
            let mut p = [0.0_f64; 4];
            for v in p.iter_mut() {
                *v = reader.read_f64().map_err(Err::from)?;
            }
            Ok(Geometry::Plane(p))
        }
        ObjectKind::Matrix => Ok(Geometry::Matrix(read_matrix(reader)?)),
        ObjectKind::CtlPt => {
            let pt_type = PointType::from_byte(reader.read_u8().map_err(Err::from)?)?;
            let n = pt_type.dim as usize + pt_type.rational as usize;
            let mut coords = Vec::with_capacity(n);
            for _ in 0..n {
                coords.push(reader.read_f64().map_err(Err::from)?);
            }
            Ok(Geometry::CtlPt(CtlPt { pt_type, coords }))
        }
        ObjectKind::Numeric => Ok(Geometry::Numeric(reader.read_f64().map_err(Err::from)?)),
        ObjectKind::StringVal => Ok(Geometry::StringVal(read_str(reader)?)),
        ObjectKind::Instance => {
            let of = read_str(reader)?;
            Ok(Geometry::Instance {
                of,
                matrix: read_matrix(reader)?,
            })
        }
        ObjectKind::TrimmedSurface => {
            let surface = decode_object(ctx, reader)?;
            if !matches!(surface.geom, Geometry::Surface(_)) {
                return Err(Err::StreamCorrupted("trimmed surface child is not a surface"));
            }
            let mut trim_curves = Vec::new();
            while read_continuation(reader)? {
                let crv = decode_object(ctx, reader)?;
                if !matches!(crv.geom, Geometry::Curve(_)) {
                    return Err(Err::StreamCorrupted("trim curve is not a curve"));
                }
                trim_curves.push(Rc::new(crv));
            }
            Ok(Geometry::TrimmedSurface {
                surface: Rc::new(surface),
                trim_curves,
            })
        }
        ObjectKind::Model => {
            let mut trimmed_surfaces = Vec::new();
            while read_continuation(reader)? {
                let srf = decode_object(ctx, reader)?;
                if !matches!(srf.geom, Geometry::TrimmedSurface { .. }) {
                    return Err(Err::StreamCorrupted("model child is not a trimmed surface"));
                }
                trimmed_surfaces.push(Rc::new(srf));
            }
            Ok(Geometry::Model { trimmed_surfaces })
        }
        ObjectKind::List => {
            let mut children = Vec::new();
            while read_continuation(reader)? {
                children.push(Rc::new(decode_object(ctx, reader)?));
            }
            Ok(Geometry::list(children))
        }
    }
}

fn read_f64s3<R>(reader: &mut R) -> Result<[f64; 3], Err>
where
    R: ByteReader,
{
    let mut p = [0.0_f64; 3];
    for v in p.iter_mut() {
        *v = reader.read_f64().map_err(Err::from)?;
    }
    Ok(p)
}

fn read_matrix<R>(reader: &mut R) -> Result<[f64; 16], Err>
where
    R: ByteReader,
{
    let mut m = [0.0_f64; 16];
    for v in m.iter_mut() {
        *v = reader.read_f64().map_err(Err::from)?;
    }
    Ok(m)
}

fn decode_polygon_mesh<R>(step: Option<f32>, reader: &mut R) -> Result<Geometry, Err>
where
    R: ByteReader,
{
    let range = if step.is_some() {
        reader.read_f64().map_err(Err::from)?
    } else {
        1.0
    };
    let q = Quantizer::new(step, range);

    let mut polygons = Vec::new();
    while read_continuation(reader)? {
        let mut plane = [0.0_f64; 4];
        for v in plane.iter_mut() {
            *v = reader.read_f64().map_err(Err::from)?;
        }
        let nverts = read_count(reader, "invalid polygon vertex count")?;
        let mut channels = Vec::with_capacity(3);
        for _ in 0..3 {
            channels.push(uniform::decode_channel(nverts, 1, &q, reader)?);
        }
        let vertices: Vec<[f64; 3]> = (0..nverts)
            .map(|i| [channels[0][i], channels[1][i], channels[2][i]])
            .collect();
        let normals = if read_flag(reader)? {
            let mut normals = Vec::with_capacity(nverts);
            for _ in 0..nverts {
                normals.push(read_f64s3(reader)?);
            }
            Some(normals)
        } else {
            None
        };
        polygons.push(Polygon {
            plane,
            vertices,
            normals,
        });
    }
    Ok(Geometry::PolygonMesh(polygons))
}
