//! The object-tree walker, encode side. One record per object: predictor
//! byte, kind byte, field bitmap, the selected optional fields, then the
//! kind payload. Repeated sections are continuation-guarded throughout.

use tracing::trace;

use crate::core::bit_coder::ByteWriter;
use crate::core::geometry::{CtlPt, Polygon};
use crate::core::object::{Attribute, AttrValue, Dependency, Geometry, Object};
use crate::error::Err;
use crate::shared::prediction::{uniform, PredictorType};
use crate::shared::quant::{round_to_pow10, Quantizer};
use crate::shared::{field, write_continuation, write_str, MAX_NESTING};

use super::knots::encode_knot_vector;
use super::points::{encode_ctl_points, select_curve_predictor, select_surface_predictor};
use super::EncoderContext;

pub(crate) fn encode_object<W>(
    obj: &Object,
    ctx: &mut EncoderContext,
    writer: &mut W,
) -> Result<(), Err>
where
    W: ByteWriter,
{
    let ptr = obj as *const Object;
    if ctx.active.iter().any(|&p| p == ptr) {
        return Err(Err::SelfReferencingList);
    }
    if ctx.active.len() >= MAX_NESTING {
        return Err(Err::GeneralError("object nesting too deep"));
    }
    ctx.active.push(ptr);
    let res = encode_object_record(obj, ctx, writer);
    ctx.active.pop();
    res
}

fn encode_object_record<W>(
    obj: &Object,
    ctx: &mut EncoderContext,
    writer: &mut W,
) -> Result<(), Err>
where
    W: ByteWriter,
{
    trace!(kind = obj.kind().get_id(), "encoding object");

    let pred = select_predictor(obj, ctx)?;
    pred.write_to(writer);
    obj.kind().write_to(writer);

    let mut bitmap = 0_u8;
    if obj.bbox.is_some() {
        bitmap |= field::BBOX;
    }
    if obj.count.is_some() {
        bitmap |= field::COUNT;
    }
    if obj.tags.is_some() {
        bitmap |= field::TAGS;
    }
    if obj.name.is_some() {
        bitmap |= field::NAME;
    }
    if !obj.attributes.is_empty() {
        bitmap |= field::ATTRIBUTES;
    }
    if !obj.dependencies.is_empty() {
        bitmap |= field::DEPENDENCIES;
    }
    writer.write_u8(bitmap);

    if let Some(bbox) = &obj.bbox {
        for &v in bbox.min.iter().chain(bbox.max.iter()) {
            writer.write_f64(v);
        }
    }
    if let Some(count) = obj.count {
        writer.write_i32(count);
    }
    if let Some(tags) = obj.tags {
        writer.write_i32(tags);
    }
    if let Some(name) = &obj.name {
        write_str(writer, name)?;
    }
    if !obj.attributes.is_empty() {
        encode_attributes(&obj.attributes, ctx, writer)?;
    }
    if !obj.dependencies.is_empty() {
        encode_dependencies(&obj.dependencies, ctx, writer)?;
    }

    encode_payload(obj, pred, ctx, writer)
}

/// Picks the predictor byte leading the record. Curves and surfaces run the
/// selector; the remaining spline kinds always chain uniformly; everything
/// else carries no predictor.
fn select_predictor(obj: &Object, ctx: &mut EncoderContext) -> Result<PredictorType, Err> {
    let step = ctx.args.step;
    let pred = match &obj.geom {
        Geometry::Curve(crv) => {
            let p = select_curve_predictor(crv, step, ctx.prev_crv)?;
            ctx.prev_crv = Some(p);
            p
        }
        Geometry::Surface(srf) => {
            let p = select_surface_predictor(srf, step, ctx.prev_srf)?;
            ctx.prev_srf = Some(p);
            p
        }
        Geometry::TriangularSurface(_) => ctx.args.trisrf_pred,
        Geometry::Trivariate(_) => ctx.args.trivar_pred,
        Geometry::Multivariate(_) => ctx.args.mv_pred,
        Geometry::PolygonMesh(_) => PredictorType::Uniform,
        _ => PredictorType::NoPredictor,
    };
    Ok(pred)
}

fn encode_attributes<W>(
    attributes: &[Attribute],
    ctx: &mut EncoderContext,
    writer: &mut W,
) -> Result<(), Err>
where
    W: ByteWriter,
{
    for attr in attributes {
        // pointer attributes are process-local and cannot survive a stream
        if matches!(attr.value, AttrValue::Ptr | AttrValue::RefPtr) {
            continue;
        }
        write_continuation(writer, true);
        write_str(writer, &attr.name)?;
        writer.write_u8(attr.value.type_tag());
        match &attr.value {
            AttrValue::None => {}
            AttrValue::Int(v) => writer.write_i32(*v),
            AttrValue::Real(v) => writer.write_f64(*v),
            AttrValue::Uv(uv) => {
                writer.write_f64(uv[0]);
                writer.write_f64(uv[1]);
            }
            AttrValue::Str(s) => write_str(writer, s)?,
            AttrValue::Obj(sub) => encode_object(sub, ctx, writer)?,
            AttrValue::Ptr | AttrValue::RefPtr => unreachable!(),
        }
    }
    write_continuation(writer, false);
    Ok(())
}

fn encode_str_list<W>(names: &[String], writer: &mut W) -> Result<(), Err>
where
    W: ByteWriter,
{
    for name in names {
        write_continuation(writer, true);
        write_str(writer, name)?;
    }
    write_continuation(writer, false);
    Ok(())
}

fn encode_dependencies<W>(
    dependencies: &[Dependency],
    ctx: &mut EncoderContext,
    writer: &mut W,
) -> Result<(), Err>
where
    W: ByteWriter,
{
    for dep in dependencies {
        write_continuation(writer, true);
        encode_attributes(&dep.attributes, ctx, writer)?;
        encode_str_list(&dep.param_names, writer)?;
        encode_str_list(&dep.dependent_names, writer)?;
        match &dep.eval_expr {
            Some(expr) => {
                writer.write_u8(1);
                write_str(writer, expr)?;
            }
            None => writer.write_u8(0),
        }
        writer.write_i32(dep.eval_index);
        writer.write_i32(dep.num_visits);
    }
    write_continuation(writer, false);
    Ok(())
}

fn encode_payload<W>(
    obj: &Object,
    pred: PredictorType,
    ctx: &mut EncoderContext,
    writer: &mut W,
) -> Result<(), Err>
where
    W: ByteWriter,
{
    let step = ctx.args.step;
    match &obj.geom {
        Geometry::Curve(crv) => {
            let length = crv.length();
            crv.knots.validate(length)?;
            writer.write_i32(crv.knots.order as i32);
            writer.write_i32(length as i32);
            writer.write_u8(crv.knots.periodic as u8);
            writer.write_u8(crv.points.pt_type.to_byte());
            encode_knot_vector(&crv.knots, step, writer)?;
            encode_ctl_points(&crv.points, pred, None, step, writer)
        }
        Geometry::Surface(srf) => {
            srf.uknots.validate(srf.ulength)?;
            srf.vknots.validate(srf.vlength)?;
            if srf.points.num_points() != srf.ulength * srf.vlength {
                return Err(Err::GeneralError("surface mesh size disagrees with lengths"));
            }
            writer.write_i32(srf.uknots.order as i32);
            writer.write_i32(srf.vknots.order as i32);
            writer.write_i32(srf.ulength as i32);
            writer.write_i32(srf.vlength as i32);
            writer.write_u8(srf.uknots.periodic as u8);
            writer.write_u8(srf.vknots.periodic as u8);
            writer.write_u8(srf.points.pt_type.to_byte());
            encode_knot_vector(&srf.uknots, step, writer)?;
            encode_knot_vector(&srf.vknots, step, writer)?;
            encode_ctl_points(
                &srf.points,
                pred,
                Some((srf.ulength, srf.vlength)),
                step,
                writer,
            )
        }
        Geometry::Trivariate(tv) => {
            let mut expected = 1_usize;
            for d in 0..3 {
                tv.knots[d].validate(tv.lengths[d])?;
                expected *= tv.lengths[d];
            }
            if tv.points.num_points() != expected {
                return Err(Err::GeneralError("trivariate mesh size disagrees with lengths"));
            }
            for d in 0..3 {
                writer.write_i32(tv.knots[d].order as i32);
            }
            for d in 0..3 {
                writer.write_i32(tv.lengths[d] as i32);
            }
            for d in 0..3 {
                writer.write_u8(tv.knots[d].periodic as u8);
            }
            writer.write_u8(tv.points.pt_type.to_byte());
            for d in 0..3 {
                encode_knot_vector(&tv.knots[d], step, writer)?;
            }
            encode_ctl_points(&tv.points, pred, None, step, writer)
        }
        Geometry::TriangularSurface(ts) => {
            ts.knots.validate(ts.length)?;
            let expected = crate::core::geometry::TriangularSurface::expected_points(ts.length);
            if ts.points.num_points() != expected {
                return Err(Err::GeneralError(
                    "triangular mesh size disagrees with length",
                ));
            }
            writer.write_i32(ts.knots.order as i32);
            writer.write_i32(ts.length as i32);
            writer.write_u8(ts.points.pt_type.to_byte());
            encode_knot_vector(&ts.knots, step, writer)?;
            encode_ctl_points(&ts.points, pred, None, step, writer)
        }
        Geometry::Multivariate(mv) => {
            let dim = mv.dim();
            if dim == 0 || mv.lengths.len() != dim {
                return Err(Err::GeneralError("multivariate without directions"));
            }
            let mut expected = 1_usize;
            for d in 0..dim {
                mv.knots[d].validate(mv.lengths[d])?;
                expected = expected.saturating_mul(mv.lengths[d]);
            }
            if mv.points.num_points() != expected {
                return Err(Err::GeneralError(
                    "multivariate mesh size disagrees with lengths",
                ));
            }
            writer.write_i32(dim as i32);
            for d in 0..dim {
                writer.write_i32(mv.knots[d].order as i32);
                writer.write_i32(mv.lengths[d] as i32);
                writer.write_u8(mv.knots[d].periodic as u8);
            }
            writer.write_u8(mv.points.pt_type.to_byte());
            for d in 0..dim {
                encode_knot_vector(&mv.knots[d], step, writer)?;
            }
            encode_ctl_points(&mv.points, pred, None, step, writer)
        }
        Geometry::PolygonMesh(polygons) => encode_polygon_mesh(polygons, step, writer),
        Geometry::Point(p) | Geometry::Vector(p) => {
            for &v in p {
                writer.write_f64(v);
            }
            Ok(())
        }
        Geometry::Plane(p) => {
            for &v in p {
                writer.write_f64(v);
            }
            Ok(())
        }
        Geometry::Matrix(m) => {
            for &v in m {
                writer.write_f64(v);
            }
            Ok(())
        }
        Geometry::CtlPt(cp) => encode_ctl_pt(cp, writer),
        Geometry::Numeric(v) => {
            writer.write_f64(*v);
            Ok(())
        }
        Geometry::StringVal(s) => write_str(writer, s),
        Geometry::Instance { of, matrix } => {
            write_str(writer, of)?;
            for &v in matrix {
                writer.write_f64(v);
            }
            Ok(())
        }
        Geometry::TrimmedSurface {
            surface,
            trim_curves,
        } => {
            if !matches!(surface.geom, Geometry::Surface(_)) {
                return Err(Err::GeneralError("trimmed surface child is not a surface"));
            }
            encode_object(surface, ctx, writer)?;
            for crv in trim_curves {
                if !matches!(crv.geom, Geometry::Curve(_)) {
                    return Err(Err::GeneralError("trim curve is not a curve"));
                }
                write_continuation(writer, true);
                encode_object(crv, ctx, writer)?;
            }
            write_continuation(writer, false);
            Ok(())
        }
        Geometry::Model { trimmed_surfaces } => {
            for srf in trimmed_surfaces {
                if !matches!(srf.geom, Geometry::TrimmedSurface { .. }) {
                    return Err(Err::GeneralError("model child is not a trimmed surface"));
                }
                write_continuation(writer, true);
                encode_object(srf, ctx, writer)?;
            }
            write_continuation(writer, false);
            Ok(())
        }
        Geometry::List(children) => {
            for child in children.borrow().iter() {
                write_continuation(writer, true);
                encode_object(child, ctx, writer)?;
            }
            write_continuation(writer, false);
            Ok(())
        }
    }
}

fn encode_ctl_pt<W>(cp: &CtlPt, writer: &mut W) -> Result<(), Err>
where
    W: ByteWriter,
{
    let expected = cp.pt_type.dim as usize + cp.pt_type.rational as usize;
    if cp.coords.len() != expected {
        return Err(Err::GeneralError("control point coordinate count mismatch"));
    }
    writer.write_u8(cp.pt_type.to_byte());
    for &v in &cp.coords {
        writer.write_f64(v);
    }
    Ok(())
}

/// Polygon vertices ride the uniform chain like curve channels; planes and
/// normals travel raw. The dynamic range covers the whole mesh so every
/// polygon shares one quantizer.
fn encode_polygon_mesh<W>(
    polygons: &[Polygon],
    step: Option<f32>,
    writer: &mut W,
) -> Result<(), Err>
where
    W: ByteWriter,
{
    let mut max = 0.0_f64;
    for poly in polygons {
        for v in &poly.vertices {
            for &c in v {
                max = max.max(c.abs());
            }
        }
    }
    let range = round_to_pow10(max);
    if step.is_some() {
        writer.write_f64(range);
    }
    let q = Quantizer::new(step, range);

    for poly in polygons {
        if poly.vertices.is_empty() {
            return Err(Err::GeneralError("polygon without vertices"));
        }
        write_continuation(writer, true);
        for &v in &poly.plane {
            writer.write_f64(v);
        }
        if let Some(normals) = &poly.normals {
            if normals.len() != poly.vertices.len() {
                return Err(Err::GeneralError("polygon normal count mismatch"));
            }
        }
        writer.write_i32(poly.vertices.len() as i32);
        for axis in 0..3 {
            let channel: Vec<f64> = poly.vertices.iter().map(|v| v[axis]).collect();
            uniform::encode_channel(&channel, 1, &q, writer)?;
        }
        match &poly.normals {
            Some(normals) => {
                writer.write_u8(1);
                for n in normals {
                    for &c in n {
                        writer.write_f64(c);
                    }
                }
            }
            None => writer.write_u8(0),
        }
    }
    write_continuation(writer, false);
    Ok(())
}
