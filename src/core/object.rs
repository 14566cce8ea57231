//! The geometric object tree the codec serializes.

use std::cell::RefCell;
use std::rc::Rc;

use super::bit_coder::{ByteReader, ByteWriter};
use super::geometry::{
    CtlPt, Curve, Multivariate, Polygon, Surface, TriangularSurface, Trivariate,
};
use crate::error::Err;

/// Axis-aligned bounding box of an object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BBox {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

/// A generically serialized attribute record. The codec does not interpret
/// values; it only preserves them.
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: AttrValue,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    None,
    Int(i32),
    Real(f64),
    Uv([f64; 2]),
    Str(String),
    /// attributes may embed whole sub-objects; these recurse through the
    /// object walker on both sides.
    Obj(Rc<Object>),
    /// process-local; never written to the stream.
    Ptr,
    /// process-local; never written to the stream.
    RefPtr,
}

impl AttrValue {
    pub(crate) fn type_tag(&self) -> u8 {
        match self {
            AttrValue::None => 0,
            AttrValue::Int(_) => 1,
            AttrValue::Real(_) => 2,
            AttrValue::Uv(_) => 3,
            AttrValue::Str(_) => 4,
            AttrValue::Obj(_) => 5,
            AttrValue::Ptr => 6,
            AttrValue::RefPtr => 7,
        }
    }
}

/// A generically serialized object-dependency record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dependency {
    pub attributes: Vec<Attribute>,
    pub param_names: Vec<String>,
    pub dependent_names: Vec<String>,
    pub eval_expr: Option<String>,
    pub eval_index: i32,
    pub num_visits: i32,
}

impl Dependency {
    pub fn num_params(&self) -> usize {
        self.param_names.len()
    }
}

/// One node of the scene's object tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Object {
    pub name: Option<String>,
    pub bbox: Option<BBox>,
    pub count: Option<i32>,
    pub tags: Option<i32>,
    pub attributes: Vec<Attribute>,
    pub dependencies: Vec<Dependency>,
    pub geom: Geometry,
}

impl Object {
    pub fn new(geom: Geometry) -> Self {
        Self {
            name: None,
            bbox: None,
            count: None,
            tags: None,
            attributes: Vec::new(),
            dependencies: Vec::new(),
            geom,
        }
    }

    pub fn with_name(geom: Geometry, name: impl Into<String>) -> Self {
        let mut obj = Self::new(geom);
        obj.name = Some(name.into());
        obj
    }

    pub fn kind(&self) -> ObjectKind {
        self.geom.kind()
    }
}

/// The closed sum of geometry payloads. Every dispatch over this type is an
/// exhaustive `match`, so a new kind is a compile error until handled.
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    Curve(Curve),
    Surface(Surface),
    Trivariate(Trivariate),
    TriangularSurface(TriangularSurface),
    Multivariate(Multivariate),
    TrimmedSurface {
        surface: Rc<Object>,
        trim_curves: Vec<Rc<Object>>,
    },
    Model {
        trimmed_surfaces: Vec<Rc<Object>>,
    },
    PolygonMesh(Vec<Polygon>),
    Point([f64; 3]),
    Vector([f64; 3]),
    Plane([f64; 4]),
    Matrix([f64; 16]),
    CtlPt(CtlPt),
    Numeric(f64),
    StringVal(String),
    Instance {
        of: String,
        matrix: [f64; 16],
    },
    /// The scene's heterogeneous container. Interior mutability is what
    /// makes a self-referencing list constructible at all; the encoder
    /// detects and rejects such lists.
    List(RefCell<Vec<Rc<Object>>>),
}

impl Geometry {
    pub fn list(children: Vec<Rc<Object>>) -> Self {
        Geometry::List(RefCell::new(children))
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            Geometry::Curve(_) => ObjectKind::Curve,
            Geometry::Surface(_) => ObjectKind::Surface,
            Geometry::Trivariate(_) => ObjectKind::Trivariate,
            Geometry::TriangularSurface(_) => ObjectKind::TriangularSurface,
            Geometry::Multivariate(_) => ObjectKind::Multivariate,
            Geometry::TrimmedSurface { .. } => ObjectKind::TrimmedSurface,
            Geometry::Model { .. } => ObjectKind::Model,
            Geometry::PolygonMesh(_) => ObjectKind::PolygonMesh,
            Geometry::Point(_) => ObjectKind::Point,
            Geometry::Vector(_) => ObjectKind::Vector,
            Geometry::Plane(_) => ObjectKind::Plane,
            Geometry::Matrix(_) => ObjectKind::Matrix,
            Geometry::CtlPt(_) => ObjectKind::CtlPt,
            Geometry::Numeric(_) => ObjectKind::Numeric,
            Geometry::StringVal(_) => ObjectKind::StringVal,
            Geometry::Instance { .. } => ObjectKind::Instance,
            Geometry::List(_) => ObjectKind::List,
        }
    }
}

/// Wire ids of the object kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Curve,
    Surface,
    Trivariate,
    TriangularSurface,
    Multivariate,
    TrimmedSurface,
    Model,
    PolygonMesh,
    Point,
    Vector,
    Plane,
    Matrix,
    CtlPt,
    Numeric,
    StringVal,
    Instance,
    List,
}

impl ObjectKind {
    pub(crate) fn get_id(&self) -> u8 {
        match self {
            ObjectKind::Curve => 1,
            ObjectKind::Surface => 2,
            ObjectKind::Trivariate => 3,
            ObjectKind::TriangularSurface => 4,
            ObjectKind::Multivariate => 5,
            ObjectKind::TrimmedSurface => 6,
            ObjectKind::Model => 7,
            ObjectKind::PolygonMesh => 8,
            ObjectKind::Point => 9,
            ObjectKind::Vector => 10,
            ObjectKind::Plane => 11,
            ObjectKind::Matrix => 12,
            ObjectKind::CtlPt => 13,
            ObjectKind::Numeric => 14,
            ObjectKind::StringVal => 15,
            ObjectKind::Instance => 16,
            ObjectKind::List => 17,
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
        let out = match id {
            1 => ObjectKind::Curve,
            2 => ObjectKind::Surface,
            3 => ObjectKind::Trivariate,
            4 => ObjectKind::TriangularSurface,
            5 => ObjectKind::Multivariate,
            6 => ObjectKind::TrimmedSurface,
            7 => ObjectKind::Model,
            8 => ObjectKind::PolygonMesh,
            9 => ObjectKind::Point,
            10 => ObjectKind::Vector,
            11 => ObjectKind::Plane,
            12 => ObjectKind::Matrix,
            13 => ObjectKind::CtlPt,
            14 => ObjectKind::Numeric,
            15 => ObjectKind::StringVal,
            16 => ObjectKind::Instance,
            17 => ObjectKind::List,
            _ => return Err(Err::StreamCorrupted("unknown object kind byte")),
        };
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_byte_roundtrip() {
        let kinds = [
            ObjectKind::Curve,
            ObjectKind::Surface,
            ObjectKind::Trivariate,
            ObjectKind::TriangularSurface,
            ObjectKind::Multivariate,
            ObjectKind::TrimmedSurface,
            ObjectKind::Model,
            ObjectKind::PolygonMesh,
            ObjectKind::Point,
            ObjectKind::Vector,
            ObjectKind::Plane,
            ObjectKind::Matrix,
            ObjectKind::CtlPt,
            ObjectKind::Numeric,
            ObjectKind::StringVal,
            ObjectKind::Instance,
            ObjectKind::List,
        ];
        for kind in kinds {
            let mut buffer = Vec::new();
            kind.write_to(&mut buffer);
            let mut reader = buffer.into_iter();
            assert_eq!(ObjectKind::read_from(&mut reader).unwrap(), kind);
        }
        let mut reader = vec![0_u8].into_iter();
        assert!(ObjectKind::read_from(&mut reader).is_err());
    }

    #[test]
    fn a_list_can_be_made_to_contain_itself() {
        let list = Rc::new(Object::new(Geometry::list(Vec::new())));
        if let Geometry::List(children) = &list.geom {
            children.borrow_mut().push(Rc::clone(&list));
        }
        if let Geometry::List(children) = &list.geom {
            assert!(Rc::ptr_eq(&children.borrow()[0], &list));
        }
        // break the cycle so the test does not leak
        if let Geometry::List(children) = &list.geom {
            children.borrow_mut().clear();
        }
    }
}
