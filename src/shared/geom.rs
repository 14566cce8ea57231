//! Small fixed-size geometry helpers used by the geometric predictors:
//! 3-D vectors, axis-angle rotations, frame alignment and circumcircles.

use std::ops;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vec3(pub [f64; 3]);

impl Vec3 {
    pub fn zero() -> Self {
        Vec3([0.0; 3])
    }

    pub fn get(&self, i: usize) -> f64 {
        self.0[i]
    }

    pub fn dot(self, other: Self) -> f64 {
        self.0[0] * other.0[0] + self.0[1] * other.0[1] + self.0[2] * other.0[2]
    }

    pub fn cross(self, other: Self) -> Self {
        Vec3([
            self.0[1] * other.0[2] - self.0[2] * other.0[1],
            self.0[2] * other.0[0] - self.0[0] * other.0[2],
            self.0[0] * other.0[1] - self.0[1] * other.0[0],
        ])
    }

    pub fn norm(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn normalize(self) -> Self {
        let n = self.norm();
        if n == 0.0 {
            return self;
        }
        self * (1.0 / n)
    }

    /// Snaps near-zero components to exactly zero. The plane-fit normal is
    /// snapped before use so that an almost-axis-aligned plane quantizes
    /// the same way on repeated encodes.
    pub fn zero_snap(self, eps: f64) -> Self {
        let mut out = self.0;
        for v in out.iter_mut() {
            if v.abs() < eps {
                *v = 0.0;
            }
        }
        Vec3(out)
    }

    /// Rotation about the Z axis applied to the XY components; Z passes
    /// through unchanged.
    pub fn rotate_z(self, cos_t: f64, sin_t: f64) -> Self {
        Vec3([
            self.0[0] * cos_t - self.0[1] * sin_t,
            self.0[0] * sin_t + self.0[1] * cos_t,
            self.0[2],
        ])
    }
}

impl ops::Add for Vec3 {
    type Output = Vec3;
    fn add(self, other: Vec3) -> Vec3 {
        Vec3([
            self.0[0] + other.0[0],
            self.0[1] + other.0[1],
            self.0[2] + other.0[2],
        ])
    }
}

impl ops::Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, other: Vec3) -> Vec3 {
        Vec3([
            self.0[0] - other.0[0],
            self.0[1] - other.0[1],
            self.0[2] - other.0[2],
        ])
    }
}

impl ops::Mul<f64> for Vec3 {
    type Output = Vec3;
    fn mul(self, s: f64) -> Vec3 {
        Vec3([self.0[0] * s, self.0[1] * s, self.0[2] * s])
    }
}

/// A 3×3 rotation matrix, rows first.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mat3(pub [[f64; 3]; 3]);

impl Mat3 {
    pub fn identity() -> Self {
        Mat3([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])
    }

    /// Rodrigues' rotation about a unit axis.
    pub fn from_axis_angle(axis: Vec3, angle: f64) -> Self {
        let (sin_a, cos_a) = angle.sin_cos();
        let one_minus = 1.0 - cos_a;
        let [x, y, z] = axis.0;
        Mat3([
            [
                cos_a + x * x * one_minus,
                x * y * one_minus - z * sin_a,
                x * z * one_minus + y * sin_a,
            ],
            [
                y * x * one_minus + z * sin_a,
                cos_a + y * y * one_minus,
                y * z * one_minus - x * sin_a,
            ],
            [
                z * x * one_minus - y * sin_a,
                z * y * one_minus + x * sin_a,
                cos_a + z * z * one_minus,
            ],
        ])
    }

    /// The rotation taking the given unit normal onto +Z. Near-parallel
    /// normals collapse to the identity (or a half turn about X for -Z).
    pub fn align_z(normal: Vec3) -> Self {
        let z = Vec3([0.0, 0.0, 1.0]);
        let axis = normal.cross(z);
        let s = axis.norm();
        let c = normal.dot(z);
        if s < 1e-12 {
            if c >= 0.0 {
                return Mat3::identity();
            }
            return Mat3::from_axis_angle(Vec3([1.0, 0.0, 0.0]), std::f64::consts::PI);
        }
        Mat3::from_axis_angle(axis * (1.0 / s), s.atan2(c))
    }

    pub fn transpose(&self) -> Self {
        let m = &self.0;
        Mat3([
            [m[0][0], m[1][0], m[2][0]],
            [m[0][1], m[1][1], m[2][1]],
            [m[0][2], m[1][2], m[2][2]],
        ])
    }

    pub fn apply(&self, v: Vec3) -> Vec3 {
        let m = &self.0;
        Vec3([
            m[0][0] * v.0[0] + m[0][1] * v.0[1] + m[0][2] * v.0[2],
            m[1][0] * v.0[0] + m[1][1] * v.0[1] + m[1][2] * v.0[2],
            m[2][0] * v.0[0] + m[2][1] * v.0[1] + m[2][2] * v.0[2],
        ])
    }
}

/// Circumcircle of three points in the XY plane. `None` when the points are
/// collinear within the working precision.
pub fn circumcircle_xy(a: Vec3, b: Vec3, c: Vec3) -> Option<(f64, f64, f64)> {
    let (ax, ay) = (a.0[0], a.0[1]);
    let (bx, by) = (b.0[0], b.0[1]);
    let (cx, cy) = (c.0[0], c.0[1]);
    let d = 2.0 * (ax * (by - cy) + bx * (cy - ay) + cx * (ay - by));
    let span = (b - a).norm().max((c - b).norm());
    if d.abs() < 1e-12 * span * span {
        return None;
    }
    let a2 = ax * ax + ay * ay;
    let b2 = bx * bx + by * by;
    let c2 = cx * cx + cy * cy;
    let ux = (a2 * (by - cy) + b2 * (cy - ay) + c2 * (ay - by)) / d;
    let uy = (a2 * (cx - bx) + b2 * (ax - cx) + c2 * (bx - ax)) / d;
    let r = ((ax - ux).powi(2) + (ay - uy).powi(2)).sqrt();
    if r == 0.0 {
        return None;
    }
    Some((ux, uy, r))
}
