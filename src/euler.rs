//! Conversions between euler angles and quaternion/matrix rotation
//! representations.
//!
//! Euler angles describe a rotation as three elemental rotations, one
//! about each principal axis. The sequence in which they are composed is
//! given as a `RotationOrder`, and the composition is either _intrinsic_
//! (each step rotates about the axes of the already-rotated frame) or
//! _extrinsic_ (each step rotates about the fixed world axes).
//!
//! Matrices are column major, like cgmath.

use std::fmt;
use std::str::FromStr;

use cgmath::prelude::*;
use cgmath::{Matrix3, Quaternion, Rad, Vector3};

use errors::{Error, Result};

/// One of the three principal axes of rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// The fixed world unit vector of this axis.
    #[inline]
    pub fn unit(self) -> Vector3<f32> {
        match self {
            Axis::X => Vector3::new(1.0, 0.0, 0.0),
            Axis::Y => Vector3::new(0.0, 1.0, 0.0),
            Axis::Z => Vector3::new(0.0, 0.0, 1.0),
        }
    }

    /// Picks the component of `v` that belongs to this axis.
    #[inline]
    pub fn component(self, v: Vector3<f32>) -> f32 {
        match self {
            Axis::X => v.x,
            Axis::Y => v.y,
            Axis::Z => v.z,
        }
    }
}

/// The sequence in which the three elemental rotations are composed. All
/// 6 permutations of the axes are valid orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RotationOrder {
    XYZ,
    XZY,
    YXZ,
    YZX,
    ZXY,
    ZYX,
}

impl RotationOrder {
    /// All possible rotation orders in 3D space.
    pub const ALL: [RotationOrder; 6] = [
        RotationOrder::XYZ,
        RotationOrder::XZY,
        RotationOrder::YXZ,
        RotationOrder::YZX,
        RotationOrder::ZXY,
        RotationOrder::ZYX,
    ];

    /// The axes in composition sequence.
    #[inline]
    pub fn axes(self) -> [Axis; 3] {
        match self {
            RotationOrder::XYZ => [Axis::X, Axis::Y, Axis::Z],
            RotationOrder::XZY => [Axis::X, Axis::Z, Axis::Y],
            RotationOrder::YXZ => [Axis::Y, Axis::X, Axis::Z],
            RotationOrder::YZX => [Axis::Y, Axis::Z, Axis::X],
            RotationOrder::ZXY => [Axis::Z, Axis::X, Axis::Y],
            RotationOrder::ZYX => [Axis::Z, Axis::Y, Axis::X],
        }
    }

    /// The same permutation read backwards.
    #[inline]
    pub fn reversed(self) -> RotationOrder {
        match self {
            RotationOrder::XYZ => RotationOrder::ZYX,
            RotationOrder::XZY => RotationOrder::YZX,
            RotationOrder::YXZ => RotationOrder::ZXY,
            RotationOrder::YZX => RotationOrder::XZY,
            RotationOrder::ZXY => RotationOrder::YXZ,
            RotationOrder::ZYX => RotationOrder::XYZ,
        }
    }
}

impl Default for RotationOrder {
    fn default() -> Self {
        RotationOrder::ZXY
    }
}

impl fmt::Display for RotationOrder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let v = match *self {
            RotationOrder::XYZ => "XYZ",
            RotationOrder::XZY => "XZY",
            RotationOrder::YXZ => "YXZ",
            RotationOrder::YZX => "YZX",
            RotationOrder::ZXY => "ZXY",
            RotationOrder::ZYX => "ZYX",
        };
        write!(f, "{}", v)
    }
}

impl FromStr for RotationOrder {
    type Err = Error;

    /// Parses a rotation order, case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "XYZ" => Ok(RotationOrder::XYZ),
            "XZY" => Ok(RotationOrder::XZY),
            "YXZ" => Ok(RotationOrder::YXZ),
            "YZX" => Ok(RotationOrder::YZX),
            "ZXY" => Ok(RotationOrder::ZXY),
            "ZYX" => Ok(RotationOrder::ZYX),
            _ => Err(Error::InvalidRotationOrder(s.into())),
        }
    }
}

/// Converts euler angles in radians to a rotation quaternion.
///
/// The elemental rotations are composed sequentially, each step rotating
/// the accumulated result about the named fixed world axis. If `extrinsic`
/// the given order is reversed before iterating, which yields rotations
/// around the world axes; otherwise the rotation is intrinsic with respect
/// to the given order.
pub fn to_quat(radians: Vector3<f32>, order: RotationOrder, extrinsic: bool) -> Quaternion<f32> {
    let order = if extrinsic { order.reversed() } else { order };

    let mut result = Quaternion::one();
    for &axis in &order.axes() {
        result = result * Quaternion::from_axis_angle(axis.unit(), Rad(axis.component(radians)));
    }

    result
}

/// Converts euler angles in radians to the equivalent 3x3 rotation matrix.
#[inline]
pub fn to_mat3(radians: Vector3<f32>, order: RotationOrder, extrinsic: bool) -> Matrix3<f32> {
    Matrix3::from(to_quat(radians, order, extrinsic))
}

/// Converts a quaternion to euler angles as radians.
///
/// This is a best-effort inverse of `to_quat`; at gimbal lock (the middle
/// angle at +-90 degrees) the decomposition is not unique and one of the
/// valid solutions is picked.
#[inline]
pub fn from_quat(rotation: Quaternion<f32>, order: RotationOrder, extrinsic: bool) -> Vector3<f32> {
    from_mat3(Matrix3::from(rotation), order, extrinsic)
}

/// Converts a 3x3 rotation matrix to euler angles as radians.
///
/// This is a best-effort inverse of `to_mat3`; at gimbal lock (the middle
/// angle at +-90 degrees) the decomposition is not unique and one of the
/// valid solutions is picked.
pub fn from_mat3(mat: Matrix3<f32>, order: RotationOrder, extrinsic: bool) -> Vector3<f32> {
    let order = if extrinsic { order.reversed() } else { order };

    match order {
        RotationOrder::XYZ => from_mat3_xyz(&mat),
        RotationOrder::XZY => from_mat3_xzy(&mat),
        RotationOrder::YXZ => from_mat3_yxz(&mat),
        RotationOrder::YZX => from_mat3_yzx(&mat),
        RotationOrder::ZXY => from_mat3_zxy(&mat),
        RotationOrder::ZYX => from_mat3_zyx(&mat),
    }
}

// Clamps the atan2 argument of the middle angle against floating point
// drift pushing it outside [-1, 1], which would produce NaN at the gimbal
// lock boundaries.
#[inline]
fn guarded(v: f32) -> f32 {
    (1.0 - v * v).max(0.0).sqrt()
}

fn from_mat3_xyz(m: &Matrix3<f32>) -> Vector3<f32> {
    Vector3::new(
        (-m[2][1]).atan2(m[2][2]),
        m[2][0].atan2(guarded(m[2][0])),
        (-m[1][0]).atan2(m[0][0]),
    )
}

fn from_mat3_xzy(m: &Matrix3<f32>) -> Vector3<f32> {
    Vector3::new(
        m[1][2].atan2(m[1][1]),
        m[2][0].atan2(m[0][0]),
        (-m[1][0]).atan2(guarded(m[1][0])),
    )
}

fn from_mat3_yxz(m: &Matrix3<f32>) -> Vector3<f32> {
    Vector3::new(
        (-m[2][1]).atan2(guarded(m[2][1])),
        m[2][0].atan2(m[2][2]),
        m[0][1].atan2(m[1][1]),
    )
}

fn from_mat3_yzx(m: &Matrix3<f32>) -> Vector3<f32> {
    Vector3::new(
        (-m[2][1]).atan2(m[1][1]),
        (-m[0][2]).atan2(m[0][0]),
        m[0][1].atan2(guarded(m[0][1])),
    )
}

fn from_mat3_zxy(m: &Matrix3<f32>) -> Vector3<f32> {
    Vector3::new(
        m[1][2].atan2(guarded(m[1][2])),
        (-m[0][2]).atan2(m[2][2]),
        (-m[1][0]).atan2(m[1][1]),
    )
}

fn from_mat3_zyx(m: &Matrix3<f32>) -> Vector3<f32> {
    Vector3::new(
        m[1][2].atan2(m[2][2]),
        (-m[0][2]).atan2(guarded(m[0][2])),
        m[0][1].atan2(m[0][0]),
    )
}
