use std::cell::Cell;

use cgmath::prelude::*;
use cgmath::{Matrix4, Quaternion, Vector3};

/// `Transform` is used to store and manipulate the position, rotation and
/// scale of an object, without respect to any hierarchy. We use a right
/// handed, y-up coordinate system where Z- is forward.
///
/// The matrix representation is composed as `M = T * S * R`: translation
/// and scale are applied in the parent's frame and rotation is applied
/// last. The matrix is cached and recomputed lazily, on the next read
/// after a property changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transform {
    position: Vector3<f32>,
    rotation: Quaternion<f32>,
    scale: Vector3<f32>,
    #[serde(skip)]
    cache: Cell<Option<Matrix4<f32>>>,
}

impl Default for Transform {
    fn default() -> Self {
        Transform {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Quaternion::one(),
            scale: Vector3::new(1.0, 1.0, 1.0),
            cache: Cell::new(None),
        }
    }
}

impl PartialEq for Transform {
    fn eq(&self, rhs: &Self) -> bool {
        self.position == rhs.position && self.rotation == rhs.rotation && self.scale == rhs.scale
    }
}

impl Transform {
    /// Creates a transform from its properties.
    pub fn new<T1, T2, T3>(position: T1, rotation: T2, scale: T3) -> Self
    where
        T1: Into<Vector3<f32>>,
        T2: Into<Quaternion<f32>>,
        T3: Into<Vector3<f32>>,
    {
        Transform {
            position: position.into(),
            rotation: rotation.into(),
            scale: scale.into(),
            cache: Cell::new(None),
        }
    }

    /// Gets the position.
    #[inline]
    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    /// Sets the position.
    #[inline]
    pub fn set_position<T: Into<Vector3<f32>>>(&mut self, position: T) {
        self.position = position.into();
        self.cache.set(None);
    }

    /// Gets the rotation.
    #[inline]
    pub fn rotation(&self) -> Quaternion<f32> {
        self.rotation
    }

    /// Sets the rotation.
    #[inline]
    pub fn set_rotation<T: Into<Quaternion<f32>>>(&mut self, rotation: T) {
        self.rotation = rotation.into();
        self.cache.set(None);
    }

    /// Gets the scale.
    #[inline]
    pub fn scale(&self) -> Vector3<f32> {
        self.scale
    }

    /// Sets the scale.
    #[inline]
    pub fn set_scale<T: Into<Vector3<f32>>>(&mut self, scale: T) {
        self.scale = scale.into();
        self.cache.set(None);
    }

    /// Returns the matrix representation, recomputing it only if a
    /// property has been touched since the last read.
    pub fn matrix(&self) -> Matrix4<f32> {
        if let Some(m) = self.cache.get() {
            return m;
        }

        // M = T * S * R
        let m = Matrix4::from_translation(self.position)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
            * Matrix4::from(self.rotation);

        self.cache.set(Some(m));
        m
    }

    /// Transforms direction from local space to transform's space.
    ///
    /// This operation is not affected by scale or position of the
    /// transform. The returned vector has the same length as direction.
    #[inline]
    pub fn transform_direction<T>(&self, v: T) -> Vector3<f32>
    where
        T: Into<Vector3<f32>>,
    {
        self.rotation * v.into()
    }

    /// Transforms vector from local space to transform's space.
    ///
    /// This operation is not affected by position of the transform, but is
    /// affected by scale. The returned vector may have a different length
    /// than vector.
    #[inline]
    pub fn transform_vector<T>(&self, v: T) -> Vector3<f32>
    where
        T: Into<Vector3<f32>>,
    {
        self.scale.mul_element_wise(self.rotation * v.into())
    }

    /// Transforms points from local space to transform's space.
    #[inline]
    pub fn transform_point<T>(&self, v: T) -> Vector3<f32>
    where
        T: Into<Vector3<f32>>,
    {
        self.scale.mul_element_wise(self.rotation * v.into()) + self.position
    }

    /// Returns the forward direction in transform's space, which is
    /// looking down the negative z-axis.
    #[inline]
    pub fn forward(&self) -> Vector3<f32> {
        self.transform_direction(Vector3::new(0.0, 0.0, -1.0))
    }

    /// Returns the right direction in transform's space, which is looking
    /// down the positive x-axis.
    #[inline]
    pub fn right(&self) -> Vector3<f32> {
        self.transform_direction(Vector3::new(1.0, 0.0, 0.0))
    }

    /// Returns the up direction in transform's space, which is looking
    /// down the positive y-axis.
    #[inline]
    pub fn up(&self) -> Vector3<f32> {
        self.transform_direction(Vector3::new(0.0, 1.0, 0.0))
    }
}
