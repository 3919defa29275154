/*!
Core math aliases and the serializable vector type used by shape descriptions.

This module intentionally contains no algorithms. It defines the data types exchanged
between:
- shape descriptions (declarative, serde-friendly `{x, y, z}` objects)
- the shape builder (nalgebra points/vectors handed to rapier)
- the physics world (body poses read back every frame)
*/

use nalgebra as na;
use serde::{Deserialize, Serialize};

/// Common math aliases for clarity and consistency.
pub type Vec3 = na::Vector3<f32>;
pub type Point3 = na::Point3<f32>;
pub type Quat = na::UnitQuaternion<f32>;
pub type Iso = na::Isometry3<f32>;

/// A rigid transform (isometry) in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self::new(Vec3::zeros(), Quat::identity())
    }
}

impl Transform {
    #[inline]
    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// Convert to nalgebra `Isometry3` for rapier body poses.
    #[inline]
    pub fn iso(&self) -> Iso {
        Iso::from_parts(na::Translation3::from(self.translation), self.rotation)
    }
}

/// A 3D vector as it appears in shape descriptions and entity definitions.
///
/// Semantics:
/// - Serialized as `{ "x": .., "y": .., "z": .. }`.
/// - This is a data type only; math happens on the nalgebra types it converts into.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3Def {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3Def {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const UP: Self = Self::new(0.0, 1.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<Vec3Def> for Point3 {
    fn from(v: Vec3Def) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}
impl From<&Vec3Def> for Point3 {
    fn from(v: &Vec3Def) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<Vec3Def> for Vec3 {
    fn from(v: Vec3Def) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<Vec3> for Vec3Def {
    fn from(v: Vec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<Point3> for Vec3Def {
    fn from(p: Point3) -> Self {
        Vec3Def::new(p.x, p.y, p.z)
    }
}
