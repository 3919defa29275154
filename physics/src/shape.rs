use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_SPHERE_RADIUS;
use crate::types::Vec3Def;

/// Three vertices in the owning mesh's local space, in winding order.
pub type Triangle = [Vec3Def; 3];

/// Declarative collision volume attached to a `rigidBody` component.
///
/// Serialized with an inline `type` tag, e.g. `{ "type": "box", "width": 0.5, "height": 1, "depth": 0.5 }`.
///
/// Conventions
/// - Units are meters.
/// - Box and cylinder dimensions are full extents; the builder halves them.
/// - Capsule and cone heights are total heights including any caps.
/// - Concave, convex, and heightfield descriptions carry per-instance geometry and are
///   never shared between entities, even when numerically identical.
/// - Any unknown `type` deserializes to [`ShapeDescription::Unrecognized`] instead of failing,
///   so an entity with a malformed shape still loads (it just never gets a body).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ShapeDescription {
    /// Infinite plane (half-space) through the body origin.
    Plane {
        #[serde(default = "default_plane_normal")]
        normal: Vec3Def,
    },

    /// Oriented box with full extents along X/Y/Z.
    #[serde(rename = "box")]
    Cuboid { width: f32, height: f32, depth: f32 },

    Sphere { radius: f32 },

    /// Y-aligned cylinder. `width` is the diameter; `depth` only feeds the cache key
    /// since native cylinders are circular.
    Cylinder { width: f32, height: f32, depth: f32 },

    /// Y-aligned capsule; `height` is tip to tip.
    Capsule { radius: f32, height: f32 },

    /// Y-aligned cone; `height` is base to apex.
    Cone { radius: f32, height: f32 },

    /// Static triangle soup, usually extracted from a loaded mesh.
    Concave {
        #[serde(default)]
        triangles: Vec<Triangle>,
    },

    /// Convex hull of a point cloud.
    Convex {
        #[serde(default)]
        points: Vec<Vec3Def>,
    },

    /// Regular height grid of `xpts * ypts` samples spanning `xsize` by `ysize` meters.
    ///
    /// `points` is row-major: sample `(x, y)` lives at `points[y * xpts + x]`.
    Heightfield {
        xpts: usize,
        ypts: usize,
        xsize: f32,
        ysize: f32,
        #[serde(default, rename = "absMaxHeight")]
        abs_max_height: f32,
        #[serde(default)]
        points: Vec<f32>,
    },

    #[serde(other)]
    Unrecognized,
}

fn default_plane_normal() -> Vec3Def {
    Vec3Def::UP
}

impl Default for ShapeDescription {
    fn default() -> Self {
        Self::Sphere {
            radius: DEFAULT_SPHERE_RADIUS,
        }
    }
}

/// Discriminant of a [`ShapeDescription`], mostly for logs and error messages.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Plane,
    Box,
    Sphere,
    Cylinder,
    Capsule,
    Cone,
    Concave,
    Convex,
    Heightfield,
    Unrecognized,
}

impl ShapeKind {
    pub fn name(self) -> &'static str {
        match self {
            ShapeKind::Plane => "plane",
            ShapeKind::Box => "box",
            ShapeKind::Sphere => "sphere",
            ShapeKind::Cylinder => "cylinder",
            ShapeKind::Capsule => "capsule",
            ShapeKind::Cone => "cone",
            ShapeKind::Concave => "concave",
            ShapeKind::Convex => "convex",
            ShapeKind::Heightfield => "heightfield",
            ShapeKind::Unrecognized => "unrecognized",
        }
    }

    /// Per-instance kinds are cached by owner, never by geometry.
    pub fn is_instanced(self) -> bool {
        matches!(
            self,
            ShapeKind::Concave | ShapeKind::Convex | ShapeKind::Heightfield
        )
    }
}

impl ShapeDescription {
    pub fn kind(&self) -> ShapeKind {
        match self {
            ShapeDescription::Plane { .. } => ShapeKind::Plane,
            ShapeDescription::Cuboid { .. } => ShapeKind::Box,
            ShapeDescription::Sphere { .. } => ShapeKind::Sphere,
            ShapeDescription::Cylinder { .. } => ShapeKind::Cylinder,
            ShapeDescription::Capsule { .. } => ShapeKind::Capsule,
            ShapeDescription::Cone { .. } => ShapeKind::Cone,
            ShapeDescription::Concave { .. } => ShapeKind::Concave,
            ShapeDescription::Convex { .. } => ShapeKind::Convex,
            ShapeDescription::Heightfield { .. } => ShapeKind::Heightfield,
            ShapeDescription::Unrecognized => ShapeKind::Unrecognized,
        }
    }

    pub fn is_instanced(&self) -> bool {
        self.kind().is_instanced()
    }

    /// Whether construction has to wait for external geometry (a mesh load).
    pub fn needs_mesh(&self) -> bool {
        matches!(self, ShapeDescription::Concave { .. })
    }

    /// Deterministic key shared by every description with the same kind and parameters.
    ///
    /// Format is `<kind>_<param1>_<param2>_...` using the exact parameter values,
    /// e.g. `box_0.5_1_0.5`. Returns `None` for per-instance and unrecognized kinds,
    /// which must never land in the shared cache.
    pub fn cache_key(&self) -> Option<String> {
        let key = match self {
            ShapeDescription::Plane { normal } => {
                format!("plane_{}_{}_{}", normal.x, normal.y, normal.z)
            }
            ShapeDescription::Cuboid {
                width,
                height,
                depth,
            } => format!("box_{width}_{height}_{depth}"),
            ShapeDescription::Sphere { radius } => format!("sphere_{radius}"),
            ShapeDescription::Cylinder {
                width,
                height,
                depth,
            } => format!("cylinder_{width}_{height}_{depth}"),
            ShapeDescription::Capsule { radius, height } => format!("capsule_{radius}_{height}"),
            ShapeDescription::Cone { radius, height } => format!("cone_{radius}_{height}"),
            ShapeDescription::Concave { .. }
            | ShapeDescription::Convex { .. }
            | ShapeDescription::Heightfield { .. }
            | ShapeDescription::Unrecognized => return None,
        };
        Some(key)
    }
}
