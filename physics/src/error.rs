use thiserror::Error;

/// Why a shape description could not be turned into a native collision shape.
///
/// None of these are fatal for the owning entity: callers treat them as "skip body
/// creation" and keep the entity alive without physics.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShapeError {
    #[error("unrecognized shape kind")]
    Unrecognized,

    #[error("concave shape has no triangles")]
    EmptyTriangles,

    #[error("{kind} shape has a non-finite parameter")]
    NonFinite { kind: &'static str },

    #[error("{kind} shape has an invalid dimension {value}")]
    InvalidDimension { kind: &'static str, value: f32 },

    #[error("convex hull of {points} points is degenerate")]
    DegenerateHull { points: usize },

    #[error("heightfield grid {xpts}x{ypts} does not match {samples} samples")]
    HeightfieldGrid {
        xpts: usize,
        ypts: usize,
        samples: usize,
    },

    #[error("triangle mesh rejected: {0}")]
    TriMesh(String),
}

/// Why a rigid body could not be constructed or addressed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BodyError {
    #[error("invalid mass {0}; expected a finite value >= 0")]
    InvalidMass(f32),

    #[error("invalid material (friction {friction}, restitution {restitution})")]
    InvalidMaterial { friction: f32, restitution: f32 },

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error("body is not registered with this physics world")]
    UnknownBody,
}
