//! Shape Builder: declarative [`ShapeDescription`] -> native rapier shape.
//!
//! Design notes
//! - Primitive kinds (plane, box, sphere, cylinder, capsule, cone) go through the shared
//!   cache keyed by [`ShapeDescription::cache_key`]; a key is constructed at most once.
//! - Per-instance kinds (concave, convex, heightfield) are built fresh every call and
//!   recorded in the instance table under the owner tag, replacing any previous entry.
//! - Every dimension is validated before it reaches rapier. Invalid input is an error,
//!   never a panic inside the engine.

use rapier3d::na::DMatrix;
use rapier3d::parry::shape::TriMeshFlags;
use rapier3d::prelude::*;

use crate::cache::{ShapeCache, ShapeHandle};
use crate::error::ShapeError;
use crate::owner::Owner;
use crate::shape::{ShapeDescription, ShapeKind, Triangle};
use crate::types::{Point3, Vec3, Vec3Def};

/// Owns the shape cache and turns descriptions into shapes.
#[derive(Default)]
pub struct ShapeBuilder {
    cache: ShapeCache,
}

impl ShapeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache(&self) -> &ShapeCache {
        &self.cache
    }

    /// Build (or fetch) the native shape for `desc`.
    ///
    /// `owner` is only used by per-instance kinds. An unrecognized kind or an empty concave
    /// mesh is an error and leaves the cache untouched.
    pub fn build(&mut self, desc: &ShapeDescription, owner: Owner) -> Result<ShapeHandle, ShapeError> {
        if let ShapeDescription::Unrecognized = desc {
            return Err(ShapeError::Unrecognized);
        }

        match desc.cache_key() {
            Some(key) => {
                if let Some(handle) = self.cache.get(&key) {
                    return Ok(handle);
                }
                let handle = ShapeHandle::new(native_shape(desc)?);
                log::debug!("shape cache miss, built {key}");
                Ok(self.cache.insert(key, handle))
            }
            None => {
                let mut handle = ShapeHandle::new(native_shape(desc)?);
                if let ShapeDescription::Heightfield {
                    xpts,
                    ypts,
                    xsize,
                    ysize,
                    ..
                } = desc
                {
                    let spacing = heightfield_local_scale(*xpts, *ypts, *xsize, *ysize);
                    handle = handle.with_local_scale(spacing);
                }
                if self.cache.insert_instance(owner, handle.clone()).is_some() {
                    log::debug!("replaced {} instance shape of owner {owner:#x}", desc.kind().name());
                }
                Ok(handle)
            }
        }
    }

    /// Forget the per-instance shape of `owner`. Shared entries stay.
    pub fn release(&mut self, owner: Owner) -> Option<ShapeHandle> {
        self.cache.release_instance(owner)
    }
}

/// Grid spacing of a heightfield: how far apart neighbouring samples are on X and Z.
/// The vertical axis is unscaled.
pub fn heightfield_local_scale(xpts: usize, ypts: usize, xsize: f32, ysize: f32) -> Vec3 {
    Vec3::new(
        xsize / (xpts.saturating_sub(1).max(1)) as f32,
        1.0,
        ysize / (ypts.saturating_sub(1).max(1)) as f32,
    )
}

fn positive(kind: ShapeKind, value: f32) -> Result<f32, ShapeError> {
    if !value.is_finite() {
        return Err(ShapeError::NonFinite { kind: kind.name() });
    }
    if value <= 0.0 {
        return Err(ShapeError::InvalidDimension {
            kind: kind.name(),
            value,
        });
    }
    Ok(value)
}

fn finite_points<'a>(
    kind: ShapeKind,
    points: impl IntoIterator<Item = &'a Vec3Def>,
) -> Result<Vec<Point3>, ShapeError> {
    points
        .into_iter()
        .map(|p| {
            if p.is_finite() {
                Ok(Point3::from(p))
            } else {
                Err(ShapeError::NonFinite { kind: kind.name() })
            }
        })
        .collect()
}

fn native_shape(desc: &ShapeDescription) -> Result<SharedShape, ShapeError> {
    let kind = desc.kind();
    match desc {
        ShapeDescription::Plane { normal } => {
            if !normal.is_finite() {
                return Err(ShapeError::NonFinite { kind: kind.name() });
            }
            let n = Vec3::from(*normal);
            let unit_n = UnitVector::try_new(n, 1.0e-6).ok_or(ShapeError::InvalidDimension {
                kind: kind.name(),
                value: n.norm(),
            })?;
            Ok(SharedShape::new(HalfSpace::new(unit_n)))
        }

        ShapeDescription::Cuboid {
            width,
            height,
            depth,
        } => Ok(SharedShape::cuboid(
            positive(kind, *width)? / 2.0,
            positive(kind, *height)? / 2.0,
            positive(kind, *depth)? / 2.0,
        )),

        ShapeDescription::Sphere { radius } => Ok(SharedShape::ball(positive(kind, *radius)?)),

        ShapeDescription::Cylinder {
            width,
            height,
            depth,
        } => {
            positive(kind, *depth)?;
            Ok(SharedShape::cylinder(
                positive(kind, *height)? / 2.0,
                positive(kind, *width)? / 2.0,
            ))
        }

        ShapeDescription::Capsule { radius, height } => {
            let radius = positive(kind, *radius)?;
            let height = positive(kind, *height)?;
            // Native capsules exclude the hemispherical caps from their segment.
            let segment = height - 2.0 * radius;
            if segment < 0.0 {
                return Err(ShapeError::InvalidDimension {
                    kind: kind.name(),
                    value: segment,
                });
            }
            Ok(SharedShape::capsule_y(segment / 2.0, radius))
        }

        ShapeDescription::Cone { radius, height } => Ok(SharedShape::cone(
            positive(kind, *height)? / 2.0,
            positive(kind, *radius)?,
        )),

        ShapeDescription::Concave { triangles } => trimesh(triangles),

        ShapeDescription::Convex { points } => {
            let pts = finite_points(kind, points)?;
            // The hull builder happily returns flat (massless) polyhedra.
            if !spans_volume(&pts) {
                return Err(ShapeError::DegenerateHull { points: pts.len() });
            }
            SharedShape::convex_hull(&pts).ok_or(ShapeError::DegenerateHull { points: pts.len() })
        }

        ShapeDescription::Heightfield {
            xpts,
            ypts,
            xsize,
            ysize,
            abs_max_height,
            points,
        } => {
            let (xpts, ypts) = (*xpts, *ypts);
            if xpts < 2 || ypts < 2 || xpts.checked_mul(ypts) != Some(points.len()) {
                return Err(ShapeError::HeightfieldGrid {
                    xpts,
                    ypts,
                    samples: points.len(),
                });
            }
            positive(kind, *xsize)?;
            positive(kind, *ysize)?;
            if !abs_max_height.is_finite() || points.iter().any(|h| !h.is_finite()) {
                return Err(ShapeError::NonFinite { kind: kind.name() });
            }

            let spacing = heightfield_local_scale(xpts, ypts, *xsize, *ysize);
            Ok(heightfield(xpts, ypts, points, *abs_max_height, spacing))
        }

        ShapeDescription::Unrecognized => Err(ShapeError::Unrecognized),
    }
}

/// True when the points are not all on one plane, i.e. their hull has volume.
fn spans_volume(points: &[Point3]) -> bool {
    let Some(origin) = points.first() else {
        return false;
    };
    let offsets: Vec<Vec3> = points.iter().map(|p| p - origin).collect();
    let extent = offsets.iter().map(|d| d.norm()).fold(0.0, f32::max);
    let tolerance = extent * 1.0e-5;
    if extent <= 0.0 {
        return false;
    }

    let Some(u) = offsets.iter().find(|d| d.norm() > tolerance) else {
        return false;
    };
    let u = u.normalize();
    let Some(n) = offsets
        .iter()
        .map(|d| u.cross(d))
        .find(|c| c.norm() > tolerance)
    else {
        return false;
    };
    let n = n.normalize();
    offsets.iter().any(|d| n.dot(d).abs() > tolerance)
}

fn trimesh(triangles: &[Triangle]) -> Result<SharedShape, ShapeError> {
    if triangles.is_empty() {
        return Err(ShapeError::EmptyTriangles);
    }
    let vertices = finite_points(ShapeKind::Concave, triangles.iter().flatten())?;
    let indices: Vec<[u32; 3]> = (0..triangles.len() as u32)
        .map(|t| [3 * t, 3 * t + 1, 3 * t + 2])
        .collect();

    SharedShape::trimesh_with_flags(vertices, indices, TriMeshFlags::MERGE_DUPLICATE_VERTICES)
        .map_err(|e| ShapeError::TriMesh(format!("{e:?}")))
}

/// Samples are row-major (`points[y * xpts + x]`), rows running along Z.
/// Rapier's scale is the full extent, i.e. spacing times cell count per axis.
fn heightfield(
    xpts: usize,
    ypts: usize,
    points: &[f32],
    abs_max_height: f32,
    spacing: Vec3,
) -> SharedShape {
    let heights: Vec<f32> = if abs_max_height > 0.0 {
        points
            .iter()
            .map(|h| h.clamp(-abs_max_height, abs_max_height))
            .collect()
    } else {
        points.to_vec()
    };
    let scale = Vector::new(
        spacing.x * (xpts - 1) as f32,
        spacing.y,
        spacing.z * (ypts - 1) as f32,
    );
    SharedShape::heightfield(DMatrix::from_row_slice(ypts, xpts, &heights), scale)
}
