//! Triangle extraction from loaded mesh geometry.
//!
//! A concave collision shape can only be derived once its source mesh has finished loading.
//! The loader hands over a [`MeshGeometry`]; [`triangles_from_mesh`] flattens every face into
//! vertex triplets in the mesh's local space, ready for a `concave` shape description.

use crate::shape::Triangle;
use crate::types::{Point3, Vec3Def};

/// A renderable face referencing vertices by index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Face {
    Triangle([u32; 3]),
    /// Quad `a, b, c, d`, split along the `b`-`d` diagonal.
    Quad([u32; 4]),
}

/// Loaded mesh geometry: shared vertex list plus faces.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshGeometry {
    pub vertices: Vec<Point3>,
    pub faces: Vec<Face>,
}

impl MeshGeometry {
    pub fn new(vertices: Vec<Point3>, faces: Vec<Face>) -> Self {
        Self { vertices, faces }
    }

    /// Number of triangles [`triangles_from_mesh`] would produce, ignoring bad indices.
    pub fn triangle_count(&self) -> usize {
        self.faces
            .iter()
            .map(|f| match f {
                Face::Triangle(_) => 1,
                Face::Quad(_) => 2,
            })
            .sum()
    }
}

/// Flatten every face into triangles.
///
/// Quads `a, b, c, d` become `{a, b, d}` and `{b, c, d}`, keeping the winding of the source.
/// Faces referencing a vertex that doesn't exist are skipped.
pub fn triangles_from_mesh(mesh: &MeshGeometry) -> Vec<Triangle> {
    let vertex = |i: u32| mesh.vertices.get(i as usize).copied().map(Vec3Def::from);
    let tri = |a: u32, b: u32, c: u32| Some([vertex(a)?, vertex(b)?, vertex(c)?]);

    let mut triangles = Vec::with_capacity(mesh.triangle_count());
    for face in &mesh.faces {
        match *face {
            Face::Triangle([a, b, c]) => triangles.extend(tri(a, b, c)),
            Face::Quad([a, b, c, d]) => {
                // Both halves or neither, so a bad quad never leaves a half-face behind.
                if let (Some(first), Some(second)) = (tri(a, b, d), tri(b, c, d)) {
                    triangles.push(first);
                    triangles.push(second);
                }
            }
        }
    }
    triangles
}
