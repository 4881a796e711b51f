//! Core traits for meshtune

use crate::{buffer::PositionStream, error::Result, mesh::IndexedMesh, point::*};

/// A pass that rewrites an indexed mesh.
///
/// Implementations compute into a fresh buffer and swap it into the mesh, so
/// a failed pass leaves the mesh untouched.
pub trait MeshOptimizer {
    /// Optimize the mesh in place
    fn optimize(&self, mesh: &mut IndexedMesh) -> Result<()>;
}

/// Trait for geometry with an axis-aligned extent
pub trait Bounded {
    /// Get the bounding box of the object
    fn bounding_box(&self) -> (Point3f, Point3f);

    /// Get the center point of the object
    fn center(&self) -> Point3f {
        let (min, max) = self.bounding_box();
        Point3f::new(
            (min.x + max.x) / 2.0,
            (min.y + max.y) / 2.0,
            (min.z + max.z) / 2.0,
        )
    }

    /// Largest side of the bounding box
    fn max_extent(&self) -> f32 {
        let (min, max) = self.bounding_box();
        (max.x - min.x).max(max.y - min.y).max(max.z - min.z)
    }
}

impl Bounded for PositionStream<'_> {
    fn bounding_box(&self) -> (Point3f, Point3f) {
        if self.is_empty() {
            return (Point3f::origin(), Point3f::origin());
        }

        let first = self.position(0);
        let mut min = first;
        let mut max = first;

        for p in self.iter() {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);

            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }

        (min, max)
    }
}
