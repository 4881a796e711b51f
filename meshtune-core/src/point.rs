//! Point and vertex types and related functionality

use bytemuck::{Pod, Zeroable};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// A 3D point with floating point coordinates
pub type Point3f = Point3<f32>;

/// A 3D vector with floating point components
pub type Vector3f = Vector3<f32>;

/// Size in bytes of a position record (three `f32` components)
pub const POSITION_SIZE: usize = std::mem::size_of::<[f32; 3]>();

/// An interleaved vertex with position, normal and texture coordinates.
///
/// This is the layout produced by typical OBJ importers; the optimizers only
/// ever look at the position, at byte offset [`Vertex::POSITION_OFFSET`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable, Serialize, Deserialize)]
#[repr(C)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub texcoord: [f32; 2],
}

impl Vertex {
    /// Byte offset of the position within the record
    pub const POSITION_OFFSET: usize = 0;

    /// Byte stride of one record
    pub const STRIDE: usize = std::mem::size_of::<Vertex>();

    pub fn new(position: [f32; 3], normal: [f32; 3], texcoord: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            texcoord,
        }
    }

    /// Vertex at `position` with a +Z normal and zero texture coordinates
    pub fn from_position(position: [f32; 3]) -> Self {
        Self::new(position, [0.0, 0.0, 1.0], [0.0, 0.0])
    }

    pub fn point(&self) -> Point3f {
        Point3f::from(self.position)
    }
}
