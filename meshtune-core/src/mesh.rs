//! Indexed mesh container over an opaque interleaved vertex buffer

use crate::buffer::{validate_indices, PositionStream, VertexStream};
use crate::error::{Error, Result};
use crate::point::{Point3f, POSITION_SIZE};
use crate::traits::Bounded;
use bytemuck::Pod;
use serde::{Deserialize, Serialize};

/// A triangle mesh with an interleaved vertex buffer and a `u32` index buffer.
///
/// Vertex records are `stride` bytes each. Positions are three `f32` values at
/// `position_offset` within every record; all other bytes are carried along
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedMesh {
    pub vertices: Vec<u8>,
    pub stride: usize,
    pub position_offset: usize,
    pub indices: Vec<u32>,
}

impl IndexedMesh {
    /// Create a mesh from raw parts, validating the layout and the indices
    pub fn new(
        vertices: Vec<u8>,
        stride: usize,
        position_offset: usize,
        indices: Vec<u32>,
    ) -> Result<Self> {
        let mesh = Self {
            vertices,
            stride,
            position_offset,
            indices,
        };
        mesh.validate()?;
        Ok(mesh)
    }

    /// Create a mesh from typed vertices
    pub fn from_vertices<V: Pod>(
        vertices: &[V],
        indices: Vec<u32>,
        position_offset: usize,
    ) -> Result<Self> {
        Self::new(
            bytemuck::cast_slice(vertices).to_vec(),
            std::mem::size_of::<V>(),
            position_offset,
            indices,
        )
    }

    /// Create an empty mesh with the given vertex layout
    pub fn empty(stride: usize, position_offset: usize) -> Self {
        Self {
            vertices: Vec::new(),
            stride,
            position_offset,
            indices: Vec::new(),
        }
    }

    /// Check the vertex layout and that every index addresses a vertex
    pub fn validate(&self) -> Result<()> {
        if self.stride == 0 {
            return Err(Error::ZeroStride);
        }
        if self.position_offset + POSITION_SIZE > self.stride {
            return Err(Error::StrideTooSmall {
                stride: self.stride,
                required: self.position_offset + POSITION_SIZE,
            });
        }
        let stream = VertexStream::new(&self.vertices, self.stride)?;
        validate_indices(&self.indices, stream.len())?;
        Ok(())
    }

    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        if self.stride == 0 {
            0
        } else {
            self.vertices.len() / self.stride
        }
    }

    /// Get the number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Check if the mesh is empty
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }

    /// View the vertex buffer as a stream of opaque records
    pub fn vertex_stream(&self) -> Result<VertexStream<'_>> {
        VertexStream::new(&self.vertices, self.stride)
    }

    /// Bytes of the vertex buffer starting at the first position
    pub fn position_bytes(&self) -> &[u8] {
        self.vertices.get(self.position_offset..).unwrap_or(&[])
    }

    /// View the vertex positions
    pub fn positions(&self) -> Result<PositionStream<'_>> {
        PositionStream::new(self.position_bytes(), self.stride, self.vertex_count())
    }

    /// Bounding box of the vertex positions; fails if the layout is invalid
    pub fn bounding_box(&self) -> Result<(Point3f, Point3f)> {
        Ok(self.positions()?.bounding_box())
    }

    /// Copy the vertex buffer out as typed vertices
    pub fn vertices_as<V: Pod>(&self) -> Result<Vec<V>> {
        if std::mem::size_of::<V>() != self.stride {
            return Err(Error::BufferSizeMismatch {
                buffer: "vertex type",
                expected: self.stride,
                actual: std::mem::size_of::<V>(),
            });
        }
        Ok(bytemuck::pod_collect_to_vec(&self.vertices))
    }

    /// Iterate over triangles as index triples
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
    }

    /// Clear the mesh, keeping its layout
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }
}
