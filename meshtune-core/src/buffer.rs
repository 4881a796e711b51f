//! Stride-addressed views over caller-owned vertex and index buffers

use crate::error::{Error, Result};
use crate::point::{Point3f, POSITION_SIZE};

/// A read-only view over an interleaved vertex stream.
///
/// Records are opaque byte blocks of `stride` bytes; the view never looks
/// inside them.
#[derive(Debug, Clone, Copy)]
pub struct VertexStream<'a> {
    data: &'a [u8],
    stride: usize,
}

impl<'a> VertexStream<'a> {
    /// Wrap `data` as a stream of `stride`-sized records.
    pub fn new(data: &'a [u8], stride: usize) -> Result<Self> {
        if stride == 0 {
            return Err(Error::ZeroStride);
        }
        if data.len() % stride != 0 {
            return Err(Error::BufferSizeMismatch {
                buffer: "vertices",
                expected: data.len() - data.len() % stride,
                actual: data.len(),
            });
        }
        Ok(Self { data, stride })
    }

    /// Number of records in the stream
    pub fn len(&self) -> usize {
        self.data.len() / self.stride
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Bytes of record `index`
    #[inline]
    pub fn record(&self, index: usize) -> &'a [u8] {
        let start = index * self.stride;
        &self.data[start..start + self.stride]
    }

    /// Iterate over all records in stream order
    pub fn records(&self) -> std::slice::ChunksExact<'a, u8> {
        self.data.chunks_exact(self.stride)
    }
}

/// A read-only view over vertex positions stored as three consecutive `f32`
/// values every `stride` bytes.
///
/// The slice must start at the first position; other attributes sharing the
/// stride are skipped. Reads are unaligned so any byte offset works.
#[derive(Debug, Clone, Copy)]
pub struct PositionStream<'a> {
    data: &'a [u8],
    stride: usize,
    vertex_count: usize,
}

impl<'a> PositionStream<'a> {
    pub fn new(data: &'a [u8], stride: usize, vertex_count: usize) -> Result<Self> {
        if stride == 0 {
            return Err(Error::ZeroStride);
        }
        if stride < POSITION_SIZE {
            return Err(Error::StrideTooSmall {
                stride,
                required: POSITION_SIZE,
            });
        }
        let required = match vertex_count {
            0 => 0,
            n => (n - 1) * stride + POSITION_SIZE,
        };
        if data.len() < required {
            return Err(Error::BufferSizeMismatch {
                buffer: "positions",
                expected: required,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            stride,
            vertex_count,
        })
    }

    /// Number of addressable positions
    pub fn len(&self) -> usize {
        self.vertex_count
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_count == 0
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Position of vertex `index`
    #[inline]
    pub fn position(&self, index: usize) -> Point3f {
        let start = index * self.stride;
        let xyz: [f32; 3] = bytemuck::pod_read_unaligned(&self.data[start..start + POSITION_SIZE]);
        Point3f::from(xyz)
    }

    /// Iterate over all positions in vertex order
    pub fn iter(&self) -> impl Iterator<Item = Point3f> + '_ {
        (0..self.vertex_count).map(move |i| self.position(i))
    }
}

/// Check that `indices` forms whole triangles referencing only vertices below
/// `vertex_count`. Returns the triangle count.
pub fn validate_indices(indices: &[u32], vertex_count: usize) -> Result<usize> {
    if indices.len() % 3 != 0 {
        return Err(Error::IndexCountNotMultipleOfThree(indices.len()));
    }
    if let Some((position, &index)) = indices
        .iter()
        .enumerate()
        .find(|&(_, &index)| index as usize >= vertex_count)
    {
        return Err(Error::IndexOutOfRange {
            index,
            position,
            vertex_count,
        });
    }
    Ok(indices.len() / 3)
}

/// Check that a destination buffer matches its source in length
pub fn check_destination(buffer: &'static str, destination: usize, source: usize) -> Result<()> {
    if destination != source {
        return Err(Error::BufferSizeMismatch {
            buffer,
            expected: source,
            actual: destination,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_vertex_stream_records() {
        let data = [1u8, 2, 3, 4, 5, 6];
        let stream = VertexStream::new(&data, 2).unwrap();
        assert_eq!(stream.len(), 3);
        assert_eq!(stream.record(1), &[3, 4]);
        assert_eq!(stream.records().count(), 3);
    }

    #[test]
    fn test_vertex_stream_rejects_bad_stride() {
        let data = [0u8; 7];
        assert_eq!(VertexStream::new(&data, 0).unwrap_err(), Error::ZeroStride);
        assert!(matches!(
            VertexStream::new(&data, 2),
            Err(Error::BufferSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_position_stream_reads_strided_positions() {
        // two records of [x, y, z, pad]
        let floats = [1.0f32, 2.0, 3.0, 9.0, 4.0, 5.0, 6.0, 9.0];
        let bytes: &[u8] = bytemuck::cast_slice(&floats);
        let positions = PositionStream::new(bytes, 16, 2).unwrap();
        let p = positions.position(1);
        assert_relative_eq!(p.x, 4.0);
        assert_relative_eq!(p.y, 5.0);
        assert_relative_eq!(p.z, 6.0);
    }

    #[test]
    fn test_position_stream_unaligned_offset() {
        let floats = [0.0f32, 7.0, 8.0, 9.0];
        let bytes: &[u8] = bytemuck::cast_slice(&floats);
        // skip the first float: positions start at byte 4
        let positions = PositionStream::new(&bytes[4..], 12, 1).unwrap();
        assert_relative_eq!(positions.position(0).z, 9.0);
    }

    #[test]
    fn test_position_stream_too_short() {
        let bytes = [0u8; 20];
        assert!(matches!(
            PositionStream::new(&bytes, 12, 2),
            Err(Error::BufferSizeMismatch { .. })
        ));
        assert!(matches!(
            PositionStream::new(&bytes, 8, 1),
            Err(Error::StrideTooSmall { .. })
        ));
    }

    #[test]
    fn test_validate_indices() {
        assert_eq!(validate_indices(&[0, 1, 2, 2, 1, 3], 4).unwrap(), 2);
        assert_eq!(validate_indices(&[], 0).unwrap(), 0);
        assert_eq!(
            validate_indices(&[0, 1], 4).unwrap_err(),
            Error::IndexCountNotMultipleOfThree(2)
        );
        assert_eq!(
            validate_indices(&[0, 1, 4], 4).unwrap_err(),
            Error::IndexOutOfRange {
                index: 4,
                position: 2,
                vertex_count: 4
            }
        );
    }
}
