//! Exact-duplicate vertex welding and index buffer generation
//!
//! Vertex records are compared as raw bytes: two records are merged only if
//! every byte matches. The first occurrence of each distinct record becomes
//! its canonical entry and canonical entries keep first-occurrence order.

use meshtune_core::{
    check_destination, validate_indices, Error, IndexedMesh, Result, VertexStream,
};
use rustc_hash::FxHashMap;

/// Assign every record of an unindexed vertex stream the index of its
/// canonical (first) occurrence.
///
/// `destination` receives one index per record. Returns the number of unique
/// records, which is the size the unique vertex buffer must have.
pub fn generate_index_buffer(destination: &mut [u32], vertices: &[u8], stride: usize) -> Result<usize> {
    let stream = VertexStream::new(vertices, stride)?;
    check_destination("indices", destination.len(), stream.len())?;
    if stream.len() > u32::MAX as usize {
        return Err(Error::BufferSizeMismatch {
            buffer: "vertices",
            expected: u32::MAX as usize,
            actual: stream.len(),
        });
    }

    let mut canonical: FxHashMap<&[u8], u32> =
        FxHashMap::with_capacity_and_hasher(stream.len(), Default::default());
    let mut unique_count = 0u32;

    for (slot, record) in destination.iter_mut().zip(stream.records()) {
        *slot = *canonical.entry(record).or_insert_with(|| {
            let index = unique_count;
            unique_count += 1;
            index
        });
    }

    log::debug!(
        "generate_index_buffer: {} records, {} unique",
        stream.len(),
        unique_count
    );

    Ok(unique_count as usize)
}

/// Copy the canonical occurrence of every record into a compact unique
/// vertex buffer.
///
/// `indices` must be the output of [`generate_index_buffer`] for the same
/// stream, and `destination` must hold exactly `unique_count` records.
pub fn generate_vertex_buffer(
    destination: &mut [u8],
    indices: &[u32],
    vertices: &[u8],
    stride: usize,
) -> Result<()> {
    let stream = VertexStream::new(vertices, stride)?;
    check_destination("indices", indices.len(), stream.len())?;
    if destination.len() % stride != 0 {
        return Err(Error::BufferSizeMismatch {
            buffer: "unique vertices",
            expected: destination.len() - destination.len() % stride,
            actual: destination.len(),
        });
    }

    let unique_count = destination.len() / stride;
    if let Some((position, &index)) = indices
        .iter()
        .enumerate()
        .find(|&(_, &index)| index as usize >= unique_count)
    {
        return Err(Error::IndexOutOfRange {
            index,
            position,
            vertex_count: unique_count,
        });
    }

    let mut filled = vec![false; unique_count];
    let mut filled_count = 0;

    for (&index, record) in indices.iter().zip(stream.records()) {
        let slot = index as usize;
        if !filled[slot] {
            destination[slot * stride..(slot + 1) * stride].copy_from_slice(record);
            filled[slot] = true;
            filled_count += 1;
        }
    }

    if filled_count != unique_count {
        return Err(Error::BufferSizeMismatch {
            buffer: "unique vertices",
            expected: filled_count * stride,
            actual: destination.len(),
        });
    }

    Ok(())
}

/// Build an indexed mesh from an unindexed vertex stream, merging records
/// that are byte-identical.
pub fn weld_vertices(vertices: &[u8], stride: usize, position_offset: usize) -> Result<IndexedMesh> {
    let stream = VertexStream::new(vertices, stride)?;

    let mut indices = vec![0u32; stream.len()];
    let unique_count = generate_index_buffer(&mut indices, vertices, stride)?;

    let mut unique = vec![0u8; unique_count * stride];
    generate_vertex_buffer(&mut unique, &indices, vertices, stride)?;

    IndexedMesh::new(unique, stride, position_offset, indices)
}

/// Typed convenience wrapper around [`weld_vertices`]
pub fn weld<V: bytemuck::Pod>(vertices: &[V], position_offset: usize) -> Result<IndexedMesh> {
    weld_vertices(
        bytemuck::cast_slice(vertices),
        std::mem::size_of::<V>(),
        position_offset,
    )
}

/// Merge byte-identical records of an already indexed mesh and rewrite its
/// indices to the merged buffer. Unreferenced records are kept.
pub fn weld_mesh(mesh: &IndexedMesh) -> Result<IndexedMesh> {
    let stream = mesh.vertex_stream()?;
    validate_indices(&mesh.indices, stream.len())?;

    let mut remap = vec![0u32; stream.len()];
    let unique_count = generate_index_buffer(&mut remap, &mesh.vertices, mesh.stride)?;

    let mut unique = vec![0u8; unique_count * mesh.stride];
    generate_vertex_buffer(&mut unique, &remap, &mesh.vertices, mesh.stride)?;

    let indices = mesh.indices.iter().map(|&i| remap[i as usize]).collect();
    IndexedMesh::new(unique, mesh.stride, mesh.position_offset, indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshtune_core::Vertex;

    fn expand(mesh: &IndexedMesh) -> Vec<u8> {
        let stream = mesh.vertex_stream().unwrap();
        mesh.indices
            .iter()
            .flat_map(|&i| stream.record(i as usize).iter().copied())
            .collect()
    }

    fn make_quad_soup() -> Vec<Vertex> {
        // two triangles sharing an edge, written out unindexed
        let a = Vertex::from_position([0.0, 0.0, 0.0]);
        let b = Vertex::from_position([1.0, 0.0, 0.0]);
        let c = Vertex::from_position([0.0, 1.0, 0.0]);
        let d = Vertex::from_position([1.0, 1.0, 0.0]);
        vec![a, b, c, c, b, d]
    }

    #[test]
    fn test_index_buffer_first_occurrence_order() {
        let soup = make_quad_soup();
        let mut indices = vec![0u32; soup.len()];
        let unique = generate_index_buffer(&mut indices, bytemuck::cast_slice(&soup), Vertex::STRIDE).unwrap();
        assert_eq!(unique, 4);
        assert_eq!(indices, vec![0, 1, 2, 2, 1, 3]);
    }

    #[test]
    fn test_vertex_buffer_round_trip() {
        let soup = make_quad_soup();
        let mesh = weld(&soup, Vertex::POSITION_OFFSET).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(expand(&mesh), bytemuck::cast_slice::<Vertex, u8>(&soup).to_vec());
    }

    #[test]
    fn test_no_duplicates_keeps_everything() {
        let records: Vec<u8> = (0..12).collect();
        let mut indices = vec![0u32; 4];
        let unique = generate_index_buffer(&mut indices, &records, 3).unwrap();
        assert_eq!(unique, 4);
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_exact_byte_equality_only() {
        // 0.0 and -0.0 compare equal as floats but differ in bytes
        let soup = [
            Vertex::from_position([0.0, 0.0, 0.0]),
            Vertex::from_position([-0.0, 0.0, 0.0]),
            Vertex::from_position([0.0, 0.0, 0.0]),
        ];
        let mut indices = vec![0u32; 3];
        let unique = generate_index_buffer(&mut indices, bytemuck::cast_slice(&soup), Vertex::STRIDE).unwrap();
        assert_eq!(unique, 2);
        assert_eq!(indices, vec![0, 1, 0]);
    }

    #[test]
    fn test_empty_stream() {
        let mut indices: Vec<u32> = Vec::new();
        assert_eq!(generate_index_buffer(&mut indices, &[], 4).unwrap(), 0);
        let mut unique: Vec<u8> = Vec::new();
        assert!(generate_vertex_buffer(&mut unique, &indices, &[], 4).is_ok());
    }

    #[test]
    fn test_preconditions() {
        let records = [0u8; 8];
        let mut indices = vec![0u32; 2];
        assert_eq!(generate_index_buffer(&mut indices, &records, 0).unwrap_err(), Error::ZeroStride);
        assert!(matches!(
            generate_index_buffer(&mut indices, &records, 3),
            Err(Error::BufferSizeMismatch { .. })
        ));
        let mut short = vec![0u32; 1];
        assert!(matches!(
            generate_index_buffer(&mut short, &records, 4),
            Err(Error::BufferSizeMismatch { .. })
        ));

        let mut unique = vec![0u8; 4];
        assert!(matches!(
            generate_vertex_buffer(&mut unique, &[0, 1], &records, 4),
            Err(Error::IndexOutOfRange { index: 1, .. })
        ));
        let mut oversized = vec![0u8; 12];
        assert!(matches!(
            generate_vertex_buffer(&mut oversized, &[0, 0], &records, 4),
            Err(Error::BufferSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_weld_indexed_mesh() {
        let vertices = [
            Vertex::from_position([0.0, 0.0, 0.0]),
            Vertex::from_position([1.0, 0.0, 0.0]),
            Vertex::from_position([0.0, 1.0, 0.0]),
            Vertex::from_position([1.0, 0.0, 0.0]),
            Vertex::from_position([1.0, 1.0, 0.0]),
        ];
        let mesh = IndexedMesh::from_vertices(&vertices, vec![0, 1, 2, 2, 3, 4], 0).unwrap();
        let welded = weld_mesh(&mesh).unwrap();
        assert_eq!(welded.vertex_count(), 4);
        assert_eq!(welded.indices, vec![0, 1, 2, 2, 1, 3]);
        assert_eq!(expand(&welded), expand(&mesh));
    }
}
