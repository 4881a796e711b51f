//! Cache and overdraw analyzers

use crate::cache::simulate_misses;
use crate::rasterizer::OverdrawRasterizer;
use meshtune_core::{
    validate_indices, IndexedMesh, OverdrawStatistics, PositionStream,
    PostTransformCacheStatistics, Result,
};
use serde::{Deserialize, Serialize};

/// Replay `indices` through a cold FIFO cache of `cache_size` entries
pub fn analyze_post_transform(
    indices: &[u32],
    vertex_count: usize,
    cache_size: usize,
) -> Result<PostTransformCacheStatistics> {
    let misses = simulate_misses(indices, vertex_count, cache_size)?;
    Ok(PostTransformCacheStatistics::from_misses(
        misses,
        indices.len() / 3,
        vertex_count,
        cache_size,
    ))
}

/// Estimate the overdraw of `indices` drawn in order.
///
/// Positions are three `f32` values at the start of every
/// `position_stride` byte record.
pub fn analyze_overdraw(
    indices: &[u32],
    positions: &[u8],
    position_stride: usize,
    vertex_count: usize,
) -> Result<OverdrawStatistics> {
    let positions = PositionStream::new(positions, position_stride, vertex_count)?;
    analyze_overdraw_stream(indices, &positions)
}

/// [`analyze_overdraw`] over an existing position view
pub fn analyze_overdraw_stream(
    indices: &[u32],
    positions: &PositionStream,
) -> Result<OverdrawStatistics> {
    validate_indices(indices, positions.len())?;
    Ok(OverdrawRasterizer::new().rasterize(indices, positions))
}

/// Both statistics for one mesh
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshReport {
    pub cache: PostTransformCacheStatistics,
    pub overdraw: OverdrawStatistics,
}

/// Analyze the current index order of a mesh
pub fn analyze_mesh(mesh: &IndexedMesh, cache_size: usize) -> Result<MeshReport> {
    let cache = analyze_post_transform(&mesh.indices, mesh.vertex_count(), cache_size)?;
    let overdraw = analyze_overdraw_stream(&mesh.indices, &mesh.positions()?)?;
    Ok(MeshReport { cache, overdraw })
}
