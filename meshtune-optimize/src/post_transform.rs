//! Post-transform vertex cache optimization
//!
//! Triangles are emitted in fans around one vertex at a time. The FIFO cache
//! is tracked with insertion timestamps: a vertex inserted at time `t` stays
//! cached while `time - t <= cache_size`. The next fan vertex is the oldest
//! neighbor that remains cached until all of its live triangles are emitted;
//! at a dead end the most recently referenced vertex with live triangles is
//! used, then the first live vertex in input order. Each vertex is fanned at
//! most once, so the pass runs in near-linear time regardless of valence.

use crate::cache::FifoCache;
use meshtune_core::{
    check_destination, validate_indices, Clusters, Error, IndexedMesh, MeshOptimizer, Result,
    DEFAULT_CACHE_SIZE,
};
use priority_queue::PriorityQueue;
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use std::hash::BuildHasherDefault;

type DeadEndQueue = PriorityQueue<u32, u64, BuildHasherDefault<FxHasher>>;

/// Configuration for the post-transform optimizer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PostTransformConfig {
    /// Simulated FIFO cache size
    pub cache_size: usize,
    /// A cluster is closed once the misses since its start reach
    /// `cluster_miss_factor * cache_size`
    pub cluster_miss_factor: f32,
}

impl Default for PostTransformConfig {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_CACHE_SIZE,
            cluster_miss_factor: 2.0,
        }
    }
}

impl PostTransformConfig {
    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size;
        self
    }

    pub fn with_cluster_miss_factor(mut self, factor: f32) -> Self {
        self.cluster_miss_factor = factor;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_size < 3 {
            return Err(Error::InvalidCacheSize(self.cache_size));
        }
        if !self.cluster_miss_factor.is_finite() || self.cluster_miss_factor <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "cluster miss factor must be positive, got {}",
                self.cluster_miss_factor
            )));
        }
        Ok(())
    }

    fn cluster_miss_budget(&self) -> usize {
        ((self.cluster_miss_factor * self.cache_size as f32).ceil() as usize).max(1)
    }
}

/// Offsets are stored as `u32`
fn check_index_count(count: usize) -> Result<()> {
    if count > u32::MAX as usize {
        return Err(Error::BufferSizeMismatch {
            buffer: "indices",
            expected: u32::MAX as usize,
            actual: count,
        });
    }
    Ok(())
}

/// Vertex to triangle adjacency in compressed rows, triangles in input order
struct Adjacency {
    offsets: Vec<u32>,
    triangles: Vec<u32>,
}

impl Adjacency {
    /// Build the adjacency and return it with the valence of every vertex
    fn build(indices: &[u32], vertex_count: usize) -> (Self, Vec<u32>) {
        let mut valence = vec![0u32; vertex_count];
        for &vertex in indices {
            valence[vertex as usize] += 1;
        }

        let mut offsets = Vec::with_capacity(vertex_count + 1);
        let mut total = 0u32;
        offsets.push(0);
        for &count in &valence {
            total += count;
            offsets.push(total);
        }

        let mut fill = offsets[..vertex_count].to_vec();
        let mut triangles = vec![0u32; indices.len()];
        for (triangle, corners) in indices.chunks_exact(3).enumerate() {
            for &vertex in corners {
                let slot = &mut fill[vertex as usize];
                triangles[*slot as usize] = triangle as u32;
                *slot += 1;
            }
        }

        (Self { offsets, triangles }, valence)
    }

    #[inline]
    fn triangles(&self, vertex: u32) -> &[u32] {
        let v = vertex as usize;
        &self.triangles[self.offsets[v] as usize..self.offsets[v + 1] as usize]
    }
}

/// Vertex cache optimizer.
///
/// Reorders triangles (keeping each triangle's winding) to minimize misses in
/// a FIFO cache of `cache_size` entries, optionally splitting the result into
/// locality clusters for the overdraw pass. The result never has more misses
/// than the input order.
#[derive(Debug, Clone, Default)]
pub struct PostTransformOptimizer {
    pub config: PostTransformConfig,
}

impl PostTransformOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PostTransformConfig) -> Self {
        Self { config }
    }

    /// Reorder `indices` into `destination`, filling `clusters` with the
    /// start offsets of locality clusters when given.
    pub fn optimize_indices(
        &self,
        destination: &mut [u32],
        indices: &[u32],
        vertex_count: usize,
        clusters: Option<&mut Clusters>,
    ) -> Result<()> {
        self.config.validate()?;
        check_index_count(indices.len())?;
        let triangle_count = validate_indices(indices, vertex_count)?;
        check_destination("destination", destination.len(), indices.len())?;

        let mut clusters = clusters;
        if let Some(clusters) = clusters.as_deref_mut() {
            clusters.clear();
        }
        if triangle_count == 0 {
            return Ok(());
        }

        self.emit_fans(destination, indices, vertex_count);

        let mut cache = FifoCache::new(self.config.cache_size, vertex_count)?;
        let input_misses = cache.replay(indices);
        cache.clear();
        let mut total_misses = cache.replay(destination);
        if total_misses > input_misses {
            log::debug!(
                "optimize_post_transform: reorder has {} misses against {} in input order, keeping input",
                total_misses,
                input_misses
            );
            destination.copy_from_slice(indices);
            total_misses = input_misses;
        }

        if let Some(clusters) = clusters.as_deref_mut() {
            cut_clusters(destination, &mut cache, self.config.cluster_miss_budget(), clusters);
        }

        log::debug!(
            "optimize_post_transform: {} triangles, {} misses, ACMR {:.3}, {} clusters",
            triangle_count,
            total_misses,
            total_misses as f32 / triangle_count as f32,
            clusters.as_deref().map_or(0, |c| c.len())
        );

        Ok(())
    }

    /// Write every triangle of `indices` to `destination` in fan order
    fn emit_fans(&self, destination: &mut [u32], indices: &[u32], vertex_count: usize) {
        let cache_size = self.config.cache_size;
        let (adjacency, mut live) = Adjacency::build(indices, vertex_count);

        let mut emitted = vec![false; indices.len() / 3];
        let mut inserted_at = vec![0usize; vertex_count];
        let mut time = cache_size + 1;

        let mut dead_ends: DeadEndQueue =
            PriorityQueue::with_capacity_and_hasher(vertex_count.min(indices.len()), Default::default());
        let mut reference = 0u64;
        let mut cursor = 0usize;

        let mut candidates: Vec<u32> = Vec::new();
        let mut written = 0usize;
        let mut fan = indices.first().copied();

        while let Some(center) = fan {
            candidates.clear();

            for &triangle in adjacency.triangles(center) {
                let t = triangle as usize;
                if emitted[t] {
                    continue;
                }
                emitted[t] = true;

                let corners = &indices[t * 3..t * 3 + 3];
                destination[written..written + 3].copy_from_slice(corners);
                written += 3;

                for &vertex in corners {
                    let v = vertex as usize;
                    live[v] -= 1;
                    candidates.push(vertex);
                    reference += 1;
                    dead_ends.push(vertex, reference);
                    if time - inserted_at[v] > cache_size {
                        inserted_at[v] = time;
                        time += 1;
                    }
                }
            }

            fan = next_fan(&candidates, &live, &inserted_at, time, cache_size)
                .or_else(|| pop_dead_end(&mut dead_ends, &live))
                .or_else(|| next_live_in_input(indices, &live, &mut cursor));
        }

        debug_assert_eq!(written, indices.len());
    }
}

/// Oldest candidate whose live triangles can all be emitted before it is
/// evicted; any candidate with live triangles otherwise
fn next_fan(
    candidates: &[u32],
    live: &[u32],
    inserted_at: &[usize],
    time: usize,
    cache_size: usize,
) -> Option<u32> {
    let mut best: Option<(u32, usize)> = None;
    for &vertex in candidates {
        let v = vertex as usize;
        if live[v] == 0 {
            continue;
        }
        // each further triangle inserts at most two new vertices
        let age = time - inserted_at[v];
        let priority = if age + 2 * live[v] as usize <= cache_size { age } else { 0 };
        if best.map_or(true, |(_, current)| priority > current) {
            best = Some((vertex, priority));
        }
    }
    best.map(|(vertex, _)| vertex)
}

/// Most recently referenced vertex that still has live triangles
fn pop_dead_end(dead_ends: &mut DeadEndQueue, live: &[u32]) -> Option<u32> {
    while let Some((vertex, _)) = dead_ends.pop() {
        if live[vertex as usize] > 0 {
            return Some(vertex);
        }
    }
    None
}

fn next_live_in_input(indices: &[u32], live: &[u32], cursor: &mut usize) -> Option<u32> {
    while *cursor < indices.len() {
        let vertex = indices[*cursor];
        if live[vertex as usize] > 0 {
            return Some(vertex);
        }
        *cursor += 1;
    }
    None
}

/// Start a cluster at every triangle with no cached vertex and whenever the
/// misses since the last start reach `budget`
fn cut_clusters(order: &[u32], cache: &mut FifoCache, budget: usize, clusters: &mut Clusters) {
    cache.clear();
    clusters.push(0);
    let mut misses = 0usize;

    for (triangle, corners) in order.chunks_exact(3).enumerate() {
        let cold = !corners.iter().any(|&v| cache.contains(v));
        if triangle > 0 && (cold || misses >= budget) {
            clusters.push((triangle * 3) as u32);
            misses = 0;
        }
        misses += cache.access_triangle(corners);
    }
}

impl MeshOptimizer for PostTransformOptimizer {
    fn optimize(&self, mesh: &mut IndexedMesh) -> Result<()> {
        let mut result = vec![0u32; mesh.indices.len()];
        self.optimize_indices(&mut result, &mesh.indices, mesh.vertex_count(), None)?;
        mesh.indices = result;
        Ok(())
    }
}

/// Reorder triangles for the post-transform cache.
///
/// `destination` must not alias `indices`. When `clusters` is given it is
/// overwritten with the start offsets of the locality clusters of the result.
pub fn optimize_post_transform(
    destination: &mut [u32],
    indices: &[u32],
    vertex_count: usize,
    cache_size: usize,
    clusters: Option<&mut Clusters>,
) -> Result<()> {
    let config = PostTransformConfig::default().with_cache_size(cache_size);
    PostTransformOptimizer::with_config(config).optimize_indices(destination, indices, vertex_count, clusters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::simulate_misses;

    fn make_strip(quads: u32) -> (Vec<u32>, usize) {
        // a row of quads: top vertices 0..=quads, bottom quads+1..
        let stride = quads + 1;
        let mut indices = Vec::new();
        for x in 0..quads {
            let (tl, tr) = (x, x + 1);
            let (bl, br) = (stride + x, stride + x + 1);
            indices.extend_from_slice(&[tl, bl, tr, tr, bl, br]);
        }
        (indices, (stride * 2) as usize)
    }

    fn make_grid(n: u32) -> (Vec<u32>, usize) {
        let side = n + 1;
        let mut indices = Vec::new();
        for y in 0..n {
            for x in 0..n {
                let tl = y * side + x;
                let bl = tl + side;
                indices.extend_from_slice(&[tl, bl, tl + 1, tl + 1, bl, bl + 1]);
            }
        }
        (indices, (side * side) as usize)
    }

    fn sorted_triangles(indices: &[u32]) -> Vec<[u32; 3]> {
        let mut triangles: Vec<[u32; 3]> = indices
            .chunks_exact(3)
            .map(|t| {
                let mut t = [t[0], t[1], t[2]];
                t.sort();
                t
            })
            .collect();
        triangles.sort();
        triangles
    }

    #[test]
    fn test_config_defaults() {
        let config = PostTransformConfig::default();
        assert_eq!(config.cache_size, 24);
        assert_eq!(config.cluster_miss_budget(), 48);
        assert!(config.validate().is_ok());
        assert!(config.with_cache_size(2).validate().is_err());
        assert!(config.with_cluster_miss_factor(0.0).validate().is_err());
    }

    #[test]
    fn test_next_fan_prefers_oldest_surviving_vertex() {
        let live = [1, 1, 20, 0];
        // vertex 0 inserted at 5, vertex 1 at 8, vertex 2 at 2, time 10
        let inserted_at = [5, 8, 2, 9];
        assert_eq!(next_fan(&[1, 0, 2, 3], &live, &inserted_at, 10, 8), Some(0));
        // nothing fits the window: first candidate with live triangles
        assert_eq!(next_fan(&[3, 2, 1], &live, &inserted_at, 10, 3), Some(2));
        assert_eq!(next_fan(&[3], &live, &inserted_at, 10, 8), None);
    }

    #[test]
    fn test_preserves_triangles_and_winding() {
        let (indices, vertex_count) = make_strip(10);
        let mut result = vec![0u32; indices.len()];
        optimize_post_transform(&mut result, &indices, vertex_count, 16, None).unwrap();
        assert_eq!(sorted_triangles(&result), sorted_triangles(&indices));

        let originals: Vec<&[u32]> = indices.chunks_exact(3).collect();
        for triangle in result.chunks_exact(3) {
            assert!(originals.contains(&triangle), "winding changed for {:?}", triangle);
        }
    }

    #[test]
    fn test_single_triangle() {
        let indices = [2u32, 0, 1];
        let mut result = [0u32; 3];
        let mut clusters = Clusters::new();
        optimize_post_transform(&mut result, &indices, 3, 24, Some(&mut clusters)).unwrap();
        assert_eq!(result, indices);
        assert_eq!(clusters.offsets(), &[0]);
    }

    #[test]
    fn test_empty_input() {
        let mut clusters = Clusters::from_offsets(vec![0, 3]);
        let mut result: Vec<u32> = Vec::new();
        optimize_post_transform(&mut result, &[], 0, 24, Some(&mut clusters)).unwrap();
        assert!(clusters.is_empty());
    }

    #[test]
    fn test_improves_over_reversed_interleaving() {
        // emit the strip alternating from both ends so no order is reused
        let (indices, vertex_count) = make_strip(40);
        let triangles: Vec<&[u32]> = indices.chunks_exact(3).collect();
        let mut scrambled = Vec::new();
        let (mut lo, mut hi) = (0usize, triangles.len() - 1);
        while lo <= hi {
            scrambled.extend_from_slice(triangles[lo]);
            if lo != hi {
                scrambled.extend_from_slice(triangles[hi]);
            }
            lo += 1;
            if hi == 0 {
                break;
            }
            hi -= 1;
        }

        let before = simulate_misses(&scrambled, vertex_count, 3).unwrap();
        let mut result = vec![0u32; scrambled.len()];
        optimize_post_transform(&mut result, &scrambled, vertex_count, 3, None).unwrap();
        let after = simulate_misses(&result, vertex_count, 3).unwrap();
        assert!(after < before, "misses {} -> {}", before, after);
        // one transform per vertex along a strip
        assert_eq!(after, vertex_count);
    }

    #[test]
    fn test_never_worse_than_ordered_grid() {
        for n in 2..=12 {
            let (indices, vertex_count) = make_grid(n);
            let before = simulate_misses(&indices, vertex_count, 24).unwrap();
            let mut result = vec![0u32; indices.len()];
            optimize_post_transform(&mut result, &indices, vertex_count, 24, None).unwrap();
            let after = simulate_misses(&result, vertex_count, 24).unwrap();
            assert!(after <= before, "n = {}: misses {} -> {}", n, before, after);
        }

        // fanning a 10x10 grid costs more than its row order, which is kept
        let (indices, vertex_count) = make_grid(10);
        let mut result = vec![0u32; indices.len()];
        let mut clusters = Clusters::new();
        optimize_post_transform(&mut result, &indices, vertex_count, 24, Some(&mut clusters)).unwrap();
        assert_eq!(result, indices);
        assert!(clusters.validate(result.len()).is_ok());
    }

    #[test]
    fn test_high_valence_fan() {
        let spokes = 40_000u32;
        let indices: Vec<u32> = (1..=spokes).flat_map(|i| [0, i, i + 1]).collect();
        let vertex_count = spokes as usize + 2;

        let mut result = vec![0u32; indices.len()];
        optimize_post_transform(&mut result, &indices, vertex_count, 24, None).unwrap();
        // the hub is fanned first, emitting its triangles in input order
        assert_eq!(result, indices);
    }

    #[test]
    fn test_clusters_partition_output() {
        let (indices, vertex_count) = make_strip(200);
        let mut result = vec![0u32; indices.len()];
        let mut clusters = Clusters::new();
        let optimizer = PostTransformOptimizer::with_config(
            PostTransformConfig::default()
                .with_cache_size(8)
                .with_cluster_miss_factor(1.0),
        );
        optimizer
            .optimize_indices(&mut result, &indices, vertex_count, Some(&mut clusters))
            .unwrap();
        assert!(clusters.len() > 1);
        assert!(clusters.validate(result.len()).is_ok());
        let covered: usize = clusters.ranges(result.len()).map(|r| r.len()).sum();
        assert_eq!(covered, result.len());
    }

    #[test]
    fn test_cut_clusters_on_cold_triangles() {
        // two disconnected triangles, then one sharing a vertex with the second
        let order = [0u32, 1, 2, 3, 4, 5, 5, 4, 6];
        let mut cache = FifoCache::new(24, 7).unwrap();
        let mut clusters = Clusters::new();
        cut_clusters(&order, &mut cache, 100, &mut clusters);
        assert_eq!(clusters.offsets(), &[0, 3]);

        clusters.clear();
        cut_clusters(&order, &mut cache, 3, &mut clusters);
        assert_eq!(clusters.offsets(), &[0, 3, 6]);
    }

    #[test]
    fn test_deterministic() {
        let (indices, vertex_count) = make_strip(30);
        let mut a = vec![0u32; indices.len()];
        let mut b = vec![0u32; indices.len()];
        optimize_post_transform(&mut a, &indices, vertex_count, 12, None).unwrap();
        optimize_post_transform(&mut b, &indices, vertex_count, 12, None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_preconditions() {
        let mut result = vec![0u32; 3];
        assert!(matches!(
            optimize_post_transform(&mut result, &[0, 1, 3], 3, 24, None),
            Err(Error::IndexOutOfRange { .. })
        ));
        assert!(matches!(
            optimize_post_transform(&mut result, &[0, 1, 2], 3, 2, None),
            Err(Error::InvalidCacheSize(2))
        ));
        let mut short = vec![0u32; 2];
        assert!(matches!(
            optimize_post_transform(&mut short, &[0, 1, 2], 3, 24, None),
            Err(Error::BufferSizeMismatch { .. })
        ));
        assert!(check_index_count(u32::MAX as usize).is_ok());
        assert!(matches!(
            check_index_count(u32::MAX as usize + 1),
            Err(Error::BufferSizeMismatch { buffer: "indices", .. })
        ));
    }
}
