//! Overdraw optimization
//!
//! Reorders the clusters of a cache-optimized index buffer so that surfaces
//! likely to occlude others are drawn first, while keeping the cache
//! efficiency within a threshold of the input order.

use crate::cache::FifoCache;
use crate::rasterizer::OverdrawRasterizer;
use itertools::Itertools;
use meshtune_core::{
    check_destination, validate_indices, Bounded, Clusters, Error, IndexedMesh, MeshOptimizer,
    Point3f, PositionStream, Result, Vector3f, DEFAULT_CACHE_SIZE,
};
use serde::{Deserialize, Serialize};
use std::ops::Range;

const NIL: usize = usize::MAX;

/// How a set of patches is laid out in the output
#[derive(Debug, Clone, Copy)]
enum Emission {
    Walk,
    KeyOrder,
}

/// Configuration for the overdraw optimizer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverdrawConfig {
    /// Simulated FIFO cache size
    pub cache_size: usize,
    /// Allowed ACMR growth over the input order; must be at least 1.0
    pub threshold: f32,
    /// Maximum number of candidate clusters considered per step
    pub lookahead: usize,
    /// Candidates must have a sort key within this fraction of the mesh
    /// extent of the best remaining key
    pub depth_tolerance: f32,
    /// Keep the input order unless the estimated overdraw improves
    pub verify_overdraw: bool,
}

impl Default for OverdrawConfig {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_CACHE_SIZE,
            threshold: 1.05,
            lookahead: 8,
            depth_tolerance: 0.05,
            verify_overdraw: true,
        }
    }
}

impl OverdrawConfig {
    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_lookahead(mut self, lookahead: usize) -> Self {
        self.lookahead = lookahead;
        self
    }

    pub fn with_depth_tolerance(mut self, tolerance: f32) -> Self {
        self.depth_tolerance = tolerance;
        self
    }

    pub fn with_verify_overdraw(mut self, verify: bool) -> Self {
        self.verify_overdraw = verify;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_size < 3 {
            return Err(Error::InvalidCacheSize(self.cache_size));
        }
        if !self.threshold.is_finite() || self.threshold < 1.0 {
            return Err(Error::InvalidThreshold(self.threshold));
        }
        if self.lookahead == 0 {
            return Err(Error::InvalidConfig("lookahead must be at least 1".to_string()));
        }
        if !self.depth_tolerance.is_finite() || self.depth_tolerance < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "depth tolerance must be non-negative, got {}",
                self.depth_tolerance
            )));
        }
        Ok(())
    }
}

/// A sub-cluster with its sort data
#[derive(Debug, Clone)]
struct Patch {
    range: Range<usize>,
    centroid: Point3f,
    normal: Vector3f,
    area: f32,
    key: f32,
}

impl Patch {
    fn new(range: Range<usize>, indices: &[u32], positions: &PositionStream) -> Self {
        let mut weighted = Vector3f::zeros();
        let mut unweighted = Vector3f::zeros();
        let mut normal = Vector3f::zeros();
        let mut area = 0.0f32;

        for triangle in indices[range.clone()].chunks_exact(3) {
            let p0 = positions.position(triangle[0] as usize);
            let p1 = positions.position(triangle[1] as usize);
            let p2 = positions.position(triangle[2] as usize);

            let cross = (p1 - p0).cross(&(p2 - p0));
            let triangle_area = cross.norm() * 0.5;
            let center = (p0.coords + p1.coords + p2.coords) / 3.0;

            weighted += center * triangle_area;
            unweighted += center;
            normal += cross;
            area += triangle_area;
        }

        let count = (range.len() / 3) as f32;
        let centroid = if area > 0.0 {
            Point3f::from(weighted / area)
        } else {
            Point3f::from(unweighted / count)
        };

        Self {
            range,
            centroid,
            normal,
            area,
            key: 0.0,
        }
    }

    fn triangle_count(&self) -> usize {
        self.range.len() / 3
    }
}

/// Overdraw optimizer.
///
/// Splits each input cluster into smaller patches wherever doing so keeps the
/// patch ACMR within the threshold, sorts patches so outward-facing surfaces
/// come first, then walks them greedily with a cache-aware acceptance test.
/// If the walk ends above the threshold, whole clusters and plain key order
/// are tried before the input order is kept.
#[derive(Debug, Clone, Default)]
pub struct OverdrawOptimizer {
    pub config: OverdrawConfig,
}

impl OverdrawOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: OverdrawConfig) -> Self {
        Self { config }
    }

    /// Optimizer that treats the whole mesh as one cluster and allows the
    /// cache efficiency to degrade down to the worst case, so individual
    /// triangles can be reordered freely.
    pub fn single_cluster() -> Self {
        Self::with_config(OverdrawConfig::default().with_threshold(3.0))
    }

    /// Reorder the clusters of `indices` into `destination`
    pub fn optimize_indices(
        &self,
        destination: &mut [u32],
        indices: &[u32],
        positions: &PositionStream,
        clusters: &Clusters,
    ) -> Result<()> {
        self.config.validate()?;
        let vertex_count = positions.len();
        let triangle_count = validate_indices(indices, vertex_count)?;
        check_destination("destination", destination.len(), indices.len())?;
        clusters.validate(indices.len())?;

        if triangle_count == 0 {
            return Ok(());
        }

        let threshold = self.config.threshold as f64;
        let mut cache = FifoCache::new(self.config.cache_size, vertex_count)?;
        let baseline_misses = cache.replay(indices);
        let baseline_acmr = baseline_misses as f64 / triangle_count as f64;

        let mut hard: Vec<Patch> = clusters
            .ranges(indices.len())
            .map(|range| Patch::new(range, indices, positions))
            .collect();
        let mut soft: Vec<Patch> = Vec::new();
        for cluster in &hard {
            for range in split_cluster(indices, cluster.range.clone(), threshold, &mut cache) {
                soft.push(Patch::new(range, indices, positions));
            }
        }

        log::trace!(
            "optimize_overdraw: {} clusters split into {} patches",
            hard.len(),
            soft.len()
        );

        if soft.len() < 2 {
            destination.copy_from_slice(indices);
            return Ok(());
        }

        assign_sort_keys(&mut hard, positions);
        assign_sort_keys(&mut soft, positions);

        let limit = threshold * baseline_acmr;
        let tolerance = self.config.depth_tolerance * positions.max_extent();

        // soft patches gain the most; whole clusters and plain key order
        // lose less cache locality when the walk overshoots the cap
        let mut attempts = vec![(&soft, Emission::Walk)];
        if hard.len() > 1 && hard.len() < soft.len() {
            attempts.push((&hard, Emission::Walk));
        }
        attempts.push((&soft, Emission::KeyOrder));
        if hard.len() > 1 && hard.len() < soft.len() {
            attempts.push((&hard, Emission::KeyOrder));
        }

        let mut accepted: Option<usize> = None;
        for (patches, emission) in attempts {
            cache.clear();
            match emission {
                Emission::Walk => self.walk(destination, indices, patches, &mut cache, limit, tolerance),
                Emission::KeyOrder => emit_in_key_order(destination, indices, patches),
            }
            cache.clear();
            let misses = cache.replay(destination);
            if misses as f64 <= threshold * baseline_misses as f64 {
                accepted = Some(misses);
                break;
            }
            log::trace!(
                "optimize_overdraw: {:?} over {} patches gives {} misses, cap {:.1}",
                emission,
                patches.len(),
                misses,
                threshold * baseline_misses as f64
            );
        }

        let final_misses = match accepted {
            Some(misses) => misses,
            None => {
                log::warn!(
                    "optimize_overdraw: no reordering within {} x {} baseline misses, keeping input order",
                    threshold,
                    baseline_misses
                );
                destination.copy_from_slice(indices);
                return Ok(());
            }
        };

        if self.config.verify_overdraw {
            let mut rasterizer = OverdrawRasterizer::new();
            let before = rasterizer.rasterize(indices, positions);
            let after = rasterizer.rasterize(destination, positions);
            if after.pixels_shaded >= before.pixels_shaded {
                log::debug!(
                    "optimize_overdraw: no overdraw gain ({:.3} -> {:.3}), keeping input order",
                    before.overdraw,
                    after.overdraw
                );
                destination.copy_from_slice(indices);
                return Ok(());
            }
            log::debug!(
                "optimize_overdraw: overdraw {:.3} -> {:.3}",
                before.overdraw,
                after.overdraw
            );
        }

        log::debug!(
            "optimize_overdraw: {} triangles, {} patches, ACMR {:.3} -> {:.3}",
            triangle_count,
            soft.len(),
            baseline_acmr,
            final_misses as f64 / triangle_count as f64
        );

        Ok(())
    }

    /// Emit all patches in greedy order.
    ///
    /// Candidates are the highest-keyed remaining patches within the depth
    /// tolerance. The patch that followed the last emitted one in the input
    /// is tried first, then the others by centroid distance; the first one
    /// keeping the running ACMR within `limit` is emitted. When none does,
    /// the input order is resumed.
    fn walk(
        &self,
        destination: &mut [u32],
        indices: &[u32],
        patches: &[Patch],
        cache: &mut FifoCache,
        limit: f64,
        tolerance: f32,
    ) {
        // patch ids sorted by key, highest first, linked for O(1) removal
        let order: Vec<usize> = (0..patches.len())
            .sorted_by(|&a, &b| patches[b].key.total_cmp(&patches[a].key).then(a.cmp(&b)))
            .collect();
        let count = order.len();
        let mut slot_of = vec![0usize; count];
        for (slot, &patch) in order.iter().enumerate() {
            slot_of[patch] = slot;
        }
        let mut next: Vec<usize> = (1..=count).map(|i| if i == count { NIL } else { i }).collect();
        let mut prev: Vec<usize> = (0..count).map(|i| if i == 0 { NIL } else { i - 1 }).collect();
        let mut head = 0usize;

        let mut emitted = vec![false; count];
        let mut input_cursor = 0usize;
        let mut last: Option<usize> = None;

        let mut emitted_misses = 0usize;
        let mut emitted_triangles = 0usize;
        let mut written = 0usize;
        let mut window: Vec<usize> = Vec::with_capacity(self.config.lookahead);

        while head != NIL {
            let floor = patches[order[head]].key - tolerance;
            window.clear();
            let mut cursor = head;
            while cursor != NIL
                && window.len() < self.config.lookahead
                && patches[order[cursor]].key >= floor
            {
                window.push(order[cursor]);
                cursor = next[cursor];
            }

            let successor = last.map(|id| id + 1).filter(|&id| id < count && !emitted[id]);
            let ranked: Vec<usize> = match last {
                Some(last) => {
                    let anchor = patches[last].centroid;
                    window
                        .iter()
                        .copied()
                        .sorted_by(|&a, &b| {
                            let da = (patches[a].centroid - anchor).norm_squared();
                            let db = (patches[b].centroid - anchor).norm_squared();
                            (Some(b) == successor)
                                .cmp(&(Some(a) == successor))
                                .then(da.total_cmp(&db))
                                .then(slot_of[a].cmp(&slot_of[b]))
                        })
                        .collect()
                }
                None => window.clone(),
            };

            let checkpoint = cache.checkpoint();
            let mut chosen: Option<(usize, usize)> = None;
            for &id in &ranked {
                let patch = &patches[id];
                let misses = cache.replay(&indices[patch.range.clone()]);
                let total_misses = emitted_misses + misses;
                let total_triangles = emitted_triangles + patch.triangle_count();
                if total_misses as f64 <= limit * total_triangles as f64 {
                    chosen = Some((id, misses));
                    break;
                }
                cache.restore(&checkpoint);
            }

            let (id, misses) = match chosen {
                Some(accepted) => accepted,
                None => {
                    let id = match successor {
                        Some(id) => id,
                        None => {
                            while emitted[input_cursor] {
                                input_cursor += 1;
                            }
                            input_cursor
                        }
                    };
                    (id, cache.replay(&indices[patches[id].range.clone()]))
                }
            };

            let patch = &patches[id];
            let len = patch.range.len();
            destination[written..written + len].copy_from_slice(&indices[patch.range.clone()]);
            written += len;
            emitted_misses += misses;
            emitted_triangles += patch.triangle_count();
            emitted[id] = true;
            last = Some(id);

            // unlink
            let slot = slot_of[id];
            if prev[slot] != NIL {
                next[prev[slot]] = next[slot];
            } else {
                head = next[slot];
            }
            if next[slot] != NIL {
                prev[next[slot]] = prev[slot];
            }
        }
    }
}

impl MeshOptimizer for OverdrawOptimizer {
    fn optimize(&self, mesh: &mut IndexedMesh) -> Result<()> {
        let positions = mesh.positions()?;
        let mut result = vec![0u32; mesh.indices.len()];
        self.optimize_indices(&mut result, &mesh.indices, &positions, &Clusters::single())?;
        mesh.indices = result;
        Ok(())
    }
}

/// Emit patches by descending key, ties in input order
fn emit_in_key_order(destination: &mut [u32], indices: &[u32], patches: &[Patch]) {
    let mut written = 0usize;
    for patch in patches
        .iter()
        .enumerate()
        .sorted_by(|(a, pa), (b, pb)| pb.key.total_cmp(&pa.key).then(a.cmp(b)))
        .map(|(_, patch)| patch)
    {
        let len = patch.range.len();
        destination[written..written + len].copy_from_slice(&indices[patch.range.clone()]);
        written += len;
    }
}

/// Split one cluster wherever the cold-start ACMR of the running patch drops
/// to `threshold` times the cold-start ACMR of the whole cluster
fn split_cluster(
    indices: &[u32],
    cluster: Range<usize>,
    threshold: f64,
    cache: &mut FifoCache,
) -> Vec<Range<usize>> {
    let triangles = &indices[cluster.clone()];

    cache.clear();
    let cluster_misses = cache.replay(triangles);
    let limit = threshold * cluster_misses as f64 / (triangles.len() / 3) as f64;

    let mut ranges = Vec::new();
    let mut start = cluster.start;
    let mut misses = 0usize;
    cache.clear();

    for (i, triangle) in triangles.chunks_exact(3).enumerate() {
        misses += cache.access_triangle(triangle);
        let end = cluster.start + (i + 1) * 3;
        let count = (end - start) / 3;
        if end < cluster.end && misses as f64 <= limit * count as f64 {
            ranges.push(start..end);
            start = end;
            misses = 0;
            cache.clear();
        }
    }
    ranges.push(start..cluster.end);
    ranges
}

/// Key every patch by how far it sits in front of the mesh centroid along
/// its own normal
fn assign_sort_keys(patches: &mut [Patch], positions: &PositionStream) {
    let total_area: f32 = patches.iter().map(|p| p.area).sum();
    let mesh_centroid = if total_area > 0.0 {
        let weighted = patches
            .iter()
            .fold(Vector3f::zeros(), |sum, p| sum + p.centroid.coords * p.area);
        Point3f::from(weighted / total_area)
    } else {
        positions.center()
    };

    for patch in patches.iter_mut() {
        patch.key = match patch.normal.try_normalize(f32::EPSILON) {
            Some(normal) => (patch.centroid - mesh_centroid).dot(&normal),
            None => 0.0,
        };
    }
}

/// Reorder clusters of `indices` to reduce overdraw.
///
/// `positions` holds `vertex_count` positions, each three `f32` values at
/// the start of a `position_stride` byte record. The ACMR of the result is at
/// most `threshold` times the ACMR of `indices`.
#[allow(clippy::too_many_arguments)]
pub fn optimize_overdraw(
    destination: &mut [u32],
    indices: &[u32],
    positions: &[u8],
    position_stride: usize,
    vertex_count: usize,
    clusters: &Clusters,
    cache_size: usize,
    threshold: f32,
) -> Result<()> {
    let positions = PositionStream::new(positions, position_stride, vertex_count)?;
    let config = OverdrawConfig::default()
        .with_cache_size(cache_size)
        .with_threshold(threshold);
    OverdrawOptimizer::with_config(config).optimize_indices(destination, indices, &positions, clusters)
}
