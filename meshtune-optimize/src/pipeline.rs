//! Composed optimization passes

use crate::overdraw::{OverdrawConfig, OverdrawOptimizer};
use crate::post_transform::{PostTransformConfig, PostTransformOptimizer};
use meshtune_core::{validate_indices, Clusters, Error, IndexedMesh, MeshOptimizer, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Configuration for the full cache + overdraw pipeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub post_transform: PostTransformConfig,
    pub overdraw: OverdrawConfig,
    /// Run the overdraw pass after the cache pass
    pub optimize_overdraw: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            post_transform: PostTransformConfig::default(),
            overdraw: OverdrawConfig::default(),
            optimize_overdraw: true,
        }
    }
}

impl PipelineConfig {
    /// Use the same cache size for both passes
    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.post_transform.cache_size = cache_size;
        self.overdraw.cache_size = cache_size;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.overdraw.threshold = threshold;
        self
    }

    pub fn with_overdraw(mut self, enabled: bool) -> Self {
        self.optimize_overdraw = enabled;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.post_transform.validate()?;
        if self.optimize_overdraw {
            self.overdraw.validate()?;
            if self.overdraw.cache_size != self.post_transform.cache_size {
                return Err(Error::InvalidConfig(format!(
                    "cache sizes differ between passes: {} and {}",
                    self.post_transform.cache_size, self.overdraw.cache_size
                )));
            }
        }
        Ok(())
    }
}

/// Vertex cache optimization followed by cluster-level overdraw optimization
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    pub config: PipelineConfig,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        Self { config }
    }
}

impl MeshOptimizer for Pipeline {
    fn optimize(&self, mesh: &mut IndexedMesh) -> Result<()> {
        self.config.validate()?;
        let vertex_count = mesh.vertex_count();

        let mut clusters = Clusters::new();
        let mut ordered = vec![0u32; mesh.indices.len()];
        PostTransformOptimizer::with_config(self.config.post_transform).optimize_indices(
            &mut ordered,
            &mesh.indices,
            vertex_count,
            Some(&mut clusters),
        )?;

        if self.config.optimize_overdraw {
            let positions = mesh.positions()?;
            let mut result = vec![0u32; ordered.len()];
            OverdrawOptimizer::with_config(self.config.overdraw).optimize_indices(
                &mut result,
                &ordered,
                &positions,
                &clusters,
            )?;
            ordered = result;
        }

        mesh.indices = ordered;
        Ok(())
    }
}

/// Shuffle whole triangles in place with a seeded generator
pub fn shuffle_triangles(indices: &mut [u32], seed: u64) -> Result<()> {
    let triangle_count = validate_indices(indices, usize::MAX)?;
    let mut rng = StdRng::seed_from_u64(seed);

    let mut order: Vec<usize> = (0..triangle_count).collect();
    order.shuffle(&mut rng);

    let shuffled: Vec<u32> = order
        .iter()
        .flat_map(|&t| indices[t * 3..t * 3 + 3].iter().copied())
        .collect();
    indices.copy_from_slice(&shuffled);
    Ok(())
}

/// Pass that shuffles triangle order, for producing cache-hostile inputs
#[derive(Debug, Clone, Copy)]
pub struct ShuffleTriangles {
    pub seed: u64,
}

impl ShuffleTriangles {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl MeshOptimizer for ShuffleTriangles {
    fn optimize(&self, mesh: &mut IndexedMesh) -> Result<()> {
        shuffle_triangles(&mut mesh.indices, self.seed)
    }
}
