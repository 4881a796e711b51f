//! Statistics reported by the analyzers

use serde::{Deserialize, Serialize};

/// Post-transform vertex cache efficiency of an index buffer
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PostTransformCacheStatistics {
    /// Number of cache misses (vertices transformed)
    pub misses: usize,
    /// Simulated FIFO cache size
    pub cache_size: usize,
    /// Average cache misses per triangle; 3.0 is the worst case
    pub acmr: f32,
    /// Average cache misses per vertex; 1.0 is ideal
    pub atvr: f32,
}

impl PostTransformCacheStatistics {
    /// Derive the ratios from raw counts; zero counts yield zero ratios
    pub fn from_misses(
        misses: usize,
        triangle_count: usize,
        vertex_count: usize,
        cache_size: usize,
    ) -> Self {
        let ratio = |count: usize| {
            if count == 0 {
                0.0
            } else {
                misses as f32 / count as f32
            }
        };
        Self {
            misses,
            cache_size,
            acmr: ratio(triangle_count),
            atvr: ratio(vertex_count),
        }
    }
}

/// Estimated rasterization overdraw of an index buffer
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OverdrawStatistics {
    /// Pixels touched by at least one triangle, summed over all views
    pub pixels_covered: u64,
    /// Fragments that passed the depth test, summed over all views
    pub pixels_shaded: u64,
    /// `pixels_shaded / pixels_covered`; 1.0 is ideal
    pub overdraw: f32,
}

impl OverdrawStatistics {
    pub fn from_counts(pixels_covered: u64, pixels_shaded: u64) -> Self {
        let overdraw = if pixels_covered == 0 {
            0.0
        } else {
            pixels_shaded as f32 / pixels_covered as f32
        };
        Self {
            pixels_covered,
            pixels_shaded,
            overdraw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cache_statistics_ratios() {
        let stats = PostTransformCacheStatistics::from_misses(6, 4, 6, 24);
        assert_relative_eq!(stats.acmr, 1.5);
        assert_relative_eq!(stats.atvr, 1.0);
    }

    #[test]
    fn test_degenerate_statistics_are_zero() {
        let stats = PostTransformCacheStatistics::from_misses(0, 0, 0, 24);
        assert_eq!(stats.acmr, 0.0);
        assert_eq!(stats.atvr, 0.0);
        assert_eq!(OverdrawStatistics::from_counts(0, 0).overdraw, 0.0);
    }
}
