//! Mesh optimization passes
//!
//! This crate reorders and compacts indexed triangle meshes for GPU
//! rendering:
//! - Vertex deduplication and index buffer generation
//! - FIFO post-transform cache simulation
//! - Post-transform vertex cache optimization with locality clusters
//! - Overdraw optimization bounded by a cache efficiency threshold
//! - ACMR/ATVR and overdraw analyzers

pub mod analyze;
pub mod cache;
pub mod dedup;
pub mod overdraw;
pub mod pipeline;
pub mod post_transform;
pub mod rasterizer;

pub use analyze::*;
pub use cache::*;
pub use dedup::*;
pub use overdraw::*;
pub use pipeline::*;
pub use post_transform::*;
pub use rasterizer::*;
