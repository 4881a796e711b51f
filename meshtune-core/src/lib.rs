//! Core data structures and traits for meshtune
//!
//! This crate provides the building blocks shared by the optimization passes:
//! stride-addressed vertex and position views, index buffer validation,
//! cluster lists, indexed meshes, statistics records and the error type.

pub mod buffer;
pub mod cluster;
pub mod error;
pub mod mesh;
pub mod point;
pub mod stats;
pub mod traits;

pub use buffer::*;
pub use cluster::*;
pub use error::*;
pub use mesh::*;
pub use point::*;
pub use stats::*;
pub use traits::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3};

/// Default number of entries in the simulated post-transform cache
pub const DEFAULT_CACHE_SIZE: usize = 24;
