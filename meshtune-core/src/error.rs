//! Error types for meshtune

use thiserror::Error;

/// Main error type for meshtune operations
///
/// Every variant is a precondition violation detected before any buffer is
/// read or written out of bounds. Degenerate input (no triangles, no vertices)
/// is never an error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Index count {0} is not a multiple of 3")]
    IndexCountNotMultipleOfThree(usize),

    #[error("Vertex stride must be greater than zero")]
    ZeroStride,

    #[error("Vertex stride {stride} is too small, at least {required} bytes are required")]
    StrideTooSmall { stride: usize, required: usize },

    #[error("Index {index} at position {position} is out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        index: u32,
        position: usize,
        vertex_count: usize,
    },

    #[error("Buffer size mismatch for {buffer}: expected {expected}, got {actual}")]
    BufferSizeMismatch {
        buffer: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Cache size {0} is invalid, at least 3 entries are required")]
    InvalidCacheSize(usize),

    #[error("Overdraw threshold {0} is invalid, it must be finite and at least 1.0")]
    InvalidThreshold(f32),

    #[error("Invalid cluster list: {0}")]
    InvalidClusters(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for meshtune operations
pub type Result<T> = std::result::Result<T, Error>;
