//! Error types for deformable mesh simulation.

use sim_types::SimError;
use thiserror::Error;

/// Errors that can occur while building or driving a deformable mesh.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DeformableError {
    /// The index buffer cannot describe a triangle mesh.
    #[error("Invalid mesh topology: {0}")]
    InvalidTopology(String),

    /// A vertex index is outside the vertex buffer.
    #[error("Index out of bounds: {index} (vertex count {count})")]
    IndexOutOfBounds {
        /// Offending index.
        index: usize,
        /// Number of vertices.
        count: usize,
    },

    /// A per-vertex buffer has the wrong length.
    #[error("Size mismatch: expected {expected} entries, got {actual}")]
    SizeMismatch {
        /// Number of mesh vertices.
        expected: usize,
        /// Length supplied.
        actual: usize,
    },

    /// A parameter is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No control point is registered under this id.
    #[error("Unknown control point: {0}")]
    UnknownControlPoint(u32),

    /// Particle substrate error (stale handle, bad timestep).
    #[error(transparent)]
    Sim(#[from] SimError),
}

impl DeformableError {
    /// Create an invalid topology error.
    pub fn invalid_topology(msg: impl Into<String>) -> Self {
        Self::InvalidTopology(msg.into())
    }

    /// Create an invalid config error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Check an index against a vertex count.
    pub(crate) fn check_index(index: usize, count: usize) -> Result<()> {
        if index < count {
            Ok(())
        } else {
            Err(Self::IndexOutOfBounds { index, count })
        }
    }
}

/// Result type for deformable mesh operations.
pub type Result<T> = std::result::Result<T, DeformableError>;
