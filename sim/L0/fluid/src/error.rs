//! Error types for the fluid grid.

use thiserror::Error;

/// Errors raised by [`FluidSystem`](crate::FluidSystem) setters and updates.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FluidError {
    /// A node buffer does not match the grid size.
    #[error("Size mismatch: expected {expected} nodes, got {actual}")]
    SizeMismatch {
        /// Nodes in the grid.
        expected: usize,
        /// Length supplied.
        actual: usize,
    },

    /// Grid dimensions or domain size are unusable.
    #[error("Invalid grid size: {0}")]
    InvalidSize(String),

    /// A solver parameter is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Timestep is negative or not finite.
    #[error("Invalid timestep: {0}")]
    InvalidTimestep(f64),
}

impl FluidError {
    /// Create an invalid size error.
    pub fn invalid_size(msg: impl Into<String>) -> Self {
        Self::InvalidSize(msg.into())
    }

    /// Create an invalid config error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub(crate) fn check_len(expected: usize, actual: usize) -> Result<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self::SizeMismatch { expected, actual })
        }
    }
}

/// Result type for fluid operations.
pub type Result<T> = std::result::Result<T, FluidError>;
