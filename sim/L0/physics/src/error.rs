//! Error type for the orchestrator.

use sim_deformable::DeformableError;
use sim_fluid::FluidError;
use sim_types::SimError;
use thiserror::Error;

/// Errors raised while building or stepping the simulation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PhysicsError {
    /// Handle, timestep or configuration error.
    #[error(transparent)]
    Sim(#[from] SimError),

    /// Mesh construction or update failed.
    #[error(transparent)]
    Deformable(#[from] DeformableError),

    /// Fluid grid error.
    #[error(transparent)]
    Fluid(#[from] FluidError),
}

impl PhysicsError {
    /// Whether this error came from a stale or unknown handle, at any layer.
    #[must_use]
    pub fn is_invalid_handle(&self) -> bool {
        match self {
            Self::Sim(e) | Self::Deformable(DeformableError::Sim(e)) => e.is_invalid_handle(),
            _ => false,
        }
    }
}

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, PhysicsError>;
