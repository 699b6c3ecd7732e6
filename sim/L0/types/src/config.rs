//! Timestep policy for the simulation orchestrator.
//!
//! Frames arrive with a variable `dt`. The orchestrator accumulates it and
//! advances the particle substrate in fixed substeps:
//!
//! ```text
//! remainder += dt
//! n = min(floor(remainder / substep), max_substeps)
//! run n substeps, remainder -= n * substep
//! extrapolation_time = remainder
//! ```

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Main configuration for a simulation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulationConfig {
    /// Requested fixed substep (seconds). Clamped to
    /// `[min_substep, max_substep]` when used.
    pub substep: f64,
    /// Smallest allowed substep.
    pub min_substep: f64,
    /// Largest allowed substep.
    pub max_substep: f64,
    /// Upper bound on substeps per frame. Time beyond the cap is dropped.
    pub max_substeps: u32,
    /// Number of meshes per parallel batch.
    pub mesh_batch_size: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::realtime()
    }
}

impl SimulationConfig {
    /// 60 Hz substeps, up to 4 per frame.
    #[must_use]
    pub const fn realtime() -> Self {
        Self {
            substep: 1.0 / 60.0,
            min_substep: 0.005,
            max_substep: 0.067,
            max_substeps: 4,
            mesh_batch_size: 8,
        }
    }

    /// 120 Hz substeps for stiffer cloth, up to 8 per frame.
    #[must_use]
    pub const fn high_fidelity() -> Self {
        Self {
            substep: 1.0 / 120.0,
            max_substeps: 8,
            ..Self::realtime()
        }
    }

    /// 30 Hz substeps, at most 2 per frame.
    #[must_use]
    pub const fn fast() -> Self {
        Self {
            substep: 1.0 / 30.0,
            max_substeps: 2,
            ..Self::realtime()
        }
    }

    /// Set the requested substep.
    #[must_use]
    pub const fn with_substep(mut self, substep: f64) -> Self {
        self.substep = substep;
        self
    }

    /// Set the substep cap.
    #[must_use]
    pub const fn with_max_substeps(mut self, max_substeps: u32) -> Self {
        self.max_substeps = max_substeps;
        self
    }

    /// Set the mesh batch size.
    #[must_use]
    pub const fn with_mesh_batch_size(mut self, size: usize) -> Self {
        self.mesh_batch_size = size;
        self
    }

    /// The substep actually used.
    #[must_use]
    pub fn effective_substep(&self) -> f64 {
        self.substep.clamp(self.min_substep, self.max_substep)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        for value in [self.substep, self.min_substep, self.max_substep] {
            if !value.is_finite() || value <= 0.0 {
                return Err(crate::SimError::InvalidTimestep(value));
            }
        }

        if self.min_substep > self.max_substep {
            return Err(crate::SimError::invalid_config(format!(
                "min_substep {} exceeds max_substep {}",
                self.min_substep, self.max_substep
            )));
        }

        if self.max_substeps == 0 {
            return Err(crate::SimError::invalid_config(
                "max_substeps must be at least 1",
            ));
        }

        if self.mesh_batch_size == 0 {
            return Err(crate::SimError::invalid_config(
                "mesh_batch_size must be at least 1",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_presets_validate() {
        SimulationConfig::default().validate().unwrap();
        SimulationConfig::high_fidelity().validate().unwrap();
        SimulationConfig::fast().validate().unwrap();
    }

    #[test]
    fn test_effective_substep_clamped() {
        let cfg = SimulationConfig::default().with_substep(1.0);
        assert_relative_eq!(cfg.effective_substep(), 0.067);
        let cfg = SimulationConfig::default().with_substep(0.0001);
        assert_relative_eq!(cfg.effective_substep(), 0.005);
    }

    #[test]
    fn test_invalid_configs() {
        assert!(SimulationConfig::default().with_substep(-1.0).validate().is_err());
        assert!(SimulationConfig::default().with_max_substeps(0).validate().is_err());
        assert!(SimulationConfig::default()
            .with_mesh_batch_size(0)
            .validate()
            .is_err());
        let mut cfg = SimulationConfig::default();
        cfg.min_substep = 0.1;
        assert!(cfg.validate().unwrap_err().is_config_error());
    }
}
