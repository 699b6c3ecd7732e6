//! Particle group solver settings.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use sim_types::SimError;

/// Settings for one [`ParticleGroup`](crate::ParticleGroup).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GroupConfig {
    /// Constraint relaxation passes per update. Fixed cost, no convergence check.
    pub iterations: u32,
    /// Velocity damping per update, in `[0, 1)`.
    pub damping: f64,
    /// Speed limit applied after integrating acceleration.
    pub max_velocity: f64,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self::realtime()
    }
}

impl GroupConfig {
    /// Four passes, light damping.
    #[must_use]
    pub const fn realtime() -> Self {
        Self {
            iterations: 4,
            damping: 0.01,
            max_velocity: 100.0,
        }
    }

    /// Many passes for stiff cloth.
    #[must_use]
    pub const fn accurate() -> Self {
        Self {
            iterations: 16,
            damping: 0.005,
            max_velocity: 200.0,
        }
    }

    /// Set the iteration count.
    #[must_use]
    pub const fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the damping.
    #[must_use]
    pub const fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    /// Validate the settings.
    pub fn validate(&self) -> sim_types::Result<()> {
        if !(0.0..1.0).contains(&self.damping) {
            return Err(SimError::invalid_config(format!(
                "damping {} outside [0, 1)",
                self.damping
            )));
        }
        if self.max_velocity.is_nan() || self.max_velocity <= 0.0 {
            return Err(SimError::invalid_config("max_velocity must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        assert!(GroupConfig::realtime().validate().is_ok());
        assert!(GroupConfig::accurate().validate().is_ok());
        assert!(GroupConfig::default().with_damping(1.0).validate().is_err());
    }
}
