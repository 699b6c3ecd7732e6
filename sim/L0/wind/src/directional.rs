//! Uniform wind inside a soft-edged box, with optional gusting.

use std::f64::consts::TAU;

use nalgebra::{Point3, Vector3};
use sim_types::{Aabb, SimError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::controller::WindSourceController;
use crate::source::{WindModel, soft_window};

/// Directional wind parameters, in the source frame.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DirectionalWind {
    /// Wind velocity.
    pub velocity: Vector3<f64>,
    /// Box half extents.
    pub half_extents: Vector3<f64>,
    /// Fraction of each half extent over which the wind fades out.
    pub edge_softness: f64,
    /// Relative gust amplitude.
    pub gust_amplitude: f64,
    /// Gust frequency (Hz).
    pub gust_frequency: f64,
}

impl DirectionalWind {
    /// Steady wind in a box with 10% soft edges.
    #[must_use]
    pub const fn new(velocity: Vector3<f64>, half_extents: Vector3<f64>) -> Self {
        Self {
            velocity,
            half_extents,
            edge_softness: 0.1,
            gust_amplitude: 0.0,
            gust_frequency: 0.0,
        }
    }

    /// Set the soft edge fraction.
    #[must_use]
    pub const fn with_edge_softness(mut self, softness: f64) -> Self {
        self.edge_softness = softness;
        self
    }

    /// Add sinusoidal gusting.
    #[must_use]
    pub const fn with_gusts(mut self, amplitude: f64, frequency: f64) -> Self {
        self.gust_amplitude = amplitude;
        self.gust_frequency = frequency;
        self
    }

    /// Velocity at a point in the source frame at time `t`.
    #[must_use]
    pub fn local_velocity(&self, p: &Point3<f64>, t: f64) -> Vector3<f64> {
        let mut weight = 1.0;
        for i in 0..3 {
            let h = self.half_extents[i];
            weight *= soft_window(p[i], h * (1.0 - self.edge_softness), h);
        }
        let gust = 1.0 + self.gust_amplitude * (TAU * self.gust_frequency * t).sin();
        self.velocity * (weight * gust)
    }
}

impl WindModel for DirectionalWind {
    fn velocity(&self, controller: &WindSourceController, point: &Point3<f64>) -> Vector3<f64> {
        let local = controller.to_local_point(point);
        controller.to_world_vector(&self.local_velocity(&local, controller.elapsed()))
    }

    fn bounds(&self, controller: &WindSourceController) -> Aabb {
        controller.world_bounds(&Aabb::from_center(Point3::origin(), self.half_extents))
    }

    fn validate(&self) -> sim_types::Result<()> {
        if self.half_extents.iter().any(|h| h.is_nan() || *h <= 0.0) {
            return Err(SimError::invalid_config(
                "directional wind half extents must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.edge_softness) {
            return Err(SimError::invalid_config(
                "directional wind edge softness must be in [0, 1]",
            ));
        }
        if !self.velocity.iter().all(|c| c.is_finite())
            || !self.gust_amplitude.is_finite()
            || !self.gust_frequency.is_finite()
        {
            return Err(SimError::invalid_config("directional wind must be finite"));
        }
        Ok(())
    }
}
