//! Rankine vortex around the local z axis.
//!
//! ```text
//!  speed
//!    │     ╱╲
//!    │    ╱  ‾‾‾‾──────___
//!    │   ╱                ‾‾──__
//!    └──┴───────────────────────┴──► r
//!       core                    outer
//! ```
//!
//! Solid-body rotation inside the core, `1 / r` decay outside, faded to
//! zero at the outer radius and above and below the vortex height.

use nalgebra::{Point3, Vector3};
use sim_types::{Aabb, SimError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::controller::WindSourceController;
use crate::source::{WindModel, soft_window};

/// Vortex parameters, in the source frame.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VortexWind {
    /// Tangential speed at the core radius.
    pub max_velocity: f64,
    /// Radius of solid-body rotation.
    pub core_radius: f64,
    /// Radius at which the field vanishes.
    pub outer_radius: f64,
    /// Vertical extent, centered on the origin.
    pub height: f64,
    /// Inward radial speed as a fraction of the tangential speed.
    pub inflow: f64,
}

impl VortexWind {
    /// A vortex without inflow.
    #[must_use]
    pub const fn new(max_velocity: f64, core_radius: f64, outer_radius: f64, height: f64) -> Self {
        Self {
            max_velocity,
            core_radius,
            outer_radius,
            height,
            inflow: 0.0,
        }
    }

    /// Set the inflow fraction.
    #[must_use]
    pub const fn with_inflow(mut self, inflow: f64) -> Self {
        self.inflow = inflow;
        self
    }

    /// Tangential speed at radius `r`, before falloff.
    #[must_use]
    pub fn rankine_speed(&self, r: f64) -> f64 {
        if r < self.core_radius {
            self.max_velocity * r / self.core_radius
        } else {
            self.max_velocity * self.core_radius / r
        }
    }

    /// Velocity at a point in the source frame.
    #[must_use]
    pub fn local_velocity(&self, p: &Point3<f64>) -> Vector3<f64> {
        let r = p.x.hypot(p.y);
        if r <= 0.0 {
            return Vector3::zeros();
        }
        let half = 0.5 * self.height;
        let falloff = soft_window(r, 0.8 * self.outer_radius, self.outer_radius)
            * soft_window(p.z, 0.8 * half, half);
        let speed = self.rankine_speed(r) * falloff;
        let radial = Vector3::new(p.x / r, p.y / r, 0.0);
        let tangent = Vector3::new(-radial.y, radial.x, 0.0);
        tangent * speed - radial * (speed * self.inflow)
    }
}

impl WindModel for VortexWind {
    fn velocity(&self, controller: &WindSourceController, point: &Point3<f64>) -> Vector3<f64> {
        let local = controller.to_local_point(point);
        controller.to_world_vector(&self.local_velocity(&local))
    }

    fn bounds(&self, controller: &WindSourceController) -> Aabb {
        controller.world_bounds(&Aabb::from_center(
            Point3::origin(),
            Vector3::new(self.outer_radius, self.outer_radius, 0.5 * self.height),
        ))
    }

    fn validate(&self) -> sim_types::Result<()> {
        if self.core_radius.is_nan() || self.core_radius <= 0.0 {
            return Err(SimError::invalid_config("vortex core radius must be positive"));
        }
        if self.outer_radius.is_nan() || self.outer_radius < self.core_radius {
            return Err(SimError::invalid_config(
                "vortex outer radius must be at least the core radius",
            ));
        }
        if self.height.is_nan() || self.height <= 0.0 {
            return Err(SimError::invalid_config("vortex height must be positive"));
        }
        if !self.max_velocity.is_finite() || !self.inflow.is_finite() {
            return Err(SimError::invalid_config("vortex velocities must be finite"));
        }
        Ok(())
    }
}
