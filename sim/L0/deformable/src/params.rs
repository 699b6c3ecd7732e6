//! Tunable physical parameters of a deformable mesh.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use sim_particles::GroupConfig;

use crate::error::{DeformableError, Result};

/// Physical parameters of a [`DeformableMesh`](crate::DeformableMesh).
///
/// Rates (`*_friction`, `animation_relaxation`, `animation_position_factor`)
/// are in 1/s and enter through `exp(-rate * dt)`, so they are stable for
/// any timestep.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeformableMeshParams {
    /// Gravity along world z (m/s²).
    pub gravity: f64,
    /// Collision radius of every particle.
    pub particle_radius: f64,

    /// Link correction fraction per iteration.
    pub link_stiffness: f64,
    /// Maximum link length as a multiple of rest length.
    pub link_stretch: f64,
    /// Allowed link shortening as a fraction of rest length.
    pub link_allowed_contraction: f64,
    /// Bend correction fraction per iteration.
    pub bend_stiffness: f64,
    /// Dihedral deviation (radians) tolerated without correction.
    pub bend_angle_threshold: f64,

    /// Relaxation rate of relative air velocity along the surface normal.
    pub wind_normal_friction: f64,
    /// Relaxation rate of relative air velocity in the tangent plane.
    pub wind_tangent_friction: f64,
    /// Multiplier on sampled wind velocity.
    pub wind_scale: f64,

    /// Weight of the animated rest-pose velocity in the follow target.
    pub animation_velocity_factor: f64,
    /// Rate at which the follow target closes the gap to the rest pose.
    pub animation_position_factor: f64,
    /// Rate at which particle velocity relaxes toward the follow target.
    pub animation_relaxation: f64,
    /// Speed limit of the follow target.
    pub animation_max_velocity: f64,

    /// Enclosure radius at hierarchy depth zero.
    pub enclosure_radius: f64,
    /// Extra enclosure radius per hierarchy level.
    pub enclosure_radius_per_depth: f64,
    /// Maximum hierarchy link length as a multiple of its rest length.
    pub shock_ratio: f64,

    /// Constraint relaxation passes per substep.
    pub solver_iterations: u32,
    /// Velocity damping per substep.
    pub damping: f64,
}

impl Default for DeformableMeshParams {
    fn default() -> Self {
        Self::cotton()
    }
}

impl DeformableMeshParams {
    /// Light, loose fabric.
    #[must_use]
    pub const fn cotton() -> Self {
        Self {
            gravity: -9.81,
            particle_radius: 0.01,
            link_stiffness: 0.9,
            link_stretch: 1.05,
            link_allowed_contraction: 0.3,
            bend_stiffness: 0.1,
            bend_angle_threshold: 0.0,
            wind_normal_friction: 2.0,
            wind_tangent_friction: 0.2,
            wind_scale: 1.0,
            animation_velocity_factor: 0.0,
            animation_position_factor: 0.0,
            animation_relaxation: 0.0,
            animation_max_velocity: 20.0,
            enclosure_radius: 0.05,
            enclosure_radius_per_depth: 0.1,
            shock_ratio: 1.2,
            solver_iterations: 4,
            damping: 0.01,
        }
    }

    /// Heavy, stiff material that resists folding.
    #[must_use]
    pub const fn leather() -> Self {
        Self {
            link_stiffness: 1.0,
            link_stretch: 1.01,
            link_allowed_contraction: 0.1,
            bend_stiffness: 0.6,
            bend_angle_threshold: 0.05,
            wind_normal_friction: 0.5,
            wind_tangent_friction: 0.05,
            solver_iterations: 8,
            damping: 0.02,
            ..Self::cotton()
        }
    }

    /// Cloth that tracks its animated pose closely (skirts, capes on
    /// characters).
    #[must_use]
    pub const fn rigid_follow() -> Self {
        Self {
            animation_velocity_factor: 1.0,
            animation_position_factor: 5.0,
            animation_relaxation: 10.0,
            enclosure_radius: 0.02,
            enclosure_radius_per_depth: 0.03,
            shock_ratio: 1.05,
            ..Self::cotton()
        }
    }

    /// Set gravity.
    #[must_use]
    pub const fn with_gravity(mut self, gravity: f64) -> Self {
        self.gravity = gravity;
        self
    }

    /// Set the link band.
    #[must_use]
    pub const fn with_links(mut self, stiffness: f64, stretch: f64, allowed_contraction: f64) -> Self {
        self.link_stiffness = stiffness;
        self.link_stretch = stretch;
        self.link_allowed_contraction = allowed_contraction;
        self
    }

    /// Set bending.
    #[must_use]
    pub const fn with_bending(mut self, stiffness: f64, angle_threshold: f64) -> Self {
        self.bend_stiffness = stiffness;
        self.bend_angle_threshold = angle_threshold;
        self
    }

    /// Set the solver passes and damping.
    #[must_use]
    pub const fn with_solver(mut self, iterations: u32, damping: f64) -> Self {
        self.solver_iterations = iterations;
        self.damping = damping;
        self
    }

    /// Set the animation coupling.
    #[must_use]
    pub const fn with_animation(
        mut self,
        velocity_factor: f64,
        position_factor: f64,
        relaxation: f64,
    ) -> Self {
        self.animation_velocity_factor = velocity_factor;
        self.animation_position_factor = position_factor;
        self.animation_relaxation = relaxation;
        self
    }

    /// Set the enclosure radii.
    #[must_use]
    pub const fn with_enclosure(mut self, radius: f64, per_depth: f64) -> Self {
        self.enclosure_radius = radius;
        self.enclosure_radius_per_depth = per_depth;
        self
    }

    /// Whether animation coupling has any effect.
    #[must_use]
    pub fn animation_enabled(&self) -> bool {
        const NEGLIGIBLE: f64 = 1e-6;
        self.animation_relaxation > NEGLIGIBLE
            && (self.animation_velocity_factor.abs() > NEGLIGIBLE
                || self.animation_position_factor.abs() > NEGLIGIBLE)
    }

    /// Solver settings for the mesh's particle group.
    #[must_use]
    pub fn group_config(&self) -> GroupConfig {
        GroupConfig {
            iterations: self.solver_iterations,
            damping: self.damping,
            max_velocity: GroupConfig::default().max_velocity.max(self.animation_max_velocity),
        }
    }

    /// Validate the parameters.
    pub fn validate(&self) -> Result<()> {
        let unit = [
            ("link_stiffness", self.link_stiffness),
            ("link_allowed_contraction", self.link_allowed_contraction),
            ("bend_stiffness", self.bend_stiffness),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(DeformableError::invalid_config(format!(
                    "{name} = {value} outside [0, 1]"
                )));
            }
        }

        let non_negative = [
            ("particle_radius", self.particle_radius),
            ("bend_angle_threshold", self.bend_angle_threshold),
            ("wind_normal_friction", self.wind_normal_friction),
            ("wind_tangent_friction", self.wind_tangent_friction),
            ("animation_position_factor", self.animation_position_factor),
            ("animation_relaxation", self.animation_relaxation),
            ("animation_max_velocity", self.animation_max_velocity),
            ("enclosure_radius", self.enclosure_radius),
            ("enclosure_radius_per_depth", self.enclosure_radius_per_depth),
        ];
        for (name, value) in non_negative {
            if value.is_nan() || value < 0.0 {
                return Err(DeformableError::invalid_config(format!(
                    "{name} = {value} must be non-negative"
                )));
            }
        }

        if self.link_stretch.is_nan() || self.link_stretch < 1.0 {
            return Err(DeformableError::invalid_config("link_stretch must be >= 1"));
        }
        if self.shock_ratio.is_nan() || self.shock_ratio < 1.0 {
            return Err(DeformableError::invalid_config("shock_ratio must be >= 1"));
        }
        if !self.gravity.is_finite() || !self.wind_scale.is_finite() {
            return Err(DeformableError::invalid_config(
                "gravity and wind_scale must be finite",
            ));
        }
        self.group_config().validate()?;
        Ok(())
    }
}
