//! Particles and repositioning modes.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A simulated point mass.
///
/// Fixed particles have zero inverse mass: constraints never move them, and
/// they only change position through [`PositionMode`] requests.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Particle {
    /// Current position.
    pub position: Point3<f64>,
    /// Current velocity.
    pub velocity: Vector3<f64>,
    /// Acceleration applied during the next update.
    pub acceleration: Vector3<f64>,
    /// Collision radius.
    pub radius: f64,
    /// Whether the particle is pinned.
    pub fixed: bool,
    /// Pending target position, consumed by the next update.
    pub destination: Option<Point3<f64>>,
    /// Opaque caller payload (vertex index for mesh particles).
    pub user_data: u64,
    pub(crate) prev_position: Point3<f64>,
}

impl Particle {
    /// Create a particle at rest.
    #[must_use]
    pub fn new(position: Point3<f64>, radius: f64, fixed: bool) -> Self {
        Self {
            position,
            velocity: Vector3::zeros(),
            acceleration: Vector3::zeros(),
            radius,
            fixed,
            destination: None,
            user_data: 0,
            prev_position: position,
        }
    }

    /// Inverse mass used by the constraint solver.
    #[must_use]
    pub fn inv_mass(&self) -> f64 {
        if self.fixed { 0.0 } else { 1.0 }
    }

    /// Position at the start of the last update.
    #[must_use]
    pub fn previous_position(&self) -> Point3<f64> {
        self.prev_position
    }

    /// Position extrapolated `t` seconds ahead along the current velocity.
    #[must_use]
    pub fn extrapolated(&self, t: f64) -> Point3<f64> {
        self.position + self.velocity * t
    }

    /// Whether position or velocity holds a non-finite component.
    #[must_use]
    pub fn is_corrupt(&self) -> bool {
        !(self.position.coords.iter().all(|c| c.is_finite())
            && self.velocity.iter().all(|c| c.is_finite()))
    }
}

/// How [`ParticleGroup::set_position`](crate::ParticleGroup::set_position)
/// moves a particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PositionMode {
    /// Move and zero the velocity. Safe for recovering from `NaN`.
    Reset,
    /// Move and let the velocity absorb the displacement.
    Push,
    /// Move and keep the velocity.
    Teleport,
    /// Defer the move to the next update (kinematic target).
    SetDest,
}
