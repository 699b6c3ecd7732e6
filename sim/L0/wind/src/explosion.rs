//! Expanding blast shell.
//!
//! ```text
//!            back      front
//!   0 ────────┼─────────┼───────► r
//!             │  ╱‾‾╲   │
//!             │ ╱    ╲  │       speed = peak (1 - p)² sin(π s)
//!   ──────────┴╱──────╲─┴────   s = (r - back) / (front - back)
//! ```
//!
//! With progress `p = elapsed / duration`, the front sits at
//! `radius * p^0.4` (a decelerating blast wave) and the back at
//! `front * (1 - shell_fraction)`. Air moves radially outward inside the
//! shell and is still everywhere else.

use std::f64::consts::PI;

use nalgebra::{Point3, Vector3};
use sim_types::{Aabb, SimError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::controller::WindSourceController;
use crate::source::WindModel;

/// Exponent of the front radius growth.
pub const FRONT_EXPONENT: f64 = 0.4;

/// Explosion parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExplosionWind {
    /// Peak outward speed at the start.
    pub peak_velocity: f64,
    /// Front radius when the lifetime ends.
    pub radius: f64,
    /// Shell thickness as a fraction of the front radius.
    pub shell_fraction: f64,
}

impl ExplosionWind {
    /// An explosion with a half-thickness shell.
    #[must_use]
    pub const fn new(peak_velocity: f64, radius: f64) -> Self {
        Self {
            peak_velocity,
            radius,
            shell_fraction: 0.5,
        }
    }

    /// Set the shell thickness fraction.
    #[must_use]
    pub const fn with_shell_fraction(mut self, fraction: f64) -> Self {
        self.shell_fraction = fraction;
        self
    }

    /// Front and back radius at `progress`.
    #[must_use]
    pub fn shell(&self, progress: f64) -> (f64, f64) {
        let front = self.radius * progress.clamp(0.0, 1.0).powf(FRONT_EXPONENT);
        (front, front * (1.0 - self.shell_fraction))
    }

    /// Outward speed at distance `r` from the center.
    #[must_use]
    pub fn speed(&self, r: f64, progress: f64) -> f64 {
        let (front, back) = self.shell(progress);
        if front <= back || r <= back || r >= front {
            return 0.0;
        }
        let s = (r - back) / (front - back);
        let fade = (1.0 - progress.clamp(0.0, 1.0)).powi(2);
        self.peak_velocity * fade * (PI * s).sin()
    }
}

impl WindModel for ExplosionWind {
    fn velocity(&self, controller: &WindSourceController, point: &Point3<f64>) -> Vector3<f64> {
        let local = controller.to_local_point(point).coords;
        let r = local.norm();
        if r <= 0.0 {
            return Vector3::zeros();
        }
        let speed = self.speed(r, controller.progress());
        controller.to_world_vector(&(local * (speed / r)))
    }

    fn bounds(&self, controller: &WindSourceController) -> Aabb {
        let (front, _) = self.shell(controller.progress());
        controller.world_bounds(&Aabb::from_center(
            Point3::origin(),
            Vector3::repeat(front),
        ))
    }

    fn validate(&self) -> sim_types::Result<()> {
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(SimError::invalid_config("explosion radius must be positive"));
        }
        if !self.peak_velocity.is_finite() {
            return Err(SimError::invalid_config("explosion peak velocity must be finite"));
        }
        if self.shell_fraction.is_nan() || self.shell_fraction <= 0.0 || self.shell_fraction > 1.0 {
            return Err(SimError::invalid_config(
                "explosion shell fraction must be in (0, 1]",
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
    use sim_types::Coords;

    #[test]
    fn test_shell_radii() {
        let e = ExplosionWind::new(500.0, 200.0);
        let (front, back) = e.shell(0.5);
        assert_relative_eq!(front, 200.0 * 0.5_f64.powf(0.4), epsilon = 1e-12);
        assert_relative_eq!(back, front * 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_speed_zero_outside_band() {
        let e = ExplosionWind::new(500.0, 200.0);
        let (front, back) = e.shell(0.5);
        assert!(e.speed(back * 0.9, 0.5).abs() < f64::EPSILON);
        assert!(e.speed(front * 1.01, 0.5).abs() < f64::EPSILON);
        assert!(e.speed(250.0, 0.5).abs() < f64::EPSILON);
        let mid = e.speed(0.5 * (front + back), 0.5);
        assert_relative_eq!(mid, 500.0 * 0.25, epsilon = 1e-9);
        // Dead at the end of the lifetime.
        assert!(e.speed(150.0, 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_velocity_points_outward() {
        let e = ExplosionWind::new(100.0, 10.0);
        let mut c = WindSourceController::new(&Coords::from_translation(Point3::new(5.0, 0.0, 0.0)), 1.0);
        c.advance(0.5);
        let (front, back) = e.shell(0.5);
        let r = 0.5 * (front + back);
        let v = e.velocity(&c, &Point3::new(5.0, r, 0.0));
        assert!(v.y > 0.0);
        assert!(v.x.abs() < 1e-12 && v.z.abs() < 1e-12);
    }

    #[test]
    fn test_validate() {
        assert!(ExplosionWind::new(1.0, 1.0).validate().is_ok());
        assert!(ExplosionWind::new(1.0, 0.0).validate().is_err());
        assert!(ExplosionWind::new(1.0, 1.0).with_shell_fraction(0.0).validate().is_err());
    }
}
