//! Velocity-level coupling to wind and to the animated pose.
//!
//! Both couplings relax a velocity toward a target with a factor
//! `exp(-rate * dt)`. The factor lies in `[0, 1]` for every non-negative
//! rate and timestep, so neither coupling can add energy.

use nalgebra::{Point3, Vector3};

/// `exp(-rate * dt)` with negative inputs clamped to zero.
#[must_use]
pub fn decay(rate: f64, dt: f64) -> f64 {
    let x = rate.max(0.0) * dt.max(0.0);
    if x.is_nan() { 1.0 } else { (-x).exp() }
}

/// Relax `velocity` toward `wind` separately along `normal` and in the
/// tangent plane.
///
/// Without a usable normal the normal rate is applied to every axis.
#[must_use]
pub fn relax_toward_wind(
    velocity: &Vector3<f64>,
    wind: &Vector3<f64>,
    normal: Option<&Vector3<f64>>,
    normal_friction: f64,
    tangent_friction: f64,
    dt: f64,
) -> Vector3<f64> {
    let relative = velocity - wind;
    let kn = decay(normal_friction, dt);
    match normal {
        Some(n) => {
            let along = n * relative.dot(n);
            let across = relative - along;
            wind + along * kn + across * decay(tangent_friction, dt)
        }
        None => wind + relative * kn,
    }
}

/// Inputs for the animation follow target of one vertex.
#[derive(Debug, Clone, Copy)]
pub struct AnimationTarget {
    /// Animated rest position now.
    pub def_position: Point3<f64>,
    /// Animated rest position at the previous pose update.
    pub prev_def_position: Point3<f64>,
    /// Time between the two pose updates.
    pub def_interval: f64,
    /// Live particle position.
    pub position: Point3<f64>,
}

impl AnimationTarget {
    /// Velocity the particle should move with to follow the pose.
    ///
    /// `velocity_factor * pose_velocity + position_factor * (def - x)`,
    /// clamped to `max_velocity`.
    #[must_use]
    pub fn velocity(&self, velocity_factor: f64, position_factor: f64, max_velocity: f64) -> Vector3<f64> {
        let pose_velocity = if self.def_interval > 0.0 {
            (self.def_position - self.prev_def_position) / self.def_interval
        } else {
            Vector3::zeros()
        };
        let target = pose_velocity * velocity_factor
            + (self.def_position - self.position) * position_factor;
        let speed = target.norm();
        if speed > max_velocity && speed > 0.0 {
            target * (max_velocity / speed)
        } else {
            target
        }
    }
}

/// Move `velocity` toward `target` by `(1 - exp(-rate dt)) * control_ratio`.
#[must_use]
pub fn relax_toward(
    velocity: &Vector3<f64>,
    target: &Vector3<f64>,
    rate: f64,
    dt: f64,
    control_ratio: f64,
) -> Vector3<f64> {
    let k = (1.0 - decay(rate, dt)) * control_ratio.clamp(0.0, 1.0);
    velocity + (target - velocity) * k
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_decay_bounds() {
        assert_relative_eq!(decay(0.0, 1.0), 1.0);
        assert_relative_eq!(decay(1.0, 0.0), 1.0);
        assert_relative_eq!(decay(-5.0, 1.0), 1.0);
        assert_relative_eq!(decay(0.0, f64::INFINITY), 1.0);
        assert_relative_eq!(decay(1.0, f64::INFINITY), 0.0);
        assert_relative_eq!(decay(2.0, 0.5), (-1.0_f64).exp());
    }

    #[test]
    fn test_wind_relaxation_per_axis() {
        let n = Vector3::z();
        let v = Vector3::new(4.0, 0.0, 4.0);
        let w = Vector3::zeros();
        // Normal decays, tangent untouched.
        let out = relax_toward_wind(&v, &w, Some(&n), 1e9, 0.0, 1.0);
        assert_relative_eq!(out, Vector3::new(4.0, 0.0, 0.0), epsilon = 1e-9);
        // Huge timestep converges to the wind.
        let wind = Vector3::new(1.0, 2.0, 3.0);
        let out = relax_toward_wind(&v, &wind, Some(&n), 1.0, 1.0, 1e6);
        assert_relative_eq!(out, wind, epsilon = 1e-9);
    }

    #[test]
    fn test_animation_target_clamped() {
        let target = AnimationTarget {
            def_position: Point3::new(1.0, 0.0, 0.0),
            prev_def_position: Point3::origin(),
            def_interval: 0.1,
            position: Point3::new(1.0, 0.0, 0.0),
        };
        assert_relative_eq!(target.velocity(1.0, 0.0, 100.0), Vector3::new(10.0, 0.0, 0.0));
        assert_relative_eq!(target.velocity(1.0, 0.0, 2.0), Vector3::new(2.0, 0.0, 0.0));

        let lagging = AnimationTarget {
            position: Point3::origin(),
            ..target
        };
        assert_relative_eq!(lagging.velocity(0.0, 3.0, 100.0), Vector3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn test_relax_toward_respects_ratio() {
        let v = Vector3::zeros();
        let t = Vector3::new(1.0, 0.0, 0.0);
        assert_relative_eq!(relax_toward(&v, &t, 1e9, 1.0, 1.0), t, epsilon = 1e-12);
        assert_relative_eq!(relax_toward(&v, &t, 1e9, 1.0, 0.0), v);
        assert_relative_eq!(relax_toward(&v, &t, 1e9, 1.0, 0.5), t * 0.5, epsilon = 1e-12);
    }
}
