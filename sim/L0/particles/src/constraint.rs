//! Distance links and dihedral bend constraints.
//!
//! Both constraints are projections: each call moves the participating
//! particles a fraction (`stiffness`) of the way toward satisfying the
//! constraint, weighted by inverse mass. Fixed particles never move.
//!
//! # Bend geometry
//!
//! ```text
//!            side0
//!            /   \
//!   axis0 ------- axis1      dihedral angle measured about axis0 -> axis1
//!            \   /
//!            side1
//! ```

use nalgebra::{Point3, Vector3};

use crate::ParticleId;
use crate::particle::Particle;

const EPS: f64 = 1e-10;

/// Distance constraint with a tolerance band.
///
/// The link is slack while its length lies in
/// `[rest * (1 - allowed_contraction), rest * stretch]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    /// First particle.
    pub p0: ParticleId,
    /// Second particle.
    pub p1: ParticleId,
    /// Rest length.
    pub rest_length: f64,
    /// Fraction of the error corrected per iteration, in `[0, 1]`.
    pub stiffness: f64,
    /// Maximum length as a multiple of the rest length (>= 1).
    pub stretch: f64,
    /// Allowed shortening as a fraction of the rest length, in `[0, 1]`.
    pub allowed_contraction: f64,
    /// Sum of corrections applied during the last update.
    pub impulse: f64,
}

impl Link {
    /// Create a link with the given rest length.
    #[must_use]
    pub fn new(
        p0: ParticleId,
        p1: ParticleId,
        rest_length: f64,
        stiffness: f64,
        stretch: f64,
        allowed_contraction: f64,
    ) -> Self {
        Self {
            p0,
            p1,
            rest_length: rest_length.max(0.0),
            stiffness: stiffness.clamp(0.0, 1.0),
            stretch: stretch.max(1.0),
            allowed_contraction: allowed_contraction.clamp(0.0, 1.0),
            impulse: 0.0,
        }
    }

    /// Shortest length that needs no correction.
    #[must_use]
    pub fn min_length(&self) -> f64 {
        self.rest_length * (1.0 - self.allowed_contraction)
    }

    /// Longest length that needs no correction.
    #[must_use]
    pub fn max_length(&self) -> f64 {
        self.rest_length * self.stretch
    }

    /// Project the two particles toward the tolerance band.
    pub fn solve(&mut self, a: &mut Particle, b: &mut Particle) {
        let wa = a.inv_mass();
        let wb = b.inv_mass();
        let w = wa + wb;
        if w <= 0.0 {
            return;
        }

        let delta = b.position - a.position;
        let dist = delta.norm();
        if dist < EPS {
            return;
        }

        let target = if dist > self.max_length() {
            self.max_length()
        } else if dist < self.min_length() {
            self.min_length()
        } else {
            return;
        };

        let error = dist - target;
        let correction = delta / dist * (error * self.stiffness / w);
        a.position += correction * wa;
        b.position -= correction * wb;
        self.impulse += error * self.stiffness;
    }
}

/// Dihedral angle between triangles `(axis0, axis1, side0)` and
/// `(axis0, axis1, side1)`, in `(-pi, pi]`. Zero for a flat pair.
#[must_use]
pub fn dihedral_angle(
    axis0: &Point3<f64>,
    axis1: &Point3<f64>,
    side0: &Point3<f64>,
    side1: &Point3<f64>,
) -> f64 {
    let e = axis1 - axis0;
    let e_len = e.norm();
    if e_len < EPS {
        return 0.0;
    }
    let e_norm = e / e_len;

    let n1 = e.cross(&(side0 - axis0));
    let n2 = (side1 - axis0).cross(&e);
    let n1_len = n1.norm();
    let n2_len = n2.norm();
    if n1_len < EPS || n2_len < EPS {
        return 0.0;
    }
    let n1 = n1 / n1_len;
    let n2 = n2 / n2_len;

    let cos_angle = n1.dot(&n2).clamp(-1.0, 1.0);
    let sin_angle = n1.cross(&n2).dot(&e_norm);
    sin_angle.atan2(cos_angle)
}

/// Wrap an angle into `(-pi, pi]`.
#[must_use]
pub fn wrap_angle(angle: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

/// Bending constraint on the two triangles sharing an edge.
#[derive(Debug, Clone, PartialEq)]
pub struct BendConstraint {
    /// Shared edge endpoints.
    pub axis: [ParticleId; 2],
    /// Opposite vertices of the two triangles.
    pub sides: [ParticleId; 2],
    /// Fraction of the error corrected per iteration, in `[0, 1]`.
    pub stiffness: f64,
    /// Rest dihedral angle.
    pub rest_angle: f64,
    /// Angle deviation tolerated without correction.
    pub angle_threshold: f64,
}

impl BendConstraint {
    /// Create a bend constraint with the given rest angle.
    #[must_use]
    pub fn new(
        axis: [ParticleId; 2],
        sides: [ParticleId; 2],
        stiffness: f64,
        rest_angle: f64,
        angle_threshold: f64,
    ) -> Self {
        Self {
            axis,
            sides,
            stiffness: stiffness.clamp(0.0, 1.0),
            rest_angle,
            angle_threshold: angle_threshold.max(0.0),
        }
    }

    /// Particle ids in `[axis0, axis1, side0, side1]` order.
    #[must_use]
    pub fn particles(&self) -> [ParticleId; 4] {
        [self.axis[0], self.axis[1], self.sides[0], self.sides[1]]
    }

    /// Compute position corrections for `[axis0, axis1, side0, side1]`.
    ///
    /// The correction direction follows the bending modes of Bridson et al.
    /// scaled by inverse mass. Its length comes from a Newton step on the
    /// measured angle, so it is independent of the normal orientation
    /// convention. Returns `None` when the pair is within tolerance or
    /// degenerate.
    #[must_use]
    pub fn corrections(
        &self,
        positions: &[Point3<f64>; 4],
        inv_masses: &[f64; 4],
    ) -> Option<[Vector3<f64>; 4]> {
        let [a0, a1, s0, s1] = positions;
        let angle = dihedral_angle(a0, a1, s0, s1);
        let error = wrap_angle(angle - self.rest_angle);
        if error.abs() <= self.angle_threshold {
            return None;
        }
        let error = error - self.angle_threshold.copysign(error);

        let e = a1 - a0;
        let e_len = e.norm();
        if e_len < EPS {
            return None;
        }
        let n1 = (s0 - a0).cross(&(s0 - a1));
        let n2 = (s1 - a1).cross(&(s1 - a0));
        let n1_sq = n1.norm_squared();
        let n2_sq = n2.norm_squared();
        if n1_sq < EPS || n2_sq < EPS {
            return None;
        }
        let n1 = n1 / n1_sq;
        let n2 = n2 / n2_sq;

        let u_s0 = n1 * e_len;
        let u_s1 = n2 * e_len;
        let u_a0 = n1 * ((s0 - a1).dot(&e) / e_len) + n2 * ((s1 - a1).dot(&e) / e_len);
        let u_a1 = -(n1 * ((s0 - a0).dot(&e) / e_len)) - n2 * ((s1 - a0).dot(&e) / e_len);

        let mut dirs = [u_a0, u_a1, u_s0, u_s1];
        for (d, w) in dirs.iter_mut().zip(inv_masses) {
            *d *= *w;
        }
        let dir_len = dirs.iter().map(|d| d.norm_squared()).sum::<f64>().sqrt();
        if dir_len < EPS {
            return None;
        }
        for d in &mut dirs {
            *d /= dir_len;
        }

        // Measure d(angle)/ds along the mode by a small finite difference.
        let h = 1e-4 * e_len;
        let probe = |s: f64| {
            dihedral_angle(
                &(a0 + dirs[0] * s),
                &(a1 + dirs[1] * s),
                &(s0 + dirs[2] * s),
                &(s1 + dirs[3] * s),
            )
        };
        let slope = wrap_angle(probe(h) - angle) / h;
        if slope.abs() < EPS {
            return None;
        }

        let step = -error / slope * self.stiffness;
        // Large steps leave the linear regime; limit to one edge length.
        let step = step.clamp(-e_len, e_len);
        Some(dirs.map(|d| d * step))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn quad(fold: f64) -> [Point3<f64>; 4] {
        [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, -fold.cos(), fold.sin()),
        ]
    }

    #[test]
    fn test_flat_pair_has_zero_angle() {
        let [a0, a1, s0, s1] = quad(0.0);
        assert_relative_eq!(dihedral_angle(&a0, &a1, &s0, &s1), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_folded_pair_angle_magnitude() {
        let [a0, a1, s0, s1] = quad(FRAC_PI_2);
        assert_relative_eq!(
            dihedral_angle(&a0, &a1, &s0, &s1).abs(),
            FRAC_PI_2,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_wrap_angle() {
        assert_relative_eq!(wrap_angle(3.0 * PI), PI, epsilon = 1e-12);
        assert_relative_eq!(wrap_angle(-PI), PI, epsilon = 1e-12);
        assert_relative_eq!(wrap_angle(0.5), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_bend_corrections_reduce_error() {
        let mut particles = crate::ParticleGroup::default();
        let ids: Vec<_> = (0..4)
            .map(|_| particles.add_particle(Point3::origin(), 0.0, false))
            .collect();
        let bend = BendConstraint::new([ids[0], ids[1]], [ids[2], ids[3]], 1.0, 0.0, 0.0);

        let mut pos = quad(0.6);
        let inv = [1.0; 4];
        let before = dihedral_angle(&pos[0], &pos[1], &pos[2], &pos[3]).abs();
        for _ in 0..10 {
            if let Some(c) = bend.corrections(&pos, &inv) {
                for (p, d) in pos.iter_mut().zip(c) {
                    *p += d;
                }
            }
        }
        let after = dihedral_angle(&pos[0], &pos[1], &pos[2], &pos[3]).abs();
        assert!(after < before * 0.1, "before {before}, after {after}");
    }

    #[test]
    fn test_bend_threshold_dead_zone() {
        let mut particles = crate::ParticleGroup::default();
        let ids: Vec<_> = (0..4)
            .map(|_| particles.add_particle(Point3::origin(), 0.0, false))
            .collect();
        let bend = BendConstraint::new([ids[0], ids[1]], [ids[2], ids[3]], 1.0, 0.0, 0.5);
        assert!(bend.corrections(&quad(0.3), &[1.0; 4]).is_none());
        assert!(bend.corrections(&quad(0.8), &[1.0; 4]).is_some());
    }

    #[test]
    fn test_link_band() {
        let mut group = crate::ParticleGroup::default();
        let a_id = group.add_particle(Point3::origin(), 0.0, false);
        let b_id = group.add_particle(Point3::new(1.0, 0.0, 0.0), 0.0, false);
        let mut link = Link::new(a_id, b_id, 1.0, 1.0, 1.1, 0.2);

        let mut a = Particle::new(Point3::origin(), 0.0, false);
        let mut b = Particle::new(Point3::new(1.05, 0.0, 0.0), 0.0, false);
        link.solve(&mut a, &mut b);
        assert_relative_eq!(b.position.x - a.position.x, 1.05);

        let mut b = Particle::new(Point3::new(2.0, 0.0, 0.0), 0.0, false);
        link.solve(&mut a, &mut b);
        assert_relative_eq!(b.position.x - a.position.x, 1.1, epsilon = 1e-12);

        let mut fixed = Particle::new(Point3::origin(), 0.0, true);
        let mut c = Particle::new(Point3::new(0.5, 0.0, 0.0), 0.0, false);
        link.solve(&mut fixed, &mut c);
        assert_relative_eq!(fixed.position, Point3::origin());
        assert_relative_eq!(c.position.x, 0.8, epsilon = 1e-12);
    }
}
