//! Property-based tests for particle constraints.
//!
//! Run with: cargo test -p sim-particles -- proptest

#![allow(clippy::unwrap_used, clippy::expect_used)]

use nalgebra::Point3;
use proptest::prelude::*;
use sim_particles::{GroupConfig, ParticleGroup, dihedral_angle, wrap_angle};

// =============================================================================
// Strategies
// =============================================================================

fn arb_point() -> impl Strategy<Value = Point3<f64>> {
    prop::array::uniform3(-50.0..50.0f64).prop_map(|[x, y, z]| Point3::new(x, y, z))
}

// =============================================================================
// Property Tests: Links
// =============================================================================

proptest! {
    /// A new link's rest length equals the current particle distance.
    #[test]
    fn link_rest_length_matches_distance(
        a in arb_point(),
        b in arb_point(),
        stiffness in 0.0..1.0f64,
        stretch in 1.0..2.0f64,
        contraction in 0.0..1.0f64,
    ) {
        let mut group = ParticleGroup::default();
        let pa = group.add_particle(a, 0.05, false);
        let pb = group.add_particle(b, 0.05, false);
        let link = group.add_link(pa, pb, stiffness, stretch, contraction).unwrap();
        let rest = group.link(link).unwrap().rest_length;
        prop_assert!((rest - (b - a).norm()).abs() < 1e-9);
    }

    /// A stiff link between a fixed and a free particle lands inside its band.
    #[test]
    fn stiff_link_lands_in_band(
        a in arb_point(),
        b in arb_point(),
        target in arb_point(),
    ) {
        prop_assume!((b - a).norm() > 1e-3);
        prop_assume!((target - a).norm() > 1e-3);

        let mut group = ParticleGroup::new(GroupConfig::default().with_iterations(1).with_damping(0.0));
        let pa = group.add_particle(a, 0.05, true);
        let pb = group.add_particle(b, 0.05, false);
        let link = group.add_link(pa, pb, 1.0, 1.2, 0.1).unwrap();
        group.set_position(pb, target, sim_particles::PositionMode::Reset).unwrap();
        group.update(1.0 / 60.0).unwrap();

        let link = group.link(link).unwrap();
        let len = (group.particle(pb).unwrap().position - a).norm();
        prop_assert!(len >= link.min_length() - 1e-6);
        prop_assert!(len <= link.max_length() + 1e-6);
    }
}

// =============================================================================
// Property Tests: Angles
// =============================================================================

proptest! {
    /// Wrapped angles stay in (-pi, pi] and differ by whole turns.
    #[test]
    fn wrap_angle_range(angle in -100.0..100.0f64) {
        use std::f64::consts::{PI, TAU};
        let w = wrap_angle(angle);
        prop_assert!(w > -PI - 1e-12 && w <= PI + 1e-12);
        let turns = (angle - w) / TAU;
        prop_assert!((turns - turns.round()).abs() < 1e-9);
    }

    /// Dihedral angle is invariant under translation.
    #[test]
    fn dihedral_translation_invariant(
        pts in prop::array::uniform4(arb_point()),
        offset in arb_point(),
    ) {
        let [a0, a1, s0, s1] = pts;
        prop_assume!((a1 - a0).cross(&(s0 - a0)).norm() > 1e-2);
        prop_assume!((a1 - a0).cross(&(s1 - a0)).norm() > 1e-2);
        let o = offset.coords;
        let base = dihedral_angle(&a0, &a1, &s0, &s1);
        let moved = dihedral_angle(&(a0 + o), &(a1 + o), &(s0 + o), &(s1 + o));
        prop_assert!(wrap_angle(base - moved).abs() < 1e-6);
    }
}
