//! A single explosion at the origin (peak 500 m/s, radius 200 m, 1 s),
//! sampled through the orchestrator's wind system at t = 0.5 s.

use nalgebra::{Point3, Vector3};
use sim_physics::System;
use sim_types::{Coords, SimulationConfig};
use sim_wind::ExplosionWind;

const BLAST: ExplosionWind = ExplosionWind::new(500.0, 200.0);

fn system_at_half_life() -> System {
    let system = System::new(SimulationConfig::realtime()).unwrap();
    system
        .wind_mut()
        .add_explosion_wind_source(&Coords::identity(), 1.0, BLAST)
        .unwrap();
    system.update(0.5).unwrap();
    system
}

fn speed_along_x(system: &System, r: f64) -> f64 {
    system.wind().global_wind_velocity(&Point3::new(r, 0.0, 0.0)).norm()
}

#[test]
fn still_outside_the_shell() {
    let system = system_at_half_life();
    let (front, back) = BLAST.shell(0.5);
    assert!(front < 250.0);

    assert_eq!(
        system.wind().global_wind_velocity(&Point3::new(250.0, 0.0, 0.0)),
        Vector3::zeros()
    );
    for r in [0.0, 0.5 * back, back, front, 1.5 * front] {
        assert!(speed_along_x(&system, r) < 1e-9, "moving air at r = {r}");
    }
}

#[test]
fn outward_inside_the_shell() {
    let system = system_at_half_life();
    let (front, back) = BLAST.shell(0.5);

    for i in 1..20 {
        let r = back + (front - back) * f64::from(i) / 20.0;
        let v = system.wind().global_wind_velocity(&Point3::new(0.0, r, 0.0));
        assert!(v.y > 0.0, "no outflow at r = {r}");
        assert!(v.x.abs() < 1e-9 && v.z.abs() < 1e-9);
    }

    // Single smooth peak in the middle of the band, faded by (1 - 0.5)².
    let mid = speed_along_x(&system, 0.5 * (front + back));
    assert!((mid - 500.0 * 0.25).abs() < 1e-6);
    assert!(speed_along_x(&system, 0.4 * front + 0.6 * back) < mid);
    assert!(speed_along_x(&system, 0.6 * front + 0.4 * back) < mid);
}

#[test]
fn continuous_along_a_ray() {
    let system = system_at_half_life();
    let (front, back) = BLAST.shell(0.5);
    let lipschitz = 500.0 * 0.25 * std::f64::consts::PI / (front - back);

    let step = 0.01;
    let mut previous = speed_along_x(&system, 0.0);
    for i in 1..=30_000 {
        let speed = speed_along_x(&system, f64::from(i) * step);
        assert!(
            (speed - previous).abs() <= lipschitz * step * 1.01,
            "jump of {} at r = {}",
            speed - previous,
            f64::from(i) * step
        );
        previous = speed;
    }
}
