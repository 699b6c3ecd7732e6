//! A 16x16 closed box with one unit source at the center.
//!
//! After one step with a 50-cycle multigrid projection, the net flux out of
//! any closed contour equals the source strength it encloses.

use nalgebra::Vector2;
use sim_fluid::{FluidConfig, PressureSolver};
use sim_integration_tests::{closed_box, contour_flux};
use sim_physics::{FluidId, System};
use sim_types::SimulationConfig;

const N: usize = 16;
const CENTER: (usize, usize) = (8, 8);

fn stepped_box(system: &System) -> FluidId {
    let config = FluidConfig::realtime().with_solver(PressureSolver::Multigrid, 50);
    let id = system.add_fluid_system(config).unwrap();
    system
        .with_fluid(id, |fluid| {
            fluid.set_size(N, N, Vector2::new(N as f64, N as f64))?;
            fluid.set_static_data(&closed_box(N, CENTER, 1.0))
        })
        .unwrap()
        .unwrap();
    system.update(1.0 / 60.0).unwrap();
    id
}

#[test]
fn flux_around_source_equals_strength() {
    let system = System::new(SimulationConfig::realtime()).unwrap();
    let id = stepped_box(&system);

    system
        .with_fluid(id, |fluid| {
            for (xs, ys) in [((5, 11), (5, 11)), ((2, 13), (3, 12)), ((8, 8), (8, 8))] {
                let flux = contour_flux(fluid, xs, ys);
                assert!((flux - 1.0).abs() < 1e-6, "flux {flux} around {xs:?} x {ys:?}");
            }
            // A contour that misses the source carries no net flux.
            let flux = contour_flux(fluid, (2, 5), (2, 5));
            assert!(flux.abs() < 1e-6, "flux {flux} away from the source");
        })
        .unwrap();
}

#[test]
fn every_open_cell_matches_its_source() {
    let system = System::new(SimulationConfig::realtime()).unwrap();
    let id = stepped_box(&system);

    system
        .with_fluid(id, |fluid| {
            let stats = *fluid.stats();
            assert_eq!(stats.iterations, 50);
            assert!(stats.final_residual < 1e-6);

            for y in 0..N {
                for x in 0..N {
                    if fluid.is_solid_node(x, y) {
                        continue;
                    }
                    let source = if (x, y) == CENTER { 1.0 } else { 0.0 };
                    let div = fluid.velocity_divergence(x, y);
                    assert!((div - source).abs() < 1e-6, "div {div} at ({x}, {y})");
                }
            }
        })
        .unwrap();
}
