//! A 3x3 sheet pinned at its four corners, no gravity, no wind.
//!
//! ```text
//!   6───7───8      corners 0, 2, 6, 8 attached
//!   │ ╱ │ ╱ │
//!   3───4───5
//!   │ ╱ │ ╱ │
//!   0───1───2
//! ```

use approx::assert_relative_eq;
use nalgebra::{Point3, Vector3};
use sim_deformable::{DeformableMesh, DeformableMeshParams};
use sim_particles::PositionMode;
use sim_physics::{DeformableMeshId, System};
use sim_types::{Coords, SimulationConfig};

const CORNERS: [u32; 4] = [0, 2, 6, 8];
const SPACING: f64 = 0.1;

fn pinned_sheet(system: &System, params: DeformableMeshParams) -> DeformableMeshId {
    let coords = Coords::from_translation(Point3::new(1.0, -2.0, 0.5));
    let mesh = DeformableMesh::grid(3, 3, SPACING, &coords, params.with_gravity(0.0)).unwrap();
    let id = system.insert_deformable_mesh(mesh, None);
    system
        .with_mesh(id, |mesh| mesh.set_attachment_indices(&CORNERS))
        .unwrap()
        .unwrap();
    id
}

/// Bilinear interpolation of the four corners at grid vertex `i`.
fn bilinear(corners: [Point3<f64>; 4], i: usize) -> Point3<f64> {
    let s = (i % 3) as f64 / 2.0;
    let t = (i / 3) as f64 / 2.0;
    let [c00, c10, c01, c11] = corners.map(|c| c.coords);
    Point3::from(
        c00 * (1.0 - s) * (1.0 - t) + c10 * s * (1.0 - t) + c01 * (1.0 - s) * t + c11 * s * t,
    )
}

fn assert_flat(system: &System, id: DeformableMeshId, tolerance: f64) {
    let positions = system.with_mesh(id, |mesh| mesh.positions()).unwrap();
    let corners = CORNERS.map(|c| positions[c as usize]);
    for (i, p) in positions.iter().enumerate() {
        let expected = bilinear(corners, i);
        assert!(
            (p - expected).norm() < tolerance,
            "vertex {i} at {p:?}, expected {expected:?}"
        );
    }
}

fn run_substeps(system: &System, substeps: u32) {
    let h = system.config().effective_substep();
    for _ in 0..substeps {
        let stats = system.update(h).unwrap();
        assert_eq!(stats.substeps, 1);
    }
}

#[test]
fn sheet_at_rest_stays_flat() {
    let system = System::new(SimulationConfig::realtime()).unwrap();
    let id = pinned_sheet(&system, DeformableMeshParams::cotton());
    let before = system.with_mesh(id, |mesh| mesh.positions()).unwrap();

    run_substeps(&system, 100);

    assert_flat(&system, id, 1e-9);
    let after = system.with_mesh(id, |mesh| mesh.positions()).unwrap();
    for c in CORNERS {
        assert_relative_eq!(after[c as usize], before[c as usize], epsilon = 1e-12);
    }
}

/// Displaced free vertices settle back onto the plane of the corners.
///
/// Links are taut (no stretch or contraction allowance) and animation
/// coupling is off, so only the constraint solve restores the sheet.
#[test]
fn perturbed_sheet_converges_flat() {
    let params = DeformableMeshParams::cotton().with_links(1.0, 1.0, 0.0);
    assert!(!params.animation_enabled());

    let system = System::new(SimulationConfig::realtime()).unwrap();
    let id = pinned_sheet(&system, params);
    let offsets = [
        (1, Vector3::new(0.01, 0.0, 0.015)),
        (3, Vector3::new(0.0, -0.012, -0.01)),
        (4, Vector3::new(0.015, 0.01, 0.03)),
        (5, Vector3::new(-0.01, 0.005, 0.02)),
        (7, Vector3::new(0.008, -0.01, -0.02)),
    ];
    system
        .with_mesh(id, |mesh| {
            for (v, offset) in offsets {
                let vertex = &mesh.vertices()[v];
                let (particle, moved) = (vertex.particle, vertex.def_position + offset);
                mesh.particle_group_mut()
                    .set_position(particle, moved, PositionMode::Teleport)?;
            }
            Ok::<_, sim_types::SimError>(())
        })
        .unwrap()
        .unwrap();

    run_substeps(&system, 100);

    assert_flat(&system, id, 1e-3);
}

/// With the default contraction allowance the sheet comes back to the
/// plane, but may rest anywhere inside the link tolerance band in-plane.
#[test]
fn lifted_center_returns_to_plane() {
    let system = System::new(SimulationConfig::realtime()).unwrap();
    let id = pinned_sheet(&system, DeformableMeshParams::cotton());
    system
        .with_mesh(id, |mesh| {
            let center = &mesh.vertices()[4];
            let (particle, lifted) = (center.particle, center.def_position + Vector3::new(0.0, 0.0, 0.03));
            mesh.particle_group_mut()
                .set_position(particle, lifted, PositionMode::Teleport)
        })
        .unwrap()
        .unwrap();

    run_substeps(&system, 100);

    let positions = system.with_mesh(id, |mesh| mesh.positions()).unwrap();
    let plane = positions[CORNERS[0] as usize].z;
    for p in &positions {
        assert!((p.z - plane).abs() < 1e-3, "vertex off the plane: {p:?}");
    }
    assert_flat(&system, id, SPACING * 0.3);
}
