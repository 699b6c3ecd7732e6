//! Handles stay valid until the next update after removal, then fail with
//! an invalid-handle error instead of aliasing a newer object.

use nalgebra::{Point3, Vector3};
use sim_deformable::{DeformableMesh, DeformableMeshParams};
use sim_fluid::FluidConfig;
use sim_particles::{GroupConfig, ParticleGroup};
use sim_physics::System;
use sim_types::{Coords, SimulationConfig};
use sim_wind::DirectionalWind;

fn sheet() -> DeformableMesh {
    DeformableMesh::grid(3, 3, 0.1, &Coords::identity(), DeformableMeshParams::cotton()).unwrap()
}

#[test]
fn removed_mesh_slot_is_not_aliased() {
    let system = System::new(SimulationConfig::realtime()).unwrap();
    let old = system.insert_deformable_mesh(sheet(), None);
    system.remove_deformable_mesh(old).unwrap();
    system.update(1.0 / 60.0).unwrap();

    let new = system.insert_deformable_mesh(sheet(), None);
    assert_eq!(new.index(), old.index());
    assert_ne!(new.generation(), old.generation());
    assert!(system.with_mesh(old, |_| ()).unwrap_err().is_invalid_handle());
    assert!(system.with_mesh(new, |_| ()).is_ok());
    assert!(system.remove_deformable_mesh(old).is_err());
}

#[test]
fn stale_wind_and_fluid_handles_fail() {
    let system = System::new(SimulationConfig::realtime()).unwrap();
    let wind = system
        .wind_mut()
        .add_directional_wind_source(
            &Coords::identity(),
            0.1,
            DirectionalWind::new(Vector3::new(1.0, 0.0, 0.0), Vector3::repeat(1.0)),
        )
        .unwrap();
    system.wind_mut().detach(wind).unwrap();
    let fluid = system.add_fluid_system(FluidConfig::realtime()).unwrap();
    system.remove_fluid_system(fluid).unwrap();

    // Expires the wind source and releases the fluid grid.
    system.update(0.2).unwrap();
    system.update(0.0).unwrap();

    assert!(system.wind().source(wind).unwrap_err().is_invalid_handle());
    assert!(system.with_fluid(fluid, |_| ()).unwrap_err().is_invalid_handle());
}

#[test]
fn standalone_particles_step_with_the_frame() {
    let system = System::new(SimulationConfig::realtime()).unwrap();
    let (group, particle) = {
        let mut group = ParticleGroup::new(GroupConfig::default());
        let p = group.add_particle(Point3::origin(), 0.05, false);
        group.particle_mut(p).unwrap().acceleration = Vector3::new(0.0, 0.0, -9.81);
        (system.particles_mut().add_group(group), p)
    };

    let stats = system.update(3.0 / 60.0).unwrap();
    assert_eq!(stats.substeps, 3);
    assert_eq!(stats.particle_groups, 1);
    let z = system
        .particles_mut()
        .group(group)
        .unwrap()
        .particle(particle)
        .unwrap()
        .position
        .z;
    assert!(z < 0.0);
}
