//! Frame orchestration for cloth, wind and fluid simulation.
//!
//! [`System`] owns every simulated object and re-exports the layer below:
//!
//! - [`sim_types`] - math kernel, handles, timestep policy
//! - [`sim_particles`] - particle groups with links and bend constraints
//! - [`sim_deformable`] - cloth meshes driven by an animated pose
//! - [`sim_wind`] - analytic wind sources
//! - [`sim_fluid`] - 2-D staggered-grid flow
//!
//! # Timestep policy
//!
//! Frames arrive with a variable `dt`. Cloth is stepped in fixed substeps
//! (`SimulationConfig::effective_substep`), at most `max_substeps` per frame.
//! The unconsumed remainder is exposed as
//! [`System::extrapolation_time`] for rendering. Wind and fluid grids are
//! stepped once per frame with the frame's `dt`.
//!
//! # Quick Start
//!
//! ```
//! use sim_physics::prelude::*;
//!
//! let system = System::new(SimulationConfig::realtime()).unwrap();
//!
//! // A 5x5 sheet hanging from two corners.
//! let sheet = DeformableMesh::grid(5, 5, 0.1, &Coords::identity(), DeformableMeshParams::cotton())
//!     .unwrap();
//! let id = system.insert_deformable_mesh(sheet, None);
//! system.with_mesh(id, |mesh| mesh.set_attachment_indices(&[0, 4])).unwrap().unwrap();
//!
//! // A gust from a detached explosion.
//! let blast = ExplosionWind::new(20.0, 5.0);
//! let source = system
//!     .wind_mut()
//!     .add_explosion_wind_source(&Coords::from_translation(Point3::new(0.2, 0.2, -1.0)), 1.0, blast)
//!     .unwrap();
//! system.wind_mut().detach(source).unwrap();
//!
//! for _ in 0..30 {
//!     system.update(1.0 / 60.0).unwrap();
//! }
//! assert!(system.simulation_time() > 0.49);
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     sim-physics (this crate)                    │
//! │        System: tables, locks, substep loop, callbacks           │
//! └─────────────────────────────────────────────────────────────────┘
//!          │                    │                      │
//!          ▼                    ▼                      ▼
//!  ┌────────────────┐   ┌──────────────┐       ┌──────────────┐
//!  │ sim-deformable │   │   sim-wind   │       │  sim-fluid   │
//!  │  cloth meshes  │◄──│ VelocityField│       │  MAC grid    │
//!  └───────┬────────┘   └──────┬───────┘       └──────────────┘
//!          ▼                   │
//!  ┌────────────────┐          │
//!  │ sim-particles  │          │
//!  └───────┬────────┘          │
//!          └─────────┬─────────┘
//!                    ▼
//!           ┌─────────────────┐
//!           │    sim-types    │
//!           └─────────────────┘
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc
)]

mod callback;
mod error;
mod system;

pub use callback::PhysicsCallback;
pub use error::{PhysicsError, Result};
pub use system::{DeformableMeshId, FluidId, FrameStats, MeshEntry, System};

// Re-export sub-crates
pub use sim_deformable;
pub use sim_fluid;
pub use sim_particles;
pub use sim_types;
pub use sim_wind;

// Re-export nalgebra for convenience
pub use nalgebra;

/// Prelude module for convenient imports.
///
/// ```
/// use sim_physics::prelude::*;
/// ```
pub mod prelude {
    // ========================================================================
    // Orchestrator
    // ========================================================================

    pub use crate::{
        DeformableMeshId, FluidId, FrameStats, PhysicsCallback, PhysicsError, System,
    };

    // ========================================================================
    // Core types from sim-types
    // ========================================================================

    pub use sim_types::{
        Aabb, Capsule, Coords, Cuboid, Ellipsoid, Shape, SimError, SimulationConfig, Sphere,
        UniformField, VelocityField, ZeroField,
    };

    // ========================================================================
    // Particles
    // ========================================================================

    pub use sim_particles::{GroupConfig, GroupId, Obstacle, ParticleGroup, PositionMode};

    // ========================================================================
    // Cloth
    // ========================================================================

    pub use sim_deformable::{DeformableError, DeformableMesh, DeformableMeshParams, SkinWeights};

    // ========================================================================
    // Wind
    // ========================================================================

    pub use sim_wind::{
        DirectionalWind, ExplosionWind, TurbulenceWind, VortexWind, WakeWind, WindSourceId,
        WindSystem,
    };

    // ========================================================================
    // Fluid
    // ========================================================================

    pub use sim_fluid::{
        FluidConfig, FluidDynamicNode, FluidError, FluidStaticNode, FluidSystem, PressureSolver,
    };

    // ========================================================================
    // Math types from nalgebra
    // ========================================================================

    pub use nalgebra::{Point3, UnitQuaternion, Vector2, Vector3};
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_imports() {
        let _config = SimulationConfig::default();
        let _params = DeformableMeshParams::leather();
        let _fluid = FluidConfig::smoke();
        let _wind = WindSystem::new();
    }

    #[test]
    fn test_system_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<System>();
    }

    #[test]
    fn test_shared_across_threads() {
        let system = System::new(SimulationConfig::realtime()).unwrap();
        std::thread::scope(|scope| {
            scope.spawn(|| {
                let sheet =
                    DeformableMesh::grid(3, 3, 0.1, &Coords::identity(), DeformableMeshParams::cotton())
                        .unwrap();
                system.insert_deformable_mesh(sheet, None);
            });
        });
        system.update(1.0 / 60.0).unwrap();
        assert_eq!(system.frame_stats().meshes, 1);
    }
}
