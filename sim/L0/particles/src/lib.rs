//! Particle substrate for position-based cloth.
//!
//! A [`ParticleGroup`] owns particles, distance [`Link`]s, dihedral
//! [`BendConstraint`]s and static [`Obstacle`]s. Everything is addressed by
//! generation-checked handles; removals are deferred until the group's next
//! [`update`](ParticleGroup::update).
//!
//! # Example
//!
//! ```
//! use sim_particles::{GroupConfig, ParticleGroup};
//! use nalgebra::Point3;
//!
//! let mut group = ParticleGroup::new(GroupConfig::default());
//! let a = group.add_particle(Point3::origin(), 0.05, true);
//! let b = group.add_particle(Point3::new(1.0, 0.0, 0.0), 0.05, false);
//! let link = group.add_link(a, b, 1.0, 1.0, 0.0).unwrap();
//! assert!((group.link(link).unwrap().rest_length - 1.0).abs() < 1e-12);
//! group.update(1.0 / 60.0).unwrap();
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,
    clippy::suboptimal_flops,
    clippy::cast_precision_loss,
    clippy::missing_errors_doc
)]

mod config;
mod constraint;
mod group;
mod obstacle;
mod particle;
mod system;

pub use config::GroupConfig;
pub use constraint::{BendConstraint, Link, dihedral_angle, wrap_angle};
pub use group::ParticleGroup;
pub use obstacle::{CollisionEvent, Obstacle};
pub use particle::{Particle, PositionMode};
pub use system::ParticleSystem;

use sim_types::Handle;

/// Handle to a particle within its group.
pub type ParticleId = Handle<Particle>;
/// Handle to a link within its group.
pub type LinkId = Handle<Link>;
/// Handle to a bend constraint within its group.
pub type BendId = Handle<BendConstraint>;
/// Handle to an obstacle within its group.
pub type ObstacleId = Handle<Obstacle>;
/// Handle to a group registered with a [`ParticleSystem`].
pub type GroupId = Handle<ParticleGroup>;
