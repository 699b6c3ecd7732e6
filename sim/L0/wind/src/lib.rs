//! Analytic wind sources summed into one velocity field.
//!
//! Every source pairs a [`WindSourceController`] (frame, clock, bounds,
//! playing/attached flags) with a closed-form model:
//!
//! | Model                 | Field                                             |
//! |-----------------------|---------------------------------------------------|
//! | [`ExplosionWind`]     | Radial blast shell expanding over the lifetime    |
//! | [`VortexWind`]        | Rankine vortex around the local z axis            |
//! | [`WakeWind`]          | Street of vortex pairs shed behind a moving anchor |
//! | [`DirectionalWind`]   | Uniform wind in a soft-edged box, optional gusts  |
//! | [`TurbulenceWind`]    | Seeded noise texture scrolled through a box       |
//!
//! Sources do not interact: [`WindSystem::global_wind_velocity`] is the
//! plain sum of every playing source whose bounds contain the point.
//!
//! # Lifetime
//!
//! ```text
//!   add ──► playing ──(duration elapsed or stop)──► stopped
//!             │                                       │
//!          detach                                  detached? ──► collected
//! ```
//!
//! A negative duration plays until stopped. Detached sources keep playing
//! and are removed by [`WindSystem::update`] once they stop.
//!
//! # Example
//!
//! ```
//! use sim_types::{Coords, Point3, Vector3};
//! use sim_wind::{ExplosionWind, WindSystem};
//!
//! let mut wind = WindSystem::new();
//! let id = wind
//!     .add_explosion_wind_source(&Coords::identity(), 1.0, ExplosionWind::new(500.0, 200.0))
//!     .unwrap();
//! wind.detach(id).unwrap();
//!
//! wind.update(0.5).unwrap();
//! let v = wind.global_wind_velocity(&Point3::new(120.0, 0.0, 0.0));
//! assert!(v.x > 0.0);
//! assert_eq!(wind.global_wind_velocity(&Point3::new(250.0, 0.0, 0.0)), Vector3::zeros());
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,
    clippy::suboptimal_flops,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::missing_errors_doc
)]
#![cfg_attr(test, allow(clippy::float_cmp))]

pub mod controller;
pub mod directional;
pub mod explosion;
pub mod source;
pub mod system;
pub mod turbulence;
pub mod vortex;
pub mod wake;

pub use controller::WindSourceController;
pub use directional::DirectionalWind;
pub use explosion::{ExplosionWind, FRONT_EXPONENT};
pub use source::{WindModel, WindSource, WindSourceKind, smoothstep, soft_window};
pub use system::{WindSourceId, WindSystem};
pub use turbulence::{TurbulenceTexture, TurbulenceWind};
pub use vortex::VortexWind;
pub use wake::{VortexPair, WakeWind};
