//! Math kernel and shared types for the deformable simulation core.
//!
//! - [`Coords`] - affine frames with QR-style decomposition
//! - [`Aabb`] - axis-aligned bounds
//! - [`Sphere`], [`Capsule`], [`Cuboid`], [`Ellipsoid`] - shape primitives with
//!   closest-point and ray queries
//! - [`VelocityField`] - the seam through which meshes sample wind
//! - [`Arena`] / [`Handle`] - generation-checked object tables
//! - [`SimulationConfig`] - substep policy
//!
//! # Layer 0
//!
//! Pure data and pure functions. No threads, no logging, no globals.
//!
//! # Coordinate System
//!
//! - X: right
//! - Y: forward
//! - Z: up (gravity acts along -Z)
//! - Right-handed
//!
//! # Example
//!
//! ```
//! use sim_types::{Coords, Point3, Shape, Sphere};
//!
//! let frame = Coords::from_translation(Point3::new(0.0, 0.0, 2.0));
//! let ball = Shape::Sphere(Sphere::new(1.0));
//! let local = frame.local_point(&Point3::new(0.0, 0.0, 4.0));
//! assert!((ball.signed_distance(&local) - 1.0).abs() < 1e-12);
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,
    clippy::cast_precision_loss,
    clippy::missing_errors_doc,
)]

mod aabb;
mod arena;
mod config;
mod coords;
mod error;
mod field;
mod shapes;

pub use aabb::Aabb;
pub use arena::{Arena, Handle};
pub use config::SimulationConfig;
pub use coords::{Coords, any_orthogonal};
pub use error::SimError;
pub use field::{UniformField, VelocityField, ZeroField};
pub use shapes::{Capsule, Cuboid, Ellipsoid, Ray, RayHit, Shape, Sphere, SurfacePoint};

pub use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector2, Vector3};

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;
