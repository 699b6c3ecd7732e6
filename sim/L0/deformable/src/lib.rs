//! Position-based cloth meshes driven by an animated pose.
//!
//! A [`DeformableMesh`] turns a triangle mesh into one particle group with
//! one distance link per edge and one bend constraint per interior edge.
//! Selected vertices are attached to the animated pose; every other vertex
//! is kept loosely around its animated rest position by two passes that
//! run after each particle solve:
//!
//! - **Enclosure**: a vertex may stray from its rest position by a radius
//!   that grows with its hierarchy depth (edges to the nearest attachment).
//! - **Shock propagation**: each hierarchy link is clamped to
//!   `rest_length * shock_ratio`, parents first.
//!
//! ```text
//!   A───●───●───A      A  attachment (depth 0)
//!   │ ╲ │ ╲ │ ╲ │      ●  depth 1
//!   ●───○───○───●      ○  depth 2
//! ```
//!
//! Wind and animation coupling act on velocities through exponential
//! relaxation (`v' = target + (v - target) * exp(-rate * dt)`), which stays
//! stable for any timestep.
//!
//! # Quick Start
//!
//! ```
//! use sim_deformable::{DeformableMesh, DeformableMeshParams};
//! use sim_types::{Coords, UniformField};
//! use nalgebra::Vector3;
//!
//! let mut mesh = DeformableMesh::grid(
//!     4,
//!     4,
//!     0.1,
//!     &Coords::identity(),
//!     DeformableMeshParams::cotton(),
//! )
//! .unwrap();
//! mesh.set_attachment_indices(&[0, 3]).unwrap();
//!
//! let wind = UniformField(Vector3::new(2.0, 0.0, 0.0));
//! let dt = 1.0 / 60.0;
//! mesh.process_attached_vertices().unwrap();
//! mesh.update(dt, &wind).unwrap();
//! mesh.simulate(dt).unwrap();
//! ```
//!
//! # Control points
//!
//! External rigid frames (bones, props) can ride on the cloth:
//! [`DeformableMesh::set_rigid_control_point`] snaps a frame to the nearest
//! edge or vertex and [`DeformableMesh::get_control_point`] returns where
//! that frame is now.

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,
    clippy::suboptimal_flops,
    clippy::cast_precision_loss,
    clippy::missing_errors_doc
)]
#![cfg_attr(test, allow(clippy::float_cmp))]

pub mod control;
pub mod error;
pub mod forces;
mod hierarchy;
pub mod mesh;
pub mod params;
mod topology;
pub mod types;

pub use control::{ControlPoint, EDGE_COORD_EPSILON, SkinWeights};
pub use error::{DeformableError, Result};
pub use mesh::DeformableMesh;
pub use params::DeformableMeshParams;
pub use types::{
    EdgeSides, EdgeVertices, HierarchyLink, PhysicalVertex, TopologyIssue, Triangle, VertexFlags,
};
