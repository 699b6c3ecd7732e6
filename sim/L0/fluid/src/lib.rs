//! Incompressible flow on a 2-D staggered (MAC) grid.
//!
//! Each [`FluidSystem::update`] runs four stages in a fixed order:
//!
//! 1. **Advect**: semi-Lagrangian backtrace of both velocity components and
//!    the passive substance, with bilinear sampling clamped at the edges.
//! 2. **Diffuse**: damped Jacobi relaxation of `(I - aΔ) x = x₀` for
//!    viscosity and substance diffusion, skipping solid nodes.
//! 3. **Project**: pressure Poisson solve that drives every open cell's
//!    divergence to its prescribed source, then subtracts the pressure
//!    gradient from the open faces.
//! 4. **Set bounds**: solid faces take the prescribed boundary velocity, the
//!    domain edges close, solid pressure mirrors its open neighbours.
//!
//! # Boundaries
//!
//! Solids come from a per-cell `boundary_distance` in `[0, 1]`. It is
//! sampled bilinearly at each quantity's own node position, so a face
//! between a free and a solid cell is half open. A node is solid when its
//! sampled distance exceeds [`SOLID_THRESHOLD`].
//!
//! # Pressure solvers
//!
//! | Solver                          | Iteration                         |
//! |---------------------------------|-----------------------------------|
//! | [`PressureSolver::GaussSeidel`] | red-black sweep, `ω = 1 + (1 - i/2N)/2` |
//! | [`PressureSolver::Multigrid`]   | Galerkin V-cycle, up to 5 levels  |
//!
//! Solid cells are pinned to zero pressure during the solve. The operator
//! depends only on the static data and is cached between steps.

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,
    clippy::suboptimal_flops,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::float_cmp,
    clippy::missing_errors_doc
)]

mod config;
mod error;
mod grid;
pub mod multigrid;
pub mod stencil;
mod system;

pub use config::{FluidConfig, PressureSolver};
pub use error::{FluidError, Result};
pub use multigrid::Multigrid;
pub use stencil::StencilGrid;
pub use system::{
    FluidDynamicNode, FluidSolverStats, FluidStaticNode, FluidSystem, SOLID_THRESHOLD,
};
