//! The fluid grid and its step: advect, diffuse, project, set bounds.

use nalgebra::Vector2;
use tracing::{debug, trace};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::{FluidConfig, PressureSolver};
use crate::error::{FluidError, Result};
use crate::grid::{MacDims, sample_with};
use crate::multigrid::Multigrid;
use crate::stencil::{CENTER, StencilGrid, index};

/// Boundary distance above which a node counts as solid.
pub const SOLID_THRESHOLD: f64 = 0.99;

/// Static per-cell input.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FluidStaticNode {
    /// 0 in open fluid, 1 inside solids. Fractional values close faces
    /// partially.
    pub boundary_distance: f64,
    /// Velocity imposed on solid faces.
    pub boundary_velocity: Vector2<f64>,
    /// Prescribed divergence (1/s). Positive values also emit substance.
    pub source: f64,
}

impl FluidStaticNode {
    /// Open fluid.
    pub const FREE: Self = Self {
        boundary_distance: 0.0,
        boundary_velocity: Vector2::new(0.0, 0.0),
        source: 0.0,
    };

    /// Static solid.
    pub const SOLID: Self = Self {
        boundary_distance: 1.0,
        boundary_velocity: Vector2::new(0.0, 0.0),
        source: 0.0,
    };

    /// Open fluid with a source term.
    #[must_use]
    pub const fn source(source: f64) -> Self {
        Self {
            source,
            ..Self::FREE
        }
    }
}

/// Per-cell simulation state, sampled at cell centers.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FluidDynamicNode {
    /// Velocity (m/s).
    pub velocity: Vector2<f64>,
    /// Pressure in projection units (kinematic pressure times timestep).
    pub pressure: f64,
    /// Passive substance concentration.
    pub substance: f64,
}

/// Statistics from the last pressure solve.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FluidSolverStats {
    /// Solver used.
    pub solver: PressureSolver,
    /// Gauss-Seidel iterations or V-cycles run.
    pub iterations: usize,
    /// Largest Poisson residual before the solve.
    pub initial_residual: f64,
    /// Largest Poisson residual after the solve.
    pub final_residual: f64,
    /// Whether the previous pressure seeded the solve.
    pub used_warm_start: bool,
}

/// Cached pressure operator. Depends only on the grid size and static data.
#[derive(Debug, Clone)]
struct PressureOperator {
    multigrid: Multigrid,
    /// Rows pinned to zero pressure (solid or fully enclosed cells).
    dirichlet: Vec<bool>,
}

/// Incompressible flow on a 2-D staggered grid.
///
/// # Example
///
/// ```
/// use nalgebra::Vector2;
/// use sim_fluid::{FluidConfig, FluidStaticNode, FluidSystem};
///
/// let mut fluid = FluidSystem::new(FluidConfig::high_accuracy()).unwrap();
/// fluid.set_size(8, 8, Vector2::new(8.0, 8.0)).unwrap();
///
/// // Solid walls around the edge, one source in the middle.
/// let statics: Vec<_> = (0..64)
///     .map(|i| match (i % 8, i / 8) {
///         (0 | 7, _) | (_, 0 | 7) => FluidStaticNode::SOLID,
///         (4, 4) => FluidStaticNode::source(1.0),
///         _ => FluidStaticNode::FREE,
///     })
///     .collect();
/// fluid.set_static_data(&statics).unwrap();
///
/// fluid.update(0.1).unwrap();
/// assert!((fluid.velocity_divergence(4, 4) - 1.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct FluidSystem {
    config: FluidConfig,
    dims: MacDims,
    area: Vector2<f64>,
    u: Vec<f64>,
    v: Vec<f64>,
    pressure: Vec<f64>,
    substance: Vec<f64>,
    statics: Vec<FluidStaticNode>,
    operator: Option<PressureOperator>,
    stats: FluidSolverStats,
}

impl FluidSystem {
    /// Create an empty (zero-sized) system. Call [`set_size`](Self::set_size)
    /// before stepping.
    pub fn new(config: FluidConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            dims: MacDims::default(),
            area: Vector2::new(1.0, 1.0),
            u: Vec::new(),
            v: Vec::new(),
            pressure: Vec::new(),
            substance: Vec::new(),
            statics: Vec::new(),
            operator: None,
            stats: FluidSolverStats::default(),
        })
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &FluidConfig {
        &self.config
    }

    /// Replace the configuration.
    pub fn set_config(&mut self, config: FluidConfig) -> Result<()> {
        config.validate()?;
        if config.multigrid_levels != self.config.multigrid_levels
            || config.solver != self.config.solver
        {
            self.operator = None;
        }
        self.config = config;
        Ok(())
    }

    /// Resize to `width × height` cells covering `area` metres. Clears all
    /// state.
    pub fn set_size(&mut self, width: usize, height: usize, area: Vector2<f64>) -> Result<()> {
        if width < 2 || height < 2 {
            return Err(FluidError::invalid_size(format!(
                "grid must be at least 2x2 cells, got {width}x{height}"
            )));
        }
        if area.iter().any(|a| !a.is_finite() || *a <= 0.0) {
            return Err(FluidError::invalid_size("domain size must be positive"));
        }
        let dims = MacDims { width, height };
        self.dims = dims;
        self.area = area;
        self.u = vec![0.0; dims.u_len()];
        self.v = vec![0.0; dims.v_len()];
        self.pressure = vec![0.0; dims.cells()];
        self.substance = vec![0.0; dims.cells()];
        self.statics = vec![FluidStaticNode::FREE; dims.cells()];
        self.operator = None;
        self.stats = FluidSolverStats::default();
        Ok(())
    }

    /// Cells per row.
    #[must_use]
    pub fn width(&self) -> usize {
        self.dims.width
    }

    /// Rows.
    #[must_use]
    pub fn height(&self) -> usize {
        self.dims.height
    }

    /// Domain size in metres.
    #[must_use]
    pub fn area(&self) -> Vector2<f64> {
        self.area
    }

    /// Size of one cell in metres.
    #[must_use]
    pub fn cell_size(&self) -> Vector2<f64> {
        Vector2::new(
            self.area.x / self.dims.width.max(1) as f64,
            self.area.y / self.dims.height.max(1) as f64,
        )
    }

    /// Statistics from the last pressure solve.
    #[must_use]
    pub fn stats(&self) -> &FluidSolverStats {
        &self.stats
    }

    /// Set boundaries and sources, one node per cell, row-major.
    pub fn set_static_data(&mut self, nodes: &[FluidStaticNode]) -> Result<()> {
        FluidError::check_len(self.dims.cells(), nodes.len())?;
        self.statics.copy_from_slice(nodes);
        self.operator = None;
        Ok(())
    }

    /// Static data, one node per cell.
    #[must_use]
    pub fn static_data(&self) -> &[FluidStaticNode] {
        &self.statics
    }

    /// Overwrite the flow state from cell-centered nodes. Face velocities are
    /// averaged from the two adjacent cells; domain-edge faces stay closed.
    pub fn set_dynamic_data(&mut self, nodes: &[FluidDynamicNode]) -> Result<()> {
        let d = self.dims;
        FluidError::check_len(d.cells(), nodes.len())?;

        for y in 0..d.height {
            for x in 0..=d.width {
                self.u[d.u(x, y)] = if x == 0 || x == d.width {
                    0.0
                } else {
                    0.5 * (nodes[d.cell(x - 1, y)].velocity.x + nodes[d.cell(x, y)].velocity.x)
                };
            }
        }
        for y in 0..=d.height {
            for x in 0..d.width {
                self.v[d.v(x, y)] = if y == 0 || y == d.height {
                    0.0
                } else {
                    0.5 * (nodes[d.cell(x, y - 1)].velocity.y + nodes[d.cell(x, y)].velocity.y)
                };
            }
        }
        for (i, node) in nodes.iter().enumerate() {
            self.pressure[i] = node.pressure;
            self.substance[i] = node.substance;
        }
        Ok(())
    }

    /// Flow state at cell centers, row-major.
    #[must_use]
    pub fn get_dynamic_data(&self) -> Vec<FluidDynamicNode> {
        let d = self.dims;
        let mut out = Vec::with_capacity(d.cells());
        for y in 0..d.height {
            for x in 0..d.width {
                let i = d.cell(x, y);
                out.push(FluidDynamicNode {
                    velocity: Vector2::new(
                        0.5 * (self.u[d.u(x, y)] + self.u[d.u(x + 1, y)]),
                        0.5 * (self.v[d.v(x, y)] + self.v[d.v(x, y + 1)]),
                    ),
                    pressure: self.pressure[i],
                    substance: self.substance[i],
                });
            }
        }
        out
    }

    /// X-velocity on the face at `(x, y + ½)`, `x` in `0..=width`.
    #[must_use]
    pub fn u_velocity(&self, x: usize, y: usize) -> f64 {
        self.u[self.dims.u(x, y)]
    }

    /// Y-velocity on the face at `(x + ½, y)`, `y` in `0..=height`.
    #[must_use]
    pub fn v_velocity(&self, x: usize, y: usize) -> f64 {
        self.v[self.dims.v(x, y)]
    }

    /// Pressure at cell `(x, y)`.
    #[must_use]
    pub fn pressure(&self, x: usize, y: usize) -> f64 {
        self.pressure[self.dims.cell(x, y)]
    }

    /// Substance at cell `(x, y)`.
    #[must_use]
    pub fn substance(&self, x: usize, y: usize) -> f64 {
        self.substance[self.dims.cell(x, y)]
    }

    // =========================================================================
    // Boundary queries
    // =========================================================================

    fn sample_boundary(&self, px: f64, py: f64, value: impl Fn(&FluidStaticNode) -> f64) -> f64 {
        let d = self.dims;
        sample_with(d.width, d.height, px - 0.5, py - 0.5, |i| value(&self.statics[i]))
    }

    /// Boundary distance interpolated at the pressure node of cell `(x, y)`.
    #[must_use]
    pub fn pressure_node_boundary_dist(&self, x: usize, y: usize) -> f64 {
        self.sample_boundary(x as f64 + 0.5, y as f64 + 0.5, |n| n.boundary_distance)
    }

    /// Boundary distance interpolated at the u face `(x, y + ½)`.
    #[must_use]
    pub fn u_node_boundary_dist(&self, x: usize, y: usize) -> f64 {
        self.sample_boundary(x as f64, y as f64 + 0.5, |n| n.boundary_distance)
    }

    /// Boundary distance interpolated at the v face `(x + ½, y)`.
    #[must_use]
    pub fn v_node_boundary_dist(&self, x: usize, y: usize) -> f64 {
        self.sample_boundary(x as f64 + 0.5, y as f64, |n| n.boundary_distance)
    }

    /// Whether the pressure node of cell `(x, y)` is inside a solid.
    #[must_use]
    pub fn is_solid_node(&self, x: usize, y: usize) -> bool {
        self.pressure_node_boundary_dist(x, y) > SOLID_THRESHOLD
    }

    /// Open fraction of the u face `(x, y + ½)`. Domain edges are closed.
    fn u_openness(&self, x: usize, y: usize) -> f64 {
        if x == 0 || x == self.dims.width {
            0.0
        } else {
            (1.0 - self.u_node_boundary_dist(x, y)).clamp(0.0, 1.0)
        }
    }

    /// Open fraction of the v face `(x + ½, y)`. Domain edges are closed.
    fn v_openness(&self, x: usize, y: usize) -> f64 {
        if y == 0 || y == self.dims.height {
            0.0
        } else {
            (1.0 - self.v_node_boundary_dist(x, y)).clamp(0.0, 1.0)
        }
    }

    /// Discrete divergence of cell `(x, y)` (1/s).
    #[must_use]
    pub fn velocity_divergence(&self, x: usize, y: usize) -> f64 {
        let d = self.dims;
        let h = self.cell_size();
        (self.u[d.u(x + 1, y)] - self.u[d.u(x, y)]) / h.x
            + (self.v[d.v(x, y + 1)] - self.v[d.v(x, y)]) / h.y
    }

    // =========================================================================
    // Step
    // =========================================================================

    /// Advance the flow by `dt` seconds.
    pub fn update(&mut self, dt: f64) -> Result<()> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(FluidError::InvalidTimestep(dt));
        }
        if self.dims.cells() == 0 {
            return Ok(());
        }

        self.advect(dt);
        self.diffuse(dt);
        self.project();
        self.set_bounds();
        trace!(width = self.dims.width, height = self.dims.height, dt, "fluid step");
        Ok(())
    }

    /// Semi-Lagrangian advection of both velocity components and the
    /// substance, then substance emission at positive sources.
    fn advect(&mut self, dt: f64) {
        let d = self.dims;
        let h = self.cell_size();
        let (sx, sy) = (dt / h.x, dt / h.y);
        let u0 = self.u.clone();
        let v0 = self.v.clone();

        for y in 0..d.height {
            for x in 1..d.width {
                let (px, py) = (x as f64, y as f64 + 0.5);
                let vel = (u0[d.u(x, y)], d.sample_v(&v0, px, py));
                self.u[d.u(x, y)] = d.sample_u(&u0, px - vel.0 * sx, py - vel.1 * sy);
            }
        }
        for y in 1..d.height {
            for x in 0..d.width {
                let (px, py) = (x as f64 + 0.5, y as f64);
                let vel = (d.sample_u(&u0, px, py), v0[d.v(x, y)]);
                self.v[d.v(x, y)] = d.sample_v(&v0, px - vel.0 * sx, py - vel.1 * sy);
            }
        }

        let s0 = self.substance.clone();
        let emission = self.config.substance_emission * dt;
        for y in 0..d.height {
            for x in 0..d.width {
                let i = d.cell(x, y);
                if self.is_solid_node(x, y) {
                    continue;
                }
                let (px, py) = (x as f64 + 0.5, y as f64 + 0.5);
                let vel = (d.sample_u(&u0, px, py), d.sample_v(&v0, px, py));
                let mut s = d.sample_center(&s0, px - vel.0 * sx, py - vel.1 * sy);
                let source = self.statics[i].source;
                if source > 0.0 {
                    s += source * emission;
                }
                self.substance[i] = s;
            }
        }
    }

    /// Implicit diffusion by damped Jacobi, skipping solid nodes.
    fn diffuse(&mut self, dt: f64) {
        let d = self.dims;
        let h = self.cell_size();
        let iterations = self.config.diffusion_iterations;
        let damping = self.config.jacobi_damping;

        if self.config.viscosity > 0.0 {
            let a = (self.config.viscosity * dt / (h.x * h.x), self.config.viscosity * dt / (h.y * h.y));

            let mut active = vec![false; d.u_len()];
            for y in 0..d.height {
                for x in 1..d.width {
                    active[d.u(x, y)] = self.u_node_boundary_dist(x, y) <= SOLID_THRESHOLD;
                }
            }
            jacobi_diffuse(&mut self.u, d.width + 1, d.height, a, &active, iterations, damping);

            let mut active = vec![false; d.v_len()];
            for y in 1..d.height {
                for x in 0..d.width {
                    active[d.v(x, y)] = self.v_node_boundary_dist(x, y) <= SOLID_THRESHOLD;
                }
            }
            jacobi_diffuse(&mut self.v, d.width, d.height + 1, a, &active, iterations, damping);
        }

        if self.config.diffusion > 0.0 {
            let a = (self.config.diffusion * dt / (h.x * h.x), self.config.diffusion * dt / (h.y * h.y));
            let active: Vec<bool> = (0..d.cells())
                .map(|i| !self.is_solid_node(i % d.width, i / d.width))
                .collect();
            jacobi_diffuse(&mut self.substance, d.width, d.height, a, &active, iterations, damping);
        }
    }

    /// Build the Poisson operator `Σ θ_f (p_c - p_n) / h²` over faces `f`.
    ///
    /// Solid cells and cells with no open face are pinned to zero pressure.
    fn build_operator(&self) -> PressureOperator {
        let d = self.dims;
        let h = self.cell_size();
        let (cx, cy) = (1.0 / (h.x * h.x), 1.0 / (h.y * h.y));
        let solid: Vec<bool> = (0..d.cells())
            .map(|i| self.is_solid_node(i % d.width, i / d.width))
            .collect();

        let mut grid = StencilGrid::zeros(d.width, d.height);
        let mut dirichlet = vec![false; d.cells()];
        for y in 0..d.height {
            for x in 0..d.width {
                let i = d.cell(x, y);
                let faces = [
                    (-1, 0, self.u_openness(x, y) * cx),
                    (1, 0, self.u_openness(x + 1, y) * cx),
                    (0, -1, self.v_openness(x, y) * cy),
                    (0, 1, self.v_openness(x, y + 1) * cy),
                ];
                let diag: f64 = faces.iter().map(|f| f.2).sum();
                let stencil = grid.stencil_mut(x, y);

                if solid[i] || diag < 1e-12 {
                    stencil[CENTER] = 1.0;
                    dirichlet[i] = true;
                    continue;
                }

                stencil[CENTER] = diag;
                for (dx, dy, c) in faces {
                    if c <= 0.0 {
                        continue;
                    }
                    // Checked above: open faces never point off the grid.
                    let nx = x.wrapping_add_signed(dx);
                    let ny = y.wrapping_add_signed(dy);
                    if !solid[d.cell(nx, ny)] {
                        stencil[index(dx, dy)] = -c;
                    }
                }
            }
        }

        let levels = match self.config.solver {
            PressureSolver::GaussSeidel => 1,
            PressureSolver::Multigrid => self.config.multigrid_levels,
        };
        PressureOperator {
            multigrid: Multigrid::new(grid, levels),
            dirichlet,
        }
    }

    /// Pressure projection: solve for pressure so that every open cell's
    /// divergence matches its source, then subtract the pressure gradient
    /// from the open faces.
    pub fn project(&mut self) -> FluidSolverStats {
        let d = self.dims;
        if d.cells() == 0 {
            return self.stats;
        }
        let h = self.cell_size();
        let operator = match self.operator.take() {
            Some(op) => op,
            None => self.build_operator(),
        };

        let mut rhs = vec![0.0; d.cells()];
        for y in 0..d.height {
            for x in 0..d.width {
                let i = d.cell(x, y);
                if !operator.dirichlet[i] {
                    rhs[i] = self.statics[i].source - self.velocity_divergence(x, y);
                }
            }
        }

        let warm = self.config.warm_starting;
        if !warm {
            self.pressure.iter_mut().for_each(|p| *p = 0.0);
        }
        for (p, &pinned) in self.pressure.iter_mut().zip(&operator.dirichlet) {
            if pinned {
                *p = 0.0;
            }
        }

        let fine = operator.multigrid.fine();
        let initial_residual = fine.max_residual(&self.pressure, &rhs);
        let iterations = self.config.pressure_iterations;
        match self.config.solver {
            PressureSolver::GaussSeidel => {
                let n = iterations.max(1) as f64;
                for i in 0..iterations {
                    let omega = 1.0 + (1.0 - i as f64 / (2.0 * n)) * 0.5;
                    fine.red_black_sweep(&mut self.pressure, &rhs, omega);
                }
            }
            PressureSolver::Multigrid => {
                let sweeps = self.config.smoothing_sweeps.max(1);
                for _ in 0..iterations {
                    operator.multigrid.v_cycle(&mut self.pressure, &rhs, sweeps);
                }
            }
        }
        for (p, &pinned) in self.pressure.iter_mut().zip(&operator.dirichlet) {
            if pinned {
                *p = 0.0;
            }
        }
        let final_residual = fine.max_residual(&self.pressure, &rhs);

        for y in 0..d.height {
            for x in 1..d.width {
                let theta = self.u_openness(x, y);
                if theta > 0.0 {
                    let grad = self.pressure[d.cell(x, y)] - self.pressure[d.cell(x - 1, y)];
                    self.u[d.u(x, y)] -= theta * grad / h.x;
                }
            }
        }
        for y in 1..d.height {
            for x in 0..d.width {
                let theta = self.v_openness(x, y);
                if theta > 0.0 {
                    let grad = self.pressure[d.cell(x, y)] - self.pressure[d.cell(x, y - 1)];
                    self.v[d.v(x, y)] -= theta * grad / h.y;
                }
            }
        }

        self.operator = Some(operator);
        self.stats = FluidSolverStats {
            solver: self.config.solver,
            iterations,
            initial_residual,
            final_residual,
            used_warm_start: warm,
        };
        debug!(
            solver = ?self.stats.solver,
            iterations,
            initial_residual,
            final_residual,
            "pressure solve"
        );
        self.stats
    }

    /// Impose boundary velocities on solid faces, close the domain edges and
    /// fill solid pressure from open neighbours.
    fn set_bounds(&mut self) {
        let d = self.dims;
        for y in 0..d.height {
            for x in 0..=d.width {
                let i = d.u(x, y);
                if x == 0 || x == d.width {
                    self.u[i] = 0.0;
                } else if self.u_node_boundary_dist(x, y) > SOLID_THRESHOLD {
                    self.u[i] = self.sample_boundary(x as f64, y as f64 + 0.5, |n| {
                        n.boundary_velocity.x
                    });
                }
            }
        }
        for y in 0..=d.height {
            for x in 0..d.width {
                let i = d.v(x, y);
                if y == 0 || y == d.height {
                    self.v[i] = 0.0;
                } else if self.v_node_boundary_dist(x, y) > SOLID_THRESHOLD {
                    self.v[i] = self.sample_boundary(x as f64 + 0.5, y as f64, |n| {
                        n.boundary_velocity.y
                    });
                }
            }
        }

        let p0 = self.pressure.clone();
        for y in 0..d.height {
            for x in 0..d.width {
                if !self.is_solid_node(x, y) {
                    continue;
                }
                let mut sum = 0.0;
                let mut count = 0u32;
                for (dx, dy) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
                    let (Some(nx), Some(ny)) = (x.checked_add_signed(dx), y.checked_add_signed(dy))
                    else {
                        continue;
                    };
                    if nx < d.width && ny < d.height && !self.is_solid_node(nx, ny) {
                        sum += p0[d.cell(nx, ny)];
                        count += 1;
                    }
                }
                let i = d.cell(x, y);
                self.pressure[i] = if count > 0 { sum / f64::from(count) } else { 0.0 };
                self.substance[i] = 0.0;
            }
        }
    }
}

/// Damped Jacobi relaxation of `(I - aΔ) x = x₀` on an `nx × ny` array.
/// Inactive nodes keep their value. Neighbours past the edge mirror the node.
fn jacobi_diffuse(
    field: &mut [f64],
    nx: usize,
    ny: usize,
    a: (f64, f64),
    active: &[bool],
    iterations: usize,
    damping: f64,
) {
    let x0 = field.to_vec();
    let mut cur = field.to_vec();
    let mut next = cur.clone();
    let denom = 1.0 + 2.0 * a.0 + 2.0 * a.1;

    for _ in 0..iterations {
        for y in 0..ny {
            for x in 0..nx {
                let i = y * nx + x;
                if !active[i] {
                    next[i] = cur[i];
                    continue;
                }
                let left = cur[y * nx + x.saturating_sub(1)];
                let right = cur[y * nx + (x + 1).min(nx - 1)];
                let down = cur[y.saturating_sub(1) * nx + x];
                let up = cur[(y + 1).min(ny - 1) * nx + x];
                let target = (x0[i] + a.0 * (left + right) + a.1 * (down + up)) / denom;
                next[i] = cur[i] + damping * (target - cur[i]);
            }
        }
        std::mem::swap(&mut cur, &mut next);
    }
    field.copy_from_slice(&cur);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn closed_box(n: usize, config: FluidConfig) -> FluidSystem {
        let mut fluid = FluidSystem::new(config).unwrap();
        fluid.set_size(n, n, Vector2::new(n as f64, n as f64)).unwrap();
        let mut statics = vec![FluidStaticNode::FREE; n * n];
        for y in 0..n {
            for x in 0..n {
                if x == 0 || y == 0 || x == n - 1 || y == n - 1 {
                    statics[y * n + x] = FluidStaticNode::SOLID;
                }
            }
        }
        fluid.set_static_data(&statics).unwrap();
        fluid
    }

    fn swirl(fluid: &mut FluidSystem) {
        let (w, h) = (fluid.width(), fluid.height());
        let nodes: Vec<_> = (0..w * h)
            .map(|i| {
                let (x, y) = ((i % w) as f64, (i / w) as f64);
                FluidDynamicNode {
                    velocity: Vector2::new((x * 0.7 + y * 0.3).sin(), (y * 1.3 + x * 0.5).cos()),
                    ..FluidDynamicNode::default()
                }
            })
            .collect();
        fluid.set_dynamic_data(&nodes).unwrap();
    }

    fn assert_divergence_free(fluid: &FluidSystem, tol: f64) {
        for y in 0..fluid.height() {
            for x in 0..fluid.width() {
                if fluid.is_solid_node(x, y) {
                    continue;
                }
                let source = fluid.static_data()[y * fluid.width() + x].source;
                let div = fluid.velocity_divergence(x, y);
                assert!((div - source).abs() < tol, "div {div} at ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_set_size_validation() {
        let mut fluid = FluidSystem::new(FluidConfig::realtime()).unwrap();
        assert!(fluid.set_size(1, 4, Vector2::new(1.0, 1.0)).is_err());
        assert!(fluid.set_size(4, 4, Vector2::new(0.0, 1.0)).is_err());
        fluid.set_size(4, 3, Vector2::new(2.0, 3.0)).unwrap();
        assert_relative_eq!(fluid.cell_size(), Vector2::new(0.5, 1.0));
        assert_eq!(
            fluid.set_static_data(&[FluidStaticNode::FREE; 3]),
            Err(FluidError::SizeMismatch { expected: 12, actual: 3 })
        );
        assert!(fluid.update(-1.0).is_err());
    }

    #[test]
    fn test_dynamic_data_round_trip_uniform() {
        let mut fluid = FluidSystem::new(FluidConfig::realtime()).unwrap();
        fluid.set_size(4, 4, Vector2::new(4.0, 4.0)).unwrap();
        let node = FluidDynamicNode {
            velocity: Vector2::new(1.0, -2.0),
            pressure: 3.0,
            substance: 0.5,
        };
        fluid.set_dynamic_data(&[node; 16]).unwrap();
        let out = fluid.get_dynamic_data();
        // Interior cells see two open faces, edge cells one closed face.
        assert_relative_eq!(out[5].velocity, Vector2::new(1.0, -2.0));
        assert_relative_eq!(out[4].velocity.x, 0.5);
        assert_relative_eq!(out[5].pressure, 3.0);
        assert_relative_eq!(out[5].substance, 0.5);
    }

    #[test]
    fn test_boundary_distance_sampling() {
        let mut fluid = FluidSystem::new(FluidConfig::realtime()).unwrap();
        fluid.set_size(3, 3, Vector2::new(3.0, 3.0)).unwrap();
        let mut statics = vec![FluidStaticNode::FREE; 9];
        statics[4] = FluidStaticNode::SOLID;
        fluid.set_static_data(&statics).unwrap();

        assert!(fluid.is_solid_node(1, 1));
        assert!(!fluid.is_solid_node(0, 1));
        assert_relative_eq!(fluid.u_node_boundary_dist(1, 1), 0.5);
        assert_relative_eq!(fluid.v_node_boundary_dist(1, 2), 0.5);
        assert_relative_eq!(fluid.u_node_boundary_dist(0, 1), 0.0);
    }

    #[test]
    fn test_gauss_seidel_projection() {
        let config = FluidConfig::realtime().with_solver(PressureSolver::GaussSeidel, 600);
        let mut fluid = closed_box(8, config);
        swirl(&mut fluid);
        let stats = fluid.project();
        assert!(stats.final_residual < stats.initial_residual);
        assert_divergence_free(&fluid, 1e-6);
    }

    #[test]
    fn test_multigrid_projection() {
        let config = FluidConfig::realtime().with_solver(PressureSolver::Multigrid, 30);
        let mut fluid = closed_box(16, config);
        swirl(&mut fluid);
        fluid.project();
        assert_divergence_free(&fluid, 1e-6);
    }

    #[test]
    fn test_source_drives_outflow() {
        let mut fluid = closed_box(9, FluidConfig::high_accuracy());
        let mut statics = fluid.static_data().to_vec();
        statics[4 * 9 + 4] = FluidStaticNode::source(2.0);
        fluid.set_static_data(&statics).unwrap();

        fluid.update(0.1).unwrap();
        assert_divergence_free(&fluid, 1e-6);
        assert!(fluid.u_velocity(5, 4) > 0.0);
        assert!(fluid.u_velocity(4, 4) < 0.0);
        // Substance is emitted at the source.
        assert!(fluid.substance(4, 4) > 0.0);
    }

    #[test]
    fn test_set_bounds_closes_edges_and_fills_solids() {
        let mut fluid = closed_box(6, FluidConfig::high_accuracy());
        swirl(&mut fluid);
        fluid.update(0.05).unwrap();
        for y in 0..6 {
            assert_relative_eq!(fluid.u_velocity(0, y), 0.0);
            assert_relative_eq!(fluid.u_velocity(6, y), 0.0);
        }
        // Solid pressure mirrors its single open neighbour.
        assert_relative_eq!(fluid.pressure(0, 2), fluid.pressure(1, 2));
        assert_relative_eq!(fluid.substance(0, 2), 0.0);
    }

    #[test]
    fn test_viscosity_smooths_velocity() {
        let config = FluidConfig::realtime().with_diffusion(0.5, 0.0);
        let mut fluid = FluidSystem::new(config).unwrap();
        fluid.set_size(8, 8, Vector2::new(8.0, 8.0)).unwrap();
        swirl(&mut fluid);
        let energy = |f: &FluidSystem| -> f64 {
            (0..8)
                .flat_map(|y| (1..8).map(move |x| (x, y)))
                .map(|(x, y)| f.u_velocity(x, y).powi(2))
                .sum()
        };
        let before = energy(&fluid);

        fluid.diffuse(0.1);
        let after = energy(&fluid);
        assert!(after < before);
    }

    #[test]
    fn test_static_change_rebuilds_operator() {
        let mut fluid = closed_box(6, FluidConfig::high_accuracy());
        fluid.update(0.1).unwrap();
        assert!(fluid.operator.is_some());
        let statics = fluid.static_data().to_vec();
        fluid.set_static_data(&statics).unwrap();
        assert!(fluid.operator.is_none());
    }
}
