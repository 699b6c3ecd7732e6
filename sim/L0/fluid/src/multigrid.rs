//! Galerkin multigrid V-cycle.
//!
//! ```text
//!   level 0  ── smooth ─┐                       ┌─ smooth ──►
//!   level 1      ── smooth ─┐               ┌─ smooth
//!   level 2          ── smooth ─┐       ┌─ smooth
//!   coarsest                    └─solve─┘
//!             restrict residual ↓       ↑ prolong correction
//! ```
//!
//! Coarse operators are `Pᵀ A P` with bilinear `P`, so every level keeps a
//! 3×3 stencil and stays symmetric positive definite when the fine operator
//! is.

use crate::stencil::StencilGrid;

/// Gauss-Seidel sweeps used as the coarsest-level solve.
const COARSEST_SWEEPS: usize = 32;

/// Operator hierarchy, finest first.
#[derive(Debug, Clone, PartialEq)]
pub struct Multigrid {
    levels: Vec<StencilGrid>,
}

impl Multigrid {
    /// Build up to `max_levels` levels, stopping once a level is 2×2 or
    /// smaller.
    #[must_use]
    pub fn new(fine: StencilGrid, max_levels: usize) -> Self {
        let mut levels = vec![fine];
        while levels.len() < max_levels.max(1) {
            let Some(last) = levels.last() else { break };
            if last.width() <= 2 && last.height() <= 2 {
                break;
            }
            let coarse = last.galerkin_coarsen();
            levels.push(coarse);
        }
        Self { levels }
    }

    /// Number of levels.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// The fine operator.
    #[must_use]
    pub fn fine(&self) -> &StencilGrid {
        &self.levels[0]
    }

    /// One V-cycle on `A u = b`.
    pub fn v_cycle(&self, u: &mut [f64], b: &[f64], sweeps: usize) {
        self.cycle(0, u, b, sweeps);
    }

    fn cycle(&self, level: usize, u: &mut [f64], b: &[f64], sweeps: usize) {
        let a = &self.levels[level];
        let Some(coarse) = self.levels.get(level + 1) else {
            for _ in 0..COARSEST_SWEEPS {
                a.red_black_sweep(u, b, 1.0);
            }
            return;
        };

        for _ in 0..sweeps {
            a.red_black_sweep(u, b, 1.0);
        }

        let r = a.residual(u, b);
        let (cw, ch) = (coarse.width(), coarse.height());
        let rc = a.restrict(&r, cw, ch);
        let mut ec = vec![0.0; coarse.len()];
        self.cycle(level + 1, &mut ec, &rc, sweeps);
        a.prolong_add(u, &ec, cw, ch);

        for _ in 0..sweeps {
            a.red_black_sweep(u, b, 1.0);
        }
    }
}
