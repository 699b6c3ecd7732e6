//! Shared fixtures for the end-to-end scenarios in `integration/`.

#![deny(clippy::unwrap_used, clippy::expect_used)]

use sim_fluid::{FluidStaticNode, FluidSystem};

/// Static data for an `n × n` box with a solid one-cell wall and a single
/// source at `source_cell`.
#[must_use]
pub fn closed_box(n: usize, source_cell: (usize, usize), strength: f64) -> Vec<FluidStaticNode> {
    (0..n * n)
        .map(|i| {
            let (x, y) = (i % n, i / n);
            if x == 0 || y == 0 || x == n - 1 || y == n - 1 {
                FluidStaticNode::SOLID
            } else if (x, y) == source_cell {
                FluidStaticNode::source(strength)
            } else {
                FluidStaticNode::FREE
            }
        })
        .collect()
}

/// Net outward flux through the boundary of the cell block
/// `x0..=x1 × y0..=y1`, in m²/s.
#[must_use]
pub fn contour_flux(fluid: &FluidSystem, (x0, x1): (usize, usize), (y0, y1): (usize, usize)) -> f64 {
    let h = fluid.cell_size();
    let horizontal: f64 = (y0..=y1)
        .map(|y| fluid.u_velocity(x1 + 1, y) - fluid.u_velocity(x0, y))
        .sum();
    let vertical: f64 = (x0..=x1)
        .map(|x| fluid.v_velocity(x, y1 + 1) - fluid.v_velocity(x, y0))
        .sum();
    horizontal * h.y + vertical * h.x
}
