//! 3×3 stencil operators and the smoothers and transfers that act on them.
//!
//! Coefficient `k` of a node multiplies the unknown at offset
//! `(k % 3 - 1, k / 3 - 1)`; `k = 4` is the diagonal.
//!
//! ```text
//!   6 7 8
//!   3 4 5      +y up
//!   0 1 2      +x right
//! ```

use smallvec::SmallVec;

/// Index of the diagonal coefficient.
pub const CENTER: usize = 4;

/// Offset of stencil coefficient `k`.
#[inline]
#[must_use]
pub const fn offset(k: usize) -> (isize, isize) {
    ((k % 3) as isize - 1, (k / 3) as isize - 1)
}

/// Stencil index of offset `(dx, dy)`.
#[inline]
#[must_use]
pub const fn index(dx: isize, dy: isize) -> usize {
    ((dy + 1) * 3 + dx + 1) as usize
}

/// Bilinear interpolation weights from a coarse 1-D grid to fine node `i`.
///
/// Even fine nodes coincide with coarse node `i / 2`; odd ones sit halfway
/// between two coarse nodes. Coarse nodes past the end are treated as zero.
fn prolong_1d(i: usize, coarse: usize) -> SmallVec<[(usize, f64); 2]> {
    let mut out = SmallVec::new();
    if i % 2 == 0 {
        out.push((i / 2, 1.0));
    } else {
        out.push((i / 2, 0.5));
        if i / 2 + 1 < coarse {
            out.push((i / 2 + 1, 0.5));
        }
    }
    out
}

/// Coarse grid size for a fine size.
#[must_use]
pub const fn coarse_size(fine: usize) -> usize {
    fine.div_ceil(2)
}

/// A linear operator on a `width × height` node grid with 3×3 support.
#[derive(Debug, Clone, PartialEq)]
pub struct StencilGrid {
    width: usize,
    height: usize,
    coeffs: Vec<[f64; 9]>,
}

impl StencilGrid {
    /// An all-zero operator.
    #[must_use]
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            coeffs: vec![[0.0; 9]; width * height],
        }
    }

    /// Nodes per row.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Rows.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    /// Whether the grid has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }

    /// Coefficients of node `(x, y)`.
    #[must_use]
    pub fn stencil(&self, x: usize, y: usize) -> &[f64; 9] {
        &self.coeffs[y * self.width + x]
    }

    /// Mutable coefficients of node `(x, y)`.
    pub fn stencil_mut(&mut self, x: usize, y: usize) -> &mut [f64; 9] {
        &mut self.coeffs[y * self.width + x]
    }

    fn neighbour(&self, x: usize, y: usize, k: usize) -> Option<usize> {
        let (dx, dy) = offset(k);
        let nx = x.checked_add_signed(dx).filter(|&v| v < self.width)?;
        let ny = y.checked_add_signed(dy).filter(|&v| v < self.height)?;
        Some(ny * self.width + nx)
    }

    /// Off-diagonal part of row `(x, y)` applied to `u`.
    fn off_diagonal(&self, u: &[f64], x: usize, y: usize) -> f64 {
        let row = self.stencil(x, y);
        let mut sum = 0.0;
        for (k, &a) in row.iter().enumerate() {
            if k == CENTER || a == 0.0 {
                continue;
            }
            if let Some(n) = self.neighbour(x, y, k) {
                sum += a * u[n];
            }
        }
        sum
    }

    /// `out = A u`.
    pub fn apply(&self, u: &[f64], out: &mut [f64]) {
        for y in 0..self.height {
            for x in 0..self.width {
                let i = y * self.width + x;
                out[i] = self.coeffs[i][CENTER] * u[i] + self.off_diagonal(u, x, y);
            }
        }
    }

    /// `b - A u`.
    #[must_use]
    pub fn residual(&self, u: &[f64], b: &[f64]) -> Vec<f64> {
        let mut r = vec![0.0; self.len()];
        self.apply(u, &mut r);
        for (ri, bi) in r.iter_mut().zip(b) {
            *ri = bi - *ri;
        }
        r
    }

    /// Largest absolute entry of `b - A u`.
    #[must_use]
    pub fn max_residual(&self, u: &[f64], b: &[f64]) -> f64 {
        self.residual(u, b).iter().fold(0.0, |m, r| m.max(r.abs()))
    }

    /// One red-black Gauss-Seidel sweep with relaxation `omega`.
    ///
    /// Rows with a zero diagonal are left untouched.
    pub fn red_black_sweep(&self, u: &mut [f64], b: &[f64], omega: f64) {
        for color in 0..2 {
            for y in 0..self.height {
                let start = (y + color) % 2;
                for x in (start..self.width).step_by(2) {
                    let i = y * self.width + x;
                    let diag = self.coeffs[i][CENTER];
                    if diag.abs() < f64::EPSILON {
                        continue;
                    }
                    let gs = (b[i] - self.off_diagonal(u, x, y)) / diag;
                    u[i] += omega * (gs - u[i]);
                }
            }
        }
    }

    /// Galerkin coarse operator `Pᵀ A P` for bilinear prolongation `P`.
    #[must_use]
    pub fn galerkin_coarsen(&self) -> Self {
        let cw = coarse_size(self.width);
        let ch = coarse_size(self.height);
        let mut coarse = Self::zeros(cw, ch);

        for fy in 0..self.height {
            let wy_row = prolong_1d(fy, ch);
            for fx in 0..self.width {
                let wx_row = prolong_1d(fx, cw);
                let row = self.stencil(fx, fy);
                for (k, &a) in row.iter().enumerate() {
                    if a == 0.0 {
                        continue;
                    }
                    let (dx, dy) = offset(k);
                    let (Some(jx), Some(jy)) = (
                        fx.checked_add_signed(dx).filter(|&v| v < self.width),
                        fy.checked_add_signed(dy).filter(|&v| v < self.height),
                    ) else {
                        continue;
                    };
                    let wx_col = prolong_1d(jx, cw);
                    let wy_col = prolong_1d(jy, ch);

                    for &(iy, py) in &wy_row {
                        for &(ix, px) in &wx_row {
                            let stencil = coarse.stencil_mut(ix, iy);
                            for &(cy, qy) in &wy_col {
                                for &(cx, qx) in &wx_col {
                                    let ox = cx as isize - ix as isize;
                                    let oy = cy as isize - iy as isize;
                                    stencil[index(ox, oy)] += px * py * a * qx * qy;
                                }
                            }
                        }
                    }
                }
            }
        }
        coarse
    }

    /// Restrict a fine vector to the coarse grid (`Pᵀ r`).
    #[must_use]
    pub fn restrict(&self, fine: &[f64], coarse_width: usize, coarse_height: usize) -> Vec<f64> {
        let mut out = vec![0.0; coarse_width * coarse_height];
        for fy in 0..self.height {
            let wy = prolong_1d(fy, coarse_height);
            for fx in 0..self.width {
                let value = fine[fy * self.width + fx];
                if value == 0.0 {
                    continue;
                }
                for &(cx, px) in &prolong_1d(fx, coarse_width) {
                    for &(cy, py) in &wy {
                        out[cy * coarse_width + cx] += px * py * value;
                    }
                }
            }
        }
        out
    }

    /// Add the prolonged coarse correction to a fine vector (`u += P e`).
    pub fn prolong_add(&self, u: &mut [f64], coarse: &[f64], coarse_width: usize, coarse_height: usize) {
        for fy in 0..self.height {
            let wy = prolong_1d(fy, coarse_height);
            for fx in 0..self.width {
                let mut sum = 0.0;
                for &(cx, px) in &prolong_1d(fx, coarse_width) {
                    for &(cy, py) in &wy {
                        sum += px * py * coarse[cy * coarse_width + cx];
                    }
                }
                u[fy * self.width + fx] += sum;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Dirichlet 5-point Laplacian (positive definite).
    fn laplacian(n: usize) -> StencilGrid {
        let mut a = StencilGrid::zeros(n, n);
        for y in 0..n {
            for x in 0..n {
                let s = a.stencil_mut(x, y);
                s[CENTER] = 4.0;
                if x > 0 {
                    s[index(-1, 0)] = -1.0;
                }
                if x + 1 < n {
                    s[index(1, 0)] = -1.0;
                }
                if y > 0 {
                    s[index(0, -1)] = -1.0;
                }
                if y + 1 < n {
                    s[index(0, 1)] = -1.0;
                }
            }
        }
        a
    }

    #[test]
    fn test_offsets_round_trip() {
        for k in 0..9 {
            let (dx, dy) = offset(k);
            assert_eq!(index(dx, dy), k);
        }
        assert_eq!(offset(CENTER), (0, 0));
    }

    #[test]
    fn test_coarse_sizes() {
        assert_eq!(coarse_size(16), 8);
        assert_eq!(coarse_size(9), 5);
        assert_eq!(coarse_size(1), 1);
    }

    #[test]
    fn test_galerkin_operator_matches_triple_product() {
        let a = laplacian(5);
        let coarse = a.galerkin_coarsen();
        assert_eq!((coarse.width(), coarse.height()), (3, 3));

        // Compare coarse A e_J against Pᵀ A P e_J for every coarse unit vector.
        for j in 0..coarse.len() {
            let mut e = vec![0.0; coarse.len()];
            e[j] = 1.0;

            let mut fine = vec![0.0; a.len()];
            a.prolong_add(&mut fine, &e, 3, 3);
            let mut a_fine = vec![0.0; a.len()];
            a.apply(&fine, &mut a_fine);
            let expected = a.restrict(&a_fine, 3, 3);

            let mut actual = vec![0.0; coarse.len()];
            coarse.apply(&e, &mut actual);
            for (x, y) in actual.iter().zip(&expected) {
                assert_relative_eq!(x, y, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_galerkin_operator_is_symmetric() {
        let coarse = laplacian(8).galerkin_coarsen();
        let n = coarse.width();
        for y in 0..coarse.height() {
            for x in 0..n {
                for k in 0..9 {
                    let (dx, dy) = offset(k);
                    let (Some(nx), Some(ny)) =
                        (x.checked_add_signed(dx), y.checked_add_signed(dy))
                    else {
                        continue;
                    };
                    if nx >= n || ny >= coarse.height() {
                        continue;
                    }
                    let back = coarse.stencil(nx, ny)[index(-dx, -dy)];
                    assert_relative_eq!(coarse.stencil(x, y)[k], back, epsilon = 1e-12);
                }
            }
        }
    }

    #[test]
    fn test_gauss_seidel_converges() {
        let a = laplacian(6);
        let b = vec![1.0; a.len()];
        let mut u = vec![0.0; a.len()];
        for _ in 0..200 {
            a.red_black_sweep(&mut u, &b, 1.2);
        }
        assert!(a.max_residual(&u, &b) < 1e-8);
    }
}
