//! MAC grid layout and bilinear sampling.
//!
//! For a `w × h` cell grid, in cell units:
//!
//! ```text
//!   u  (x-velocity)  at (x,       y + ½)   (w + 1) × h
//!   v  (y-velocity)  at (x + ½,   y)       w × (h + 1)
//!   p, substance,
//!   static data      at (x + ½,   y + ½)   w × h
//!
//!   ┌───v───┬───v───┐
//!   u   p   u   p   u
//!   ├───v───┼───v───┤
//!   u   p   u   p   u
//!   └───v───┴───v───┘
//! ```

/// Bilinear sample of an `nx × ny` node array at fractional node
/// coordinates, clamped to the array. No wrap-around.
pub(crate) fn sample_with(nx: usize, ny: usize, px: f64, py: f64, value: impl Fn(usize) -> f64) -> f64 {
    let fx = px.clamp(0.0, (nx - 1) as f64);
    let fy = py.clamp(0.0, (ny - 1) as f64);
    let x0 = (fx.floor() as usize).min(nx - 1);
    let y0 = (fy.floor() as usize).min(ny - 1);
    let x1 = (x0 + 1).min(nx - 1);
    let y1 = (y0 + 1).min(ny - 1);
    let tx = fx - x0 as f64;
    let ty = fy - y0 as f64;

    let bottom = value(y0 * nx + x0) * (1.0 - tx) + value(y0 * nx + x1) * tx;
    let top = value(y1 * nx + x0) * (1.0 - tx) + value(y1 * nx + x1) * tx;
    bottom * (1.0 - ty) + top * ty
}

/// Cell counts of a MAC grid and index/sampling helpers for each quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct MacDims {
    pub width: usize,
    pub height: usize,
}

impl MacDims {
    pub const fn cells(self) -> usize {
        self.width * self.height
    }

    pub const fn u_len(self) -> usize {
        (self.width + 1) * self.height
    }

    pub const fn v_len(self) -> usize {
        self.width * (self.height + 1)
    }

    pub const fn cell(self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    pub const fn u(self, x: usize, y: usize) -> usize {
        y * (self.width + 1) + x
    }

    pub const fn v(self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    pub fn sample_u(self, u: &[f64], px: f64, py: f64) -> f64 {
        sample_with(self.width + 1, self.height, px, py - 0.5, |i| u[i])
    }

    pub fn sample_v(self, v: &[f64], px: f64, py: f64) -> f64 {
        sample_with(self.width, self.height + 1, px - 0.5, py, |i| v[i])
    }

    pub fn sample_center(self, field: &[f64], px: f64, py: f64) -> f64 {
        sample_with(self.width, self.height, px - 0.5, py - 0.5, |i| field[i])
    }
}
