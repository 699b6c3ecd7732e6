//! Turbulence from a tileable, seeded texture of random vectors.
//!
//! The texture is an `n³` lattice of vectors drawn from a seeded RNG, so a
//! given seed always yields the same field. Sampling is trilinear with
//! wrap-around indices, and the lattice scrolls through the source box over
//! time.

use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sim_types::{Aabb, SimError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::controller::WindSourceController;
use crate::source::WindModel;

/// Periodic lattice of vectors in `[-1, 1]³`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TurbulenceTexture {
    size: usize,
    data: Vec<Vector3<f64>>,
}

impl TurbulenceTexture {
    /// Generate a `size³` texture from `seed`.
    #[must_use]
    pub fn generate(size: usize, seed: u64) -> Self {
        let size = size.max(1);
        let mut rng = StdRng::seed_from_u64(seed);
        let data = (0..size * size * size)
            .map(|_| {
                Vector3::new(
                    rng.gen_range(-1.0..=1.0),
                    rng.gen_range(-1.0..=1.0),
                    rng.gen_range(-1.0..=1.0),
                )
            })
            .collect();
        Self { size, data }
    }

    /// Lattice resolution per axis.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    fn texel(&self, x: i64, y: i64, z: i64) -> Vector3<f64> {
        let n = self.size as i64;
        let wrap = |i: i64| i.rem_euclid(n) as usize;
        self.data[(wrap(z) * self.size + wrap(y)) * self.size + wrap(x)]
    }

    /// Trilinear sample at lattice coordinates `p` (periodic).
    #[must_use]
    pub fn sample(&self, p: &Point3<f64>) -> Vector3<f64> {
        let base = p.map(f64::floor);
        let f = p - base;
        let [x, y, z] = [base.x as i64, base.y as i64, base.z as i64];

        let mut out = Vector3::zeros();
        for corner in 0..8 {
            let dx = corner & 1;
            let dy = (corner >> 1) & 1;
            let dz = (corner >> 2) & 1;
            let w = if dx == 1 { f.x } else { 1.0 - f.x }
                * if dy == 1 { f.y } else { 1.0 - f.y }
                * if dz == 1 { f.z } else { 1.0 - f.z };
            out += self.texel(x + dx, y + dy, z + dz) * w;
        }
        out
    }
}

/// Turbulence parameters, in the source frame.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TurbulenceWind {
    /// Box half extents.
    pub half_extents: Vector3<f64>,
    /// Size of one lattice cell.
    pub cell_size: f64,
    /// Velocity scale of the texture.
    pub amplitude: f64,
    /// Texture scroll velocity.
    pub scroll_velocity: Vector3<f64>,
    texture: TurbulenceTexture,
}

impl TurbulenceWind {
    /// Turbulence from a `16³` texture generated from `seed`.
    #[must_use]
    pub fn new(half_extents: Vector3<f64>, cell_size: f64, amplitude: f64, seed: u64) -> Self {
        Self {
            half_extents,
            cell_size,
            amplitude,
            scroll_velocity: Vector3::zeros(),
            texture: TurbulenceTexture::generate(16, seed),
        }
    }

    /// Replace the texture.
    #[must_use]
    pub fn with_texture(mut self, texture: TurbulenceTexture) -> Self {
        self.texture = texture;
        self
    }

    /// Set the scroll velocity.
    #[must_use]
    pub fn with_scroll(mut self, velocity: Vector3<f64>) -> Self {
        self.scroll_velocity = velocity;
        self
    }

    /// The noise texture.
    #[must_use]
    pub fn texture(&self) -> &TurbulenceTexture {
        &self.texture
    }

    /// Velocity at a point in the source frame at time `t`.
    #[must_use]
    pub fn local_velocity(&self, p: &Point3<f64>, t: f64) -> Vector3<f64> {
        let inside = (0..3).all(|i| p[i].abs() <= self.half_extents[i]);
        if !inside {
            return Vector3::zeros();
        }
        let lattice = (p - self.scroll_velocity * t) / self.cell_size;
        self.texture.sample(&lattice) * self.amplitude
    }
}

impl WindModel for TurbulenceWind {
    fn velocity(&self, controller: &WindSourceController, point: &Point3<f64>) -> Vector3<f64> {
        let local = controller.to_local_point(point);
        controller.to_world_vector(&self.local_velocity(&local, controller.elapsed()))
    }

    fn bounds(&self, controller: &WindSourceController) -> Aabb {
        controller.world_bounds(&Aabb::from_center(Point3::origin(), self.half_extents))
    }

    fn validate(&self) -> sim_types::Result<()> {
        if self.cell_size.is_nan() || self.cell_size <= 0.0 {
            return Err(SimError::invalid_config("turbulence cell size must be positive"));
        }
        if self.half_extents.iter().any(|h| h.is_nan() || *h <= 0.0) {
            return Err(SimError::invalid_config(
                "turbulence half extents must be positive",
            ));
        }
        if !self.amplitude.is_finite() || !self.scroll_velocity.iter().all(|c| c.is_finite()) {
            return Err(SimError::invalid_config("turbulence must be finite"));
        }
        Ok(())
    }
}
