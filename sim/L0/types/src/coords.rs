//! Affine coordinate frames.
//!
//! A [`Coords`] is an origin plus three axis vectors. The axes may be scaled
//! or even skewed (animation poses frequently carry non-uniform scale), so a
//! frame is a general affine transform. [`Coords::decompose`] splits it back
//! into position, orientation and per-axis scale with a Gram-Schmidt (QR)
//! factorization of the axis matrix.

use nalgebra::{Matrix3, Point3, Rotation3, UnitQuaternion, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const DEGENERATE_AXIS: f64 = 1e-12;

/// Affine frame: `world = origin + axes * local`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Coords {
    /// Frame origin in world coordinates.
    pub origin: Point3<f64>,
    /// Axis vectors as matrix columns (x, y, z).
    pub axes: Matrix3<f64>,
}

impl Default for Coords {
    fn default() -> Self {
        Self::identity()
    }
}

impl Coords {
    /// The world frame.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            origin: Point3::origin(),
            axes: Matrix3::identity(),
        }
    }

    /// A pure translation.
    #[must_use]
    pub fn from_translation(origin: Point3<f64>) -> Self {
        Self {
            origin,
            axes: Matrix3::identity(),
        }
    }

    /// A rigid frame from a rotation and origin.
    #[must_use]
    pub fn from_rotation_translation(rotation: &UnitQuaternion<f64>, origin: Point3<f64>) -> Self {
        Self {
            origin,
            axes: rotation.to_rotation_matrix().into_inner(),
        }
    }

    /// A frame from explicit axis vectors.
    #[must_use]
    pub fn from_axes(
        origin: Point3<f64>,
        x: Vector3<f64>,
        y: Vector3<f64>,
        z: Vector3<f64>,
    ) -> Self {
        Self {
            origin,
            axes: Matrix3::from_columns(&[x, y, z]),
        }
    }

    /// Scale every axis by `scale`.
    #[must_use]
    pub fn with_scale(mut self, scale: Vector3<f64>) -> Self {
        for i in 0..3 {
            let col = self.axes.column(i) * scale[i];
            self.axes.set_column(i, &col);
        }
        self
    }

    /// The x axis vector.
    #[must_use]
    pub fn x_axis(&self) -> Vector3<f64> {
        self.axes.column(0).into_owned()
    }

    /// The y axis vector.
    #[must_use]
    pub fn y_axis(&self) -> Vector3<f64> {
        self.axes.column(1).into_owned()
    }

    /// The z axis vector.
    #[must_use]
    pub fn z_axis(&self) -> Vector3<f64> {
        self.axes.column(2).into_owned()
    }

    /// Map a local point to world space.
    #[must_use]
    pub fn world_point(&self, local: &Point3<f64>) -> Point3<f64> {
        self.origin + self.axes * local.coords
    }

    /// Map a local direction to world space.
    #[must_use]
    pub fn world_vector(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.axes * local
    }

    fn inverse_axes(&self) -> Matrix3<f64> {
        self.axes
            .try_inverse()
            .unwrap_or_else(|| self.orthonormalized().axes.transpose())
    }

    /// Map a world point into this frame.
    ///
    /// Singular frames fall back to the orthonormalized frame.
    #[must_use]
    pub fn local_point(&self, world: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.inverse_axes() * (world - self.origin))
    }

    /// Map a world direction into this frame.
    #[must_use]
    pub fn local_vector(&self, world: &Vector3<f64>) -> Vector3<f64> {
        self.inverse_axes() * world
    }

    /// Frame composition: `self.compose(child).world_point(p) ==
    /// self.world_point(child.world_point(p))`.
    #[must_use]
    pub fn compose(&self, child: &Self) -> Self {
        Self {
            origin: self.world_point(&child.origin),
            axes: self.axes * child.axes,
        }
    }

    /// Express this frame relative to `parent`, so that
    /// `parent.compose(&self.relative_to(parent)) == *self`.
    #[must_use]
    pub fn relative_to(&self, parent: &Self) -> Self {
        let inv = parent.inverse_axes();
        Self {
            origin: Point3::from(inv * (self.origin - parent.origin)),
            axes: inv * self.axes,
        }
    }

    /// QR-like decomposition into position, orientation and signed scale.
    ///
    /// The x axis fixes the first rotation column, the y axis is made
    /// orthogonal to it, and z completes a right-handed basis. The scale
    /// vector holds the diagonal of the triangular factor, so a mirrored
    /// frame yields a negative z scale.
    #[must_use]
    pub fn decompose(&self) -> (Point3<f64>, UnitQuaternion<f64>, Vector3<f64>) {
        let x = self.x_axis();
        let y = self.y_axis();
        let z = self.z_axis();

        let sx = x.norm();
        let ex = if sx > DEGENERATE_AXIS {
            x / sx
        } else {
            Vector3::x()
        };

        let y_ortho = y - ex * y.dot(&ex);
        let sy = y_ortho.norm();
        let ey = if sy > DEGENERATE_AXIS {
            y_ortho / sy
        } else {
            any_orthogonal(&ex)
        };

        let ez = ex.cross(&ey);
        let sz = z.dot(&ez);

        let rotation = Rotation3::from_matrix_unchecked(Matrix3::from_columns(&[ex, ey, ez]));
        (
            self.origin,
            UnitQuaternion::from_rotation_matrix(&rotation),
            Vector3::new(sx, sy, sz),
        )
    }

    /// The rigid part of this frame (scale and skew removed).
    #[must_use]
    pub fn orthonormalized(&self) -> Self {
        let (origin, rotation, _) = self.decompose();
        Self::from_rotation_translation(&rotation, origin)
    }

    /// Linear interpolation of origin and axes.
    #[must_use]
    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        Self {
            origin: self.origin + (other.origin - self.origin) * t,
            axes: self.axes + (other.axes - self.axes) * t,
        }
    }
}

/// A unit vector orthogonal to `v`.
#[must_use]
pub fn any_orthogonal(v: &Vector3<f64>) -> Vector3<f64> {
    let helper = if v.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    let o = v.cross(&helper);
    let len = o.norm();
    if len > DEGENERATE_AXIS {
        o / len
    } else {
        Vector3::z()
    }
}
