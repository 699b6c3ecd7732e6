//! Velocity fields sampled by deformable meshes.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A read-only velocity field over world space.
///
/// Implemented by the wind system; meshes only ever sample through this
/// trait, so they can be driven by any field in tests.
pub trait VelocityField: Sync {
    /// Field velocity at a world point.
    fn velocity(&self, point: &Point3<f64>) -> Vector3<f64>;
}

/// Still air.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZeroField;

impl VelocityField for ZeroField {
    fn velocity(&self, _point: &Point3<f64>) -> Vector3<f64> {
        Vector3::zeros()
    }
}

/// The same velocity everywhere.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UniformField(pub Vector3<f64>);

impl VelocityField for UniformField {
    fn velocity(&self, _point: &Point3<f64>) -> Vector3<f64> {
        self.0
    }
}

impl<F: VelocityField + ?Sized> VelocityField for &F {
    fn velocity(&self, point: &Point3<f64>) -> Vector3<f64> {
        (**self).velocity(point)
    }
}
