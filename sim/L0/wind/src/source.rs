//! The wind model seam and the source record stored by the system.

use nalgebra::{Point3, Vector3};
use sim_types::Aabb;

use crate::controller::WindSourceController;
use crate::directional::DirectionalWind;
use crate::explosion::ExplosionWind;
use crate::turbulence::TurbulenceWind;
use crate::vortex::VortexWind;
use crate::wake::WakeWind;

/// A closed-form wind velocity field.
///
/// Implementations are pure functions of position and the controller's
/// clock; only [`advance`](Self::advance) may change state.
pub trait WindModel {
    /// Air velocity at a world point.
    fn velocity(&self, controller: &WindSourceController, point: &Point3<f64>) -> Vector3<f64>;

    /// World-space bounds outside which the field is zero.
    fn bounds(&self, controller: &WindSourceController) -> Aabb;

    /// Per-update state change after the clock advanced by `dt`.
    fn advance(&mut self, _controller: &mut WindSourceController, _dt: f64) {}

    /// Check the parameters.
    fn validate(&self) -> sim_types::Result<()>;
}

/// Hermite smoothstep of `x` between `edge0` and `edge1`.
#[must_use]
pub fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    if edge1 <= edge0 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Weight that is 1 for `|x| <= inner` and fades smoothly to 0 at
/// `|x| = outer`.
#[must_use]
pub fn soft_window(x: f64, inner: f64, outer: f64) -> f64 {
    1.0 - smoothstep(inner, outer, x.abs())
}

/// One of the supported wind models.
#[derive(Debug, Clone)]
pub enum WindSourceKind {
    /// Expanding blast shell.
    Explosion(ExplosionWind),
    /// Rankine vortex.
    Vortex(VortexWind),
    /// Vortex street behind a moving anchor.
    Wake(WakeWind),
    /// Uniform wind in a soft-edged box.
    Directional(DirectionalWind),
    /// Scrolling noise texture.
    Turbulence(TurbulenceWind),
}

impl WindSourceKind {
    fn model(&self) -> &dyn WindModel {
        match self {
            Self::Explosion(m) => m,
            Self::Vortex(m) => m,
            Self::Wake(m) => m,
            Self::Directional(m) => m,
            Self::Turbulence(m) => m,
        }
    }

    fn model_mut(&mut self) -> &mut dyn WindModel {
        match self {
            Self::Explosion(m) => m,
            Self::Vortex(m) => m,
            Self::Wake(m) => m,
            Self::Directional(m) => m,
            Self::Turbulence(m) => m,
        }
    }

    /// Check the model parameters.
    pub fn validate(&self) -> sim_types::Result<()> {
        self.model().validate()
    }

    /// Short name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Explosion(_) => "explosion",
            Self::Vortex(_) => "vortex",
            Self::Wake(_) => "wake",
            Self::Directional(_) => "directional",
            Self::Turbulence(_) => "turbulence",
        }
    }
}

/// A registered wind source: controller plus model.
#[derive(Debug, Clone)]
pub struct WindSource {
    /// Frame, clock and flags.
    pub controller: WindSourceController,
    /// Field model.
    pub kind: WindSourceKind,
}

impl WindSource {
    pub(crate) fn new(controller: WindSourceController, kind: WindSourceKind) -> Self {
        let mut source = Self { controller, kind };
        source.refresh_bounds();
        source
    }

    /// Air velocity at `point`, zero outside the bounds or when stopped.
    #[must_use]
    pub fn velocity(&self, point: &Point3<f64>) -> Vector3<f64> {
        if !self.controller.is_playing() || !self.controller.aabb().contains(point) {
            return Vector3::zeros();
        }
        self.kind.model().velocity(&self.controller, point)
    }

    /// Recompute the world bounds after the frame or model changed.
    pub fn refresh_bounds(&mut self) {
        let aabb = self.kind.model().bounds(&self.controller);
        self.controller.set_aabb(aabb);
    }

    /// Advance the clock and model. Returns `true` when the source expired.
    pub(crate) fn advance(&mut self, dt: f64) -> bool {
        if !self.controller.is_playing() {
            return false;
        }
        let expired = self.controller.advance(dt);
        self.kind.model_mut().advance(&mut self.controller, dt);
        self.refresh_bounds();
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoothstep() {
        assert!(smoothstep(0.0, 1.0, -1.0).abs() < 1e-15);
        assert!((smoothstep(0.0, 1.0, 2.0) - 1.0).abs() < 1e-15);
        assert!((smoothstep(0.0, 1.0, 0.5) - 0.5).abs() < 1e-15);
        assert!((smoothstep(1.0, 1.0, 1.0) - 1.0).abs() < 1e-15);
    }

    #[test]
    fn test_soft_window() {
        assert!((soft_window(0.5, 1.0, 2.0) - 1.0).abs() < 1e-15);
        assert!((soft_window(-1.5, 1.0, 2.0) - 0.5).abs() < 1e-15);
        assert!(soft_window(2.5, 1.0, 2.0).abs() < 1e-15);
    }
}
