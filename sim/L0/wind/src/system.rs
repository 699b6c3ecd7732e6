//! Registry of wind sources and the global velocity field.
//!
//! ```text
//!   add_*_wind_source ──► Arena<WindSource> ──► global_wind_velocity(p)
//!                              │                    Σ playing sources
//!                     update(dt): advance, expire, collect
//! ```
//!
//! Sampling is read-only, so a `&WindSystem` can be shared across worker
//! threads while mutation goes through `&mut`.

use nalgebra::{Point3, Vector3};
use sim_types::{Arena, Coords, Handle, SimError, VelocityField};
use tracing::debug;

use crate::controller::WindSourceController;
use crate::directional::DirectionalWind;
use crate::explosion::ExplosionWind;
use crate::source::{WindSource, WindSourceKind};
use crate::turbulence::TurbulenceWind;
use crate::vortex::VortexWind;
use crate::wake::WakeWind;

/// Handle to a registered wind source.
pub type WindSourceId = Handle<WindSource>;

/// All wind sources in a scene.
#[derive(Debug, Clone)]
pub struct WindSystem {
    sources: Arena<WindSource>,
}

impl Default for WindSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl WindSystem {
    /// Create an empty system.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sources: Arena::new("wind source"),
        }
    }

    /// Register a source of any kind.
    ///
    /// A negative `duration` plays until stopped.
    pub fn add_wind_source(
        &mut self,
        frame: &Coords,
        duration: f64,
        kind: WindSourceKind,
    ) -> sim_types::Result<WindSourceId> {
        kind.validate()?;
        if duration.is_nan() {
            return Err(SimError::invalid_config("wind source duration is NaN"));
        }
        let name = kind.name();
        let id = self
            .sources
            .insert(WindSource::new(WindSourceController::new(frame, duration), kind));
        debug!(?id, kind = name, duration, "wind source added");
        Ok(id)
    }

    /// Add an explosion. The duration must be positive: the blast shell is
    /// driven by the fraction of the lifetime elapsed.
    pub fn add_explosion_wind_source(
        &mut self,
        frame: &Coords,
        duration: f64,
        model: ExplosionWind,
    ) -> sim_types::Result<WindSourceId> {
        if duration.is_nan() || duration <= 0.0 {
            return Err(SimError::invalid_config(
                "explosion duration must be positive",
            ));
        }
        self.add_wind_source(frame, duration, WindSourceKind::Explosion(model))
    }

    /// Add a vortex.
    pub fn add_vortex_wind_source(
        &mut self,
        frame: &Coords,
        duration: f64,
        model: VortexWind,
    ) -> sim_types::Result<WindSourceId> {
        self.add_wind_source(frame, duration, WindSourceKind::Vortex(model))
    }

    /// Add a wake. Move it with [`WindSourceController::set_frame`] to shed
    /// vortices.
    pub fn add_wake_wind_source(
        &mut self,
        frame: &Coords,
        duration: f64,
        model: WakeWind,
    ) -> sim_types::Result<WindSourceId> {
        self.add_wind_source(frame, duration, WindSourceKind::Wake(model))
    }

    /// Add a directional wind box.
    pub fn add_directional_wind_source(
        &mut self,
        frame: &Coords,
        duration: f64,
        model: DirectionalWind,
    ) -> sim_types::Result<WindSourceId> {
        self.add_wind_source(frame, duration, WindSourceKind::Directional(model))
    }

    /// Add a turbulence box.
    pub fn add_turbulence_wind_source(
        &mut self,
        frame: &Coords,
        duration: f64,
        model: TurbulenceWind,
    ) -> sim_types::Result<WindSourceId> {
        self.add_wind_source(frame, duration, WindSourceKind::Turbulence(model))
    }

    /// Remove a source. The handle stays valid until the next [`update`](Self::update).
    pub fn remove_wind_source(&mut self, id: WindSourceId) -> sim_types::Result<()> {
        self.sources.remove(id)
    }

    /// Give up ownership of a source. It keeps playing and is collected once
    /// it stops.
    pub fn detach(&mut self, id: WindSourceId) -> sim_types::Result<()> {
        self.sources.get_mut(id)?.controller.detach();
        Ok(())
    }

    /// Borrow a source.
    pub fn source(&self, id: WindSourceId) -> sim_types::Result<&WindSource> {
        self.sources.get(id)
    }

    /// Mutably borrow a source. Call [`WindSource::refresh_bounds`] after
    /// moving it outside of [`update`](Self::update).
    pub fn source_mut(&mut self, id: WindSourceId) -> sim_types::Result<&mut WindSource> {
        self.sources.get_mut(id)
    }

    /// Number of live sources.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Iterate live sources.
    pub fn iter(&self) -> impl Iterator<Item = (WindSourceId, &WindSource)> {
        self.sources.iter()
    }

    /// Advance every source, expire finished ones and collect stopped
    /// detached sources.
    pub fn update(&mut self, dt: f64) -> sim_types::Result<()> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(SimError::InvalidTimestep(dt));
        }

        self.sources.compact();

        let mut garbage = Vec::new();
        for (id, source) in self.sources.iter_mut() {
            if source.advance(dt) {
                debug!(?id, kind = source.kind.name(), "wind source expired");
            }
            let controller = &source.controller;
            if !controller.is_playing() && !controller.is_attached() {
                garbage.push(id);
            }
        }

        for id in garbage {
            debug!(?id, "wind source collected");
            self.sources.remove(id)?;
        }
        Ok(())
    }

    /// Sum of the velocities of every playing source at `point`.
    #[must_use]
    pub fn global_wind_velocity(&self, point: &Point3<f64>) -> Vector3<f64> {
        self.sources
            .values()
            .fold(Vector3::zeros(), |acc, source| acc + source.velocity(point))
    }
}

impl VelocityField for WindSystem {
    fn velocity(&self, point: &Point3<f64>) -> Vector3<f64> {
        self.global_wind_velocity(point)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn breeze(x: f64) -> DirectionalWind {
        DirectionalWind::new(Vector3::new(x, 0.0, 0.0), Vector3::repeat(5.0))
    }

    #[test]
    fn test_superposition() {
        let mut wind = WindSystem::new();
        wind.add_directional_wind_source(&Coords::identity(), -1.0, breeze(2.0))
            .unwrap();
        wind.add_directional_wind_source(&Coords::identity(), -1.0, breeze(3.0))
            .unwrap();
        assert_eq!(wind.source_count(), 2);
        assert_relative_eq!(
            wind.global_wind_velocity(&Point3::origin()),
            Vector3::new(5.0, 0.0, 0.0)
        );
        // Outside both boxes.
        assert_relative_eq!(
            wind.velocity(&Point3::new(20.0, 0.0, 0.0)),
            Vector3::zeros()
        );
    }

    #[test]
    fn test_expiry_keeps_attached_sources() {
        let mut wind = WindSystem::new();
        let id = wind
            .add_directional_wind_source(&Coords::identity(), 1.0, breeze(1.0))
            .unwrap();
        wind.update(0.5).unwrap();
        assert!(wind.source(id).unwrap().controller.is_playing());
        wind.update(0.6).unwrap();
        let source = wind.source(id).unwrap();
        assert!(!source.controller.is_playing());
        assert_relative_eq!(source.velocity(&Point3::origin()), Vector3::zeros());
        // Still owned, so never collected.
        wind.update(1.0).unwrap();
        assert!(wind.source(id).is_ok());
    }

    #[test]
    fn test_detached_sources_are_collected() {
        let mut wind = WindSystem::new();
        let id = wind
            .add_directional_wind_source(&Coords::identity(), 0.5, breeze(1.0))
            .unwrap();
        wind.detach(id).unwrap();
        wind.update(0.25).unwrap();
        assert_eq!(wind.source_count(), 1);

        // Expires and is marked for removal in the same update.
        wind.update(0.5).unwrap();
        assert_eq!(wind.source_count(), 0);
        // Slot is compacted on the next update.
        wind.update(0.0).unwrap();
        assert!(wind.source(id).unwrap_err().is_invalid_handle());
    }

    #[test]
    fn test_remove_is_deferred() {
        let mut wind = WindSystem::new();
        let id = wind
            .add_vortex_wind_source(&Coords::identity(), -1.0, VortexWind::new(1.0, 1.0, 2.0, 2.0))
            .unwrap();
        wind.remove_wind_source(id).unwrap();
        assert!(wind.source(id).is_ok());
        assert_eq!(wind.source_count(), 0);
        wind.update(0.1).unwrap();
        assert!(wind.source(id).is_err());
    }

    #[test]
    fn test_rejects_bad_input() {
        let mut wind = WindSystem::new();
        assert!(wind
            .add_explosion_wind_source(&Coords::identity(), -1.0, ExplosionWind::new(1.0, 1.0))
            .is_err());
        assert!(wind
            .add_vortex_wind_source(&Coords::identity(), -1.0, VortexWind::new(1.0, 0.0, 2.0, 2.0))
            .is_err());
        assert!(matches!(
            wind.update(f64::NAN),
            Err(SimError::InvalidTimestep(_))
        ));
    }

    #[test]
    fn test_explosion_through_system() {
        let mut wind = WindSystem::new();
        let explosion = ExplosionWind::new(500.0, 200.0);
        wind.add_explosion_wind_source(&Coords::identity(), 1.0, explosion)
            .unwrap();
        wind.update(0.5).unwrap();

        let (front, back) = explosion.shell(0.5);
        let inside = wind.global_wind_velocity(&Point3::new(0.5 * (front + back), 0.0, 0.0));
        assert!(inside.x > 0.0);
        assert_relative_eq!(
            wind.global_wind_velocity(&Point3::new(250.0, 0.0, 0.0)),
            Vector3::zeros()
        );
    }

    #[test]
    fn test_wake_moves_with_anchor() {
        let mut wind = WindSystem::new();
        let id = wind
            .add_wake_wind_source(&Coords::identity(), -1.0, WakeWind::new(1.0, 0.5, 2.0))
            .unwrap();
        wind.update(0.1).unwrap();
        for step in 1..=3 {
            let frame = Coords::from_translation(Point3::new(f64::from(step), 0.0, 0.0));
            wind.source_mut(id).unwrap().controller.set_frame(&frame);
            wind.update(0.1).unwrap();
        }
        let WindSourceKind::Wake(wake) = &wind.source(id).unwrap().kind else {
            panic!("expected a wake");
        };
        assert_eq!(wake.pair_count(), 3);
        assert!(!wind.source(id).unwrap().controller.aabb().is_empty());
    }
}
