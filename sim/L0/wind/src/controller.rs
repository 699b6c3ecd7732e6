//! State shared by every wind source: frame, clock and flags.

use nalgebra::{Point3, UnitQuaternion, Vector3};
use sim_types::{Aabb, Coords};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Axis scales below this are treated as 1 when mapping into the frame.
const MIN_SCALE: f64 = 1e-9;

/// Frame, lifetime and bounds of one wind source.
///
/// The frame is stored decomposed into position, orientation and per-axis
/// scale. Source models evaluate their fields in the unscaled local frame,
/// and the controller maps points in and velocities out.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WindSourceController {
    position: Point3<f64>,
    orientation: UnitQuaternion<f64>,
    scale: Vector3<f64>,
    elapsed: f64,
    duration: Option<f64>,
    aabb: Aabb,
    playing: bool,
    attached: bool,
}

impl WindSourceController {
    /// Create a playing, attached controller.
    ///
    /// A negative `duration` means the source plays until stopped.
    #[must_use]
    pub fn new(frame: &Coords, duration: f64) -> Self {
        let (position, orientation, scale) = frame.decompose();
        Self {
            position,
            orientation,
            scale,
            elapsed: 0.0,
            duration: (duration >= 0.0).then_some(duration),
            aabb: Aabb::empty(),
            playing: true,
            attached: true,
        }
    }

    /// Frame origin.
    #[must_use]
    pub fn position(&self) -> Point3<f64> {
        self.position
    }

    /// Frame orientation.
    #[must_use]
    pub fn orientation(&self) -> UnitQuaternion<f64> {
        self.orientation
    }

    /// Per-axis frame scale.
    #[must_use]
    pub fn scale(&self) -> Vector3<f64> {
        self.scale
    }

    /// The frame as an affine transform.
    #[must_use]
    pub fn frame(&self) -> Coords {
        Coords::from_rotation_translation(&self.orientation, self.position).with_scale(self.scale)
    }

    /// Move the source.
    pub fn set_frame(&mut self, frame: &Coords) {
        let (position, orientation, scale) = frame.decompose();
        self.position = position;
        self.orientation = orientation;
        self.scale = scale;
    }

    /// Seconds since the source started.
    #[must_use]
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Lifetime, `None` for indefinite sources.
    #[must_use]
    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// Fraction of the lifetime elapsed, in `[0, 1]`. Indefinite sources
    /// report 0.
    #[must_use]
    pub fn progress(&self) -> f64 {
        match self.duration {
            Some(d) if d > 0.0 => (self.elapsed / d).clamp(0.0, 1.0),
            Some(_) => 1.0,
            None => 0.0,
        }
    }

    /// World-space bounds of the field.
    #[must_use]
    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    pub(crate) fn set_aabb(&mut self, aabb: Aabb) {
        self.aabb = aabb;
    }

    /// Whether the source contributes to the global field.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Whether a caller still owns the source.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Resume playback.
    pub fn play(&mut self) {
        self.playing = true;
    }

    /// Stop contributing. Detached stopped sources are collected.
    pub fn stop(&mut self) {
        self.playing = false;
    }

    /// Restart the clock.
    pub fn rewind(&mut self) {
        self.elapsed = 0.0;
    }

    pub(crate) fn detach(&mut self) {
        self.attached = false;
    }

    /// Advance the clock. Returns `true` when a finite lifetime ran out
    /// during this call.
    pub(crate) fn advance(&mut self, dt: f64) -> bool {
        if !self.playing {
            return false;
        }
        self.elapsed += dt;
        match self.duration {
            Some(d) if self.elapsed >= d => {
                self.playing = false;
                true
            }
            _ => false,
        }
    }

    fn safe_scale(&self) -> Vector3<f64> {
        self.scale
            .map(|s| if s.abs() < MIN_SCALE { 1.0 } else { s })
    }

    /// Map a world point into the source frame.
    #[must_use]
    pub fn to_local_point(&self, world: &Point3<f64>) -> Point3<f64> {
        let rotated = self.orientation.inverse_transform_vector(&(world - self.position));
        Point3::from(rotated.component_div(&self.safe_scale()))
    }

    /// Map a velocity from the source frame to world space.
    #[must_use]
    pub fn to_world_vector(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.orientation * local.component_mul(&self.safe_scale())
    }

    /// World bounds of a local box.
    #[must_use]
    pub fn world_bounds(&self, local: &Aabb) -> Aabb {
        local.transformed(&self.frame())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_negative_duration_is_indefinite() {
        let c = WindSourceController::new(&Coords::identity(), -1.0);
        assert_eq!(c.duration(), None);
        assert!(c.is_playing());
        assert!(c.is_attached());
        assert_relative_eq!(c.progress(), 0.0);
    }

    #[test]
    fn test_advance_expires() {
        let mut c = WindSourceController::new(&Coords::identity(), 1.0);
        assert!(!c.advance(0.6));
        assert_relative_eq!(c.progress(), 0.6);
        assert!(c.advance(0.6));
        assert!(!c.is_playing());
        // Stopped clocks do not advance.
        assert!(!c.advance(1.0));
        assert_relative_eq!(c.elapsed(), 1.2);
    }

    #[test]
    fn test_local_mapping_round_trip() {
        let rotation = UnitQuaternion::from_euler_angles(0.0, 0.0, std::f64::consts::FRAC_PI_2);
        let frame = Coords::from_rotation_translation(&rotation, Point3::new(1.0, 2.0, 3.0))
            .with_scale(Vector3::new(2.0, 2.0, 2.0));
        let c = WindSourceController::new(&frame, -1.0);
        assert_relative_eq!(c.scale(), Vector3::new(2.0, 2.0, 2.0), epsilon = 1e-12);

        let local = c.to_local_point(&Point3::new(1.0, 4.0, 3.0));
        assert_relative_eq!(local, Point3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
        let v = c.to_world_vector(&Vector3::x());
        assert_relative_eq!(v, Vector3::new(0.0, 2.0, 0.0), epsilon = 1e-12);
    }
}
