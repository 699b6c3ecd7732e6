//! Vortex street shed behind a moving anchor.
//!
//! Every `spawn_distance` of anchor travel a pair of co-rotating vortices is
//! dropped at the anchor, offset to either side of the path. The spin sign
//! alternates between pairs, which gives the staggered street of a
//! von Kármán wake. Pairs live in world space: they lose strength
//! exponentially and drift toward an offset fixed at spawn time. The oldest
//! pair is dropped once the ring is full, and the source stops itself after
//! `decay_time` seconds without a spawn.
//!
//! ```text
//!   anchor path ───────────────────────────►
//!        ↺        ↻        ↺        ↻      ◆ anchor
//!        ↺        ↻        ↺        ↻
//! ```

use std::collections::VecDeque;

use nalgebra::{Point3, Vector3};
use sim_types::{Aabb, SimError, any_orthogonal};
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::controller::WindSourceController;
use crate::source::WindModel;

/// One shed vortex pair.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VortexPair {
    /// Midpoint of the pair.
    pub center: Point3<f64>,
    /// Rotation axis (anchor up axis at spawn).
    pub axis: Vector3<f64>,
    /// Unit offset from the center to the first vortex.
    pub lateral: Vector3<f64>,
    /// Signed tangential speed at the core radius.
    pub strength: f64,
    /// Point the pair drifts toward.
    pub target: Point3<f64>,
}

/// Wake parameters and live vortex ring.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WakeWind {
    /// Anchor travel between spawns.
    pub spawn_distance: f64,
    /// Ring capacity in pairs.
    pub max_pairs: usize,
    /// Core radius of each vortex.
    pub vortex_radius: f64,
    /// Distance between the two vortices of a pair.
    pub pair_separation: f64,
    /// Tangential speed of a new vortex at its core radius.
    pub initial_strength: f64,
    /// Exponential strength decay rate (1/s).
    pub decay_rate: f64,
    /// Drift target relative to the spawn point, in the anchor frame.
    pub drift_offset: Vector3<f64>,
    /// Exponential drift rate (1/s).
    pub drift_rate: f64,
    /// Seconds without spawns after which the source stops.
    pub decay_time: f64,
    pairs: VecDeque<VortexPair>,
    last_spawn: Option<Point3<f64>>,
    since_spawn: f64,
    next_sign: f64,
}

impl WakeWind {
    /// A wake with no drift.
    #[must_use]
    pub fn new(spawn_distance: f64, vortex_radius: f64, initial_strength: f64) -> Self {
        Self {
            spawn_distance,
            max_pairs: 16,
            vortex_radius,
            pair_separation: 2.0 * vortex_radius,
            initial_strength,
            decay_rate: 1.0,
            drift_offset: Vector3::zeros(),
            drift_rate: 0.0,
            decay_time: 2.0,
            pairs: VecDeque::new(),
            last_spawn: None,
            since_spawn: 0.0,
            next_sign: 1.0,
        }
    }

    /// Set the ring capacity.
    #[must_use]
    pub fn with_max_pairs(mut self, max_pairs: usize) -> Self {
        self.max_pairs = max_pairs;
        self
    }

    /// Set strength decay and the idle time before the wake stops.
    #[must_use]
    pub fn with_decay(mut self, rate: f64, decay_time: f64) -> Self {
        self.decay_rate = rate;
        self.decay_time = decay_time;
        self
    }

    /// Set the drift target and rate.
    #[must_use]
    pub fn with_drift(mut self, offset: Vector3<f64>, rate: f64) -> Self {
        self.drift_offset = offset;
        self.drift_rate = rate;
        self
    }

    /// Live vortex pairs, oldest first.
    pub fn pairs(&self) -> impl Iterator<Item = &VortexPair> {
        self.pairs.iter()
    }

    /// Number of live pairs.
    #[must_use]
    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    fn spawn(&mut self, controller: &WindSourceController, travel: &Vector3<f64>) {
        let axis = controller.orientation() * Vector3::z();
        let lateral = axis
            .cross(travel)
            .try_normalize(1e-12)
            .unwrap_or_else(|| any_orthogonal(&axis));
        let center = controller.position();
        self.pairs.push_back(VortexPair {
            center,
            axis,
            lateral,
            strength: self.initial_strength * self.next_sign,
            target: center + controller.orientation() * self.drift_offset,
        });
        self.next_sign = -self.next_sign;
        while self.pairs.len() > self.max_pairs {
            self.pairs.pop_front();
        }
    }

    fn vortex_velocity(&self, pair: &VortexPair, core: &Point3<f64>, point: &Point3<f64>) -> Vector3<f64> {
        let d = point - core;
        let radial = d - pair.axis * d.dot(&pair.axis);
        let r = radial.norm();
        if r <= 0.0 {
            return Vector3::zeros();
        }
        let rc = self.vortex_radius;
        let speed = if r < rc {
            pair.strength * r / rc
        } else {
            // Rankine tail cut off at four core radii.
            let cutoff = 4.0 * rc;
            if r >= cutoff {
                return Vector3::zeros();
            }
            pair.strength * rc / r * (1.0 - r / cutoff)
        };
        pair.axis.cross(&(radial / r)) * speed
    }
}

impl WindModel for WakeWind {
    fn velocity(&self, _controller: &WindSourceController, point: &Point3<f64>) -> Vector3<f64> {
        let half = 0.5 * self.pair_separation;
        self.pairs
            .iter()
            .map(|pair| {
                let a = pair.center + pair.lateral * half;
                let b = pair.center - pair.lateral * half;
                self.vortex_velocity(pair, &a, point) + self.vortex_velocity(pair, &b, point)
            })
            .sum()
    }

    fn bounds(&self, _controller: &WindSourceController) -> Aabb {
        if self.pairs.is_empty() {
            return Aabb::empty();
        }
        let mut aabb = Aabb::empty();
        for pair in &self.pairs {
            aabb.include_point(&pair.center);
        }
        aabb.expanded(0.5 * self.pair_separation + 4.0 * self.vortex_radius)
    }

    fn advance(&mut self, controller: &mut WindSourceController, dt: f64) {
        let decay = (-self.decay_rate.max(0.0) * dt).exp();
        let drift = 1.0 - (-self.drift_rate.max(0.0) * dt).exp();
        for pair in &mut self.pairs {
            pair.strength *= decay;
            pair.center += (pair.target - pair.center) * drift;
        }

        let anchor = controller.position();
        match self.last_spawn {
            None => {
                self.last_spawn = Some(anchor);
                self.since_spawn = 0.0;
            }
            Some(last) => {
                let travel = anchor - last;
                if travel.norm() >= self.spawn_distance {
                    self.spawn(controller, &travel);
                    self.last_spawn = Some(anchor);
                    self.since_spawn = 0.0;
                } else {
                    self.since_spawn += dt;
                }
            }
        }

        if self.since_spawn > self.decay_time && controller.is_playing() {
            debug!(pairs = self.pairs.len(), "wake idle, stopping");
            controller.stop();
        }
    }

    fn validate(&self) -> sim_types::Result<()> {
        if self.spawn_distance.is_nan() || self.spawn_distance <= 0.0 {
            return Err(SimError::invalid_config("wake spawn distance must be positive"));
        }
        if self.vortex_radius.is_nan() || self.vortex_radius <= 0.0 {
            return Err(SimError::invalid_config("wake vortex radius must be positive"));
        }
        if self.max_pairs == 0 {
            return Err(SimError::invalid_config("wake needs room for at least one pair"));
        }
        if self.decay_time.is_nan() || self.decay_time < 0.0 {
            return Err(SimError::invalid_config("wake decay time must be non-negative"));
        }
        Ok(())
    }
}
