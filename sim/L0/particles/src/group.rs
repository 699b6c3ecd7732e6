//! Particle groups: particles, constraints and obstacles stepped together.
//!
//! # Update
//!
//! ```text
//! compact dead objects
//! for each particle:   v += a dt, clamp |v|, x += v dt   (fixed: follow destination)
//! repeat iterations:   relax links, relax bend constraints
//! for each particle:   v = (x - x_prev) / dt, damp
//! for each obstacle:   push particles out, record CollisionEvent
//! ```
//!
//! Removals are deferred so that handles held by other objects stay valid
//! for the rest of the frame in which they were removed.

use nalgebra::{Point3, Vector3};
use sim_types::{Arena, SimError};
use tracing::trace;

use crate::config::GroupConfig;
use crate::constraint::{BendConstraint, Link, dihedral_angle};
use crate::obstacle::{CollisionEvent, Obstacle};
use crate::particle::{Particle, PositionMode};
use crate::{BendId, LinkId, ObstacleId, ParticleId};

/// Assumed substep for [`PositionMode::Push`] before the first update.
const DEFAULT_STEP: f64 = 1.0 / 60.0;

/// A set of particles with their constraints and obstacles.
#[derive(Debug, Clone)]
pub struct ParticleGroup {
    particles: Arena<Particle>,
    links: Arena<Link>,
    bends: Arena<BendConstraint>,
    obstacles: Arena<Obstacle>,
    collision_events: Vec<CollisionEvent>,
    config: GroupConfig,
    enabled: bool,
    collisions_enabled: bool,
    last_dt: f64,
}

impl Default for ParticleGroup {
    fn default() -> Self {
        Self::new(GroupConfig::default())
    }
}

impl ParticleGroup {
    /// Create an empty group.
    #[must_use]
    pub fn new(config: GroupConfig) -> Self {
        Self {
            particles: Arena::new("particle"),
            links: Arena::new("link"),
            bends: Arena::new("bend constraint"),
            obstacles: Arena::new("obstacle"),
            collision_events: Vec::new(),
            config,
            enabled: true,
            collisions_enabled: true,
            last_dt: DEFAULT_STEP,
        }
    }

    /// Solver settings.
    #[must_use]
    pub fn config(&self) -> &GroupConfig {
        &self.config
    }

    /// Replace the solver settings.
    pub fn set_config(&mut self, config: GroupConfig) {
        self.config = config;
    }

    /// Add a particle at `position`.
    pub fn add_particle(&mut self, position: Point3<f64>, radius: f64, fixed: bool) -> ParticleId {
        self.particles.insert(Particle::new(position, radius, fixed))
    }

    /// Link two particles at their current distance.
    pub fn add_link(
        &mut self,
        p0: ParticleId,
        p1: ParticleId,
        stiffness: f64,
        stretch: f64,
        allowed_contraction: f64,
    ) -> sim_types::Result<LinkId> {
        let a = self.particles.get(p0)?.position;
        let b = self.particles.get(p1)?.position;
        if p0 == p1 {
            return Err(SimError::invalid_config("link endpoints must differ"));
        }
        Ok(self.links.insert(Link::new(
            p0,
            p1,
            (b - a).norm(),
            stiffness,
            stretch,
            allowed_contraction,
        )))
    }

    /// Add a bend constraint with the current dihedral angle as rest angle.
    pub fn add_bend_constraint(
        &mut self,
        axis0: ParticleId,
        axis1: ParticleId,
        side0: ParticleId,
        side1: ParticleId,
        stiffness: f64,
        angle_threshold: f64,
    ) -> sim_types::Result<BendId> {
        let a0 = self.particles.get(axis0)?.position;
        let a1 = self.particles.get(axis1)?.position;
        let s0 = self.particles.get(side0)?.position;
        let s1 = self.particles.get(side1)?.position;
        let rest_angle = dihedral_angle(&a0, &a1, &s0, &s1);
        Ok(self.bends.insert(BendConstraint::new(
            [axis0, axis1],
            [side0, side1],
            stiffness,
            rest_angle,
            angle_threshold,
        )))
    }

    /// Add a static obstacle.
    pub fn add_obstacle(&mut self, obstacle: Obstacle) -> ObstacleId {
        self.obstacles.insert(obstacle)
    }

    /// Remove a particle and every constraint that references it.
    pub fn remove_particle(&mut self, id: ParticleId) -> sim_types::Result<()> {
        self.particles.remove(id)?;
        let dead_links: Vec<_> = self
            .links
            .iter()
            .filter(|(_, l)| l.p0 == id || l.p1 == id)
            .map(|(h, _)| h)
            .collect();
        for link in dead_links {
            self.links.remove(link)?;
        }
        let dead_bends: Vec<_> = self
            .bends
            .iter()
            .filter(|(_, b)| b.particles().contains(&id))
            .map(|(h, _)| h)
            .collect();
        for bend in dead_bends {
            self.bends.remove(bend)?;
        }
        Ok(())
    }

    /// Remove a link.
    pub fn remove_link(&mut self, id: LinkId) -> sim_types::Result<()> {
        self.links.remove(id)
    }

    /// Remove a bend constraint.
    pub fn remove_bend_constraint(&mut self, id: BendId) -> sim_types::Result<()> {
        self.bends.remove(id)
    }

    /// Remove an obstacle.
    pub fn remove_obstacle(&mut self, id: ObstacleId) -> sim_types::Result<()> {
        self.obstacles.remove(id)
    }

    /// Move a particle.
    pub fn set_position(
        &mut self,
        id: ParticleId,
        position: Point3<f64>,
        mode: PositionMode,
    ) -> sim_types::Result<()> {
        let last_dt = self.last_dt;
        let p = self.particles.get_mut(id)?;
        match mode {
            PositionMode::Reset => {
                p.position = position;
                p.prev_position = position;
                p.velocity = Vector3::zeros();
                p.destination = None;
            }
            PositionMode::Push => {
                p.velocity += (position - p.position) / last_dt;
                p.position = position;
            }
            PositionMode::Teleport => {
                p.position = position;
                p.prev_position = position;
            }
            PositionMode::SetDest => {
                p.destination = Some(position);
            }
        }
        Ok(())
    }

    /// Change a link's rest length.
    pub fn set_link_rest_length(&mut self, id: LinkId, rest_length: f64) -> sim_types::Result<()> {
        self.links.get_mut(id)?.rest_length = rest_length.max(0.0);
        Ok(())
    }

    /// Pin or release a particle.
    pub fn set_fixed(&mut self, id: ParticleId, fixed: bool) -> sim_types::Result<()> {
        self.particles.get_mut(id)?.fixed = fixed;
        Ok(())
    }

    /// Enable or pause simulation.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether simulation runs.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable obstacle collisions.
    pub fn set_collisions_enabled(&mut self, enabled: bool) {
        self.collisions_enabled = enabled;
        if !enabled {
            self.collision_events.clear();
        }
    }

    /// Whether obstacle collisions are resolved.
    #[must_use]
    pub fn collisions_enabled(&self) -> bool {
        self.collisions_enabled
    }

    /// Borrow a particle.
    pub fn particle(&self, id: ParticleId) -> sim_types::Result<&Particle> {
        self.particles.get(id)
    }

    /// Mutably borrow a particle.
    pub fn particle_mut(&mut self, id: ParticleId) -> sim_types::Result<&mut Particle> {
        self.particles.get_mut(id)
    }

    /// Borrow a link.
    pub fn link(&self, id: LinkId) -> sim_types::Result<&Link> {
        self.links.get(id)
    }

    /// Borrow a bend constraint.
    pub fn bend(&self, id: BendId) -> sim_types::Result<&BendConstraint> {
        self.bends.get(id)
    }

    /// Borrow an obstacle.
    pub fn obstacle(&self, id: ObstacleId) -> sim_types::Result<&Obstacle> {
        self.obstacles.get(id)
    }

    /// Live particles.
    pub fn particles(&self) -> impl Iterator<Item = (ParticleId, &Particle)> {
        self.particles.iter()
    }

    /// Live links.
    pub fn links(&self) -> impl Iterator<Item = (LinkId, &Link)> {
        self.links.iter()
    }

    /// Live bend constraints.
    pub fn bends(&self) -> impl Iterator<Item = (BendId, &BendConstraint)> {
        self.bends.iter()
    }

    /// Number of live particles.
    #[must_use]
    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    /// Number of live links.
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Number of live bend constraints.
    #[must_use]
    pub fn bend_count(&self) -> usize {
        self.bends.len()
    }

    /// Number of live obstacles.
    #[must_use]
    pub fn obstacle_count(&self) -> usize {
        self.obstacles.len()
    }

    /// Contacts recorded by the last update.
    #[must_use]
    pub fn collision_events(&self) -> &[CollisionEvent] {
        &self.collision_events
    }

    /// Vacate removed objects so their slots can be reused.
    pub fn compact(&mut self) {
        let particles = self.particles.compact().len();
        let links = self.links.compact().len();
        let bends = self.bends.compact().len();
        let obstacles = self.obstacles.compact().len();
        if particles + links + bends + obstacles > 0 {
            trace!(particles, links, bends, obstacles, "compacted particle group");
        }
    }

    /// Advance the group by one substep.
    pub fn update(&mut self, dt: f64) -> sim_types::Result<()> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(SimError::InvalidTimestep(dt));
        }
        self.compact();
        self.collision_events.clear();
        if !self.enabled || dt <= 0.0 {
            return Ok(());
        }
        self.last_dt = dt;

        self.integrate(dt);
        for _ in 0..self.config.iterations {
            self.relax_links();
            self.relax_bends();
        }
        self.finish_velocities(dt);
        if self.collisions_enabled {
            self.resolve_collisions();
        }
        Ok(())
    }

    fn integrate(&mut self, dt: f64) {
        let max_velocity = self.config.max_velocity;
        for p in self.particles.values_mut() {
            p.prev_position = p.position;
            if p.fixed {
                if let Some(dest) = p.destination.take() {
                    p.position = dest;
                }
                continue;
            }

            p.velocity += p.acceleration * dt;
            let speed = p.velocity.norm();
            if speed > max_velocity {
                p.velocity *= max_velocity / speed;
            }
            p.position += p.velocity * dt;
            if let Some(dest) = p.destination.take() {
                p.position = dest;
            }
        }
    }

    fn relax_links(&mut self) {
        for link in self.links.values_mut() {
            link.impulse = 0.0;
            if let Ok((a, b)) = self.particles.get2_mut(link.p0, link.p1) {
                link.solve(a, b);
            }
        }
    }

    fn relax_bends(&mut self) {
        for bend in self.bends.values() {
            let ids = bend.particles();
            let mut positions = [Point3::origin(); 4];
            let mut inv_masses = [0.0; 4];
            let mut valid = true;
            for (i, id) in ids.iter().enumerate() {
                match self.particles.get(*id) {
                    Ok(p) => {
                        positions[i] = p.position;
                        inv_masses[i] = p.inv_mass();
                    }
                    Err(_) => valid = false,
                }
            }
            if !valid {
                continue;
            }
            let Some(corrections) = bend.corrections(&positions, &inv_masses) else {
                continue;
            };
            for (id, correction) in ids.iter().zip(corrections) {
                if let Ok(p) = self.particles.get_mut(*id) {
                    p.position += correction;
                }
            }
        }
    }

    fn finish_velocities(&mut self, dt: f64) {
        let keep = 1.0 - self.config.damping;
        for p in self.particles.values_mut() {
            p.velocity = (p.position - p.prev_position) / dt;
            if !p.fixed {
                p.velocity *= keep;
            }
        }
    }

    fn resolve_collisions(&mut self) {
        if self.obstacles.is_empty() {
            return;
        }
        for (obstacle_id, obstacle) in self.obstacles.iter() {
            let bounds = obstacle.aabb();
            for (particle_id, p) in self.particles.iter_mut() {
                if p.fixed || !bounds.expanded(p.radius).contains(&p.position) {
                    continue;
                }
                if let Some((point, normal, depth)) = obstacle.resolve(p) {
                    self.collision_events.push(CollisionEvent {
                        particle: particle_id,
                        obstacle: obstacle_id,
                        point,
                        normal,
                        depth,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_free_fall() {
        let mut group = ParticleGroup::new(GroupConfig::default().with_damping(0.0));
        let p = group.add_particle(Point3::origin(), 0.1, false);
        group.particle_mut(p).unwrap().acceleration = Vector3::new(0.0, 0.0, -10.0);
        group.update(0.1).unwrap();
        let particle = group.particle(p).unwrap();
        assert_relative_eq!(particle.velocity.z, -1.0, epsilon = 1e-12);
        assert_relative_eq!(particle.position.z, -0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_fixed_particle_does_not_move() {
        let mut group = ParticleGroup::default();
        let p = group.add_particle(Point3::new(1.0, 2.0, 3.0), 0.1, true);
        group.particle_mut(p).unwrap().acceleration = Vector3::new(0.0, 0.0, -10.0);
        group.update(0.1).unwrap();
        assert_relative_eq!(group.particle(p).unwrap().position, Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_fixed_particle_follows_destination() {
        let mut group = ParticleGroup::default();
        let p = group.add_particle(Point3::origin(), 0.1, true);
        group
            .set_position(p, Point3::new(0.5, 0.0, 0.0), PositionMode::SetDest)
            .unwrap();
        group.update(0.5).unwrap();
        let particle = group.particle(p).unwrap();
        assert_relative_eq!(particle.position, Point3::new(0.5, 0.0, 0.0));
        assert_relative_eq!(particle.velocity, Vector3::new(1.0, 0.0, 0.0));
        assert!(particle.destination.is_none());
    }

    #[test]
    fn test_link_rest_length_from_positions() {
        let mut group = ParticleGroup::default();
        let a = group.add_particle(Point3::origin(), 0.1, false);
        let b = group.add_particle(Point3::new(3.0, 4.0, 0.0), 0.1, false);
        let link = group.add_link(a, b, 1.0, 1.0, 0.0).unwrap();
        assert_relative_eq!(group.link(link).unwrap().rest_length, 5.0);
        assert!(group.add_link(a, a, 1.0, 1.0, 0.0).is_err());
    }

    #[test]
    fn test_link_pulls_back() {
        let mut group = ParticleGroup::new(GroupConfig::default().with_iterations(8));
        let a = group.add_particle(Point3::origin(), 0.1, true);
        let b = group.add_particle(Point3::new(1.0, 0.0, 0.0), 0.1, false);
        group.add_link(a, b, 1.0, 1.0, 0.0).unwrap();
        group
            .set_position(b, Point3::new(2.0, 0.0, 0.0), PositionMode::Teleport)
            .unwrap();
        group.update(1.0 / 60.0).unwrap();
        assert_relative_eq!(
            group.particle(b).unwrap().position.x,
            1.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_deferred_removal() {
        let mut group = ParticleGroup::default();
        let a = group.add_particle(Point3::origin(), 0.1, false);
        let b = group.add_particle(Point3::new(1.0, 0.0, 0.0), 0.1, false);
        let link = group.add_link(a, b, 1.0, 1.0, 0.0).unwrap();

        group.remove_particle(a).unwrap();
        // Still readable this frame.
        assert!(group.particle(a).is_ok());
        assert_eq!(group.link_count(), 0);

        group.update(1.0 / 60.0).unwrap();
        assert!(group.particle(a).unwrap_err().is_invalid_handle());
        assert!(group.link(link).is_err());
        assert_eq!(group.particle_count(), 1);
    }

    #[test]
    fn test_position_modes() {
        let mut group = ParticleGroup::default();
        let p = group.add_particle(Point3::origin(), 0.1, false);
        group.particle_mut(p).unwrap().velocity = Vector3::new(1.0, 0.0, 0.0);

        group
            .set_position(p, Point3::new(0.0, 1.0, 0.0), PositionMode::Teleport)
            .unwrap();
        assert_relative_eq!(group.particle(p).unwrap().velocity.x, 1.0);

        group
            .set_position(p, Point3::new(0.0, 1.0, 1.0 / 60.0), PositionMode::Push)
            .unwrap();
        assert_relative_eq!(group.particle(p).unwrap().velocity.z, 1.0, epsilon = 1e-9);

        group.particle_mut(p).unwrap().position.x = f64::NAN;
        group
            .set_position(p, Point3::new(0.0, 0.0, 0.0), PositionMode::Reset)
            .unwrap();
        let particle = group.particle(p).unwrap();
        assert!(!particle.is_corrupt());
        assert_relative_eq!(particle.velocity, Vector3::zeros());
    }

    #[test]
    fn test_collision_events() {
        let mut group = ParticleGroup::new(GroupConfig::default().with_damping(0.0));
        let p = group.add_particle(Point3::new(0.0, 0.0, 0.05), 0.1, false);
        let floor = group.add_obstacle(Obstacle::cuboid(
            &sim_types::Coords::from_translation(Point3::new(0.0, 0.0, -1.0)),
            Vector3::new(5.0, 5.0, 1.0),
        ));
        group.particle_mut(p).unwrap().acceleration = Vector3::new(0.0, 0.0, -10.0);
        group.update(0.1).unwrap();

        let events = group.collision_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].obstacle, floor);
        assert_relative_eq!(group.particle(p).unwrap().position.z, 0.1, epsilon = 1e-12);

        group.set_collisions_enabled(false);
        group.update(0.1).unwrap();
        assert!(group.collision_events().is_empty());
    }

    #[test]
    fn test_disabled_group_is_frozen() {
        let mut group = ParticleGroup::default();
        let p = group.add_particle(Point3::origin(), 0.1, false);
        group.particle_mut(p).unwrap().acceleration = Vector3::new(0.0, 0.0, -10.0);
        group.set_enabled(false);
        group.update(0.1).unwrap();
        assert_relative_eq!(group.particle(p).unwrap().position, Point3::origin());
        assert!(group.update(f64::NAN).is_err());
    }
}
