//! Registry of standalone particle groups.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use sim_types::Arena;
use tracing::debug;

use crate::GroupId;
use crate::group::ParticleGroup;

/// Owns particle groups that are not tied to a deformable mesh.
#[derive(Debug)]
pub struct ParticleSystem {
    groups: Arena<ParticleGroup>,
}

impl Default for ParticleSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl ParticleSystem {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            groups: Arena::new("particle group"),
        }
    }

    /// Register a group.
    pub fn add_group(&mut self, group: ParticleGroup) -> GroupId {
        self.groups.insert(group)
    }

    /// Release a group at the next update.
    pub fn remove_group(&mut self, id: GroupId) -> sim_types::Result<()> {
        self.groups.remove(id)
    }

    /// Borrow a group.
    pub fn group(&self, id: GroupId) -> sim_types::Result<&ParticleGroup> {
        self.groups.get(id)
    }

    /// Mutably borrow a group.
    pub fn group_mut(&mut self, id: GroupId) -> sim_types::Result<&mut ParticleGroup> {
        self.groups.get_mut(id)
    }

    /// Number of live groups.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Release removed groups.
    pub fn compact(&mut self) {
        let removed = self.groups.compact().len();
        if removed > 0 {
            debug!(removed, "released particle groups");
        }
    }

    /// Step every live group by `dt`.
    pub fn update(&mut self, dt: f64) -> sim_types::Result<()> {
        self.compact();
        let mut groups: Vec<&mut ParticleGroup> = self.groups.values_mut().collect();

        #[cfg(feature = "parallel")]
        {
            groups.par_iter_mut().try_for_each(|g| g.update(dt))
        }

        #[cfg(not(feature = "parallel"))]
        {
            groups.iter_mut().try_for_each(|g| g.update(dt))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Vector3};

    #[test]
    fn test_update_steps_all_groups() {
        let mut system = ParticleSystem::new();
        let mut ids = Vec::new();
        for i in 0..3 {
            let mut group = ParticleGroup::default();
            let p = group.add_particle(Point3::new(f64::from(i), 0.0, 0.0), 0.1, false);
            group.particle_mut(p).unwrap().acceleration = Vector3::new(0.0, 0.0, -9.81);
            ids.push((system.add_group(group), p));
        }

        system.update(1.0 / 60.0).unwrap();
        for (g, p) in &ids {
            let z = system.group(*g).unwrap().particle(*p).unwrap().position.z;
            assert!(z < 0.0);
        }
    }

    #[test]
    fn test_removed_group_released_on_update() {
        let mut system = ParticleSystem::new();
        let id = system.add_group(ParticleGroup::default());
        system.remove_group(id).unwrap();
        assert!(system.group(id).is_ok());
        system.update(1.0 / 60.0).unwrap();
        assert!(system.group(id).is_err());
        assert_eq!(system.group_count(), 0);
    }
}
