//! Static collision obstacles.

use nalgebra::{Point3, UnitQuaternion, Vector3};
use sim_types::{Aabb, Capsule, Coords, Cuboid, Ellipsoid, Shape, Sphere};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::particle::Particle;
use crate::{ObstacleId, ParticleId};

/// A shape placed in the world by a rigid frame.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Obstacle {
    /// Shape in local coordinates.
    pub shape: Shape,
    frame: Coords,
}

impl Obstacle {
    /// Place `shape` with the rigid part of `frame` (scale is discarded).
    #[must_use]
    pub fn new(shape: Shape, frame: &Coords) -> Self {
        Self {
            shape,
            frame: frame.orthonormalized(),
        }
    }

    /// Sphere at `center`.
    #[must_use]
    pub fn sphere(center: Point3<f64>, radius: f64) -> Self {
        Self::new(
            Shape::Sphere(Sphere::new(radius)),
            &Coords::from_translation(center),
        )
    }

    /// Capsule between two points.
    #[must_use]
    pub fn capsule(a: Point3<f64>, b: Point3<f64>, radius: f64) -> Self {
        let axis = b - a;
        let rotation = UnitQuaternion::rotation_between(&Vector3::z(), &axis).unwrap_or_else(|| {
            UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f64::consts::PI)
        });
        Self::new(
            Shape::Capsule(Capsule::new(axis.norm() * 0.5, radius)),
            &Coords::from_rotation_translation(&rotation, nalgebra::center(&a, &b)),
        )
    }

    /// Box with the given frame and half extents.
    #[must_use]
    pub fn cuboid(frame: &Coords, half_extents: Vector3<f64>) -> Self {
        Self::new(Shape::Cuboid(Cuboid::new(half_extents)), frame)
    }

    /// Ellipsoid with the given frame and radii.
    #[must_use]
    pub fn ellipsoid(frame: &Coords, radii: Vector3<f64>) -> Self {
        Self::new(Shape::Ellipsoid(Ellipsoid::new(radii)), frame)
    }

    /// Rigid placement of the obstacle.
    #[must_use]
    pub fn frame(&self) -> &Coords {
        &self.frame
    }

    /// World-space bounds.
    #[must_use]
    pub fn aabb(&self) -> Aabb {
        self.shape.local_aabb().transformed(&self.frame)
    }

    /// Signed distance from a world point to the surface.
    #[must_use]
    pub fn signed_distance(&self, point: &Point3<f64>) -> f64 {
        self.shape.signed_distance(&self.frame.local_point(point))
    }

    /// Push a particle out of the obstacle.
    ///
    /// The particle is moved onto the surface offset by its radius and the
    /// inward normal component of its velocity is removed. Returns the
    /// world contact point, normal and penetration depth on contact.
    pub fn resolve(&self, particle: &mut Particle) -> Option<(Point3<f64>, Vector3<f64>, f64)> {
        let local = self.frame.local_point(&particle.position);
        let surface = self.shape.closest_surface_point(&local);
        let depth = particle.radius - surface.distance;
        if depth <= 0.0 {
            return None;
        }

        let normal = self.frame.world_vector(&surface.normal);
        let point = self.frame.world_point(&surface.point);
        particle.position = point + normal * particle.radius;

        let vn = particle.velocity.dot(&normal);
        if vn < 0.0 {
            particle.velocity -= normal * vn;
        }
        Some((point, normal, depth))
    }
}

/// A particle-obstacle contact recorded during the last update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionEvent {
    /// Colliding particle.
    pub particle: ParticleId,
    /// Obstacle hit.
    pub obstacle: ObstacleId,
    /// Contact point on the obstacle surface.
    pub point: Point3<f64>,
    /// Outward surface normal.
    pub normal: Vector3<f64>,
    /// Penetration depth before resolution.
    pub depth: f64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sphere_pushes_out() {
        let obstacle = Obstacle::sphere(Point3::new(0.0, 0.0, -1.0), 1.0);
        let mut p = Particle::new(Point3::new(0.0, 0.0, -0.2), 0.1, false);
        p.velocity = Vector3::new(1.0, 0.0, -3.0);
        let (_, normal, depth) = obstacle.resolve(&mut p).unwrap();
        assert_relative_eq!(normal, Vector3::z(), epsilon = 1e-12);
        assert_relative_eq!(depth, 0.3, epsilon = 1e-12);
        assert_relative_eq!(p.position.z, 0.1, epsilon = 1e-12);
        assert_relative_eq!(p.velocity, Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_no_contact_leaves_particle() {
        let obstacle = Obstacle::cuboid(&Coords::identity(), Vector3::repeat(1.0));
        let mut p = Particle::new(Point3::new(0.0, 0.0, 2.0), 0.5, false);
        assert!(obstacle.resolve(&mut p).is_none());
        assert_relative_eq!(p.position, Point3::new(0.0, 0.0, 2.0));
    }

    #[test]
    fn test_capsule_between_points() {
        let obstacle = Obstacle::capsule(
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            0.25,
        );
        assert_relative_eq!(
            obstacle.signed_distance(&Point3::new(0.5, 0.0, 1.0)),
            0.75,
            epsilon = 1e-12
        );
        assert!(obstacle.signed_distance(&Point3::new(1.1, 0.0, 0.0)) < 0.0);
        assert!(obstacle.aabb().contains(&Point3::new(1.2, 0.0, 0.0)));
    }
}
