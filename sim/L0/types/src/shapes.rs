//! Shape primitives with closest-point and ray queries.
//!
//! All shapes are expressed in their own local frame, centered on the origin.
//! Callers place them in the world with a rigid [`Coords`](crate::Coords).
//!
//! | Shape       | Local definition                                  |
//! |-------------|---------------------------------------------------|
//! | [`Sphere`]    | radius                                          |
//! | [`Capsule`]   | segment `z ∈ [-half_length, half_length]` + radius |
//! | [`Cuboid`]    | half extents                                    |
//! | [`Ellipsoid`] | radii along x, y, z                             |

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::aabb::Aabb;

const EPS: f64 = 1e-12;

/// A ray with origin and (not necessarily unit) direction.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Ray {
    /// Ray origin.
    pub origin: Point3<f64>,
    /// Ray direction.
    pub dir: Vector3<f64>,
}

impl Ray {
    /// Create a ray.
    #[must_use]
    pub const fn new(origin: Point3<f64>, dir: Vector3<f64>) -> Self {
        Self { origin, dir }
    }

    /// Point at parameter `t`.
    #[must_use]
    pub fn point_at(&self, t: f64) -> Point3<f64> {
        self.origin + self.dir * t
    }
}

/// A ray hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Ray parameter of the hit.
    pub toi: f64,
    /// Hit point.
    pub point: Point3<f64>,
    /// Outward surface normal at the hit.
    pub normal: Vector3<f64>,
}

/// Result of a closest-surface-point query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfacePoint {
    /// Closest point on the surface.
    pub point: Point3<f64>,
    /// Outward unit normal at that point.
    pub normal: Vector3<f64>,
    /// Signed distance from the query point (negative inside).
    pub distance: f64,
}

impl SurfacePoint {
    /// Whether the query point was inside the shape.
    #[must_use]
    pub fn inside(&self) -> bool {
        self.distance < 0.0
    }
}

fn smallest_positive_root(a: f64, b: f64, c: f64) -> Option<f64> {
    if a.abs() < EPS {
        return None;
    }
    let disc = b.mul_add(b, -4.0 * a * c);
    if disc < 0.0 {
        return None;
    }
    let sq = disc.sqrt();
    let t0 = (-b - sq) / (2.0 * a);
    let t1 = (-b + sq) / (2.0 * a);
    if t0 >= 0.0 {
        Some(t0)
    } else if t1 >= 0.0 {
        Some(t1)
    } else {
        None
    }
}

/// Sphere centered at the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sphere {
    /// Sphere radius.
    pub radius: f64,
}

impl Sphere {
    /// Create a sphere.
    #[must_use]
    pub const fn new(radius: f64) -> Self {
        Self { radius }
    }

    /// Closest surface point to `p`.
    #[must_use]
    pub fn closest_surface_point(&self, p: &Point3<f64>) -> SurfacePoint {
        let d = p.coords.norm();
        let normal = if d > EPS { p.coords / d } else { Vector3::z() };
        SurfacePoint {
            point: Point3::from(normal * self.radius),
            normal,
            distance: d - self.radius,
        }
    }

    /// First hit of `ray` within `max_toi`.
    #[must_use]
    pub fn ray_cast(&self, ray: &Ray, max_toi: f64) -> Option<RayHit> {
        let o = ray.origin.coords;
        let a = ray.dir.norm_squared();
        let b = 2.0 * o.dot(&ray.dir);
        let c = self.radius.mul_add(-self.radius, o.norm_squared());
        let t = smallest_positive_root(a, b, c).filter(|&t| t <= max_toi)?;
        let point = ray.point_at(t);
        Some(RayHit {
            toi: t,
            point,
            normal: point.coords.try_normalize(EPS).unwrap_or_else(Vector3::z),
        })
    }

    /// Local bounding box.
    #[must_use]
    pub fn local_aabb(&self) -> Aabb {
        Aabb::from_center(Point3::origin(), Vector3::repeat(self.radius))
    }
}

/// Capsule along the local z axis.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Capsule {
    /// Half length of the inner segment.
    pub half_length: f64,
    /// Radius around the segment.
    pub radius: f64,
}

impl Capsule {
    /// Create a capsule.
    #[must_use]
    pub const fn new(half_length: f64, radius: f64) -> Self {
        Self {
            half_length,
            radius,
        }
    }

    fn segment_point(&self, p: &Point3<f64>) -> Point3<f64> {
        Point3::new(0.0, 0.0, p.z.clamp(-self.half_length, self.half_length))
    }

    /// Closest surface point to `p`.
    #[must_use]
    pub fn closest_surface_point(&self, p: &Point3<f64>) -> SurfacePoint {
        let q = self.segment_point(p);
        let offset = p - q;
        let d = offset.norm();
        let normal = if d > EPS {
            offset / d
        } else {
            Vector3::x()
        };
        SurfacePoint {
            point: q + normal * self.radius,
            normal,
            distance: d - self.radius,
        }
    }

    /// First hit of `ray` within `max_toi`.
    #[must_use]
    pub fn ray_cast(&self, ray: &Ray, max_toi: f64) -> Option<RayHit> {
        let mut best: Option<RayHit> = None;
        let mut consider = |hit: Option<RayHit>| {
            if let Some(h) = hit {
                if h.toi <= max_toi && best.is_none_or(|b| h.toi < b.toi) {
                    best = Some(h);
                }
            }
        };

        // Infinite cylinder, then reject hits beyond the segment.
        let o = ray.origin.coords;
        let d = ray.dir;
        let a = d.x.mul_add(d.x, d.y * d.y);
        let b = 2.0 * o.x.mul_add(d.x, o.y * d.y);
        let c = o.x.mul_add(o.x, o.y * o.y) - self.radius * self.radius;
        if let Some(t) = smallest_positive_root(a, b, c) {
            let point = ray.point_at(t);
            if point.z.abs() <= self.half_length {
                let n = Vector3::new(point.x, point.y, 0.0);
                consider(Some(RayHit {
                    toi: t,
                    point,
                    normal: n.try_normalize(EPS).unwrap_or_else(Vector3::x),
                }));
            }
        }

        for cap in [-self.half_length, self.half_length] {
            let shifted = Ray::new(ray.origin - Vector3::new(0.0, 0.0, cap), ray.dir);
            let hit = Sphere::new(self.radius)
                .ray_cast(&shifted, max_toi)
                .map(|h| RayHit {
                    point: h.point + Vector3::new(0.0, 0.0, cap),
                    ..h
                });
            consider(hit);
        }

        best
    }

    /// Local bounding box.
    #[must_use]
    pub fn local_aabb(&self) -> Aabb {
        Aabb::from_center(
            Point3::origin(),
            Vector3::new(self.radius, self.radius, self.radius + self.half_length),
        )
    }
}

/// Box centered at the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cuboid {
    /// Half extents along each axis.
    pub half_extents: Vector3<f64>,
}

impl Cuboid {
    /// Create a box.
    #[must_use]
    pub const fn new(half_extents: Vector3<f64>) -> Self {
        Self { half_extents }
    }

    /// Closest surface point to `p`.
    #[must_use]
    pub fn closest_surface_point(&self, p: &Point3<f64>) -> SurfacePoint {
        let he = self.half_extents;
        let clamped = Point3::new(
            p.x.clamp(-he.x, he.x),
            p.y.clamp(-he.y, he.y),
            p.z.clamp(-he.z, he.z),
        );
        let offset = p - clamped;
        let d = offset.norm();
        if d > EPS {
            return SurfacePoint {
                point: clamped,
                normal: offset / d,
                distance: d,
            };
        }

        // Inside: push out through the nearest face.
        let mut axis = 0;
        let mut depth = f64::INFINITY;
        for i in 0..3 {
            let face_depth = he[i] - p[i].abs();
            if face_depth < depth {
                depth = face_depth;
                axis = i;
            }
        }
        let sign = if p[axis] >= 0.0 { 1.0 } else { -1.0 };
        let mut point = *p;
        point[axis] = sign * he[axis];
        let mut normal = Vector3::zeros();
        normal[axis] = sign;
        SurfacePoint {
            point,
            normal,
            distance: -depth,
        }
    }

    /// First hit of `ray` within `max_toi` (slab test).
    #[must_use]
    pub fn ray_cast(&self, ray: &Ray, max_toi: f64) -> Option<RayHit> {
        let he = self.half_extents;
        let mut t_enter = 0.0_f64;
        let mut t_exit = max_toi;
        let mut enter_axis: Option<(usize, f64)> = None;

        for i in 0..3 {
            let o = ray.origin[i];
            let d = ray.dir[i];
            if d.abs() < EPS {
                if o < -he[i] || o > he[i] {
                    return None;
                }
                continue;
            }
            let mut t0 = (-he[i] - o) / d;
            let mut t1 = (he[i] - o) / d;
            let mut sign = -1.0;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
                sign = 1.0;
            }
            if t0 > t_enter {
                t_enter = t0;
                enter_axis = Some((i, sign));
            }
            t_exit = t_exit.min(t1);
            if t_enter > t_exit {
                return None;
            }
        }

        let point = ray.point_at(t_enter);
        let normal = match enter_axis {
            Some((axis, sign)) => {
                let mut n = Vector3::zeros();
                n[axis] = sign;
                n
            }
            None => self.closest_surface_point(&point).normal,
        };
        Some(RayHit {
            toi: t_enter,
            point,
            normal,
        })
    }

    /// Local bounding box.
    #[must_use]
    pub fn local_aabb(&self) -> Aabb {
        Aabb::from_center(Point3::origin(), self.half_extents)
    }
}

/// Axis-aligned ellipsoid centered at the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Ellipsoid {
    /// Radii along x, y, z.
    pub radii: Vector3<f64>,
}

impl Ellipsoid {
    /// Create an ellipsoid.
    #[must_use]
    pub const fn new(radii: Vector3<f64>) -> Self {
        Self { radii }
    }

    /// Closest surface point to `p`.
    ///
    /// Starts from the radial projection in unit-sphere space and refines it
    /// with a few fixed-point iterations along the surface normal. Exact for
    /// spheres, within a small fraction of the smallest radius otherwise.
    #[must_use]
    pub fn closest_surface_point(&self, p: &Point3<f64>) -> SurfacePoint {
        let r = self.radii;
        let q = p.coords.component_div(&r);
        let qn = q.norm();
        let dir = if qn > EPS { q / qn } else { Vector3::z() };
        let mut s = dir.component_mul(&r);

        for _ in 0..4 {
            let n = s
                .component_div(&r.component_mul(&r))
                .try_normalize(EPS)
                .unwrap_or(dir);
            // Move along the tangent plane toward p, then re-project radially.
            let tangent = (p.coords - s) - n * (p.coords - s).dot(&n);
            let candidate = s + tangent;
            let cq = candidate.component_div(&r);
            let cn = cq.norm();
            if cn <= EPS {
                break;
            }
            s = (cq / cn).component_mul(&r);
        }

        let normal = s
            .component_div(&r.component_mul(&r))
            .try_normalize(EPS)
            .unwrap_or(dir);
        let dist = (p.coords - s).norm();
        SurfacePoint {
            point: Point3::from(s),
            normal,
            distance: if qn < 1.0 { -dist } else { dist },
        }
    }

    /// First hit of `ray` within `max_toi` (solved in unit-sphere space).
    #[must_use]
    pub fn ray_cast(&self, ray: &Ray, max_toi: f64) -> Option<RayHit> {
        let r = self.radii;
        let o = ray.origin.coords.component_div(&r);
        let d = ray.dir.component_div(&r);
        let a = d.norm_squared();
        let b = 2.0 * o.dot(&d);
        let c = o.norm_squared() - 1.0;
        let t = smallest_positive_root(a, b, c).filter(|&t| t <= max_toi)?;
        let point = ray.point_at(t);
        let normal = point
            .coords
            .component_div(&r.component_mul(&r))
            .try_normalize(EPS)
            .unwrap_or_else(Vector3::z);
        Some(RayHit {
            toi: t,
            point,
            normal,
        })
    }

    /// Local bounding box.
    #[must_use]
    pub fn local_aabb(&self) -> Aabb {
        Aabb::from_center(Point3::origin(), self.radii)
    }
}

/// Any supported shape primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Shape {
    /// Sphere.
    Sphere(Sphere),
    /// Capsule.
    Capsule(Capsule),
    /// Box.
    Cuboid(Cuboid),
    /// Ellipsoid.
    Ellipsoid(Ellipsoid),
}

impl Shape {
    /// Closest surface point to a local point.
    #[must_use]
    pub fn closest_surface_point(&self, p: &Point3<f64>) -> SurfacePoint {
        match self {
            Self::Sphere(s) => s.closest_surface_point(p),
            Self::Capsule(s) => s.closest_surface_point(p),
            Self::Cuboid(s) => s.closest_surface_point(p),
            Self::Ellipsoid(s) => s.closest_surface_point(p),
        }
    }

    /// Signed distance of a local point to the surface.
    #[must_use]
    pub fn signed_distance(&self, p: &Point3<f64>) -> f64 {
        self.closest_surface_point(p).distance
    }

    /// First hit of a local ray.
    #[must_use]
    pub fn ray_cast(&self, ray: &Ray, max_toi: f64) -> Option<RayHit> {
        match self {
            Self::Sphere(s) => s.ray_cast(ray, max_toi),
            Self::Capsule(s) => s.ray_cast(ray, max_toi),
            Self::Cuboid(s) => s.ray_cast(ray, max_toi),
            Self::Ellipsoid(s) => s.ray_cast(ray, max_toi),
        }
    }

    /// Local bounding box.
    #[must_use]
    pub fn local_aabb(&self) -> Aabb {
        match self {
            Self::Sphere(s) => s.local_aabb(),
            Self::Capsule(s) => s.local_aabb(),
            Self::Cuboid(s) => s.local_aabb(),
            Self::Ellipsoid(s) => s.local_aabb(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sphere_closest_point() {
        let s = Sphere::new(2.0);
        let sp = s.closest_surface_point(&Point3::new(4.0, 0.0, 0.0));
        assert_relative_eq!(sp.point, Point3::new(2.0, 0.0, 0.0));
        assert_relative_eq!(sp.distance, 2.0);
        assert!(!sp.inside());

        let inside = s.closest_surface_point(&Point3::new(0.0, 1.0, 0.0));
        assert!(inside.inside());
        assert_relative_eq!(inside.normal, Vector3::y());
    }

    #[test]
    fn test_capsule_closest_point() {
        let c = Capsule::new(1.0, 0.5);
        let side = c.closest_surface_point(&Point3::new(2.0, 0.0, 0.3));
        assert_relative_eq!(side.point, Point3::new(0.5, 0.0, 0.3));
        let cap = c.closest_surface_point(&Point3::new(0.0, 0.0, 3.0));
        assert_relative_eq!(cap.point, Point3::new(0.0, 0.0, 1.5));
        assert_relative_eq!(cap.distance, 1.5);
    }

    #[test]
    fn test_cuboid_inside_pushes_through_nearest_face() {
        let b = Cuboid::new(Vector3::new(1.0, 2.0, 3.0));
        let sp = b.closest_surface_point(&Point3::new(0.8, 0.0, 0.0));
        assert!(sp.inside());
        assert_relative_eq!(sp.point, Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(sp.normal, Vector3::x());
        assert_relative_eq!(sp.distance, -0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_ellipsoid_matches_sphere_when_round() {
        let e = Ellipsoid::new(Vector3::repeat(1.5));
        let s = Sphere::new(1.5);
        let p = Point3::new(0.3, -2.0, 1.0);
        let a = e.closest_surface_point(&p);
        let b = s.closest_surface_point(&p);
        assert_relative_eq!(a.point, b.point, epsilon = 1e-9);
        assert_relative_eq!(a.distance, b.distance, epsilon = 1e-9);
    }

    #[test]
    fn test_ellipsoid_closest_point_on_axis() {
        let e = Ellipsoid::new(Vector3::new(3.0, 1.0, 2.0));
        let sp = e.closest_surface_point(&Point3::new(5.0, 0.0, 0.0));
        assert_relative_eq!(sp.point, Point3::new(3.0, 0.0, 0.0), epsilon = 1e-9);
        assert_relative_eq!(sp.normal, Vector3::x(), epsilon = 1e-9);
    }

    #[test]
    fn test_ray_casts() {
        let ray = Ray::new(Point3::new(-5.0, 0.0, 0.0), Vector3::x());
        let hit = Sphere::new(1.0).ray_cast(&ray, 100.0).unwrap();
        assert_relative_eq!(hit.toi, 4.0, epsilon = 1e-12);
        assert_relative_eq!(hit.normal, -Vector3::x(), epsilon = 1e-12);

        let hit = Cuboid::new(Vector3::repeat(1.0)).ray_cast(&ray, 100.0).unwrap();
        assert_relative_eq!(hit.toi, 4.0, epsilon = 1e-12);
        assert_relative_eq!(hit.normal, -Vector3::x());

        let hit = Capsule::new(2.0, 1.0).ray_cast(&ray, 100.0).unwrap();
        assert_relative_eq!(hit.toi, 4.0, epsilon = 1e-12);

        let hit = Ellipsoid::new(Vector3::new(2.0, 1.0, 1.0))
            .ray_cast(&ray, 100.0)
            .unwrap();
        assert_relative_eq!(hit.toi, 3.0, epsilon = 1e-12);

        assert!(Sphere::new(1.0).ray_cast(&ray, 2.0).is_none());
    }
}
