//! Deformable triangle meshes on top of a particle group.
//!
//! # Construction
//!
//! ```text
//! vertices ──► particles (world space)
//!          ──► topology   (triangles, incident-triangle pool, edges)
//!          ──► links      (one per edge)
//!          ──► bends      (one per interior edge)
//!          ──► hierarchy  (BFS from attachments)
//! ```
//!
//! # Frame
//!
//! ```text
//! update_vertex_def_positions   animated rest pose for this frame
//! per substep:
//!   process_attached_vertices   attached particles -> rest pose
//!   update(dt, wind)            gravity, wind relaxation, animation follow
//!   simulate(dt)                particle solve, enclosure, shock propagation
//! ```
//!
//! Vertex indices are `u32` positions in the input vertex buffer; each
//! vertex owns exactly one particle of the mesh's group.

use hashbrown::HashMap;
use nalgebra::{Matrix3, Point3, Vector3};
use sim_particles::{BendId, LinkId, ParticleGroup, PositionMode};
use sim_types::{Coords, SimError, VelocityField, any_orthogonal};
use smallvec::SmallVec;
use tracing::{info, warn};

use crate::control::{Anchor, ControlPoint, SkinWeights, select_anchor};
use crate::error::{DeformableError, Result};
use crate::forces::{AnimationTarget, relax_toward, relax_toward_wind};
use crate::hierarchy::build_hierarchy;
use crate::params::DeformableMeshParams;
use crate::topology::{build_topology, vertex_neighbours};
use crate::types::{
    EdgeSides, EdgeVertices, HierarchyLink, PhysicalVertex, TopologyIssue, Triangle, VertexFlags,
};

const NORMAL_EPSILON: f64 = 1e-12;

/// Assumed pose interval before the first simulated substep.
const DEFAULT_STEP: f64 = 1.0 / 60.0;

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Unit vector along `direction` projected off `axis`, or any vector
/// orthogonal to `axis` when the projection vanishes.
fn perpendicular(axis: &Vector3<f64>, direction: Option<Vector3<f64>>) -> Vector3<f64> {
    direction
        .map(|d| d - axis * d.dot(axis))
        .and_then(|d| d.try_normalize(NORMAL_EPSILON))
        .unwrap_or_else(|| any_orthogonal(axis))
}

/// A cloth mesh simulated by one particle group.
#[derive(Debug, Clone)]
pub struct DeformableMesh {
    group: ParticleGroup,
    vertices: Vec<PhysicalVertex>,
    triangles: Vec<Triangle>,
    triangle_pool: Vec<u32>,
    edges: Vec<EdgeVertices>,
    neighbours: Vec<SmallVec<[u32; 8]>>,
    hierarchy_links: Vec<HierarchyLink>,
    links: Vec<LinkId>,
    bends: Vec<BendId>,
    attachments: Vec<u32>,
    control_points: HashMap<u32, ControlPoint>,
    issues: Vec<TopologyIssue>,
    params: DeformableMeshParams,
    enabled: bool,
    animation_control_ratio: f64,
    def_elapsed: f64,
    def_interval: f64,
    last_dt: f64,
}

impl DeformableMesh {
    /// Build a mesh from a vertex buffer in `coords` space and a triangle
    /// index buffer.
    ///
    /// Malformed triangles and edges are dropped and reported through
    /// [`topology_issues`](Self::topology_issues).
    pub fn new(
        vertices: &[Point3<f64>],
        indices: &[u32],
        coords: &Coords,
        params: DeformableMeshParams,
    ) -> Result<Self> {
        params.validate()?;

        let world: Vec<Point3<f64>> = vertices.iter().map(|v| coords.world_point(v)).collect();
        let topology = build_topology(&world, indices)?;

        let mut group = ParticleGroup::new(params.group_config());
        let mut physical = Vec::with_capacity(world.len());
        for (i, position) in world.iter().enumerate() {
            let particle = group.add_particle(*position, params.particle_radius, false);
            group.particle_mut(particle)?.user_data = i as u64;
            let (triangle_start, triangle_count) = topology.triangle_runs[i];
            physical.push(PhysicalVertex {
                def_position: *position,
                prev_def_position: *position,
                hierarchy_depth: None,
                nearest_attachment: None,
                triangle_start,
                triangle_count,
                particle,
                flags: VertexFlags::FREE_FLOATING,
            });
        }

        let mut links = Vec::with_capacity(topology.edges.len());
        let mut bends = Vec::new();
        for edge in &topology.edges {
            let [a, b] = edge.axis.map(|v| physical[v as usize].particle);
            links.push(group.add_link(
                a,
                b,
                params.link_stiffness,
                params.link_stretch,
                params.link_allowed_contraction,
            )?);
            match edge.sides {
                EdgeSides::Double([s0, s1]) => {
                    bends.push(group.add_bend_constraint(
                        a,
                        b,
                        physical[s0 as usize].particle,
                        physical[s1 as usize].particle,
                        params.bend_stiffness,
                        params.bend_angle_threshold,
                    )?);
                }
                EdgeSides::Single(_) => {
                    for v in edge.axis {
                        physical[v as usize].flags.insert(VertexFlags::BOUNDARY);
                    }
                }
            }
        }

        let neighbours = vertex_neighbours(world.len(), &topology.edges);

        info!(
            vertices = physical.len(),
            triangles = topology.triangles.len(),
            edges = topology.edges.len(),
            bends = bends.len(),
            issues = topology.issues.len(),
            "created deformable mesh"
        );

        let mut mesh = Self {
            group,
            vertices: physical,
            triangles: topology.triangles,
            triangle_pool: topology.triangle_pool,
            edges: topology.edges,
            neighbours,
            hierarchy_links: Vec::new(),
            links,
            bends,
            attachments: Vec::new(),
            control_points: HashMap::new(),
            issues: topology.issues,
            params,
            enabled: true,
            animation_control_ratio: 1.0,
            def_elapsed: 0.0,
            def_interval: DEFAULT_STEP,
            last_dt: DEFAULT_STEP,
        };
        mesh.rebuild_hierarchy();
        Ok(mesh)
    }

    /// A flat `nx` by `ny` sheet in the local xy plane with `spacing`
    /// between neighbouring vertices.
    ///
    /// ```text
    /// c───d
    /// │ ╱ │   triangles (a, b, d) and (a, d, c)
    /// a───b
    /// ```
    pub fn grid(
        nx: u32,
        ny: u32,
        spacing: f64,
        coords: &Coords,
        params: DeformableMeshParams,
    ) -> Result<Self> {
        if nx < 2 || ny < 2 {
            return Err(DeformableError::invalid_topology(format!(
                "grid needs at least 2x2 vertices, got {nx}x{ny}"
            )));
        }
        if spacing.is_nan() || spacing <= 0.0 {
            return Err(DeformableError::invalid_config("grid spacing must be positive"));
        }

        let vertices: Vec<_> = (0..ny)
            .flat_map(|j| {
                (0..nx).map(move |i| Point3::new(f64::from(i) * spacing, f64::from(j) * spacing, 0.0))
            })
            .collect();
        let mut indices = Vec::with_capacity((nx as usize - 1) * (ny as usize - 1) * 6);
        for j in 0..ny - 1 {
            for i in 0..nx - 1 {
                let a = j * nx + i;
                let b = a + 1;
                let c = a + nx;
                let d = c + 1;
                indices.extend_from_slice(&[a, b, d, a, d, c]);
            }
        }
        Self::new(&vertices, &indices, coords, params)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Mesh vertices.
    #[must_use]
    pub fn vertices(&self) -> &[PhysicalVertex] {
        &self.vertices
    }

    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Triangles that survived the topology build.
    #[must_use]
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// Undirected edges with their side vertices.
    #[must_use]
    pub fn edges(&self) -> &[EdgeVertices] {
        &self.edges
    }

    /// Attachment hierarchy links in BFS order.
    #[must_use]
    pub fn hierarchy_links(&self) -> &[HierarchyLink] {
        &self.hierarchy_links
    }

    /// Elements dropped while building the topology.
    #[must_use]
    pub fn topology_issues(&self) -> &[TopologyIssue] {
        &self.issues
    }

    /// Current attachment vertices.
    #[must_use]
    pub fn attachments(&self) -> &[u32] {
        &self.attachments
    }

    /// Number of edge links.
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Number of bend constraints.
    #[must_use]
    pub fn bend_count(&self) -> usize {
        self.bends.len()
    }

    /// The backing particle group.
    #[must_use]
    pub fn particle_group(&self) -> &ParticleGroup {
        &self.group
    }

    /// Mutable access to the backing particle group (obstacles, collision
    /// toggles).
    pub fn particle_group_mut(&mut self) -> &mut ParticleGroup {
        &mut self.group
    }

    /// Physical parameters.
    #[must_use]
    pub fn params(&self) -> &DeformableMeshParams {
        &self.params
    }

    /// Whether the mesh is simulated.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Pause or resume simulation without dropping state.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.group.set_enabled(enabled);
    }

    /// Blend between free physics (0) and full animation coupling (1).
    #[must_use]
    pub fn animation_control_ratio(&self) -> f64 {
        self.animation_control_ratio
    }

    /// Set the animation blend, clamped to `[0, 1]`.
    pub fn set_animation_control_ratio(&mut self, ratio: f64) {
        self.animation_control_ratio = if ratio.is_nan() {
            0.0
        } else {
            ratio.clamp(0.0, 1.0)
        };
    }

    /// Live particle position of `vertex`, or its rest position if the
    /// particle is gone.
    fn position(&self, vertex: u32) -> Point3<f64> {
        let v = &self.vertices[vertex as usize];
        self.group.particle(v.particle).map_or(v.def_position, |p| p.position)
    }

    fn extrapolated_position(&self, vertex: u32, t: f64) -> Point3<f64> {
        let v = &self.vertices[vertex as usize];
        self.group
            .particle(v.particle)
            .map_or(v.def_position, |p| p.extrapolated(t))
    }

    /// Live particle positions of every vertex.
    #[must_use]
    pub fn positions(&self) -> Vec<Point3<f64>> {
        (0..to_u32(self.vertices.len())).map(|v| self.position(v)).collect()
    }

    // ------------------------------------------------------------------
    // Animated rest pose
    // ------------------------------------------------------------------

    /// Set the animated rest pose from world-space positions.
    pub fn update_vertex_def_positions(&mut self, positions: &[Point3<f64>]) -> Result<()> {
        if positions.len() != self.vertices.len() {
            return Err(DeformableError::SizeMismatch {
                expected: self.vertices.len(),
                actual: positions.len(),
            });
        }
        self.def_interval = if self.def_elapsed > 0.0 {
            self.def_elapsed
        } else {
            self.last_dt
        };
        self.def_elapsed = 0.0;
        for (vertex, position) in self.vertices.iter_mut().zip(positions) {
            vertex.prev_def_position = vertex.def_position;
            vertex.def_position = *position;
        }
        Ok(())
    }

    /// Set the animated rest pose from positions local to `coords`.
    pub fn update_vertex_def_positions_with_coords(
        &mut self,
        positions: &[Point3<f64>],
        coords: &Coords,
    ) -> Result<()> {
        let world: Vec<_> = positions.iter().map(|p| coords.world_point(p)).collect();
        self.update_vertex_def_positions(&world)
    }

    // ------------------------------------------------------------------
    // Attachments
    // ------------------------------------------------------------------

    /// Pin `indices` to the animated pose and rebuild the hierarchy.
    pub fn set_attachment_indices(&mut self, indices: &[u32]) -> Result<()> {
        for &i in indices {
            DeformableError::check_index(i as usize, self.vertices.len())?;
        }

        for &old in &self.attachments {
            let vertex = &mut self.vertices[old as usize];
            vertex.flags.remove(VertexFlags::ATTACHED);
            self.group.set_fixed(vertex.particle, false)?;
        }

        let mut attachments = Vec::with_capacity(indices.len());
        for &i in indices {
            if attachments.contains(&i) {
                continue;
            }
            let vertex = &mut self.vertices[i as usize];
            vertex.flags.insert(VertexFlags::ATTACHED);
            self.group.set_fixed(vertex.particle, true)?;
            attachments.push(i);
        }
        self.attachments = attachments;
        self.rebuild_hierarchy();
        Ok(())
    }

    /// Rebuild the hierarchy from the attachments and every particle fixed
    /// through the group.
    ///
    /// Call after pinning particles with
    /// [`ParticleGroup::set_fixed`](sim_particles::ParticleGroup::set_fixed).
    pub fn rebuild_hierarchy(&mut self) {
        let positions = self.positions();
        let rest: Vec<_> = self.vertices.iter().map(|v| v.def_position).collect();
        let mut roots = self.attachments.clone();
        for (i, vertex) in self.vertices.iter().enumerate() {
            let i = to_u32(i);
            let fixed = self.group.particle(vertex.particle).is_ok_and(|p| p.fixed);
            if fixed && !roots.contains(&i) {
                roots.push(i);
            }
        }
        let hierarchy = build_hierarchy(&positions, &rest, &self.neighbours, &roots);
        for (i, vertex) in self.vertices.iter_mut().enumerate() {
            vertex.hierarchy_depth = hierarchy.depths[i];
            vertex.nearest_attachment = hierarchy.nearest[i];
            vertex
                .flags
                .set(VertexFlags::FREE_FLOATING, vertex.hierarchy_depth.is_none());
        }
        self.hierarchy_links = hierarchy.links;
    }

    /// Drive attached particles to their rest positions on the next
    /// particle update.
    pub fn process_attached_vertices(&mut self) -> Result<()> {
        for &a in &self.attachments {
            let vertex = &self.vertices[a as usize];
            self.group
                .set_position(vertex.particle, vertex.def_position, PositionMode::SetDest)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Forces
    // ------------------------------------------------------------------

    /// Assign gravity and apply wind and animation coupling.
    pub fn update(&mut self, dt: f64, wind: &dyn VelocityField) -> Result<()> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(SimError::InvalidTimestep(dt).into());
        }
        if !self.enabled {
            return Ok(());
        }

        let gravity = Vector3::new(0.0, 0.0, self.params.gravity);
        for vertex in &self.vertices {
            let p = self.group.particle_mut(vertex.particle)?;
            p.acceleration = if p.fixed { Vector3::zeros() } else { gravity };
        }

        self.apply_global_wind(dt, wind)?;
        if self.params.animation_enabled() && self.animation_control_ratio > 0.0 {
            self.apply_animation_forces(dt)?;
        }
        Ok(())
    }

    /// Relax every free particle's velocity toward the sampled wind, per
    /// axis of its normal/tangent frame.
    pub fn apply_global_wind(&mut self, dt: f64, wind: &dyn VelocityField) -> Result<()> {
        let positions = self.positions();
        let pos = |v: u32| positions[v as usize];
        let normals: Vec<_> = (0..to_u32(self.vertices.len()))
            .map(|v| self.angle_weighted_normal(v, &pos))
            .collect();

        let params = &self.params;
        for (i, vertex) in self.vertices.iter().enumerate() {
            let p = self.group.particle_mut(vertex.particle)?;
            if p.fixed {
                continue;
            }
            let air = wind.velocity(&positions[i]) * params.wind_scale;
            p.velocity = relax_toward_wind(
                &p.velocity,
                &air,
                normals[i].as_ref(),
                params.wind_normal_friction,
                params.wind_tangent_friction,
                dt,
            );
        }
        Ok(())
    }

    /// Relax free particle velocities toward the animated pose.
    pub fn apply_animation_forces(&mut self, dt: f64) -> Result<()> {
        let params = &self.params;
        for vertex in &self.vertices {
            let p = self.group.particle_mut(vertex.particle)?;
            if p.fixed {
                continue;
            }
            let target = AnimationTarget {
                def_position: vertex.def_position,
                prev_def_position: vertex.prev_def_position,
                def_interval: self.def_interval,
                position: p.position,
            }
            .velocity(
                params.animation_velocity_factor,
                params.animation_position_factor,
                params.animation_max_velocity,
            );
            p.velocity = relax_toward(
                &p.velocity,
                &target,
                params.animation_relaxation,
                dt,
                self.animation_control_ratio,
            );
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Solve
    // ------------------------------------------------------------------

    /// Step the particle group, then enclose and propagate shock.
    pub fn simulate(&mut self, dt: f64) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.group.update(dt)?;
        if dt > 0.0 {
            self.last_dt = dt;
            self.def_elapsed += dt;
        }
        self.enclose_vertices();
        self.propagate_shock();
        Ok(())
    }

    /// Clamp each anchored vertex to a depth-scaled sphere around its rest
    /// position and recover corrupt particles.
    ///
    /// Returns the number of particles reset from non-finite state.
    pub fn enclose_vertices(&mut self) -> usize {
        let params = self.params;
        let mut recovered = 0;
        for vertex in &mut self.vertices {
            vertex.flags.remove(VertexFlags::RECOVERED);
            let Ok(p) = self.group.particle_mut(vertex.particle) else {
                continue;
            };

            if p.is_corrupt() {
                if self
                    .group
                    .set_position(vertex.particle, vertex.def_position, PositionMode::Reset)
                    .is_ok()
                {
                    recovered += 1;
                    vertex.flags.insert(VertexFlags::RECOVERED);
                }
                continue;
            }

            let Some(depth) = vertex.hierarchy_depth else {
                continue;
            };
            if p.fixed {
                continue;
            }
            let radius =
                params.enclosure_radius + f64::from(depth) * params.enclosure_radius_per_depth;
            let offset = p.position - vertex.def_position;
            let distance = offset.norm();
            if distance > radius && distance > 0.0 {
                let dir = offset / distance;
                p.position = vertex.def_position + dir * radius;
                let outward = p.velocity.dot(&dir);
                if outward > 0.0 {
                    p.velocity -= dir * outward;
                }
            }
        }
        if recovered > 0 {
            warn!(recovered, "reset non-finite particles to rest pose");
        }
        recovered
    }

    /// Limit each hierarchy link to `rest_length * shock_ratio`, moving the
    /// child toward its parent. Parents are visited before children, so a
    /// second pass changes nothing.
    pub fn propagate_shock(&mut self) {
        let ratio = self.params.shock_ratio;
        for link in &self.hierarchy_links {
            let parent = self.vertices[link.parent as usize].particle;
            let child = self.vertices[link.child as usize].particle;
            let Ok(anchor) = self.group.particle(parent).map(|p| p.position) else {
                continue;
            };
            let Ok(p) = self.group.particle_mut(child) else {
                continue;
            };
            if p.fixed {
                continue;
            }
            let max = link.rest_length * ratio;
            let delta = p.position - anchor;
            let distance = delta.norm();
            if distance > max && distance > 0.0 {
                p.position = anchor + delta * (max / distance);
            }
        }
    }

    // ------------------------------------------------------------------
    // Bases
    // ------------------------------------------------------------------

    fn angle_weighted_normal<F>(&self, vertex: u32, pos: &F) -> Option<Vector3<f64>>
    where
        F: Fn(u32) -> Point3<f64>,
    {
        let mut sum = Vector3::zeros();
        for &t in &self.triangle_pool[self.vertices[vertex as usize].triangle_range()] {
            let tri = &self.triangles[t as usize];
            let Some(k) = tri.indices.iter().position(|&i| i == vertex) else {
                continue;
            };
            let [a, b, c] = tri.indices.map(pos);
            let Some(face) = (b - a).cross(&(c - a)).try_normalize(NORMAL_EPSILON) else {
                continue;
            };
            let here = pos(tri.indices[k]);
            let e1 = pos(tri.indices[(k + 1) % 3]) - here;
            let e2 = pos(tri.indices[(k + 2) % 3]) - here;
            sum += face * e1.angle(&e2);
        }
        sum.try_normalize(NORMAL_EPSILON)
    }

    /// Angle-weighted normal at `vertex` on the live positions.
    #[must_use]
    pub fn vertex_normal(&self, vertex: u32) -> Option<Vector3<f64>> {
        if vertex as usize >= self.vertices.len() {
            return None;
        }
        self.angle_weighted_normal(vertex, &|v| self.position(v))
    }

    fn vertex_basis<F>(&self, vertex: u32, pos: &F) -> Coords
    where
        F: Fn(u32) -> Point3<f64>,
    {
        let origin = pos(vertex);
        let z = self
            .angle_weighted_normal(vertex, pos)
            .unwrap_or_else(Vector3::z);
        let reference = self.triangle_pool[self.vertices[vertex as usize].triangle_range()]
            .first()
            .and_then(|&t| {
                let tri = &self.triangles[t as usize];
                let k = tri.indices.iter().position(|&i| i == vertex)?;
                Some(pos(tri.indices[(k + 1) % 3]) - origin)
            });
        let x = perpendicular(&z, reference);
        Coords::from_axes(origin, x, z.cross(&x), z)
    }

    fn edge_basis<F>(&self, a: u32, b: u32, t: f64, pos: &F) -> Coords
    where
        F: Fn(u32) -> Point3<f64>,
    {
        let pa = pos(a);
        let pb = pos(b);
        let x = (pb - pa)
            .try_normalize(NORMAL_EPSILON)
            .unwrap_or_else(Vector3::x);
        let normal = self.angle_weighted_normal(a, pos).unwrap_or_else(Vector3::zeros)
            + self.angle_weighted_normal(b, pos).unwrap_or_else(Vector3::zeros);
        let z = perpendicular(&x, Some(normal));
        Coords::from_axes(pa + (pb - pa) * t, x, z.cross(&x), z)
    }

    fn skinned_basis<F>(&self, weights: &[(u32, f64)], pos: &F) -> Coords
    where
        F: Fn(u32) -> Point3<f64>,
    {
        let mut origin = Vector3::zeros();
        let mut axes = Matrix3::zeros();
        for &(v, w) in weights {
            let basis = self.vertex_basis(v, pos);
            origin += basis.origin.coords * w;
            axes += basis.axes * w;
        }
        Coords {
            origin: Point3::from(origin),
            axes,
        }
        .orthonormalized()
    }

    /// Orthonormal frame at `vertex`: z along the normal, x toward the next
    /// vertex of its first triangle, positions extrapolated `extrapolation`
    /// seconds along the particle velocities.
    pub fn construct_vertex_basis(&self, vertex: u32, extrapolation: f64) -> Result<Coords> {
        DeformableError::check_index(vertex as usize, self.vertices.len())?;
        Ok(self.vertex_basis(vertex, &|v| self.extrapolated_position(v, extrapolation)))
    }

    /// Orthonormal frame at `lerp(a, b, t)`: x along the edge, z along the
    /// mean normal of the endpoints.
    pub fn construct_edge_basis(&self, a: u32, b: u32, t: f64, extrapolation: f64) -> Result<Coords> {
        DeformableError::check_index(a as usize, self.vertices.len())?;
        DeformableError::check_index(b as usize, self.vertices.len())?;
        Ok(self.edge_basis(a, b, t, &|v| self.extrapolated_position(v, extrapolation)))
    }

    // ------------------------------------------------------------------
    // Control points
    // ------------------------------------------------------------------

    /// Attach `frame` rigidly to the nearest edge, or to the nearest vertex
    /// when the edge point is close to an endpoint.
    pub fn set_rigid_control_point(&mut self, id: u32, frame: &Coords) -> Result<()> {
        let positions = self.positions();
        let pos = |v: u32| positions[v as usize];
        let anchor = select_anchor(&positions, &self.edges, &frame.origin)
            .ok_or_else(|| DeformableError::invalid_topology("mesh has no vertices"))?;
        let control = match anchor {
            Anchor::Vertex(vertex) => ControlPoint::Vertex {
                vertex,
                local: frame.relative_to(&self.vertex_basis(vertex, &pos)),
            },
            Anchor::Edge([a, b], t) => ControlPoint::Edge {
                vertices: [a, b],
                t,
                local: frame.relative_to(&self.edge_basis(a, b, t, &pos)),
            },
        };
        self.control_points.insert(id, control);
        Ok(())
    }

    /// Attach `frame` to a weighted blend of vertex frames.
    ///
    /// Weights are normalized; non-positive weights are ignored.
    pub fn set_skinned_control_point(
        &mut self,
        id: u32,
        frame: &Coords,
        weights: &[(u32, f64)],
    ) -> Result<()> {
        let mut kept: SkinWeights = SmallVec::new();
        for &(v, w) in weights {
            DeformableError::check_index(v as usize, self.vertices.len())?;
            if w.is_finite() && w > 0.0 {
                kept.push((v, w));
            }
        }
        let total: f64 = kept.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return Err(DeformableError::invalid_config(
                "skinned control point needs a positive weight",
            ));
        }
        for (_, w) in &mut kept {
            *w /= total;
        }

        let positions = self.positions();
        let basis = self.skinned_basis(&kept, &|v| positions[v as usize]);
        self.control_points.insert(
            id,
            ControlPoint::ReverseSkinning {
                weights: kept,
                local: frame.relative_to(&basis),
            },
        );
        Ok(())
    }

    /// Current world frame of a control point.
    pub fn get_control_point(&self, id: u32, extrapolation: f64) -> Result<Coords> {
        let control = self
            .control_points
            .get(&id)
            .ok_or(DeformableError::UnknownControlPoint(id))?;
        let pos = |v: u32| self.extrapolated_position(v, extrapolation);
        let basis = match control {
            ControlPoint::Vertex { vertex, .. } => self.vertex_basis(*vertex, &pos),
            ControlPoint::Edge { vertices, t, .. } => {
                self.edge_basis(vertices[0], vertices[1], *t, &pos)
            }
            ControlPoint::ReverseSkinning { weights, .. } => self.skinned_basis(weights, &pos),
        };
        Ok(basis.compose(control.local_frame()))
    }

    /// Stored control point.
    #[must_use]
    pub fn control_point(&self, id: u32) -> Option<&ControlPoint> {
        self.control_points.get(&id)
    }

    /// Forget a control point. Returns whether it existed.
    pub fn remove_control_point(&mut self, id: u32) -> bool {
        self.control_points.remove(&id).is_some()
    }
}
