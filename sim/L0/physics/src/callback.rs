//! Hooks for mesh owners around the substep loop.

use sim_deformable::DeformableMesh;

/// Per-mesh hooks run by [`System::update`](crate::System::update).
///
/// ```text
/// update(dt)
/// ├── substep 1..n
/// │   ├── physics_pre_step(mesh, substep)
/// │   ├── forces + particle solve
/// │   └── physics_post_step(mesh, substep)
/// └── physics_post_update(mesh)
/// ```
///
/// Hooks of different meshes may run concurrently on worker threads; each
/// hook only ever sees its own mesh.
pub trait PhysicsCallback: Send {
    /// Before forces are applied in a substep. Typical use: push a new
    /// animated pose with `update_vertex_def_positions`.
    fn physics_pre_step(&mut self, _mesh: &mut DeformableMesh, _dt: f64) {}

    /// After the particle solve of a substep.
    fn physics_post_step(&mut self, _mesh: &mut DeformableMesh, _dt: f64) {}

    /// Once per frame, after all substeps.
    fn physics_post_update(&mut self, _mesh: &mut DeformableMesh) {}
}
