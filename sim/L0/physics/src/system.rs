//! The orchestrator: object tables, locks and the frame loop.
//!
//! Every table sits behind its own lock so the system can be shared by
//! reference across threads:
//!
//! | Table                  | Lock      |
//! |------------------------|-----------|
//! | deformable meshes      | `Mutex`   |
//! | standalone particles   | `Mutex`   |
//! | wind sources           | `RwLock`  |
//! | fluid grids            | `Mutex`   |
//! | recreate queue         | `Mutex`   |
//!
//! [`System::update`] holds the mesh lock for the whole frame. Within a
//! substep, meshes are split into batches of
//! [`mesh_batch_size`](SimulationConfig::mesh_batch_size) and the batches run
//! on the rayon pool; every batch owns its meshes exclusively, and the phase
//! joins before the next one starts.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use nalgebra::Point3;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use sim_deformable::{DeformableMesh, DeformableMeshParams};
use sim_fluid::{FluidConfig, FluidSystem};
use sim_particles::ParticleSystem;
use sim_types::{Arena, Coords, Handle, SimError, SimulationConfig, VelocityField};
use sim_wind::WindSystem;
use tracing::{debug, info, trace, warn};

use crate::callback::PhysicsCallback;
use crate::error::Result;

/// Handle to a mesh owned by a [`System`].
pub type DeformableMeshId = Handle<MeshEntry>;

/// Handle to a fluid grid owned by a [`System`].
pub type FluidId = Handle<FluidSystem>;

type RecreateFn = Box<dyn FnOnce(&System) -> Result<()> + Send>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A mesh and the optional hooks of its owner.
pub struct MeshEntry {
    mesh: DeformableMesh,
    callback: Option<Box<dyn PhysicsCallback>>,
}

impl fmt::Debug for MeshEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeshEntry")
            .field("vertices", &self.mesh.vertex_count())
            .field("callback", &self.callback.is_some())
            .finish_non_exhaustive()
    }
}

impl MeshEntry {
    /// The mesh.
    #[must_use]
    pub fn mesh(&self) -> &DeformableMesh {
        &self.mesh
    }

    /// The mesh, mutably.
    pub fn mesh_mut(&mut self) -> &mut DeformableMesh {
        &mut self.mesh
    }

    /// Whether the owner registered hooks.
    #[must_use]
    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    fn step(&mut self, dt: f64, wind: &dyn VelocityField) -> Result<()> {
        if let Some(callback) = self.callback.as_mut() {
            callback.physics_pre_step(&mut self.mesh, dt);
        }
        self.mesh.process_attached_vertices()?;
        self.mesh.update(dt, wind)?;
        self.mesh.simulate(dt)?;
        if let Some(callback) = self.callback.as_mut() {
            callback.physics_post_step(&mut self.mesh, dt);
        }
        Ok(())
    }

    fn post_update(&mut self) {
        if let Some(callback) = self.callback.as_mut() {
            callback.physics_post_update(&mut self.mesh);
        }
    }
}

/// What the last [`System::update`] did.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameStats {
    /// Substeps run.
    pub substeps: u32,
    /// Length of each substep (seconds).
    pub substep: f64,
    /// Time discarded because the substep cap was hit (seconds).
    pub dropped_time: f64,
    /// Recreate callbacks drained.
    pub recreated: usize,
    /// Live meshes stepped.
    pub meshes: usize,
    /// Live standalone particle groups stepped.
    pub particle_groups: usize,
    /// Live wind sources.
    pub wind_sources: usize,
    /// Live fluid grids stepped.
    pub fluids: usize,
    /// Mesh steps, particle updates and fluid updates that failed and were
    /// skipped.
    pub failed_steps: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct Clock {
    remainder: f64,
    simulation_time: f64,
    extrapolation_time: f64,
    last_frame: FrameStats,
}

/// Run `f` over `items` in batches of `batch`, one rayon task per batch.
fn for_each_batch<T, F>(items: &mut [T], batch: usize, f: F)
where
    T: Send,
    F: Fn(&mut T) + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        items
            .par_chunks_mut(batch.max(1))
            .for_each(|chunk| chunk.iter_mut().for_each(&f));
    }

    #[cfg(not(feature = "parallel"))]
    {
        items
            .chunks_mut(batch.max(1))
            .for_each(|chunk| chunk.iter_mut().for_each(&f));
    }
}

/// Owns every simulated object and advances them frame by frame.
///
/// All methods take `&self`; the system is meant to be shared between the
/// thread that drives frames and the threads that add or remove objects.
/// Closures passed to [`with_mesh`](Self::with_mesh) and
/// [`with_fluid`](Self::with_fluid) run under the table lock and must not
/// call back into the system.
///
/// # Example
///
/// ```
/// use sim_physics::prelude::*;
///
/// let system = System::new(SimulationConfig::realtime()).unwrap();
/// let sheet = DeformableMesh::grid(3, 3, 0.1, &Coords::identity(), DeformableMeshParams::cotton())
///     .unwrap();
/// let id = system.insert_deformable_mesh(sheet, None);
/// system.with_mesh(id, |mesh| mesh.set_attachment_indices(&[0, 2])).unwrap().unwrap();
///
/// let stats = system.update(1.0 / 30.0).unwrap();
/// assert_eq!(stats.substeps, 2);
/// assert!(system.extrapolation_time() < 1e-9);
/// ```
pub struct System {
    config: SimulationConfig,
    meshes: Mutex<Arena<MeshEntry>>,
    particles: Mutex<ParticleSystem>,
    wind: RwLock<WindSystem>,
    fluids: Mutex<Arena<FluidSystem>>,
    recreate: Mutex<Vec<RecreateFn>>,
    clock: Mutex<Clock>,
}

impl fmt::Debug for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("System")
            .field("config", &self.config)
            .field("meshes", &self.mesh_count())
            .field("fluids", &self.fluid_count())
            .finish_non_exhaustive()
    }
}

impl System {
    /// Create an empty system.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            meshes: Mutex::new(Arena::new("deformable mesh")),
            particles: Mutex::new(ParticleSystem::new()),
            wind: RwLock::new(WindSystem::new()),
            fluids: Mutex::new(Arena::new("fluid system")),
            recreate: Mutex::new(Vec::new()),
            clock: Mutex::new(Clock::default()),
        })
    }

    /// Timestep policy.
    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    // =========================================================================
    // Meshes
    // =========================================================================

    /// Build a mesh from buffers and register it.
    pub fn add_deformable_mesh(
        &self,
        vertices: &[Point3<f64>],
        indices: &[u32],
        coords: &Coords,
        params: DeformableMeshParams,
        callback: Option<Box<dyn PhysicsCallback>>,
    ) -> Result<DeformableMeshId> {
        let mesh = DeformableMesh::new(vertices, indices, coords, params)?;
        Ok(self.insert_deformable_mesh(mesh, callback))
    }

    /// Register an already built mesh.
    pub fn insert_deformable_mesh(
        &self,
        mesh: DeformableMesh,
        callback: Option<Box<dyn PhysicsCallback>>,
    ) -> DeformableMeshId {
        let vertices = mesh.vertex_count();
        let id = lock(&self.meshes).insert(MeshEntry { mesh, callback });
        info!(?id, vertices, "deformable mesh added");
        id
    }

    /// Release a mesh at the start of the next update. The handle stays
    /// usable until then.
    pub fn remove_deformable_mesh(&self, id: DeformableMeshId) -> Result<()> {
        lock(&self.meshes).remove(id)?;
        Ok(())
    }

    /// Run `f` on a mesh.
    pub fn with_mesh<R>(
        &self,
        id: DeformableMeshId,
        f: impl FnOnce(&mut DeformableMesh) -> R,
    ) -> Result<R> {
        let mut meshes = lock(&self.meshes);
        let entry = meshes.get_mut(id)?;
        Ok(f(&mut entry.mesh))
    }

    /// Replace the hooks of a mesh.
    pub fn set_callback(
        &self,
        id: DeformableMeshId,
        callback: Option<Box<dyn PhysicsCallback>>,
    ) -> Result<()> {
        lock(&self.meshes).get_mut(id)?.callback = callback;
        Ok(())
    }

    /// Live meshes.
    #[must_use]
    pub fn mesh_count(&self) -> usize {
        lock(&self.meshes).len()
    }

    /// Queue work that needs the mesh table unlocked, such as rebuilding a
    /// mesh after its source asset changed. Runs at the start of the next
    /// [`update`](Self::update), before any mesh is touched.
    pub fn queue_recreate(&self, f: impl FnOnce(&Self) -> Result<()> + Send + 'static) {
        lock(&self.recreate).push(Box::new(f));
    }

    /// Recreate callbacks waiting for the next update.
    #[must_use]
    pub fn pending_recreates(&self) -> usize {
        lock(&self.recreate).len()
    }

    // =========================================================================
    // Particles and wind
    // =========================================================================

    /// Standalone particle groups.
    pub fn particles_mut(&self) -> MutexGuard<'_, ParticleSystem> {
        lock(&self.particles)
    }

    /// Wind sources, shared.
    pub fn wind(&self) -> RwLockReadGuard<'_, WindSystem> {
        self.wind.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wind sources, exclusive.
    pub fn wind_mut(&self) -> RwLockWriteGuard<'_, WindSystem> {
        self.wind.write().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Fluids
    // =========================================================================

    /// Register an empty fluid grid. Size it with
    /// [`with_fluid`](Self::with_fluid).
    pub fn add_fluid_system(&self, config: FluidConfig) -> Result<FluidId> {
        let fluid = FluidSystem::new(config)?;
        let id = lock(&self.fluids).insert(fluid);
        debug!(?id, "fluid system added");
        Ok(id)
    }

    /// Run `f` on a fluid grid.
    pub fn with_fluid<R>(&self, id: FluidId, f: impl FnOnce(&mut FluidSystem) -> R) -> Result<R> {
        let mut fluids = lock(&self.fluids);
        Ok(f(fluids.get_mut(id)?))
    }

    /// Release a fluid grid at the start of the next update.
    pub fn remove_fluid_system(&self, id: FluidId) -> Result<()> {
        lock(&self.fluids).remove(id)?;
        Ok(())
    }

    /// Live fluid grids.
    #[must_use]
    pub fn fluid_count(&self) -> usize {
        lock(&self.fluids).len()
    }

    // =========================================================================
    // Frame loop
    // =========================================================================

    /// Advance one frame of `dt` seconds.
    ///
    /// ```text
    /// drain recreate queue
    /// compact mesh / particle / fluid tables
    /// wind.update(dt)
    /// remainder += dt
    /// repeat n times:                  n = min(floor(remainder / h), cap)
    ///     meshes (batched): pre-step, forces, solve, post-step
    ///     standalone particle groups
    /// meshes (batched): post-update
    /// fluid grids: update(dt)
    /// extrapolation_time = remainder
    /// ```
    ///
    /// Whole substeps beyond the cap are discarded rather than carried over.
    /// A mesh, particle group or fluid grid whose step fails is logged and
    /// counted in [`FrameStats::failed_steps`]; the rest of the frame runs.
    /// Only an invalid `dt` is returned as an error.
    pub fn update(&self, dt: f64) -> Result<FrameStats> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(SimError::InvalidTimestep(dt).into());
        }

        let jobs = std::mem::take(&mut *lock(&self.recreate));
        let recreated = jobs.len();
        for job in jobs {
            if let Err(error) = job(self) {
                warn!(%error, "recreate callback failed");
            }
        }

        let mut clock = lock(&self.clock);
        let mut meshes = lock(&self.meshes);
        for entry in meshes.compact() {
            info!(vertices = entry.mesh.vertex_count(), "deformable mesh released");
        }
        let mut particles = lock(&self.particles);
        particles.compact();
        let mut fluids = lock(&self.fluids);
        let released = fluids.compact().len();
        if released > 0 {
            debug!(released, "fluid systems released");
        }

        self.wind_mut().update(dt)?;
        let wind = self.wind();

        let substep = self.config.effective_substep();
        clock.remainder += dt;
        let wanted = (clock.remainder / substep).floor();
        let substeps = wanted.min(f64::from(self.config.max_substeps)) as u32;
        clock.remainder = (clock.remainder - wanted * substep).max(0.0);
        let dropped_time = (wanted - f64::from(substeps)) * substep;
        if dropped_time > 0.0 {
            warn!(
                wanted,
                cap = self.config.max_substeps,
                dropped_time,
                "substep cap reached, dropping time"
            );
        }

        let batch = self.config.mesh_batch_size;
        let field: &WindSystem = &wind;
        let mut entries: Vec<&mut MeshEntry> = meshes.values_mut().collect();
        let failures = AtomicUsize::new(0);
        for _ in 0..substeps {
            for_each_batch(&mut entries, batch, |entry| {
                if let Err(error) = entry.step(substep, field) {
                    failures.fetch_add(1, Ordering::Relaxed);
                    warn!(%error, "deformable mesh step failed, skipping");
                }
            });
            if let Err(error) = particles.update(substep) {
                failures.fetch_add(1, Ordering::Relaxed);
                warn!(%error, "particle group update failed, skipping");
            }
            clock.simulation_time += substep;
        }
        for_each_batch(&mut entries, batch, |entry| entry.post_update());

        for fluid in fluids.values_mut() {
            if let Err(error) = fluid.update(dt) {
                failures.fetch_add(1, Ordering::Relaxed);
                warn!(%error, "fluid update failed, skipping");
            }
        }

        clock.extrapolation_time = clock.remainder;
        let stats = FrameStats {
            substeps,
            substep,
            dropped_time,
            recreated,
            meshes: entries.len(),
            particle_groups: particles.group_count(),
            wind_sources: wind.source_count(),
            fluids: fluids.len(),
            failed_steps: failures.into_inner(),
        };
        clock.last_frame = stats;
        trace!(
            substeps,
            extrapolation_time = clock.extrapolation_time,
            meshes = stats.meshes,
            failed = stats.failed_steps,
            "physics frame"
        );
        Ok(stats)
    }

    /// Time since the last completed substep (seconds). Renderers
    /// extrapolate particle positions by this much.
    #[must_use]
    pub fn extrapolation_time(&self) -> f64 {
        lock(&self.clock).extrapolation_time
    }

    /// Total simulated time (seconds), a whole number of substeps.
    #[must_use]
    pub fn simulation_time(&self) -> f64 {
        lock(&self.clock).simulation_time
    }

    /// Statistics of the last update.
    #[must_use]
    pub fn frame_stats(&self) -> FrameStats {
        lock(&self.clock).last_frame
    }
}
