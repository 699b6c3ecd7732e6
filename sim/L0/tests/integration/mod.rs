//! End-to-end scenarios for the simulation core.
//!
//! - Cloth sheet pinned at its corners comes to rest flat
//! - Explosion wind sampled through the system
//! - Closed fluid box with a single source obeys the divergence theorem
//! - Handle lifetimes across the orchestrator

#![allow(clippy::unwrap_used, clippy::expect_used)]

pub mod explosion_band;
pub mod fluid_box;
pub mod handles;
pub mod pinned_sheet;
