//! Per-vertex, per-triangle and per-edge mesh data.

use std::ops::Range;

use nalgebra::Point3;
use sim_particles::ParticleId;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Vertex state flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct VertexFlags: u32 {
        /// Pinned to the animated pose through an attachment.
        const ATTACHED = 0b0000_0001;
        /// Lies on a single-sided edge.
        const BOUNDARY = 0b0000_0010;
        /// Not reachable from any attachment (no hierarchy depth).
        const FREE_FLOATING = 0b0000_0100;
        /// Position was recovered from `NaN` during the last enclosure pass.
        const RECOVERED = 0b0000_1000;
    }
}

/// A mesh vertex bound to one particle.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalVertex {
    /// Animated rest position in world space.
    pub def_position: Point3<f64>,
    /// Rest position before the last pose update.
    pub prev_def_position: Point3<f64>,
    /// BFS distance in edges from the nearest attachment.
    pub hierarchy_depth: Option<u32>,
    /// Closest attachment vertex by Euclidean distance.
    pub nearest_attachment: Option<u32>,
    /// Start of this vertex's run in the incident-triangle pool.
    pub triangle_start: u32,
    /// Number of incident triangles.
    pub triangle_count: u32,
    /// Backing particle.
    pub particle: ParticleId,
    /// State flags.
    pub flags: VertexFlags,
}

impl PhysicalVertex {
    /// Range of this vertex's entries in the incident-triangle pool.
    #[must_use]
    pub fn triangle_range(&self) -> Range<usize> {
        let start = self.triangle_start as usize;
        start..start + self.triangle_count as usize
    }

    /// Whether the vertex follows the animated pose kinematically.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.flags.contains(VertexFlags::ATTACHED)
    }
}

/// A triangle with its rest edge lengths.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Triangle {
    /// Vertex indices.
    pub indices: [u32; 3],
    /// Rest length of edge `i -> (i + 1) % 3`.
    pub rest_lengths: [f64; 3],
}

/// The vertices opposite an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EdgeSides {
    /// Boundary edge: one incident triangle.
    Single(u32),
    /// Interior edge: two incident triangles.
    Double([u32; 2]),
}

/// An undirected edge and its opposite vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EdgeVertices {
    /// Endpoints, smaller index first.
    pub axis: [u32; 2],
    /// Opposite vertices.
    pub sides: EdgeSides,
}

impl EdgeVertices {
    /// Whether both sides are present.
    #[must_use]
    pub fn is_double_sided(&self) -> bool {
        matches!(self.sides, EdgeSides::Double(_))
    }
}

/// A BFS tree edge of the attachment hierarchy.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HierarchyLink {
    /// Vertex closer to the attachments.
    pub parent: u32,
    /// Vertex one level deeper.
    pub child: u32,
    /// Rest distance between them.
    pub rest_length: f64,
}

/// A recoverable topology defect found while building a mesh.
///
/// The offending element is dropped and the build continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyIssue {
    /// Triangle repeats a vertex.
    #[error("triangle {triangle} is degenerate")]
    DegenerateTriangle {
        /// Triangle position in the index buffer.
        triangle: usize,
    },
    /// Edge shared by more than two triangles; extra sides ignored.
    #[error("edge ({a}, {b}) is shared by more than two triangles")]
    NonManifoldEdge {
        /// First endpoint.
        a: u32,
        /// Second endpoint.
        b: u32,
    },
    /// Both triangles on an edge have the same opposite vertex.
    #[error("edge ({a}, {b}) has two coincident side vertices")]
    DuplicateTriangle {
        /// First endpoint.
        a: u32,
        /// Second endpoint.
        b: u32,
    },
}
