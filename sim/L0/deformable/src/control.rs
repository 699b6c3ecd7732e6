//! Control points: rigid frames anchored to moving mesh features.
//!
//! A control point stores a frame relative to a basis reconstructed from
//! live particle positions. Querying it rebuilds the basis and composes
//! the stored relative frame back on top.
//!
//! ```text
//! Vertex:           basis at one vertex (normal + first incident edge)
//! Edge:             basis at lerp(a, b, t) (edge direction + mean normal)
//! ReverseSkinning:  weighted blend of vertex bases
//! ```

use nalgebra::Point3;
use sim_types::Coords;
use smallvec::SmallVec;

use crate::types::EdgeVertices;

/// Edge attachments with a barycentric coordinate within this distance of
/// either endpoint fall back to a vertex attachment.
pub const EDGE_COORD_EPSILON: f64 = 0.05;

/// Skinning weights: `(vertex, weight)` pairs.
pub type SkinWeights = SmallVec<[(u32, f64); 4]>;

/// Feature a control point is attached to.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlPoint {
    /// Attached to a single vertex.
    Vertex {
        /// Vertex index.
        vertex: u32,
        /// Frame relative to the vertex basis.
        local: Coords,
    },
    /// Attached at a point along an edge.
    Edge {
        /// Edge endpoints.
        vertices: [u32; 2],
        /// Position along the edge, in `(EDGE_COORD_EPSILON, 1 - EDGE_COORD_EPSILON)`.
        t: f64,
        /// Frame relative to the edge basis.
        local: Coords,
    },
    /// Attached to a weighted set of vertices.
    ReverseSkinning {
        /// Normalized weights.
        weights: SkinWeights,
        /// Frame relative to the blended basis.
        local: Coords,
    },
}

impl ControlPoint {
    /// Stored frame relative to the anchor basis.
    #[must_use]
    pub fn local_frame(&self) -> &Coords {
        match self {
            Self::Vertex { local, .. }
            | Self::Edge { local, .. }
            | Self::ReverseSkinning { local, .. } => local,
        }
    }

    /// Vertices the control point depends on.
    #[must_use]
    pub fn vertices(&self) -> SmallVec<[u32; 4]> {
        match self {
            Self::Vertex { vertex, .. } => SmallVec::from_slice(&[*vertex]),
            Self::Edge { vertices, .. } => SmallVec::from_slice(vertices),
            Self::ReverseSkinning { weights, .. } => weights.iter().map(|(v, _)| *v).collect(),
        }
    }
}

/// Where a rigid control point should attach.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Anchor {
    Vertex(u32),
    Edge([u32; 2], f64),
}

/// Closest-point parameter of `p` on segment `ab`, and squared distance.
pub(crate) fn segment_parameter(a: &Point3<f64>, b: &Point3<f64>, p: &Point3<f64>) -> (f64, f64) {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    let t = if len_sq > 0.0 {
        ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let closest = a + ab * t;
    (t, (p - closest).norm_squared())
}

/// Pick the feature nearest to `point`: the closest edge unless the
/// closest point on it is near an endpoint, in which case the closest
/// vertex.
pub(crate) fn select_anchor(
    positions: &[Point3<f64>],
    edges: &[EdgeVertices],
    point: &Point3<f64>,
) -> Option<Anchor> {
    let mut best_edge: Option<([u32; 2], f64, f64)> = None;
    for edge in edges {
        let [a, b] = edge.axis;
        let (t, d) = segment_parameter(&positions[a as usize], &positions[b as usize], point);
        if best_edge.is_none_or(|(_, _, bd)| d < bd) {
            best_edge = Some((edge.axis, t, d));
        }
    }

    if let Some((axis, t, _)) = best_edge {
        if t > EDGE_COORD_EPSILON && t < 1.0 - EDGE_COORD_EPSILON {
            return Some(Anchor::Edge(axis, t));
        }
    }

    let mut best_vertex: Option<(u32, f64)> = None;
    for (i, p) in positions.iter().enumerate() {
        let d = (p - point).norm_squared();
        if best_vertex.is_none_or(|(_, bd)| d < bd) {
            best_vertex = Some((u32::try_from(i).unwrap_or(u32::MAX), d));
        }
    }
    best_vertex.map(|(v, _)| Anchor::Vertex(v))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::EdgeSides;

    fn segment() -> (Vec<Point3<f64>>, Vec<EdgeVertices>) {
        (
            vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.5, 1.0, 0.0)],
            vec![EdgeVertices {
                axis: [0, 1],
                sides: EdgeSides::Single(2),
            }],
        )
    }

    #[test]
    fn test_segment_parameter() {
        let (t, d) = segment_parameter(
            &Point3::origin(),
            &Point3::new(2.0, 0.0, 0.0),
            &Point3::new(0.5, 1.0, 0.0),
        );
        assert!((t - 0.25).abs() < 1e-12);
        assert!((d - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_prefers_edge_interior() {
        let (pos, edges) = segment();
        let anchor = select_anchor(&pos, &edges, &Point3::new(0.4, -0.2, 0.0)).unwrap();
        match anchor {
            Anchor::Edge(axis, t) => {
                assert_eq!(axis, [0, 1]);
                assert!((t - 0.4).abs() < 1e-12);
            }
            Anchor::Vertex(_) => panic!("expected edge anchor"),
        }
    }

    #[test]
    fn test_near_endpoint_falls_back_to_vertex() {
        let (pos, edges) = segment();
        let anchor = select_anchor(&pos, &edges, &Point3::new(1.01, -0.1, 0.0)).unwrap();
        assert_eq!(anchor, Anchor::Vertex(1));
        assert!(select_anchor(&[], &[], &Point3::origin()).is_none());
    }
}
