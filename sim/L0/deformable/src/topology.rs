//! Mesh connectivity built from a vertex/index buffer.
//!
//! Incident triangles are stored in one flat pool: a counting pass sizes
//! each vertex's run, a filling pass writes the triangle indices.
//!
//! ```text
//! counts:  v0:2  v1:3  v2:1 ...
//! starts:  v0:0  v1:2  v2:5 ...
//! pool:    [t0 t1 | t0 t1 t2 | t2 | ...]
//! ```

use hashbrown::HashMap;
use nalgebra::Point3;
use smallvec::SmallVec;
use tracing::warn;

use crate::error::{DeformableError, Result};
use crate::types::{EdgeSides, EdgeVertices, TopologyIssue, Triangle};

/// Connectivity of a triangle mesh.
#[derive(Debug, Clone, Default)]
pub(crate) struct Topology {
    pub triangles: Vec<Triangle>,
    /// Per vertex `(start, count)` into `triangle_pool`.
    pub triangle_runs: Vec<(u32, u32)>,
    pub triangle_pool: Vec<u32>,
    pub edges: Vec<EdgeVertices>,
    pub issues: Vec<TopologyIssue>,
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Build triangles, incident-triangle runs and edges.
pub(crate) fn build_topology(positions: &[Point3<f64>], indices: &[u32]) -> Result<Topology> {
    if indices.len() % 3 != 0 {
        return Err(DeformableError::invalid_topology(format!(
            "index count {} is not a multiple of 3",
            indices.len()
        )));
    }
    let vertex_count = positions.len();
    for &i in indices {
        DeformableError::check_index(i as usize, vertex_count)?;
    }

    let mut topology = Topology::default();

    for (t, tri) in indices.chunks_exact(3).enumerate() {
        let [a, b, c] = [tri[0], tri[1], tri[2]];
        if a == b || b == c || a == c {
            topology
                .issues
                .push(TopologyIssue::DegenerateTriangle { triangle: t });
            continue;
        }
        let p = |i: u32| positions[i as usize];
        topology.triangles.push(Triangle {
            indices: [a, b, c],
            rest_lengths: [
                (p(b) - p(a)).norm(),
                (p(c) - p(b)).norm(),
                (p(a) - p(c)).norm(),
            ],
        });
    }

    build_triangle_runs(&mut topology, vertex_count);
    build_edges(&mut topology);

    for issue in &topology.issues {
        warn!(%issue, "dropped malformed mesh element");
    }
    Ok(topology)
}

fn build_triangle_runs(topology: &mut Topology, vertex_count: usize) {
    let mut counts = vec![0_u32; vertex_count];
    for tri in &topology.triangles {
        for &v in &tri.indices {
            counts[v as usize] += 1;
        }
    }

    let mut runs = Vec::with_capacity(vertex_count);
    let mut start = 0_u32;
    for &count in &counts {
        runs.push((start, count));
        start += count;
    }

    let mut pool = vec![0_u32; start as usize];
    let mut fill = vec![0_u32; vertex_count];
    for (t, tri) in topology.triangles.iter().enumerate() {
        for &v in &tri.indices {
            let v = v as usize;
            pool[(runs[v].0 + fill[v]) as usize] = to_u32(t);
            fill[v] += 1;
        }
    }

    topology.triangle_runs = runs;
    topology.triangle_pool = pool;
}

fn build_edges(topology: &mut Topology) {
    let mut lookup: HashMap<(u32, u32), usize> = HashMap::new();
    let mut edges: Vec<EdgeVertices> = Vec::new();
    let mut issues = Vec::new();

    for tri in &topology.triangles {
        let [a, b, c] = tri.indices;
        for (u, v, side) in [(a, b, c), (b, c, a), (c, a, b)] {
            let key = (u.min(v), u.max(v));
            match lookup.get(&key) {
                None => {
                    lookup.insert(key, edges.len());
                    edges.push(EdgeVertices {
                        axis: [key.0, key.1],
                        sides: EdgeSides::Single(side),
                    });
                }
                Some(&e) => {
                    let edge = &mut edges[e];
                    match edge.sides {
                        EdgeSides::Single(first) if first == side => {
                            issues.push(TopologyIssue::DuplicateTriangle { a: key.0, b: key.1 });
                        }
                        EdgeSides::Single(first) => {
                            edge.sides = EdgeSides::Double([first, side]);
                        }
                        EdgeSides::Double(_) => {
                            issues.push(TopologyIssue::NonManifoldEdge { a: key.0, b: key.1 });
                        }
                    }
                }
            }
        }
    }

    topology.edges = edges;
    topology.issues.extend(issues);
}

/// Edge-connected neighbours of every vertex, in edge order.
pub(crate) fn vertex_neighbours(
    vertex_count: usize,
    edges: &[EdgeVertices],
) -> Vec<SmallVec<[u32; 8]>> {
    let mut neighbours = vec![SmallVec::new(); vertex_count];
    for edge in edges {
        let [a, b] = edge.axis;
        neighbours[a as usize].push(b);
        neighbours[b as usize].push(a);
    }
    neighbours
}
