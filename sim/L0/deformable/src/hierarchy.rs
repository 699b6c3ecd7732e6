//! Attachment hierarchy: multi-source BFS over mesh edges.
//!
//! Every root vertex (attachments and fixed particles) starts at depth 0. Each vertex reached by the
//! search gets `depth(parent) + 1` and one [`HierarchyLink`] to the vertex
//! it was discovered from. Vertices the search never reaches are free
//! floating.
//!
//! The nearest attachment is chosen by Euclidean distance, scanning the
//! attachments in the order given and replacing the current choice only
//! when a strictly closer one appears. Equidistant attachments therefore
//! resolve to the one listed first.

use std::collections::VecDeque;

use nalgebra::Point3;
use smallvec::SmallVec;

use crate::types::HierarchyLink;

/// Result of a hierarchy build.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Hierarchy {
    pub depths: Vec<Option<u32>>,
    pub nearest: Vec<Option<u32>>,
    /// Tree edges in BFS discovery order (parents before children).
    pub links: Vec<HierarchyLink>,
}

/// Build the hierarchy from the `attachments` roots.
///
/// `positions` are the live positions used for the nearest-attachment
/// search; `rest_positions` give the hierarchy link rest lengths.
pub(crate) fn build_hierarchy(
    positions: &[Point3<f64>],
    rest_positions: &[Point3<f64>],
    neighbours: &[SmallVec<[u32; 8]>],
    attachments: &[u32],
) -> Hierarchy {
    let n = positions.len();
    let mut depths = vec![None; n];
    let mut links = Vec::new();
    let mut queue = VecDeque::new();

    for &a in attachments {
        let slot = &mut depths[a as usize];
        if slot.is_none() {
            *slot = Some(0);
            queue.push_back(a);
        }
    }

    while let Some(v) = queue.pop_front() {
        let depth = depths[v as usize].unwrap_or(0);
        for &w in &neighbours[v as usize] {
            if depths[w as usize].is_some() {
                continue;
            }
            depths[w as usize] = Some(depth + 1);
            links.push(HierarchyLink {
                parent: v,
                child: w,
                rest_length: (rest_positions[w as usize] - rest_positions[v as usize]).norm(),
            });
            queue.push_back(w);
        }
    }

    let nearest = positions
        .iter()
        .map(|p| {
            let mut best: Option<(u32, f64)> = None;
            for &a in attachments {
                let d = (positions[a as usize] - p).norm_squared();
                if best.is_none_or(|(_, bd)| d < bd) {
                    best = Some((a, d));
                }
            }
            best.map(|(a, _)| a)
        })
        .collect();

    Hierarchy {
        depths,
        nearest,
        links,
    }
}
