use tracing::{debug, info};

use super::cycles::{CycleRemoval, remove_cycles};
use super::relax::relax;
use crate::error::Result;
use crate::geometry::{Boundary, Obstacle};
use crate::ir::{EdgeType, SceneGraph};

#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeOptions {
    pub cycle_removal: CycleRemoval,
}

/// Counts of every repair applied, mainly for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub reversed: usize,
    pub cycle_edges_removed: usize,
    pub orientations_flipped: usize,
    pub heights_clamped: usize,
    pub positions_relaxed: usize,
    pub floor_flags_cleared: usize,
    pub boundary_edges_removed: usize,
}

pub fn normalize(graph: &SceneGraph, boundary: &Boundary, obstacles: &[Obstacle]) -> Result<SceneGraph> {
    normalize_with(graph, boundary, obstacles, NormalizeOptions::default()).map(|(graph, _)| graph)
}

/// Produces a repaired copy of `graph`; the input is left untouched.
pub fn normalize_with(
    graph: &SceneGraph,
    boundary: &Boundary,
    obstacles: &[Obstacle],
    options: NormalizeOptions,
) -> Result<(SceneGraph, NormalizeReport)> {
    graph.validate(boundary)?;
    let mut out = graph.clone();
    let mut report = NormalizeReport::default();

    for edge in &mut out.edges {
        if let Some(canonical) = edge.kind.reversed() {
            std::mem::swap(&mut edge.source, &mut edge.target);
            edge.kind = canonical;
            report.reversed += 1;
        }
    }

    for kind in EdgeType::CANONICAL {
        report.cycle_edges_removed += remove_cycles(&mut out, kind, options.cycle_removal);
    }

    for vertex in &mut out.vertices {
        if let Some(pin) = vertex.boundary {
            if boundary.walls.get(pin) == Some(&vertex.orientation) {
                let flipped = vertex.orientation.opposite();
                debug!(
                    vertex = %vertex.label,
                    from = vertex.orientation.as_str(),
                    to = flipped.as_str(),
                    "orientation faces its own wall, flipping"
                );
                vertex.orientation = flipped;
                report.orientations_flipped += 1;
            }
        }
        if let (Some(position), Some(size)) = (vertex.position.as_mut(), vertex.size.as_ref()) {
            let floor_band = size.target[2] / 2.0 + size.tolerance[2] / 2.0;
            if position.target[2] - position.tolerance[2] > floor_band {
                debug!(vertex = %vertex.label, "clamping target height to half the target size");
                position.target[2] = size.target[2] / 2.0;
                report.heights_clamped += 1;
            }
        }
    }

    report.positions_relaxed = relax(&mut out, boundary, obstacles)?;

    let stacked: Vec<usize> = out
        .edges
        .iter()
        .filter(|edge| matches!(edge.kind, EdgeType::Above | EdgeType::Under))
        .map(|edge| edge.source)
        .collect();
    for id in stacked {
        let vertex = out.vertex_mut(id);
        if vertex.on_floor {
            debug!(vertex = %vertex.label, "stacked vertex cannot sit on the floor");
            vertex.on_floor = false;
            report.floor_flags_cleared += 1;
        }
    }

    let before = out.edges.len();
    let pinned: Vec<bool> = out.vertices.iter().map(|v| v.boundary.is_some()).collect();
    out.edges
        .retain(|edge| !(pinned[edge.source] && pinned[edge.target]));
    report.boundary_edges_removed = before - out.edges.len();

    info!(
        vertices = out.len(),
        edges = out.edges.len(),
        reversed = report.reversed,
        cycles = report.cycle_edges_removed,
        relaxed = report.positions_relaxed,
        "scene graph normalized"
    );
    Ok((out, report))
}
