//! Subdivision of every vertex into two or four touching cells.
//!
//! Copy `k` of vertex `i` gets id `i + k * n` where `n` is the vertex count of
//! the input graph, so `(id % n, id / n)` recovers `(parent, copy)`.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::geometry::Boundary;
use crate::ir::{Edge, EdgeType, Orientation, SceneGraph, Vertex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMode {
    #[default]
    None,
    Half,
    Quarter,
}

/// Arrangement of the cells a vertex was split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellLayout {
    /// Copy 0 on the right, copy 1 on the left.
    SideBySide,
    /// Copy 0 in front, copy 1 behind.
    Stacked,
    /// Copies 0..4: back-left, back-right, front-left, front-right.
    Grid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Source,
    Target,
}

/// Cells an edge endpoint may attach to: the cells facing the other endpoint
/// along the relation's axis, or any cell when the relation has no axis.
pub fn attachment_candidates(kind: EdgeType, end: Endpoint, layout: CellLayout) -> &'static [usize] {
    use CellLayout::*;
    use EdgeType::*;
    use Endpoint::*;
    match (layout, kind, end) {
        (SideBySide, LeftOf, Source) | (SideBySide, RightOf, Target) => &[0],
        (SideBySide, LeftOf, Target) | (SideBySide, RightOf, Source) => &[1],
        (Stacked, FrontOf, Source) | (Stacked, Behind, Target) => &[1],
        (Stacked, FrontOf, Target) | (Stacked, Behind, Source) => &[0],
        (Grid, LeftOf, Source) | (Grid, RightOf, Target) => &[1, 3],
        (Grid, LeftOf, Target) | (Grid, RightOf, Source) => &[0, 2],
        (Grid, FrontOf, Source) | (Grid, Behind, Target) => &[0, 1],
        (Grid, FrontOf, Target) | (Grid, Behind, Source) => &[2, 3],
        (Grid, _, _) => &[0, 1, 2, 3],
        _ => &[0, 1],
    }
}

/// Uniform pick among the candidates.
pub fn choose_attachment<R: Rng + ?Sized>(candidates: &[usize], rng: &mut R) -> usize {
    candidates.choose(rng).copied().unwrap_or(0)
}

pub fn split(
    graph: &SceneGraph,
    boundary: &Boundary,
    mode: SplitMode,
    rng: &mut (impl Rng + ?Sized),
) -> Result<SceneGraph> {
    match mode {
        SplitMode::None => Ok(graph.clone()),
        SplitMode::Half => split2(graph, boundary, rng),
        SplitMode::Quarter => split4(graph, boundary, rng),
    }
}

/// Cell geometry relative to the parent: centre offset and size divisor per planar axis.
struct Cell {
    offset: [f64; 2],
    divisor: [f64; 2],
    /// Walls this cell is not adjacent to.
    loses: &'static [Orientation],
}

fn make_cell(parent: &Vertex, id: usize, copy: usize, cell: &Cell) -> Vertex {
    let target_size = parent.size.map(|band| band.target).unwrap_or([0.0; 3]);
    let mut vertex = parent.clone();
    vertex.id = id;
    vertex.label = format!("{}[{copy}]", parent.label);
    vertex.placement = None;
    vertex.size = parent.size.map(|band| {
        let mut scaled = band;
        for axis in 0..2 {
            scaled.target[axis] /= cell.divisor[axis];
            scaled.tolerance[axis] /= cell.divisor[axis];
        }
        scaled
    });
    vertex.position = parent.position.map(|band| {
        let mut shifted = band;
        for axis in 0..2 {
            shifted.target[axis] += cell.offset[axis] * target_size[axis];
            shifted.tolerance[axis] /= cell.divisor[axis];
        }
        shifted
    });
    vertex
}

fn keeps_pin(parent: &Vertex, boundary: &Boundary, cell: &Cell) -> Option<usize> {
    let pin = parent.boundary?;
    match boundary.walls.get(pin) {
        Some(wall) if cell.loses.contains(wall) => None,
        _ => Some(pin),
    }
}

fn internal_edge(source: usize, target: usize, kind: EdgeType, tolerance: [f64; 2]) -> Edge {
    Edge::new(source, target, kind)
        .with_distance(0.0)
        .with_closeby_tolerance(tolerance)
}

fn rewire<R: Rng + ?Sized>(
    graph: &SceneGraph,
    layouts: &[CellLayout],
    out: &mut SceneGraph,
    rng: &mut R,
) {
    let n = graph.len();
    for edge in &graph.edges {
        let source_copy = choose_attachment(
            attachment_candidates(edge.kind, Endpoint::Source, layouts[edge.source]),
            rng,
        );
        let target_copy = choose_attachment(
            attachment_candidates(edge.kind, Endpoint::Target, layouts[edge.target]),
            rng,
        );
        let mut rewired = edge.clone();
        rewired.source = edge.source + source_copy * n;
        rewired.target = edge.target + target_copy * n;
        out.add_edge(rewired);
    }
}

const RIGHT_CELL: Cell = Cell {
    offset: [0.25, 0.0],
    divisor: [2.0, 1.0],
    loses: &[Orientation::Left],
};
const LEFT_CELL: Cell = Cell {
    offset: [-0.25, 0.0],
    divisor: [2.0, 1.0],
    loses: &[Orientation::Right],
};
const FRONT_CELL: Cell = Cell {
    offset: [0.0, 0.25],
    divisor: [1.0, 2.0],
    loses: &[Orientation::Back],
};
const BACK_CELL: Cell = Cell {
    offset: [0.0, -0.25],
    divisor: [1.0, 2.0],
    loses: &[Orientation::Front],
};

/// Splits every vertex in two along its longer planar side. A vertex whose
/// target width exceeds its target length gets front and back halves,
/// otherwise left and right halves.
pub fn split2<R: Rng + ?Sized>(graph: &SceneGraph, boundary: &Boundary, rng: &mut R) -> Result<SceneGraph> {
    graph.validate(boundary)?;
    let n = graph.len();
    let mut out = SceneGraph::new();
    out.vertices.reserve(2 * n);

    let layouts: Vec<CellLayout> = graph
        .vertices
        .iter()
        .map(|vertex| match vertex.size {
            Some(band) if band.target[1] > band.target[0] => CellLayout::Stacked,
            _ => CellLayout::SideBySide,
        })
        .collect();

    for copy in 0..2 {
        for (parent, layout) in graph.vertices.iter().zip(&layouts) {
            let cell = match (layout, copy) {
                (CellLayout::Stacked, 0) => &FRONT_CELL,
                (CellLayout::Stacked, _) => &BACK_CELL,
                (_, 0) => &RIGHT_CELL,
                (_, _) => &LEFT_CELL,
            };
            let mut vertex = make_cell(parent, parent.id + copy * n, copy, cell);
            vertex.boundary = keeps_pin(parent, boundary, cell);
            out.vertices.push(vertex);
        }
    }

    for (parent, layout) in graph.vertices.iter().zip(&layouts) {
        let size = parent.size.map(|band| band.target).unwrap_or([0.0; 3]);
        let (first, second) = (parent.id, parent.id + n);
        let edge = match layout {
            CellLayout::Stacked => {
                internal_edge(first, second, EdgeType::FrontOf, [size[0] / 2.0, 0.0])
            }
            _ => internal_edge(second, first, EdgeType::LeftOf, [0.0, size[1] / 2.0]),
        };
        out.add_edge(edge);
    }

    rewire(graph, &layouts, &mut out, rng);
    debug!(vertices = out.len(), edges = out.edges.len(), "half split applied");
    Ok(out)
}

const GRID_CELLS: [Cell; 4] = [
    Cell {
        offset: [-0.25, -0.25],
        divisor: [2.0, 2.0],
        loses: &[Orientation::Front, Orientation::Right],
    },
    Cell {
        offset: [0.25, -0.25],
        divisor: [2.0, 2.0],
        loses: &[Orientation::Front, Orientation::Left],
    },
    Cell {
        offset: [-0.25, 0.25],
        divisor: [2.0, 2.0],
        loses: &[Orientation::Back, Orientation::Right],
    },
    Cell {
        offset: [0.25, 0.25],
        divisor: [2.0, 2.0],
        loses: &[Orientation::Back, Orientation::Left],
    },
];

/// Splits every vertex into a 2x2 grid of quarter cells held together by
/// touching LeftOf / FrontOf edges.
pub fn split4<R: Rng + ?Sized>(graph: &SceneGraph, boundary: &Boundary, rng: &mut R) -> Result<SceneGraph> {
    graph.validate(boundary)?;
    let n = graph.len();
    let mut out = SceneGraph::new();
    out.vertices.reserve(4 * n);

    for (copy, cell) in GRID_CELLS.iter().enumerate() {
        for parent in &graph.vertices {
            let mut vertex = make_cell(parent, parent.id + copy * n, copy, cell);
            vertex.boundary = keeps_pin(parent, boundary, cell);
            out.vertices.push(vertex);
        }
    }

    for parent in &graph.vertices {
        let size = parent.size.map(|band| band.target).unwrap_or([0.0; 3]);
        let cell = |copy: usize| parent.id + copy * n;
        let across = [0.0, size[1] / 4.0];
        let along = [size[0] / 4.0, 0.0];
        out.add_edge(internal_edge(cell(0), cell(1), EdgeType::LeftOf, across));
        out.add_edge(internal_edge(cell(2), cell(3), EdgeType::LeftOf, across));
        out.add_edge(internal_edge(cell(2), cell(0), EdgeType::FrontOf, along));
        out.add_edge(internal_edge(cell(3), cell(1), EdgeType::FrontOf, along));
    }

    let layouts = vec![CellLayout::Grid; n];
    rewire(graph, &layouts, &mut out, rng);
    debug!(vertices = out.len(), edges = out.edges.len(), "quarter split applied");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Band;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn room(graph: &mut SceneGraph, label: &str, pos: [f64; 2], size: [f64; 2]) -> usize {
        let id = graph.add_vertex(label);
        let vertex = graph.vertex_mut(id);
        vertex.position = Some(Band::new([pos[0], pos[1], 0.0], [0.1, 0.1, 0.0]));
        vertex.size = Some(Band::new([size[0], size[1], 0.0], [0.04, 0.04, 0.0]));
        id
    }

    fn square() -> Boundary {
        Boundary::rectangle([0.0; 3], [1.0, 1.0, 1.0])
    }

    fn footprint(vertex: &Vertex) -> [f64; 4] {
        let pos = vertex.position.unwrap().target;
        let size = vertex.size.unwrap().target;
        [
            pos[0] - size[0] / 2.0,
            pos[0] + size[0] / 2.0,
            pos[1] - size[1] / 2.0,
            pos[1] + size[1] / 2.0,
        ]
    }

    #[test]
    fn half_split_conserves_area_and_footprint() {
        let mut graph = SceneGraph::new();
        let id = room(&mut graph, "living", [0.5, 0.5], [0.6, 0.4]);
        let out = split2(&graph, &square(), &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(out.len(), 2);

        let area: f64 = out
            .vertices
            .iter()
            .map(|v| v.size.unwrap().target[0] * v.size.unwrap().target[1])
            .sum();
        assert!((area - 0.24).abs() < 1e-12);

        let right = footprint(out.vertex(id));
        let left = footprint(out.vertex(id + 1));
        assert!((left[1] - right[0]).abs() < 1e-12, "cells share an edge");
        assert!((left[0] - 0.2).abs() < 1e-12);
        assert!((right[1] - 0.8).abs() < 1e-12);
        assert_eq!(left[2..], right[2..]);
        assert_eq!(
            out.edges,
            vec![internal_edge(id + 1, id, EdgeType::LeftOf, [0.0, 0.2])]
        );
    }

    #[test]
    fn half_split_uses_front_back_halves_for_deep_rooms() {
        let mut graph = SceneGraph::new();
        room(&mut graph, "hall", [0.5, 0.5], [0.2, 0.6]);
        let out = split2(&graph, &square(), &mut StdRng::seed_from_u64(1)).unwrap();
        let front = out.vertex(0).position.unwrap().target;
        let back = out.vertex(1).position.unwrap().target;
        assert!((front[1] - 0.65).abs() < 1e-12);
        assert!((back[1] - 0.35).abs() < 1e-12);
        assert_eq!(out.vertex(0).position.unwrap().tolerance[1], 0.05);
        assert_eq!(out.edges[0].kind, EdgeType::FrontOf);
    }

    #[test]
    fn half_split_drops_pin_on_far_cell() {
        let mut graph = SceneGraph::new();
        let id = room(&mut graph, "bath", [0.2, 0.5], [0.4, 0.2]);
        graph.vertex_mut(id).boundary = Some(3); // LEFT wall
        let out = split2(&graph, &square(), &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(out.vertex(0).boundary, None, "right cell leaves the left wall");
        assert_eq!(out.vertex(1).boundary, Some(3));
    }

    #[test]
    fn quarter_split_builds_grid() {
        let mut graph = SceneGraph::new();
        room(&mut graph, "open", [0.5, 0.5], [0.8, 0.8]);
        let out = split4(&graph, &square(), &mut StdRng::seed_from_u64(5)).unwrap();
        assert_eq!(out.len(), 4);
        let area: f64 = out
            .vertices
            .iter()
            .map(|v| v.size.unwrap().target[0] * v.size.unwrap().target[1])
            .sum();
        assert!((area - 0.64).abs() < 1e-12);
        assert_eq!(out.edges_of(EdgeType::LeftOf).count(), 2);
        assert_eq!(out.edges_of(EdgeType::FrontOf).count(), 2);
        let back_left = out.vertex(0).position.unwrap().target;
        assert!((back_left[0] - 0.3).abs() < 1e-12);
        assert!((back_left[1] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn rewired_endpoints_stay_within_candidates() {
        let mut graph = SceneGraph::new();
        let a = room(&mut graph, "a", [0.3, 0.5], [0.2, 0.2]);
        let b = room(&mut graph, "b", [0.7, 0.5], [0.2, 0.2]);
        graph.add_edge(Edge::new(a, b, EdgeType::LeftOf));
        graph.add_edge(Edge::new(b, a, EdgeType::FrontOf));
        graph.add_edge(Edge::new(a, b, EdgeType::CloseBy));
        let n = graph.len();
        for seed in 0..32 {
            let out = split4(&graph, &square(), &mut StdRng::seed_from_u64(seed)).unwrap();
            let external = &out.edges[4 * n..];
            for (original, edge) in graph.edges.iter().zip(external) {
                assert_eq!(edge.source % n, original.source);
                assert_eq!(edge.target % n, original.target);
                let sources = attachment_candidates(original.kind, Endpoint::Source, CellLayout::Grid);
                let targets = attachment_candidates(original.kind, Endpoint::Target, CellLayout::Grid);
                assert!(sources.contains(&(edge.source / n)));
                assert!(targets.contains(&(edge.target / n)));
            }
        }
    }

    #[test]
    fn left_of_attaches_facing_cells_in_half_split() {
        assert_eq!(
            attachment_candidates(EdgeType::LeftOf, Endpoint::Source, CellLayout::SideBySide),
            &[0]
        );
        assert_eq!(
            attachment_candidates(EdgeType::LeftOf, Endpoint::Target, CellLayout::SideBySide),
            &[1]
        );
        assert_eq!(
            attachment_candidates(EdgeType::LeftOf, Endpoint::Source, CellLayout::Stacked),
            &[0, 1]
        );
    }
}
