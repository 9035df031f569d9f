use crate::error::{Result, config_error};
use crate::geometry::Boundary;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const PLANAR: [Axis; 2] = [Axis::X, Axis::Y];
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Orientation {
    Up,
    Down,
    Left,
    Right,
    #[default]
    Front,
    Back,
}

static ORIENTATION_NAMES: Lazy<HashMap<&'static str, Orientation>> = Lazy::new(|| {
    Orientation::ALL
        .iter()
        .map(|orientation| (orientation.as_str(), *orientation))
        .collect()
});

impl Orientation {
    pub const ALL: [Orientation; 6] = [
        Orientation::Up,
        Orientation::Down,
        Orientation::Left,
        Orientation::Right,
        Orientation::Front,
        Orientation::Back,
    ];

    pub fn opposite(self) -> Self {
        match self {
            Orientation::Up => Orientation::Down,
            Orientation::Down => Orientation::Up,
            Orientation::Left => Orientation::Right,
            Orientation::Right => Orientation::Left,
            Orientation::Front => Orientation::Back,
            Orientation::Back => Orientation::Front,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::Up => "UP",
            Orientation::Down => "DOWN",
            Orientation::Left => "LEFT",
            Orientation::Right => "RIGHT",
            Orientation::Front => "FRONT",
            Orientation::Back => "BACK",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        ORIENTATION_NAMES
            .get(name.trim().to_ascii_uppercase().as_str())
            .copied()
    }

    /// Walls only ever face one of the four planar directions.
    pub fn is_planar(self) -> bool {
        !matches!(self, Orientation::Up | Orientation::Down)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    LeftOf,
    RightOf,
    FrontOf,
    Behind,
    Above,
    Under,
    CloseBy,
    AlignWith,
}

static EDGE_TYPE_NAMES: Lazy<HashMap<String, EdgeType>> = Lazy::new(|| {
    let mut names = HashMap::new();
    for kind in EdgeType::ALL {
        names.insert(normalize_name(kind.as_str()), kind);
        names.insert(normalize_name(kind.label()), kind);
    }
    names
});

fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|ch| ch.is_ascii_alphanumeric())
        .map(|ch| ch.to_ascii_lowercase())
        .collect()
}

impl EdgeType {
    pub const ALL: [EdgeType; 8] = [
        EdgeType::LeftOf,
        EdgeType::RightOf,
        EdgeType::FrontOf,
        EdgeType::Behind,
        EdgeType::Above,
        EdgeType::Under,
        EdgeType::CloseBy,
        EdgeType::AlignWith,
    ];

    pub const DIRECTIONAL: [EdgeType; 6] = [
        EdgeType::LeftOf,
        EdgeType::RightOf,
        EdgeType::FrontOf,
        EdgeType::Behind,
        EdgeType::Above,
        EdgeType::Under,
    ];

    pub const CANONICAL: [EdgeType; 3] = [EdgeType::LeftOf, EdgeType::FrontOf, EdgeType::Above];

    pub fn as_str(self) -> &'static str {
        match self {
            EdgeType::LeftOf => "LeftOf",
            EdgeType::RightOf => "RightOf",
            EdgeType::FrontOf => "FrontOf",
            EdgeType::Behind => "Behind",
            EdgeType::Above => "Above",
            EdgeType::Under => "Under",
            EdgeType::CloseBy => "CloseBy",
            EdgeType::AlignWith => "AlignWith",
        }
    }

    /// Human readable relation name used in graph exports.
    pub fn label(self) -> &'static str {
        match self {
            EdgeType::LeftOf => "Left of",
            EdgeType::RightOf => "Right of",
            EdgeType::FrontOf => "Front of",
            EdgeType::Behind => "Behind",
            EdgeType::Above => "Above",
            EdgeType::Under => "Under",
            EdgeType::CloseBy => "Close by",
            EdgeType::AlignWith => "Align with",
        }
    }

    /// Accepts `LeftOf`, `left_of`, `LEFT OF`, `Left of`, ...
    pub fn parse(name: &str) -> Option<Self> {
        EDGE_TYPE_NAMES.get(&normalize_name(name)).copied()
    }

    /// The canonical type an edge of this type becomes once its endpoints are swapped.
    pub fn reversed(self) -> Option<EdgeType> {
        match self {
            EdgeType::RightOf => Some(EdgeType::LeftOf),
            EdgeType::Behind => Some(EdgeType::FrontOf),
            EdgeType::Under => Some(EdgeType::Above),
            _ => None,
        }
    }

    pub fn axis(self) -> Option<Axis> {
        match self {
            EdgeType::LeftOf | EdgeType::RightOf => Some(Axis::X),
            EdgeType::FrontOf | EdgeType::Behind => Some(Axis::Y),
            EdgeType::Above | EdgeType::Under => Some(Axis::Z),
            EdgeType::CloseBy | EdgeType::AlignWith => None,
        }
    }
}

/// Face selector of an `AlignWith` edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlignEdge {
    Back,
    Right,
    Front,
    Left,
    Bottom,
    Top,
}

impl AlignEdge {
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(AlignEdge::Back),
            1 => Some(AlignEdge::Right),
            2 => Some(AlignEdge::Front),
            3 => Some(AlignEdge::Left),
            4 => Some(AlignEdge::Bottom),
            5 => Some(AlignEdge::Top),
            _ => None,
        }
    }

    pub fn index(self) -> u8 {
        match self {
            AlignEdge::Back => 0,
            AlignEdge::Right => 1,
            AlignEdge::Front => 2,
            AlignEdge::Left => 3,
            AlignEdge::Bottom => 4,
            AlignEdge::Top => 5,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "back" => Some(AlignEdge::Back),
            "right" => Some(AlignEdge::Right),
            "front" => Some(AlignEdge::Front),
            "left" => Some(AlignEdge::Left),
            "bottom" => Some(AlignEdge::Bottom),
            "top" => Some(AlignEdge::Top),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlignEdge::Back => "back",
            AlignEdge::Right => "right",
            AlignEdge::Front => "front",
            AlignEdge::Left => "left",
            AlignEdge::Bottom => "bottom",
            AlignEdge::Top => "top",
        }
    }

    /// Axis of the aligned face and whether it is the face on the high side of that axis.
    pub fn face(self) -> (Axis, bool) {
        match self {
            AlignEdge::Back => (Axis::Y, false),
            AlignEdge::Right => (Axis::X, true),
            AlignEdge::Front => (Axis::Y, true),
            AlignEdge::Left => (Axis::X, false),
            AlignEdge::Bottom => (Axis::Z, false),
            AlignEdge::Top => (Axis::Z, true),
        }
    }
}

/// A target value with its admissible deviation. Keeping both in one value
/// means a target can never exist without its tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub target: [f64; 3],
    pub tolerance: [f64; 3],
}

impl Band {
    pub fn new(target: [f64; 3], tolerance: [f64; 3]) -> Self {
        Self { target, tolerance }
    }

    pub fn lower(&self, axis: Axis) -> f64 {
        self.target[axis.index()] - self.tolerance[axis.index()]
    }

    pub fn upper(&self, axis: Axis) -> f64 {
        self.target[axis.index()] + self.tolerance[axis.index()]
    }
}

/// Solved geometry of a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    pub pos: [f64; 3],
    pub size: [f64; 3],
}

#[derive(Debug, Clone)]
pub struct Vertex {
    pub id: usize,
    pub label: String,
    pub priority: i32,
    /// Index of the boundary wall segment the vertex is pinned to.
    pub boundary: Option<usize>,
    pub on_floor: bool,
    pub orientation: Orientation,
    pub position: Option<Band>,
    pub size: Option<Band>,
    pub placement: Option<Placement>,
}

impl Vertex {
    pub fn new(id: usize, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            priority: 0,
            boundary: None,
            on_floor: false,
            orientation: Orientation::default(),
            position: None,
            size: None,
            placement: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub source: usize,
    pub target: usize,
    pub kind: EdgeType,
    /// Target gap along the relation axis. `None` only orders the pair.
    pub distance: Option<f64>,
    pub align_edge: Option<AlignEdge>,
    pub closeby_tolerance: Option<[f64; 2]>,
}

impl Edge {
    pub fn new(source: usize, target: usize, kind: EdgeType) -> Self {
        Self {
            source,
            target,
            kind,
            distance: None,
            align_edge: None,
            closeby_tolerance: None,
        }
    }

    pub fn with_distance(mut self, distance: f64) -> Self {
        self.distance = Some(distance);
        self
    }

    pub fn with_align_edge(mut self, align_edge: AlignEdge) -> Self {
        self.align_edge = Some(align_edge);
        self
    }

    pub fn with_closeby_tolerance(mut self, tolerance: [f64; 2]) -> Self {
        self.closeby_tolerance = Some(tolerance);
        self
    }

    pub fn tolerance_or_zero(&self) -> [f64; 2] {
        self.closeby_tolerance.unwrap_or([0.0, 0.0])
    }
}

/// Arena backed multigraph. A vertex id is its index in `vertices`.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    pub vertices: Vec<Vertex>,
    pub edges: Vec<Edge>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, label: impl Into<String>) -> usize {
        let id = self.vertices.len();
        self.vertices.push(Vertex::new(id, label));
        id
    }

    pub fn add_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    pub fn vertex(&self, id: usize) -> &Vertex {
        &self.vertices[id]
    }

    pub fn vertex_mut(&mut self, id: usize) -> &mut Vertex {
        &mut self.vertices[id]
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn edges_of(&self, kind: EdgeType) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |edge| edge.kind == kind)
    }

    /// Out-neighbour lists restricted to one relation type.
    pub fn adjacency(&self, kind: EdgeType) -> Vec<Vec<usize>> {
        let mut adjacency = vec![Vec::new(); self.vertices.len()];
        for edge in self.edges_of(kind) {
            adjacency[edge.source].push(edge.target);
        }
        adjacency
    }

    pub fn vertex_by_label(&self, label: &str) -> Option<&Vertex> {
        self.vertices.iter().find(|vertex| vertex.label == label)
    }

    /// Rejects graphs the later stages would otherwise misindex.
    pub fn validate(&self, boundary: &Boundary) -> Result<()> {
        let count = self.vertices.len();
        for (index, vertex) in self.vertices.iter().enumerate() {
            if vertex.id != index {
                return Err(config_error(format!(
                    "vertex '{}' has id {} but sits at index {index}",
                    vertex.label, vertex.id
                )));
            }
            if let Some(pin) = vertex.boundary {
                if boundary.walls.is_empty() {
                    return Err(config_error(format!(
                        "vertex '{}' is pinned to wall {pin} but the boundary has no wall segments",
                        vertex.label
                    )));
                }
                if pin >= boundary.walls.len() {
                    return Err(config_error(format!(
                        "vertex '{}' is pinned to wall {pin}, boundary has {} walls",
                        vertex.label,
                        boundary.walls.len()
                    )));
                }
            }
            for band in [vertex.position, vertex.size].into_iter().flatten() {
                if band.tolerance.iter().any(|t| *t < 0.0 || !t.is_finite())
                    || band.target.iter().any(|t| !t.is_finite())
                {
                    return Err(config_error(format!(
                        "vertex '{}' has a non-finite target or negative tolerance",
                        vertex.label
                    )));
                }
            }
        }
        for edge in &self.edges {
            if edge.source >= count || edge.target >= count {
                return Err(config_error(format!(
                    "{} edge {} -> {} references a missing vertex",
                    edge.kind.as_str(),
                    edge.source,
                    edge.target
                )));
            }
            if let Some(distance) = edge.distance {
                if distance < 0.0 || !distance.is_finite() {
                    return Err(config_error(format!(
                        "{} edge {} -> {} has invalid distance {distance}",
                        edge.kind.as_str(),
                        edge.source,
                        edge.target
                    )));
                }
            }
            if edge.kind == EdgeType::AlignWith && edge.align_edge.is_none() {
                return Err(config_error(format!(
                    "AlignWith edge {} -> {} has no alignment face",
                    edge.source, edge.target
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orientation_opposites_are_involutions() {
        for orientation in Orientation::ALL {
            assert_eq!(orientation.opposite().opposite(), orientation);
            assert_ne!(orientation.opposite(), orientation);
        }
    }

    #[test]
    fn parses_relation_name_variants() {
        assert_eq!(EdgeType::parse("LeftOf"), Some(EdgeType::LeftOf));
        assert_eq!(EdgeType::parse("left_of"), Some(EdgeType::LeftOf));
        assert_eq!(EdgeType::parse("Close by"), Some(EdgeType::CloseBy));
        assert_eq!(EdgeType::parse("BEHIND"), Some(EdgeType::Behind));
        assert_eq!(EdgeType::parse("Sideways"), None);
        assert_eq!(Orientation::parse("left"), Some(Orientation::Left));
    }

    #[test]
    fn reversal_targets_are_canonical() {
        for kind in EdgeType::DIRECTIONAL {
            match kind.reversed() {
                Some(canonical) => {
                    assert!(EdgeType::CANONICAL.contains(&canonical));
                    assert_eq!(canonical.axis(), kind.axis());
                }
                None => assert!(EdgeType::CANONICAL.contains(&kind)),
            }
        }
    }

    #[test]
    fn align_edge_indices_round_trip() {
        for index in 0..6 {
            let edge = AlignEdge::from_index(index).unwrap();
            assert_eq!(edge.index(), index);
        }
        assert!(AlignEdge::from_index(6).is_none());
    }

    #[test]
    fn validate_rejects_pin_without_walls() {
        let mut graph = SceneGraph::new();
        let id = graph.add_vertex("bed");
        graph.vertex_mut(id).boundary = Some(0);
        let boundary = Boundary {
            origin: [0.0; 3],
            size: [1.0, 1.0, 1.0],
            points: Vec::new(),
            walls: Vec::new(),
        };
        assert!(graph.validate(&boundary).is_err());
    }

    #[test]
    fn validate_rejects_dangling_edge() {
        let mut graph = SceneGraph::new();
        graph.add_vertex("a");
        graph.add_edge(Edge::new(0, 3, EdgeType::LeftOf));
        let boundary = Boundary::rectangle([0.0; 3], [1.0, 1.0, 1.0]);
        assert!(graph.validate(&boundary).is_err());
    }
}
