//! Scene description loader.
//!
//! Accepts JSON and JSON5. Vertex ids are their position in `vertices`; edge
//! endpoints may name a vertex by label or by index.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, scene_error};
use crate::geometry::{Boundary, Obstacle, Opening, derive_wall_orientations};
use crate::ir::{AlignEdge, Band, Edge, EdgeType, Orientation, SceneGraph, Vertex};

/// Everything one solve request needs.
#[derive(Debug, Clone)]
pub struct Scene {
    pub graph: SceneGraph,
    pub boundary: Boundary,
    pub obstacles: Vec<Obstacle>,
    pub doors: Vec<Opening>,
    pub windows: Vec<Opening>,
}

impl Scene {
    pub fn new(graph: SceneGraph, boundary: Boundary) -> Self {
        Self {
            graph,
            boundary,
            obstacles: Vec::new(),
            doors: Vec::new(),
            windows: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SceneFile {
    boundary: BoundaryFile,
    #[serde(default)]
    obstacles: Vec<ObstacleFile>,
    #[serde(default)]
    doors: Vec<OpeningFile>,
    #[serde(default)]
    windows: Vec<OpeningFile>,
    #[serde(default)]
    vertices: Vec<VertexFile>,
    #[serde(default)]
    edges: Vec<EdgeFile>,
}

#[derive(Debug, Deserialize)]
struct BoundaryFile {
    origin: Vec<f64>,
    size: Vec<f64>,
    #[serde(default)]
    points: Vec<[f64; 2]>,
    orientations: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ObstacleFile {
    pos: Vec<f64>,
    size: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct OpeningFile {
    orientation: String,
    pos: Vec<f64>,
    size: Vec<f64>,
    obstacle_pos: Vec<f64>,
    obstacle_size: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct VertexFile {
    label: String,
    #[serde(default)]
    priority: i32,
    /// Wall index; negative means unpinned.
    boundary: Option<i64>,
    #[serde(default)]
    on_floor: bool,
    orientation: Option<String>,
    target_pos: Option<Vec<f64>>,
    pos_tolerance: Option<Vec<f64>>,
    target_size: Option<Vec<f64>>,
    size_tolerance: Option<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VertexRef {
    Index(usize),
    Label(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AlignRef {
    Index(u8),
    Name(String),
}

#[derive(Debug, Deserialize)]
struct EdgeFile {
    source: VertexRef,
    target: VertexRef,
    #[serde(rename = "type")]
    kind: String,
    distance: Option<f64>,
    align_edge: Option<AlignRef>,
    closeby_tolerance: Option<[f64; 2]>,
}

pub fn load_scene(path: &Path) -> Result<Scene> {
    let contents = std::fs::read_to_string(path)?;
    let is_json5 = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json5"))
        .unwrap_or(false);
    if is_json5 {
        parse_scene_json5(&contents)
    } else {
        parse_scene(&contents)
    }
}

pub fn parse_scene(input: &str) -> Result<Scene> {
    let file: SceneFile = serde_json::from_str(input)?;
    build_scene(file)
}

pub fn parse_scene_json5(input: &str) -> Result<Scene> {
    let file: SceneFile = json5::from_str(input)?;
    build_scene(file)
}

fn build_scene(file: SceneFile) -> Result<Scene> {
    let boundary = build_boundary(file.boundary)?;
    let obstacles = file
        .obstacles
        .into_iter()
        .map(|o| {
            Ok(Obstacle {
                pos: vector3("obstacle pos", &o.pos)?,
                size: vector3("obstacle size", &o.size)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let doors = file.doors.into_iter().map(build_opening).collect::<Result<Vec<_>>>()?;
    let windows = file.windows.into_iter().map(build_opening).collect::<Result<Vec<_>>>()?;

    let mut graph = SceneGraph::new();
    let mut labels: HashMap<String, usize> = HashMap::new();
    for raw in file.vertices {
        let id = graph.add_vertex(raw.label.clone());
        if labels.insert(raw.label.clone(), id).is_some() {
            return Err(scene_error(format!("duplicate vertex label '{}'", raw.label)));
        }
        fill_vertex(graph.vertex_mut(id), raw)?;
    }

    for (index, raw) in file.edges.into_iter().enumerate() {
        let kind = EdgeType::parse(&raw.kind)
            .ok_or_else(|| scene_error(format!("edge {index}: unknown relation '{}'", raw.kind)))?;
        let source = resolve(&raw.source, &labels, graph.len(), index)?;
        let target = resolve(&raw.target, &labels, graph.len(), index)?;
        let mut edge = Edge::new(source, target, kind);
        edge.distance = raw.distance;
        edge.closeby_tolerance = raw.closeby_tolerance;
        edge.align_edge = match raw.align_edge {
            None => None,
            Some(AlignRef::Index(code)) => Some(AlignEdge::from_index(code).ok_or_else(|| {
                scene_error(format!("edge {index}: align_edge {code} is out of range"))
            })?),
            Some(AlignRef::Name(name)) => Some(AlignEdge::parse(&name).ok_or_else(|| {
                scene_error(format!("edge {index}: unknown align_edge '{name}'"))
            })?),
        };
        graph.add_edge(edge);
    }

    debug!(
        vertices = graph.len(),
        edges = graph.edges.len(),
        walls = boundary.walls.len(),
        "scene parsed"
    );
    Ok(Scene {
        graph,
        boundary,
        obstacles,
        doors,
        windows,
    })
}

fn build_boundary(raw: BoundaryFile) -> Result<Boundary> {
    let origin = vector3("boundary origin", &raw.origin)?;
    let size = vector3("boundary size", &raw.size)?;
    if raw.points.is_empty() {
        return Ok(Boundary::rectangle(origin, size));
    }
    let walls = match raw.orientations {
        Some(names) => names
            .iter()
            .map(|name| orientation(name))
            .collect::<Result<Vec<_>>>()?,
        None => derive_wall_orientations(&raw.points)?,
    };
    if walls.len() != raw.points.len() {
        return Err(scene_error(format!(
            "boundary has {} points but {} orientations",
            raw.points.len(),
            walls.len()
        )));
    }
    Boundary::new(origin, size, raw.points, walls)
}

fn build_opening(raw: OpeningFile) -> Result<Opening> {
    Ok(Opening {
        orientation: orientation(&raw.orientation)?,
        pos: vector3("opening pos", &raw.pos)?,
        size: vector3("opening size", &raw.size)?,
        obstacle_pos: vector3("opening obstacle_pos", &raw.obstacle_pos)?,
        obstacle_size: vector3("opening obstacle_size", &raw.obstacle_size)?,
    })
}

fn fill_vertex(vertex: &mut Vertex, raw: VertexFile) -> Result<()> {
    let label = raw.label;
    vertex.priority = raw.priority;
    vertex.on_floor = raw.on_floor;
    vertex.boundary = raw.boundary.and_then(|pin| usize::try_from(pin).ok());
    if let Some(name) = raw.orientation.as_deref() {
        vertex.orientation = orientation(name)?;
    }
    vertex.position = band(&label, "target_pos", raw.target_pos, "pos_tolerance", raw.pos_tolerance)?;
    vertex.size = band(&label, "target_size", raw.target_size, "size_tolerance", raw.size_tolerance)?;
    Ok(())
}

fn band(
    label: &str,
    target_name: &str,
    target: Option<Vec<f64>>,
    tolerance_name: &str,
    tolerance: Option<Vec<f64>>,
) -> Result<Option<Band>> {
    match (target, tolerance) {
        (None, None) => Ok(None),
        (Some(target), Some(tolerance)) => Ok(Some(Band::new(
            vector3(target_name, &target)?,
            vector3(tolerance_name, &tolerance)?,
        ))),
        (Some(_), None) => Err(scene_error(format!(
            "vertex '{label}' has {target_name} without {tolerance_name}"
        ))),
        (None, Some(_)) => Err(scene_error(format!(
            "vertex '{label}' has {tolerance_name} without {target_name}"
        ))),
    }
}

fn resolve(reference: &VertexRef, labels: &HashMap<String, usize>, count: usize, edge: usize) -> Result<usize> {
    match reference {
        VertexRef::Index(index) if *index < count => Ok(*index),
        VertexRef::Index(index) => Err(scene_error(format!(
            "edge {edge}: vertex index {index} out of range ({count} vertices)"
        ))),
        VertexRef::Label(label) => labels
            .get(label)
            .copied()
            .ok_or_else(|| scene_error(format!("edge {edge}: unknown vertex '{label}'"))),
    }
}

fn orientation(name: &str) -> Result<Orientation> {
    Orientation::parse(name).ok_or_else(|| scene_error(format!("unknown orientation '{name}'")))
}

/// 2-vectors are padded with 0 on the vertical axis.
fn vector3(what: &str, values: &[f64]) -> Result<[f64; 3]> {
    match values {
        [x, y] => Ok([*x, *y, 0.0]),
        [x, y, z] => Ok([*x, *y, *z]),
        _ => Err(scene_error(format!(
            "{what} needs 2 or 3 components, got {}",
            values.len()
        ))),
    }
}
