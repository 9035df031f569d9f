//! Graphviz export of a scene graph, input or solved.

use std::fmt::Write as _;
use std::path::Path;

use crate::ir::{Edge, EdgeType, SceneGraph, Vertex};

fn colour(kind: EdgeType) -> &'static str {
    match kind {
        EdgeType::LeftOf => "red",
        EdgeType::RightOf => "blue",
        EdgeType::FrontOf => "green",
        EdgeType::Behind => "orange",
        EdgeType::Above => "purple",
        EdgeType::Under => "brown",
        EdgeType::CloseBy => "cyan",
        EdgeType::AlignWith => "magenta",
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn fmt3(v: [f64; 3]) -> String {
    format!("{:.2}, {:.2}, {:.2}", v[0], v[1], v[2])
}

fn vertex_label(vertex: &Vertex) -> String {
    let mut label = format!("{} ({})\\npriority {}  {}", escape(&vertex.label), vertex.id, vertex.priority, vertex.orientation.as_str());
    if let Some(size) = vertex.size {
        let _ = write!(label, "\\nsize [{}]", fmt3(size.target));
    }
    if let Some(pin) = vertex.boundary {
        let _ = write!(label, "\\nwall {pin}");
    }
    if let Some(placement) = vertex.placement {
        let _ = write!(label, "\\npos [{}]\\nsolved [{}]", fmt3(placement.pos), fmt3(placement.size));
    }
    label
}

fn edge_label(edge: &Edge) -> String {
    let mut label = edge.kind.label().to_string();
    match edge.kind {
        EdgeType::AlignWith => {
            if let Some(face) = edge.align_edge {
                let _ = write!(label, " ({})", face.as_str());
            }
        }
        EdgeType::CloseBy => {
            let [x, y] = edge.tolerance_or_zero();
            let _ = write!(label, " ({x:.2}, {y:.2})");
        }
        _ => {
            if let Some(distance) = edge.distance {
                let _ = write!(label, " {distance:.2}");
            }
        }
    }
    label
}

pub fn to_dot(graph: &SceneGraph) -> String {
    let mut out = String::from("digraph scene {\n  node [shape=box];\n");
    for vertex in &graph.vertices {
        let _ = writeln!(out, "  {} [label=\"{}\"];", vertex.id, vertex_label(vertex));
    }
    for edge in &graph.edges {
        let _ = writeln!(
            out,
            "  {} -> {} [label=\"{}\", color={}];",
            edge.source,
            edge.target,
            edge_label(edge),
            colour(edge.kind)
        );
    }
    out.push_str("}\n");
    out
}

pub fn write_dot(path: &Path, graph: &SceneGraph) -> std::io::Result<()> {
    std::fs::write(path, to_dot(graph))
}
