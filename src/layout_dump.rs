use crate::geometry::{Boundary, Obstacle};
use crate::ir::SceneGraph;
use crate::pipeline::SolveReport;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub status: String,
    pub objective: Option<f64>,
    pub vertices: Vec<VertexDump>,
    pub boundary: BoundaryDump,
    pub obstacles: Vec<Obstacle>,
    pub infeasible_constraints: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct VertexDump {
    pub id: usize,
    pub label: String,
    pub orientation: String,
    /// `None` when the solve produced no layout.
    pub pos: Option<[f64; 3]>,
    pub size: Option<[f64; 3]>,
}

#[derive(Debug, Serialize)]
pub struct BoundaryDump {
    pub origin: [f64; 3],
    pub size: [f64; 3],
    pub points: Vec<[f64; 2]>,
    pub walls: Vec<WallDump>,
}

#[derive(Debug, Serialize)]
pub struct WallDump {
    pub start: [f64; 2],
    pub end: [f64; 2],
    pub orientation: String,
}

impl LayoutDump {
    pub fn from_graph(graph: &SceneGraph, boundary: &Boundary, obstacles: &[Obstacle]) -> Self {
        let vertices = graph
            .vertices
            .iter()
            .map(|vertex| VertexDump {
                id: vertex.id,
                label: vertex.label.clone(),
                orientation: vertex.orientation.as_str().to_string(),
                pos: vertex.placement.map(|p| p.pos),
                size: vertex.placement.map(|p| p.size),
            })
            .collect();

        let walls = (0..boundary.walls.len())
            .filter_map(|index| boundary.wall(index))
            .map(|wall| WallDump {
                start: wall.start,
                end: wall.end,
                orientation: wall.orientation.as_str().to_string(),
            })
            .collect();

        LayoutDump {
            status: String::new(),
            objective: None,
            vertices,
            boundary: BoundaryDump {
                origin: boundary.origin,
                size: boundary.size,
                points: boundary.points.clone(),
                walls,
            },
            obstacles: obstacles.to_vec(),
            infeasible_constraints: Vec::new(),
        }
    }

    pub fn from_report(report: &SolveReport, boundary: &Boundary) -> Self {
        let mut dump = Self::from_graph(&report.graph, boundary, &report.obstacles);
        dump.status = report.status.to_string();
        dump.objective = report.objective;
        dump.infeasible_constraints = report
            .infeasibility
            .as_ref()
            .map(|iis| iis.constraints.clone())
            .unwrap_or_default();
        dump
    }
}

pub fn write_layout_dump(path: &Path, report: &SolveReport, boundary: &Boundary) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_report(report, boundary);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Placement;

    #[test]
    fn dumps_placements_and_walls() {
        let mut graph = SceneGraph::new();
        let bed = graph.add_vertex("bed");
        graph.add_vertex("lamp");
        graph.vertex_mut(bed).placement = Some(Placement {
            pos: [1.0, 1.0, 0.25],
            size: [2.0, 1.5, 0.5],
        });
        let boundary = Boundary::rectangle([0.0; 3], [4.0, 3.0, 2.5]);
        let dump = LayoutDump::from_graph(&graph, &boundary, &[]);

        assert_eq!(dump.vertices[0].pos, Some([1.0, 1.0, 0.25]));
        assert_eq!(dump.vertices[1].size, None);
        assert_eq!(dump.boundary.walls.len(), 4);
        assert_eq!(dump.boundary.walls[3].orientation, "LEFT");

        let json = serde_json::to_value(&dump).unwrap();
        assert_eq!(json["vertices"][0]["label"], "bed");
        assert_eq!(json["vertices"][0]["orientation"], "FRONT");
    }
}
