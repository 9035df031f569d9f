use tracing::{debug, warn};

use crate::ir::{Placement, SceneGraph, Vertex};
use crate::model::{Model, Solution};
use crate::solver::SolveOutcome;

/// Writes solved geometry into every vertex. Returns how many were placed.
///
/// Nothing is written unless the outcome carries a usable assignment, so an
/// infeasible or failed solve leaves the graph as it was.
pub fn extract(model: &Model, outcome: &SolveOutcome, graph: &mut SceneGraph, floorplan: bool) -> usize {
    let Some(solution) = outcome.usable_solution() else {
        warn!(status = %outcome.status, "no usable solution, layout left unresolved");
        return 0;
    };
    let mut placed = 0;
    for vertex in &mut graph.vertices {
        match read_placement(model, solution, vertex, floorplan) {
            Some(placement) => {
                vertex.placement = Some(placement);
                placed += 1;
            }
            None => warn!(vertex = vertex.id, label = %vertex.label, "missing variables for vertex"),
        }
    }
    debug!(placed, "extracted placements");
    placed
}

fn read_placement(model: &Model, solution: &Solution, vertex: &Vertex, floorplan: bool) -> Option<Placement> {
    let id = vertex.id;
    let read = |prefix: &str| solution.value_by_name(model, &format!("{prefix}_{id}"));
    let (z, h) = if floorplan {
        let height = vertex.size.map(|band| band.target[2]).unwrap_or(0.0);
        (height / 2.0, height)
    } else {
        (read("z")?, read("h")?)
    };
    Some(Placement {
        pos: [read("x")?, read("y")?, z],
        size: [read("l")?, read("w")?, h],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Band;
    use crate::solver::SolveStatus;

    fn solved(floorplan: bool) -> (Model, SolveOutcome) {
        let mut model = Model::new();
        let mut values = Vec::new();
        let names: &[&str] = if floorplan { &["x", "y", "l", "w"] } else { &["x", "y", "z", "l", "w", "h"] };
        for (k, prefix) in names.iter().enumerate() {
            model.add_continuous_var(0.0, 10.0, format!("{prefix}_0"));
            values.push(k as f64 + 1.0);
        }
        let outcome = SolveOutcome {
            status: SolveStatus::Optimal,
            solution: Some(Solution::new(values)),
            objective: Some(0.0),
        };
        (model, outcome)
    }

    #[test]
    fn reads_values_by_name() {
        let (model, outcome) = solved(false);
        let mut graph = SceneGraph::new();
        graph.add_vertex("desk");
        assert_eq!(extract(&model, &outcome, &mut graph, false), 1);
        let placement = graph.vertices[0].placement.unwrap();
        assert_eq!(placement.pos, [1.0, 2.0, 3.0]);
        assert_eq!(placement.size, [4.0, 5.0, 6.0]);
    }

    #[test]
    fn floorplan_defaults_vertical_axis_from_target_height() {
        let (model, outcome) = solved(true);
        let mut graph = SceneGraph::new();
        let room = graph.add_vertex("kitchen");
        graph.vertex_mut(room).size = Some(Band::new([3.0, 3.0, 2.8], [1.0, 1.0, 0.0]));
        extract(&model, &outcome, &mut graph, true);
        let placement = graph.vertices[0].placement.unwrap();
        assert_eq!(placement.pos, [1.0, 2.0, 1.4]);
        assert_eq!(placement.size, [3.0, 4.0, 2.8]);
    }

    #[test]
    fn infeasible_outcome_writes_nothing() {
        let (model, mut outcome) = solved(false);
        outcome.status = SolveStatus::Infeasible;
        let mut graph = SceneGraph::new();
        graph.add_vertex("desk");
        assert_eq!(extract(&model, &outcome, &mut graph, false), 0);
        assert!(graph.vertices[0].placement.is_none());
    }
}
