use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ir::{EdgeType, SceneGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleRemoval {
    /// One edge per strongly connected component, no recheck.
    SinglePass,
    /// Repeat single passes until the relation subgraph is acyclic.
    #[default]
    FixedPoint,
}

/// Tarjan's algorithm. Returns the component index of every vertex.
pub fn strongly_connected_components(adjacency: &[Vec<usize>]) -> Vec<usize> {
    struct Tarjan<'a> {
        adjacency: &'a [Vec<usize>],
        index: Vec<Option<usize>>,
        lowlink: Vec<usize>,
        on_stack: Vec<bool>,
        stack: Vec<usize>,
        component: Vec<usize>,
        next_index: usize,
        next_component: usize,
    }

    impl Tarjan<'_> {
        fn visit(&mut self, v: usize) {
            self.index[v] = Some(self.next_index);
            self.lowlink[v] = self.next_index;
            self.next_index += 1;
            self.stack.push(v);
            self.on_stack[v] = true;

            let adjacency = self.adjacency;
            for &w in &adjacency[v] {
                match self.index[w] {
                    None => {
                        self.visit(w);
                        self.lowlink[v] = self.lowlink[v].min(self.lowlink[w]);
                    }
                    Some(w_index) if self.on_stack[w] => {
                        self.lowlink[v] = self.lowlink[v].min(w_index);
                    }
                    Some(_) => {}
                }
            }

            if Some(self.lowlink[v]) == self.index[v] {
                while let Some(w) = self.stack.pop() {
                    self.on_stack[w] = false;
                    self.component[w] = self.next_component;
                    if w == v {
                        break;
                    }
                }
                self.next_component += 1;
            }
        }
    }

    let count = adjacency.len();
    let mut tarjan = Tarjan {
        adjacency,
        index: vec![None; count],
        lowlink: vec![0; count],
        on_stack: vec![false; count],
        stack: Vec::new(),
        component: vec![0; count],
        next_index: 0,
        next_component: 0,
    };
    for v in 0..count {
        if tarjan.index[v].is_none() {
            tarjan.visit(v);
        }
    }
    tarjan.component
}

/// Deletes the first edge of `kind` inside every component that has one.
/// Self-loops count as component-internal. Returns the number of edges removed.
fn remove_one_per_component(graph: &mut SceneGraph, kind: EdgeType) -> usize {
    let component = strongly_connected_components(&graph.adjacency(kind));
    let mut seen = vec![false; graph.len()];
    let mut doomed = Vec::new();
    for (index, edge) in graph.edges.iter().enumerate() {
        if edge.kind != kind {
            continue;
        }
        let c = component[edge.source];
        if c == component[edge.target] && !seen[c] {
            seen[c] = true;
            doomed.push(index);
        }
    }
    for &index in doomed.iter().rev() {
        let edge = graph.edges.remove(index);
        debug!(
            kind = kind.as_str(),
            source = edge.source,
            target = edge.target,
            "removed edge closing a cycle"
        );
    }
    doomed.len()
}

pub fn remove_cycles(graph: &mut SceneGraph, kind: EdgeType, mode: CycleRemoval) -> usize {
    match mode {
        CycleRemoval::SinglePass => remove_one_per_component(graph, kind),
        CycleRemoval::FixedPoint => {
            let mut total = 0;
            loop {
                let removed = remove_one_per_component(graph, kind);
                if removed == 0 {
                    return total;
                }
                total += removed;
            }
        }
    }
}

/// True when the subgraph of `kind` edges has a directed cycle (self-loops included).
pub fn has_cycle(graph: &SceneGraph, kind: EdgeType) -> bool {
    let component = strongly_connected_components(&graph.adjacency(kind));
    graph
        .edges_of(kind)
        .any(|edge| component[edge.source] == component[edge.target])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Edge;

    fn graph_with(count: usize, edges: &[(usize, usize)]) -> SceneGraph {
        let mut graph = SceneGraph::new();
        for i in 0..count {
            graph.add_vertex(format!("v{i}"));
        }
        for &(s, t) in edges {
            graph.add_edge(Edge::new(s, t, EdgeType::LeftOf));
        }
        graph
    }

    #[test]
    fn components_group_cycle_members() {
        let graph = graph_with(4, &[(0, 1), (1, 2), (2, 0), (2, 3)]);
        let component = strongly_connected_components(&graph.adjacency(EdgeType::LeftOf));
        assert_eq!(component[0], component[1]);
        assert_eq!(component[1], component[2]);
        assert_ne!(component[2], component[3]);
    }

    #[test]
    fn breaks_three_cycle_with_one_removal() {
        let mut graph = graph_with(3, &[(0, 1), (1, 2), (2, 0)]);
        let removed = remove_cycles(&mut graph, EdgeType::LeftOf, CycleRemoval::SinglePass);
        assert_eq!(removed, 1);
        assert_eq!(graph.edges.len(), 2);
        assert!(!has_cycle(&graph, EdgeType::LeftOf));
    }

    #[test]
    fn single_pass_can_leave_shared_vertex_cycles() {
        // Two cycles through vertex 0; removing the first edge only breaks one.
        let edges = [(0, 1), (1, 0), (0, 2), (2, 0)];
        let mut single = graph_with(3, &edges);
        remove_cycles(&mut single, EdgeType::LeftOf, CycleRemoval::SinglePass);
        assert!(has_cycle(&single, EdgeType::LeftOf));

        let mut fixed = graph_with(3, &edges);
        let removed = remove_cycles(&mut fixed, EdgeType::LeftOf, CycleRemoval::FixedPoint);
        assert_eq!(removed, 2);
        assert!(!has_cycle(&fixed, EdgeType::LeftOf));
    }

    #[test]
    fn self_loops_are_removed() {
        let mut graph = graph_with(2, &[(0, 0), (0, 1)]);
        remove_cycles(&mut graph, EdgeType::LeftOf, CycleRemoval::FixedPoint);
        assert_eq!(graph.edges, vec![Edge::new(0, 1, EdgeType::LeftOf)]);
    }

    #[test]
    fn other_relation_types_are_untouched() {
        let mut graph = graph_with(2, &[(0, 1), (1, 0)]);
        graph.add_edge(Edge::new(0, 1, EdgeType::FrontOf));
        graph.add_edge(Edge::new(1, 0, EdgeType::FrontOf));
        remove_cycles(&mut graph, EdgeType::LeftOf, CycleRemoval::FixedPoint);
        assert_eq!(graph.edges_of(EdgeType::FrontOf).count(), 2);
        assert!(has_cycle(&graph, EdgeType::FrontOf));
    }
}
