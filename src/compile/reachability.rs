use crate::ir::{EdgeType, SceneGraph};

/// Depth-first search from `from` following only `kind` edges.
pub fn has_path_of(graph: &SceneGraph, kind: EdgeType, from: usize, to: usize) -> bool {
    let adjacency = graph.adjacency(kind);
    let mut visited = vec![false; graph.len()];
    let mut stack = vec![from];
    while let Some(v) = stack.pop() {
        if v == to {
            return true;
        }
        if std::mem::replace(&mut visited[v], true) {
            continue;
        }
        stack.extend(adjacency[v].iter().copied().filter(|w| !visited[*w]));
    }
    false
}

/// True when `u` reaches `v` through edges of a single directional type.
/// Mixing types along the walk does not count.
pub fn has_path(graph: &SceneGraph, u: usize, v: usize) -> bool {
    EdgeType::DIRECTIONAL
        .iter()
        .any(|kind| has_path_of(graph, *kind, u, v))
}

/// Per-type transitive closure, computed once and queried per vertex pair.
#[derive(Debug, Clone)]
pub struct Reachability {
    reach: Vec<Vec<bool>>,
}

impl Reachability {
    pub fn new(graph: &SceneGraph) -> Self {
        Self::for_kinds(graph, &EdgeType::DIRECTIONAL)
    }

    pub fn for_kinds(graph: &SceneGraph, kinds: &[EdgeType]) -> Self {
        let n = graph.len();
        let mut reach = vec![vec![false; n]; n];
        for kind in kinds {
            let adjacency = graph.adjacency(*kind);
            for (start, row) in reach.iter_mut().enumerate() {
                let mut visited = vec![false; n];
                let mut stack = vec![start];
                while let Some(v) = stack.pop() {
                    if std::mem::replace(&mut visited[v], true) {
                        continue;
                    }
                    row[v] = true;
                    stack.extend(adjacency[v].iter().copied().filter(|w| !visited[*w]));
                }
            }
        }
        Self { reach }
    }

    pub fn reaches(&self, u: usize, v: usize) -> bool {
        self.reach[u][v]
    }

    /// Either vertex reaches the other.
    pub fn ordered(&self, u: usize, v: usize) -> bool {
        self.reaches(u, v) || self.reaches(v, u)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Edge;

    fn chain() -> SceneGraph {
        let mut graph = SceneGraph::new();
        for i in 0..5 {
            graph.add_vertex(format!("v{i}"));
        }
        graph.add_edge(Edge::new(0, 1, EdgeType::LeftOf));
        graph.add_edge(Edge::new(1, 2, EdgeType::LeftOf));
        graph.add_edge(Edge::new(2, 3, EdgeType::FrontOf));
        graph.add_edge(Edge::new(4, 3, EdgeType::RightOf));
        graph.add_edge(Edge::new(3, 4, EdgeType::CloseBy));
        graph
    }

    #[test]
    fn finds_single_type_paths() {
        let graph = chain();
        assert!(has_path(&graph, 0, 2));
        assert!(has_path(&graph, 4, 3));
        assert!(!has_path(&graph, 2, 0));
    }

    #[test]
    fn cross_type_walks_do_not_count() {
        let graph = chain();
        // 0 -LeftOf-> 2 -FrontOf-> 3 mixes types.
        assert!(!has_path(&graph, 0, 3));
        // CloseBy is not directional.
        assert!(!has_path(&graph, 3, 4));
    }

    #[test]
    fn disconnected_vertices_have_no_path() {
        let mut graph = chain();
        let lonely = graph.add_vertex("lonely");
        for v in 0..lonely {
            assert!(!has_path(&graph, v, lonely));
            assert!(!has_path(&graph, lonely, v));
        }
    }

    #[test]
    fn closure_agrees_with_depth_first_queries() {
        let graph = chain();
        let closure = Reachability::new(&graph);
        for u in 0..graph.len() {
            for v in 0..graph.len() {
                if u != v {
                    assert_eq!(closure.reaches(u, v), has_path(&graph, u, v), "{u} -> {v}");
                }
            }
        }
    }
}
