use proptest::prelude::*;

use scene_layout_rs::geometry::Boundary;
use scene_layout_rs::ir::{AlignEdge, Band, Edge, EdgeType, SceneGraph};
use scene_layout_rs::preprocess::{has_cycle, normalize};

fn room() -> Boundary {
    Boundary::rectangle([0.0; 3], [4.0, 4.0, 2.5])
}

fn arb_graph() -> impl Strategy<Value = SceneGraph> {
    (2usize..8).prop_flat_map(|n| {
        let edge = (0..n, 0..n, 0usize..EdgeType::ALL.len(), proptest::option::of(0.0f64..1.0));
        let vertex = (proptest::bool::ANY, proptest::bool::ANY);
        (
            proptest::collection::vec(vertex, n),
            proptest::collection::vec(edge, 0..(3 * n)),
        )
            .prop_map(|(vertices, edges)| {
                let mut graph = SceneGraph::new();
                for (i, (with_pos, with_size)) in vertices.into_iter().enumerate() {
                    let id = graph.add_vertex(format!("v{i}"));
                    let vertex = graph.vertex_mut(id);
                    if with_pos {
                        vertex.position = Some(Band::new([2.0, 2.0, 0.5], [0.5, 0.5, 0.5]));
                    }
                    if with_size {
                        vertex.size = Some(Band::new([0.5, 0.5, 0.5], [0.1, 0.1, 0.1]));
                    }
                }
                for (source, target, kind, distance) in edges {
                    let mut edge = Edge::new(source, target, EdgeType::ALL[kind]);
                    edge.distance = distance;
                    if edge.kind == EdgeType::AlignWith {
                        edge.align_edge = Some(AlignEdge::Back);
                    }
                    graph.add_edge(edge);
                }
                graph
            })
    })
}

proptest! {
    #[test]
    fn normalized_graphs_are_acyclic_per_type(graph in arb_graph()) {
        let normalized = normalize(&graph, &room(), &[]).unwrap();
        for kind in EdgeType::CANONICAL {
            prop_assert!(!has_cycle(&normalized, kind), "{kind:?} cycle survived");
        }
    }

    #[test]
    fn opposite_relations_are_folded(graph in arb_graph()) {
        let normalized = normalize(&graph, &room(), &[]).unwrap();
        for edge in &normalized.edges {
            prop_assert!(edge.kind.reversed().is_none(), "{:?} left in graph", edge.kind);
        }
        // Every surviving edge comes from an input edge, reversed or not.
        for edge in &normalized.edges {
            let origin = graph.edges.iter().any(|input| {
                let same = input.source == edge.source && input.target == edge.target && input.kind == edge.kind;
                let flipped = input.source == edge.target
                    && input.target == edge.source
                    && input.kind.reversed() == Some(edge.kind);
                (same || flipped) && input.distance == edge.distance
            });
            prop_assert!(origin);
        }
    }

    #[test]
    fn bands_stay_paired(graph in arb_graph()) {
        let normalized = normalize(&graph, &room(), &[]).unwrap();
        prop_assert_eq!(normalized.len(), graph.len());
        for vertex in &normalized.vertices {
            if let Some(band) = vertex.position {
                prop_assert!(band.tolerance.iter().all(|t| *t >= 0.0));
            }
            if let Some(band) = vertex.size {
                prop_assert!(band.tolerance.iter().all(|t| *t >= 0.0));
            }
        }
    }
}
