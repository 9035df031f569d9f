use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;
use scene_layout_rs::compile::{CompileOptions, compile};
use scene_layout_rs::geometry::Boundary;
use scene_layout_rs::ir::{Band, Edge, EdgeType, SceneGraph};
use scene_layout_rs::model::Model;
use scene_layout_rs::preprocess::{normalize, split4};
use std::hint::black_box;

fn furnished_room(vertices: usize) -> SceneGraph {
    let mut graph = SceneGraph::new();
    for i in 0..vertices {
        let id = graph.add_vertex(format!("item{i}"));
        let vertex = graph.vertex_mut(id);
        vertex.size = Some(Band::new([0.6, 0.5, 0.8], [0.1, 0.1, 0.1]));
        if i % 3 == 0 {
            vertex.position = Some(Band::new([1.0 + i as f64 * 0.2, 2.0, 0.4], [0.5, 0.5, 0.1]));
        }
    }
    let kinds = [EdgeType::LeftOf, EdgeType::Behind, EdgeType::RightOf, EdgeType::CloseBy];
    for i in 0..vertices.saturating_sub(1) {
        let kind = kinds[i % kinds.len()];
        let mut edge = Edge::new(i, i + 1, kind);
        if kind == EdgeType::CloseBy {
            edge = edge.with_closeby_tolerance([0.2, 0.2]);
        } else if i % 2 == 0 {
            edge = edge.with_distance(0.1);
        }
        graph.add_edge(edge);
    }
    // Back edges make the normalizer break cycles.
    for i in (2..vertices).step_by(4) {
        graph.add_edge(Edge::new(i, i - 2, EdgeType::LeftOf));
    }
    graph
}

fn bench_normalize(c: &mut Criterion) {
    let boundary = Boundary::rectangle([0.0; 3], [8.0, 6.0, 2.5]);
    let mut group = c.benchmark_group("normalize");
    for size in [8usize, 32, 128] {
        let graph = furnished_room(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &graph, |b, graph| {
            b.iter(|| normalize(black_box(graph), &boundary, &[]).expect("normalize"))
        });
    }
    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let boundary = Boundary::rectangle([0.0; 3], [8.0, 6.0, 2.5]);
    let mut group = c.benchmark_group("compile");
    for size in [8usize, 32, 64] {
        let graph = normalize(&furnished_room(size), &boundary, &[]).expect("normalize");
        group.bench_with_input(BenchmarkId::from_parameter(size), &graph, |b, graph| {
            b.iter(|| {
                let mut model = Model::new();
                compile(
                    &mut model,
                    black_box(graph),
                    &boundary,
                    &[],
                    &[],
                    &[],
                    &CompileOptions::default(),
                )
                .expect("compile");
                model.stats()
            })
        });
    }
    group.finish();
}

fn bench_split(c: &mut Criterion) {
    let boundary = Boundary::rectangle([0.0; 3], [8.0, 6.0, 2.5]);
    let graph = normalize(&furnished_room(32), &boundary, &[]).expect("normalize");
    c.bench_function("split4_32", |b| {
        b.iter(|| {
            let mut rng = StdRng::seed_from_u64(11);
            split4(black_box(&graph), &boundary, &mut rng).expect("split")
        })
    });
}

criterion_group!(benches, bench_normalize, bench_compile, bench_split);
criterion_main!(benches);
