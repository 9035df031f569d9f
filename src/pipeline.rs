use std::panic::{self, AssertUnwindSafe};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{error, info, warn};

use crate::compile::compile;
use crate::config::Config;
use crate::error::Result;
use crate::extract::extract;
use crate::geometry::{Obstacle, clearance_zones};
use crate::ir::SceneGraph;
use crate::model::{Model, ModelStats, Solution};
use crate::parser::Scene;
use crate::preprocess::{NormalizeReport, normalize_with, split};
use crate::solver::{InfeasibilityReport, SolveOutcome, SolveParams, SolveStatus, SolverEngine};

/// Result of one solve request.
#[derive(Debug, Clone)]
pub struct SolveReport {
    /// Normalized (and possibly split) graph; placements are set only on success.
    pub graph: SceneGraph,
    pub status: SolveStatus,
    pub objective: Option<f64>,
    /// Assignment the engine returned, indexed like `model`'s variables.
    pub solution: Option<Solution>,
    pub stats: ModelStats,
    pub separated_pairs: usize,
    pub ordered_pairs: usize,
    pub normalize: NormalizeReport,
    /// Explicit obstacles, boundary concavities and door/window clearances.
    pub obstacles: Vec<Obstacle>,
    pub infeasibility: Option<InfeasibilityReport>,
    pub model: Model,
}

impl SolveReport {
    pub fn has_layout(&self) -> bool {
        matches!(self.status, SolveStatus::Optimal | SolveStatus::TimeLimitReached)
            && self.graph.vertices.iter().all(|v| v.placement.is_some())
    }

    /// Text form of the infeasibility report, if one was computed.
    pub fn infeasibility_text(&self) -> Option<String> {
        self.infeasibility.as_ref().map(|report| report.render(&self.model))
    }
}

/// Explicit obstacles plus the parts of the bounding box the polygon leaves out.
pub fn assemble_obstacles(scene: &Scene) -> Vec<Obstacle> {
    let mut obstacles = scene.obstacles.clone();
    obstacles.extend(scene.boundary.concavity_obstacles());
    obstacles
}

/// Runs normalize, split, compile, optimize and extract for `scene`.
///
/// Malformed input fails with `Err` before the engine is called. Anything that
/// goes wrong inside the engine is reported through `status` instead.
pub fn solve_scene(scene: &Scene, config: &Config, engine: &dyn SolverEngine) -> Result<SolveReport> {
    let obstacles = assemble_obstacles(scene);
    let mut blocked = obstacles.clone();
    blocked.extend(clearance_zones(&scene.doors, &scene.windows));

    let (normalized, normalize_report) = normalize_with(
        &scene.graph,
        &scene.boundary,
        &blocked,
        config.normalize_options(),
    )?;

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut graph = split(&normalized, &scene.boundary, config.split, &mut rng)?;

    let mut model = Model::new();
    let compiled = compile(
        &mut model,
        &graph,
        &scene.boundary,
        &obstacles,
        &scene.doors,
        &scene.windows,
        &config.compile_options(),
    )?;
    let stats = model.stats();

    info!(engine = engine.name(), "optimizing");
    let outcome = guarded_optimize(engine, &model, &config.solver);
    let infeasibility = match &outcome.status {
        SolveStatus::Optimal => {
            info!(objective = ?outcome.objective, "solved");
            None
        }
        SolveStatus::TimeLimitReached => {
            warn!(has_incumbent = outcome.solution.is_some(), "stopped at time limit");
            None
        }
        SolveStatus::EngineError(message) => {
            error!(%message, "solver engine failed");
            None
        }
        SolveStatus::Infeasible if config.solver.compute_iis => {
            warn!("model is infeasible, computing infeasibility report");
            guarded_report(engine, &model, &config.solver)
        }
        SolveStatus::Infeasible => {
            warn!("model is infeasible");
            None
        }
    };

    extract(&model, &outcome, &mut graph, config.floorplan);

    Ok(SolveReport {
        graph,
        status: outcome.status,
        objective: outcome.objective,
        solution: outcome.solution,
        stats,
        separated_pairs: compiled.separated_pairs,
        ordered_pairs: compiled.ordered_pairs,
        normalize: normalize_report,
        obstacles: blocked,
        infeasibility,
        model,
    })
}

fn guarded_optimize(engine: &dyn SolverEngine, model: &Model, params: &SolveParams) -> SolveOutcome {
    panic::catch_unwind(AssertUnwindSafe(|| engine.optimize(model, params))).unwrap_or_else(|_| {
        SolveOutcome::failed(SolveStatus::EngineError(format!(
            "engine '{}' panicked",
            engine.name()
        )))
    })
}

fn guarded_report(
    engine: &dyn SolverEngine,
    model: &Model,
    params: &SolveParams,
) -> Option<InfeasibilityReport> {
    match panic::catch_unwind(AssertUnwindSafe(|| engine.compute_infeasibility_report(model, params))) {
        Ok(report) => report,
        Err(_) => {
            error!(engine = engine.name(), "infeasibility report failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Boundary;
    use crate::ir::{Band, Edge, EdgeType};

    struct PanickingEngine;

    impl SolverEngine for PanickingEngine {
        fn name(&self) -> &str {
            "panicking"
        }

        fn optimize(&self, _model: &Model, _params: &SolveParams) -> SolveOutcome {
            panic!("backend exploded")
        }
    }

    struct RefusingEngine;

    impl SolverEngine for RefusingEngine {
        fn name(&self) -> &str {
            "refusing"
        }

        fn optimize(&self, _model: &Model, _params: &SolveParams) -> SolveOutcome {
            SolveOutcome::failed(SolveStatus::Infeasible)
        }

        fn compute_infeasibility_report(&self, _model: &Model, _params: &SolveParams) -> Option<InfeasibilityReport> {
            Some(InfeasibilityReport {
                constraints: vec!["inside_x_min_0".into()],
                irreducible: true,
            })
        }
    }

    fn scene() -> Scene {
        let mut graph = SceneGraph::new();
        let a = graph.add_vertex("a");
        let b = graph.add_vertex("b");
        graph.vertex_mut(a).size = Some(Band::new([1.0, 1.0, 1.0], [0.0; 3]));
        graph.add_edge(Edge::new(b, a, EdgeType::RightOf));
        Scene::new(graph, Boundary::rectangle([0.0; 3], [4.0, 4.0, 2.0]))
    }

    #[test]
    fn engine_panics_become_engine_errors() {
        let report = solve_scene(&scene(), &Config::default(), &PanickingEngine).unwrap();
        assert!(matches!(report.status, SolveStatus::EngineError(_)));
        assert!(!report.has_layout());
        assert!(report.graph.vertices.iter().all(|v| v.placement.is_none()));
    }

    #[test]
    fn infeasible_status_carries_report() {
        let report = solve_scene(&scene(), &Config::default(), &RefusingEngine).unwrap();
        assert_eq!(report.status, SolveStatus::Infeasible);
        let text = report.infeasibility_text().unwrap();
        assert!(text.contains("inside_x_min_0"));
    }

    #[test]
    fn report_skipped_when_disabled() {
        let mut config = Config::default();
        config.solver.compute_iis = false;
        let report = solve_scene(&scene(), &config, &RefusingEngine).unwrap();
        assert!(report.infeasibility.is_none());
    }

    #[test]
    fn normalizes_before_compiling() {
        let report = solve_scene(&scene(), &Config::default(), &RefusingEngine).unwrap();
        assert_eq!(report.normalize.reversed, 1);
        assert_eq!(report.graph.edges[0].kind, EdgeType::LeftOf);
        assert_eq!(report.stats.variables, report.model.stats().variables);
    }

    #[test]
    fn malformed_graph_fails_before_solving() {
        let mut scene = scene();
        scene.graph.vertex_mut(0).boundary = Some(9);
        assert!(solve_scene(&scene, &Config::default(), &PanickingEngine).is_err());
    }
}
