use std::collections::HashSet;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{InfeasibilityReport, SolveStatus, SolverEngine, SolveParams};
use crate::model::Model;

/// Deletion filter: drop each constraint in turn and keep it out whenever the
/// rest is still infeasible. What survives is irreducible. Returns `None` when
/// the full model is not proven infeasible to begin with.
///
/// Every re-solve runs under `iis_resolve_secs`; a re-solve that runs out of time
/// keeps its constraint. The whole filter stops once `time_limit_secs` is
/// spent and reports what is left, flagged as not irreducible.
pub fn deletion_filter<E: SolverEngine + ?Sized>(
    engine: &E,
    model: &Model,
    params: &SolveParams,
) -> Option<InfeasibilityReport> {
    let budget = resolve_params(params);
    let deadline = (params.time_limit_secs > 0.0 && params.time_limit_secs.is_finite())
        .then(|| Instant::now() + Duration::from_secs_f64(params.time_limit_secs));

    let mut active: Vec<&str> = model.constraint_names().collect();
    let everything: HashSet<&str> = active.iter().copied().collect();
    if !is_infeasible(engine, &model.feasibility_subset(&everything), &budget) {
        return None;
    }

    let mut irreducible = true;
    let mut index = 0;
    while index < active.len() {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            warn!(
                remaining = active.len() - index,
                "infeasibility filter budget spent, report may not be minimal"
            );
            irreducible = false;
            break;
        }
        let keep: HashSet<&str> = active
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, name)| *name)
            .collect();
        if is_infeasible(engine, &model.feasibility_subset(&keep), &budget) {
            debug!(constraint = active[index], "not needed for infeasibility");
            active.remove(index);
        } else {
            index += 1;
        }
    }

    info!(size = active.len(), irreducible, "infeasibility report computed");
    Some(InfeasibilityReport {
        constraints: active.into_iter().map(str::to_string).collect(),
        irreducible,
    })
}

/// Parameters for one re-solve: the per-re-solve budget, capped by the overall limit.
fn resolve_params(params: &SolveParams) -> SolveParams {
    let overall = if params.time_limit_secs > 0.0 {
        params.time_limit_secs
    } else {
        f64::INFINITY
    };
    let per_resolve = if params.iis_resolve_secs > 0.0 {
        params.iis_resolve_secs
    } else {
        f64::INFINITY
    };
    let limit = overall.min(per_resolve);
    SolveParams {
        time_limit_secs: if limit.is_finite() { limit } else { 0.0 },
        compute_iis: false,
        ..params.clone()
    }
}

fn is_infeasible<E: SolverEngine + ?Sized>(engine: &E, model: &Model, params: &SolveParams) -> bool {
    engine.optimize(model, params).status == SolveStatus::Infeasible
}
