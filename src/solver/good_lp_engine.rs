//! [`SolverEngine`] backed by `good_lp`.
//!
//! Each node of a spatial branch and bound hands the backend a mixed-integer
//! linear relaxation: bilinear terms go through McCormick envelopes over the
//! node's variable bounds and squared terms through tangent cuts plus a
//! secant. Quadratic constraints are then checked on the returned assignment
//! and the search branches on the widest violated product until every row of
//! the model holds. The reported objective is the exact quadratic one
//! evaluated at the accepted assignment.

use std::time::{Duration, Instant};

use good_lp::{
    Constraint, Expression, ProblemVariables, ResolutionError, Solution as _, SolutionStatus,
    SolverModel, Variable, WithMipGap, WithTimeLimit, constraint, variable,
};
#[cfg(feature = "highs")]
use good_lp::solvers::highs::highs as backend;
#[cfg(not(feature = "highs"))]
use good_lp::solvers::microlp::microlp as backend;
use tracing::{debug, warn};

use super::{SolveOutcome, SolveParams, SolveStatus, SolverEngine};
use crate::model::{
    LinExpr, Model, ObjectiveSense, QuadExpr, QuadraticConstraint, Sense, Solution, VarId, VarKind,
};

const FLAT_RANGE: f64 = 1e-12;

/// Largest amount by which an accepted assignment may break any row or bound.
pub const FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// Ranges narrower than this are not split any further.
const MIN_BRANCH_RANGE: f64 = 1e-9;

/// Share of a range near either end where a split falls back to the midpoint.
const BRANCH_MARGIN: f64 = 0.05;

#[derive(Debug, Clone, Default)]
pub struct GoodLpEngine;

impl GoodLpEngine {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug)]
enum BackendFailure {
    Infeasible,
    TimeLimit,
    Other(String),
}

impl From<ResolutionError> for BackendFailure {
    fn from(err: ResolutionError) -> Self {
        match err {
            ResolutionError::Infeasible => BackendFailure::Infeasible,
            ResolutionError::Unbounded => BackendFailure::Other("problem is unbounded".into()),
            // microlp stops without an incumbent this way.
            ResolutionError::Other(message) if message.starts_with("Time limit") => {
                BackendFailure::TimeLimit
            }
            other => BackendFailure::Other(other.to_string()),
        }
    }
}

type Bounds = Vec<(f64, f64)>;

/// Linearized solve of one node.
struct Relaxation {
    values: Vec<f64>,
    /// Linearized objective at `values`, in minimization sign.
    bound: f64,
    stopped_early: bool,
}

struct Incumbent {
    values: Vec<f64>,
    bound: f64,
}

#[derive(Debug, Clone, Copy)]
struct Clock {
    deadline: Option<Instant>,
}

impl Clock {
    fn start(limit_secs: f64) -> Self {
        let deadline = (limit_secs > 0.0 && limit_secs.is_finite())
            .then(|| Instant::now() + Duration::from_secs_f64(limit_secs));
        Self { deadline }
    }

    fn expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Seconds left, or `None` when there is no limit.
    fn remaining(&self) -> Option<f64> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()).as_secs_f64())
    }
}

impl SolverEngine for GoodLpEngine {
    fn name(&self) -> &str {
        "good_lp"
    }

    fn optimize(&self, model: &Model, params: &SolveParams) -> SolveOutcome {
        let started = Instant::now();
        let clock = Clock::start(params.time_limit_secs);
        let root: Bounds = model.variables().iter().map(|v| (v.lower, v.upper)).collect();
        let mut open = vec![root];
        let mut incumbent: Option<Incumbent> = None;
        let mut stopped = false;
        let mut nodes = 0usize;

        while let Some(bounds) = open.pop() {
            if nodes >= params.branch_node_limit.max(1) {
                warn!(nodes, "branch node limit reached");
                stopped = true;
                break;
            }
            if clock.expired() {
                stopped = true;
                break;
            }
            nodes += 1;
            let Some(bounds) = tighten(model, bounds) else {
                continue;
            };

            let relaxation = match solve_relaxation(model, &bounds, params, clock.remaining()) {
                Ok(relaxation) => relaxation,
                Err(BackendFailure::Infeasible) => continue,
                Err(BackendFailure::TimeLimit) => {
                    stopped = true;
                    break;
                }
                Err(BackendFailure::Other(message)) => {
                    return SolveOutcome::failed(SolveStatus::EngineError(message));
                }
            };
            stopped |= relaxation.stopped_early;
            if incumbent
                .as_ref()
                .is_some_and(|best| cannot_improve(best.bound, relaxation.bound, params.mip_gap))
            {
                continue;
            }

            let broken = model.violations(&relaxation.values, FEASIBILITY_TOLERANCE);
            if broken.is_empty() {
                incumbent = Some(Incumbent {
                    values: relaxation.values,
                    bound: relaxation.bound,
                });
                continue;
            }
            let violated: Vec<&QuadraticConstraint> = model
                .quadratic_constraints()
                .iter()
                .filter(|c| broken.contains(&c.name))
                .collect();
            if violated.is_empty() {
                warn!(rows = ?broken, "relaxation breaks linear rows, dropping node");
                continue;
            }

            if incumbent.is_none() {
                let fixed = fix_second_factors(model, &bounds, &relaxation.values, &violated);
                match solve_relaxation(model, &fixed, params, clock.remaining()) {
                    Ok(candidate)
                        if model
                            .violations(&candidate.values, FEASIBILITY_TOLERANCE)
                            .is_empty() =>
                    {
                        debug!(nodes, "fixed-factor assignment accepted");
                        stopped |= candidate.stopped_early;
                        incumbent = Some(Incumbent {
                            values: candidate.values,
                            bound: candidate.bound,
                        });
                    }
                    Ok(_) | Err(BackendFailure::Infeasible) => {}
                    Err(BackendFailure::TimeLimit) => {
                        stopped = true;
                        break;
                    }
                    Err(BackendFailure::Other(message)) => {
                        return SolveOutcome::failed(SolveStatus::EngineError(message));
                    }
                }
            }

            match branching_point(model, &bounds, &relaxation.values, &violated) {
                Some((var, at)) => {
                    let mut upper = bounds.clone();
                    upper[var.index()].0 = at;
                    let mut lower = bounds;
                    lower[var.index()].1 = at;
                    open.push(lower);
                    open.push(upper);
                }
                None => debug!(rows = ?broken, "violated rows have no range left to split"),
            }
        }

        debug!(
            nodes,
            open = open.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "good_lp search finished"
        );

        match incumbent {
            Some(best) => {
                let objective = model.objective().evaluate(&best.values);
                let solution = Solution::new(best.values);
                let status = if stopped {
                    warn!(limit = params.time_limit_secs, "returning best assignment found before the limit");
                    SolveStatus::TimeLimitReached
                } else {
                    SolveStatus::Optimal
                };
                debug_assert!(
                    model
                        .violations(solution.values(), FEASIBILITY_TOLERANCE)
                        .is_empty()
                );
                SolveOutcome {
                    status,
                    solution: Some(solution),
                    objective: Some(objective),
                }
            }
            None if stopped => {
                warn!(limit = params.time_limit_secs, "solver stopped before finding a layout");
                SolveOutcome::failed(SolveStatus::TimeLimitReached)
            }
            None => SolveOutcome::failed(SolveStatus::Infeasible),
        }
    }
}

/// Narrows `bounds` with every single-variable linear row. `None` when a
/// range becomes empty.
fn tighten(model: &Model, mut bounds: Bounds) -> Option<Bounds> {
    for c in model.linear_constraints() {
        let [(var, coef)] = c.comparison.expr.terms.as_slice() else {
            continue;
        };
        if *coef == 0.0 || model.variable(*var).kind != VarKind::Continuous {
            continue;
        }
        let limit = c.comparison.rhs / coef;
        let (caps_above, caps_below) = match (c.comparison.sense, *coef > 0.0) {
            (Sense::Eq, _) => (true, true),
            (Sense::Le, true) | (Sense::Ge, false) => (true, false),
            (Sense::Le, false) | (Sense::Ge, true) => (false, true),
        };
        let (lo, hi) = &mut bounds[var.index()];
        if caps_above {
            *hi = hi.min(limit);
        }
        if caps_below {
            *lo = lo.max(limit);
        }
        if *lo > *hi + FEASIBILITY_TOLERANCE {
            return None;
        }
        if *lo > *hi {
            let mid = (*lo + *hi) / 2.0;
            *lo = mid;
            *hi = mid;
        }
    }
    Some(bounds)
}

/// Whether a node whose relaxation reaches `bound` is within `gap` of `best`.
fn cannot_improve(best: f64, bound: f64, gap: f64) -> bool {
    best - bound <= gap * best.abs() + FLAT_RANGE
}

/// Pins the second factor of every product in `violated` at its relaxed value,
/// which makes those rows exact linear ones.
fn fix_second_factors(
    model: &Model,
    bounds: &[(f64, f64)],
    values: &[f64],
    violated: &[&QuadraticConstraint],
) -> Bounds {
    let mut fixed = bounds.to_vec();
    let mut pin = |var: VarId| {
        if model.variable(var).kind == VarKind::Continuous {
            let (lo, hi) = fixed[var.index()];
            let at = values[var.index()].clamp(lo, hi);
            fixed[var.index()] = (at, at);
        }
    };
    for c in violated {
        for (_, b, _) in &c.expr.products {
            pin(*b);
        }
        for (inner, _) in &c.expr.squares {
            inner.vars().for_each(&mut pin);
        }
    }
    fixed
}

/// Continuous variable with the widest envelope among the violated rows, and
/// where to split it.
fn branching_point(
    model: &Model,
    bounds: &[(f64, f64)],
    values: &[f64],
    violated: &[&QuadraticConstraint],
) -> Option<(VarId, f64)> {
    let range = |var: VarId| {
        let (lo, hi) = bounds[var.index()];
        if model.variable(var).kind == VarKind::Continuous {
            hi - lo
        } else {
            0.0
        }
    };
    let mut best: Option<(f64, VarId)> = None;
    let mut consider = |score: f64, var: VarId| {
        if range(var) > MIN_BRANCH_RANGE && best.is_none_or(|(top, _)| score > top) {
            best = Some((score, var));
        }
    };
    for c in violated {
        for (a, b, _) in &c.expr.products {
            let wider = if range(*a) >= range(*b) { *a } else { *b };
            consider(range(*a).max(MIN_BRANCH_RANGE) * range(*b).max(MIN_BRANCH_RANGE), wider);
        }
        for (inner, _) in &c.expr.squares {
            for var in inner.vars() {
                consider(range(var) * range(var), var);
            }
        }
    }

    let (_, var) = best?;
    let (lo, hi) = bounds[var.index()];
    let margin = (hi - lo) * BRANCH_MARGIN;
    let value = values[var.index()];
    let at = if value > lo + margin && value < hi - margin {
        value
    } else {
        (lo + hi) / 2.0
    };
    Some((var, at))
}

fn solve_relaxation(
    model: &Model,
    bounds: &[(f64, f64)],
    params: &SolveParams,
    time_left: Option<f64>,
) -> Result<Relaxation, BackendFailure> {
    let mut vars = ProblemVariables::new();
    let handles: Vec<Variable> = model
        .variables()
        .iter()
        .zip(bounds)
        .map(|(v, (lower, upper))| match v.kind {
            VarKind::Binary => vars.add(variable().binary().name(v.name.clone())),
            VarKind::Continuous => {
                vars.add(variable().min(*lower).max(*upper).name(v.name.clone()))
            }
        })
        .collect();

    let mut linearizer = Linearizer {
        vars: &mut vars,
        handles: &handles,
        bounds: bounds.to_vec(),
        segments: params.linearization_segments.max(1),
        cuts: Vec::new(),
    };

    let objective = linearizer.quadratic(model.objective())?;
    let mut quadratic_rows = Vec::with_capacity(model.quadratic_constraints().len());
    for c in model.quadratic_constraints() {
        let lhs = linearizer.quadratic(&c.expr)?;
        quadratic_rows.push(compare(lhs, c.sense, c.rhs));
    }
    let cuts = std::mem::take(&mut linearizer.cuts);

    let unsolved = match model.objective_sense() {
        ObjectiveSense::Minimize => vars.minimise(objective.clone()),
        ObjectiveSense::Maximize => vars.maximise(objective.clone()),
    };
    let mut problem = unsolved.using(backend);
    if let Some(seconds) = time_left {
        problem = problem.with_time_limit(seconds.max(FLAT_RANGE));
    }
    let mut problem = problem
        .with_mip_gap(params.mip_gap as f32)
        .map_err(|err| BackendFailure::Other(err.to_string()))?;

    for c in model.linear_constraints() {
        let lhs = affine(&c.comparison.expr, &handles);
        problem.add_constraint(compare(lhs, c.comparison.sense, c.comparison.rhs));
    }
    for row in quadratic_rows.into_iter().chain(cuts) {
        problem.add_constraint(row);
    }

    let solution = problem.solve()?;
    let stopped_early = matches!(solution.status(), SolutionStatus::TimeLimit);
    let linearized = solution.eval(&objective);
    Ok(Relaxation {
        values: handles.iter().map(|v| solution.value(*v)).collect(),
        bound: match model.objective_sense() {
            ObjectiveSense::Minimize => linearized,
            ObjectiveSense::Maximize => -linearized,
        },
        stopped_early,
    })
}

fn compare(lhs: Expression, sense: Sense, rhs: f64) -> Constraint {
    match sense {
        Sense::Le => constraint!(lhs <= rhs),
        Sense::Ge => constraint!(lhs >= rhs),
        Sense::Eq => constraint!(lhs == rhs),
    }
}

fn affine(expr: &LinExpr, handles: &[Variable]) -> Expression {
    expr.terms
        .iter()
        .fold(Expression::from(expr.constant), |acc, (var, coef)| {
            acc + *coef * handles[var.index()]
        })
}

fn weighted(constant: f64, terms: &[(Variable, f64)]) -> Expression {
    terms
        .iter()
        .fold(Expression::from(constant), |acc, (var, coef)| acc + *coef * *var)
}

struct Linearizer<'a> {
    vars: &'a mut ProblemVariables,
    handles: &'a [Variable],
    bounds: Vec<(f64, f64)>,
    segments: usize,
    cuts: Vec<Constraint>,
}

impl Linearizer<'_> {
    fn quadratic(&mut self, expr: &QuadExpr) -> Result<Expression, BackendFailure> {
        let mut out = affine(&expr.linear, self.handles);
        for (a, b, coef) in &expr.products {
            let term = if a == b {
                self.square(&LinExpr::term(*a, 1.0))?
            } else {
                self.product(*a, *b)?
            };
            out = out + term * *coef;
        }
        for (inner, weight) in &expr.squares {
            let term = self.square(inner)?;
            out = out + term * *weight;
        }
        Ok(out)
    }

    fn interval(&self, expr: &LinExpr) -> (f64, f64) {
        expr.terms
            .iter()
            .fold((expr.constant, expr.constant), |(lo, hi), (var, coef)| {
                let (lower, upper) = self.bounds[var.index()];
                if *coef >= 0.0 {
                    (lo + coef * lower, hi + coef * upper)
                } else {
                    (lo + coef * upper, hi + coef * lower)
                }
            })
    }

    /// Fresh variable standing in for `a * b`, bounded by its McCormick envelope.
    fn product(&mut self, a: VarId, b: VarId) -> Result<Expression, BackendFailure> {
        let (la, ua) = self.bounds[a.index()];
        let (lb, ub) = self.bounds[b.index()];
        if ![la, ua, lb, ub].iter().all(|v| v.is_finite()) {
            return Err(BackendFailure::Other(
                "bilinear term over an unbounded variable".into(),
            ));
        }
        let corners = [la * lb, la * ub, ua * lb, ua * ub];
        let lower = corners.iter().copied().fold(f64::INFINITY, f64::min);
        let upper = corners.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let aux = self.vars.add(variable().min(lower).max(upper));
        let (x, y) = (self.handles[a.index()], self.handles[b.index()]);

        // aux >= la*y + lb*x - la*lb, aux >= ua*y + ub*x - ua*ub
        self.cuts
            .push(constraint!(weighted(la * lb, &[(aux, 1.0), (y, -la), (x, -lb)]) >= 0.0));
        self.cuts
            .push(constraint!(weighted(ua * ub, &[(aux, 1.0), (y, -ua), (x, -ub)]) >= 0.0));
        // aux <= ua*y + lb*x - ua*lb, aux <= la*y + ub*x - la*ub
        self.cuts
            .push(constraint!(weighted(ua * lb, &[(aux, 1.0), (y, -ua), (x, -lb)]) <= 0.0));
        self.cuts
            .push(constraint!(weighted(la * ub, &[(aux, 1.0), (y, -la), (x, -ub)]) <= 0.0));
        Ok(weighted(0.0, &[(aux, 1.0)]))
    }

    /// Expression standing in for `expr^2`: tangents from below, a secant from above.
    fn square(&mut self, expr: &LinExpr) -> Result<Expression, BackendFailure> {
        let (lo, hi) = self.interval(expr);
        if !lo.is_finite() || !hi.is_finite() {
            return Err(BackendFailure::Other(
                "squared term over an unbounded expression".into(),
            ));
        }
        if hi - lo < FLAT_RANGE {
            return Ok(Expression::from(lo * lo));
        }
        let floor = if lo <= 0.0 && hi >= 0.0 {
            0.0
        } else {
            (lo * lo).min(hi * hi)
        };
        let aux = self.vars.add(variable().min(floor).max((lo * lo).max(hi * hi)));
        let inner = affine(expr, self.handles);

        for k in 0..=self.segments {
            let p = lo + (hi - lo) * k as f64 / self.segments as f64;
            // aux >= 2p*expr - p^2
            let tangent = weighted(0.0, &[(aux, 1.0)]) - inner.clone() * (2.0 * p);
            self.cuts.push(constraint!(tangent >= -p * p));
        }
        // aux <= (lo + hi)*expr - lo*hi
        let secant = weighted(0.0, &[(aux, 1.0)]) - inner * (lo + hi);
        self.cuts.push(constraint!(secant <= -lo * hi));
        Ok(weighted(0.0, &[(aux, 1.0)]))
    }
}
