//! Boundary between the compiled model and whatever optimizes it.

pub mod good_lp_engine;
pub mod iis;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{Model, Solution};

pub use good_lp_engine::GoodLpEngine;

#[derive(Debug, Clone, PartialEq)]
pub enum SolveStatus {
    Optimal,
    /// Stopped at the wall-clock limit. May still carry the best assignment found.
    TimeLimitReached,
    Infeasible,
    EngineError(String),
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "optimal"),
            SolveStatus::TimeLimitReached => write!(f, "time limit reached"),
            SolveStatus::Infeasible => write!(f, "infeasible"),
            SolveStatus::EngineError(message) => write!(f, "engine error: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveParams {
    /// Wall-clock budget per solve; zero or negative disables it.
    pub time_limit_secs: f64,
    /// Relative optimality gap accepted by backends that support it.
    pub mip_gap: f64,
    /// Tangent cuts per squared term in the piecewise-linear objective.
    pub linearization_segments: usize,
    /// Run the deletion filter when the model is infeasible.
    pub compute_iis: bool,
    /// Nodes the spatial branch and bound may open before it stops early.
    pub branch_node_limit: usize,
    /// Wall-clock budget of each re-solve inside the deletion filter.
    pub iis_resolve_secs: f64,
}

impl Default for SolveParams {
    fn default() -> Self {
        Self {
            time_limit_secs: 100.0,
            mip_gap: 0.95,
            linearization_segments: 8,
            compute_iis: true,
            branch_node_limit: 500,
            iis_resolve_secs: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    pub solution: Option<Solution>,
    /// Objective of the compiled model evaluated at `solution`.
    pub objective: Option<f64>,
}

impl SolveOutcome {
    pub fn failed(status: SolveStatus) -> Self {
        Self {
            status,
            solution: None,
            objective: None,
        }
    }

    /// The assignment, but only when the status says it is a real layout.
    pub fn usable_solution(&self) -> Option<&Solution> {
        match self.status {
            SolveStatus::Optimal | SolveStatus::TimeLimitReached => self.solution.as_ref(),
            SolveStatus::Infeasible | SolveStatus::EngineError(_) => None,
        }
    }
}

/// Irreducible inconsistent subset of named constraints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfeasibilityReport {
    pub constraints: Vec<String>,
    /// False when the filter ran out of budget before trying every constraint.
    pub irreducible: bool,
}

impl InfeasibilityReport {
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// One constraint per line, with its expression.
    pub fn render(&self, model: &Model) -> String {
        let mut out = if self.irreducible {
            String::from("\\ irreducible inconsistent subset\n")
        } else {
            String::from("\\ inconsistent subset (filter budget spent)\n")
        };
        for name in &self.constraints {
            let line = model
                .linear_constraints()
                .iter()
                .find(|c| &c.name == name)
                .map(|c| {
                    let terms: Vec<String> = c
                        .comparison
                        .expr
                        .terms
                        .iter()
                        .map(|(var, coef)| format!("{coef:+} {}", model.variable(*var).name))
                        .collect();
                    format!(
                        "{name}: {} {} {}",
                        terms.join(" "),
                        c.comparison.sense.symbol(),
                        c.comparison.rhs
                    )
                })
                .unwrap_or_else(|| format!("{name}: (quadratic)"));
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}

pub trait SolverEngine {
    fn name(&self) -> &str;

    /// Never panics across the boundary for model problems; failures come back as a status.
    fn optimize(&self, model: &Model, params: &SolveParams) -> SolveOutcome;

    fn compute_infeasibility_report(
        &self,
        model: &Model,
        params: &SolveParams,
    ) -> Option<InfeasibilityReport> {
        iis::deletion_filter(self, model, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_outcome_has_no_usable_solution() {
        let mut outcome = SolveOutcome::failed(SolveStatus::Infeasible);
        outcome.solution = Some(Solution::new(vec![1.0]));
        assert!(outcome.usable_solution().is_none());
        outcome.status = SolveStatus::TimeLimitReached;
        assert!(outcome.usable_solution().is_some());
    }

    #[test]
    fn status_display_is_readable() {
        assert_eq!(SolveStatus::Infeasible.to_string(), "infeasible");
        assert_eq!(
            SolveStatus::EngineError("boom".into()).to_string(),
            "engine error: boom"
        );
    }
}
