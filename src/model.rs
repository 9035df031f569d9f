//! Solver independent description of a mixed-integer quadratic program.
//!
//! The compiler only talks to [`Model`]; engines translate it into whatever
//! their backend understands.

mod expr;

pub use expr::{LinExpr, QuadExpr};

use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub(crate) usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Continuous,
    Binary,
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub kind: VarKind,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Le,
    Ge,
    Eq,
}

impl Sense {
    pub fn holds(self, lhs: f64, rhs: f64, tolerance: f64) -> bool {
        match self {
            Sense::Le => lhs <= rhs + tolerance,
            Sense::Ge => lhs >= rhs - tolerance,
            Sense::Eq => (lhs - rhs).abs() <= tolerance,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Sense::Le => "<=",
            Sense::Ge => ">=",
            Sense::Eq => "==",
        }
    }
}

/// `expr sense rhs` with every constant folded into `rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub expr: LinExpr,
    pub sense: Sense,
    pub rhs: f64,
}

fn compare(lhs: impl Into<LinExpr>, sense: Sense, rhs: impl Into<LinExpr>) -> Comparison {
    let mut expr = (lhs.into() - rhs.into()).simplified();
    let rhs = -expr.constant;
    expr.constant = 0.0;
    Comparison { expr, sense, rhs }
}

pub fn leq(lhs: impl Into<LinExpr>, rhs: impl Into<LinExpr>) -> Comparison {
    compare(lhs, Sense::Le, rhs)
}

pub fn geq(lhs: impl Into<LinExpr>, rhs: impl Into<LinExpr>) -> Comparison {
    compare(lhs, Sense::Ge, rhs)
}

pub fn eq(lhs: impl Into<LinExpr>, rhs: impl Into<LinExpr>) -> Comparison {
    compare(lhs, Sense::Eq, rhs)
}

#[derive(Debug, Clone)]
pub struct LinearConstraint {
    pub name: String,
    pub comparison: Comparison,
}

#[derive(Debug, Clone)]
pub struct QuadraticConstraint {
    pub name: String,
    pub expr: QuadExpr,
    pub sense: Sense,
    pub rhs: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectiveSense {
    #[default]
    Minimize,
    Maximize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModelStats {
    pub variables: usize,
    pub binaries: usize,
    pub linear_constraints: usize,
    pub quadratic_constraints: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Model {
    variables: Vec<Variable>,
    names: HashMap<String, VarId>,
    linear: Vec<LinearConstraint>,
    quadratic: Vec<QuadraticConstraint>,
    objective: QuadExpr,
    sense: ObjectiveSense,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_continuous_var(&mut self, lower: f64, upper: f64, name: impl Into<String>) -> VarId {
        self.push_var(name.into(), VarKind::Continuous, lower, upper)
    }

    pub fn add_binary_var(&mut self, name: impl Into<String>) -> VarId {
        self.push_var(name.into(), VarKind::Binary, 0.0, 1.0)
    }

    fn push_var(&mut self, name: String, kind: VarKind, lower: f64, upper: f64) -> VarId {
        let id = VarId(self.variables.len());
        self.names.insert(name.clone(), id);
        self.variables.push(Variable {
            name,
            kind,
            lower,
            upper: upper.max(lower),
        });
        id
    }

    pub fn add_linear_constraint(&mut self, name: impl Into<String>, comparison: Comparison) {
        self.linear.push(LinearConstraint {
            name: name.into(),
            comparison,
        });
    }

    pub fn add_quadratic_constraint(
        &mut self,
        name: impl Into<String>,
        expr: QuadExpr,
        sense: Sense,
        rhs: f64,
    ) {
        let mut expr = expr;
        let rhs = rhs - expr.linear.constant;
        expr.linear.constant = 0.0;
        self.quadratic.push(QuadraticConstraint {
            name: name.into(),
            expr,
            sense,
            rhs,
        });
    }

    pub fn set_objective(&mut self, objective: QuadExpr, sense: ObjectiveSense) {
        self.objective = objective;
        self.sense = sense;
    }

    pub fn objective(&self) -> &QuadExpr {
        &self.objective
    }

    pub fn objective_sense(&self) -> ObjectiveSense {
        self.sense
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, id: VarId) -> &Variable {
        &self.variables[id.0]
    }

    pub fn var_by_name(&self, name: &str) -> Option<VarId> {
        self.names.get(name).copied()
    }

    pub fn linear_constraints(&self) -> &[LinearConstraint] {
        &self.linear
    }

    pub fn quadratic_constraints(&self) -> &[QuadraticConstraint] {
        &self.quadratic
    }

    pub fn constraint_names(&self) -> impl Iterator<Item = &str> {
        self.linear
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.quadratic.iter().map(|c| c.name.as_str()))
    }

    pub fn stats(&self) -> ModelStats {
        ModelStats {
            variables: self.variables.len(),
            binaries: self
                .variables
                .iter()
                .filter(|v| v.kind == VarKind::Binary)
                .count(),
            linear_constraints: self.linear.len(),
            quadratic_constraints: self.quadratic.len(),
        }
    }

    /// Copy with only the named constraints in `keep` and no objective.
    pub fn feasibility_subset(&self, keep: &HashSet<&str>) -> Model {
        Model {
            variables: self.variables.clone(),
            names: self.names.clone(),
            linear: self
                .linear
                .iter()
                .filter(|c| keep.contains(c.name.as_str()))
                .cloned()
                .collect(),
            quadratic: self
                .quadratic
                .iter()
                .filter(|c| keep.contains(c.name.as_str()))
                .cloned()
                .collect(),
            objective: QuadExpr::new(),
            sense: ObjectiveSense::Minimize,
        }
    }

    /// Names of the constraints (and bounds) `values` breaks by more than `tolerance`.
    pub fn violations(&self, values: &[f64], tolerance: f64) -> Vec<String> {
        let mut broken = Vec::new();
        for (var, value) in self.variables.iter().zip(values) {
            if *value < var.lower - tolerance || *value > var.upper + tolerance {
                broken.push(format!("bound:{}", var.name));
            }
        }
        for c in &self.linear {
            let lhs = c.comparison.expr.evaluate(values);
            if !c.comparison.sense.holds(lhs, c.comparison.rhs, tolerance) {
                broken.push(c.name.clone());
            }
        }
        for c in &self.quadratic {
            if !c.sense.holds(c.expr.evaluate(values), c.rhs, tolerance) {
                broken.push(c.name.clone());
            }
        }
        broken
    }
}

/// Variable assignment returned by an engine, indexed by [`VarId`].
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    values: Vec<f64>,
}

impl Solution {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn value(&self, var: VarId) -> f64 {
        self.values[var.0]
    }

    pub fn value_by_name(&self, model: &Model, name: &str) -> Option<f64> {
        model
            .var_by_name(name)
            .and_then(|var| self.values.get(var.0).copied())
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_folds_constants_into_rhs() {
        let mut model = Model::new();
        let x = model.add_continuous_var(0.0, 1.0, "x_0");
        let l = model.add_continuous_var(0.0, 1.0, "l_0");
        let cmp = geq(x - l * 0.5, 0.25);
        assert_eq!(cmp.rhs, 0.25);
        let cmp = eq(x + 1.0, l);
        assert_eq!(cmp.rhs, -1.0);
        assert_eq!(cmp.expr.terms, vec![(x, 1.0), (l, -1.0)]);
    }

    #[test]
    fn looks_up_variables_by_name() {
        let mut model = Model::new();
        model.add_continuous_var(0.0, 2.0, "x_0");
        let b = model.add_binary_var("sigma_L_0_1");
        assert_eq!(model.var_by_name("sigma_L_0_1"), Some(b));
        assert_eq!(model.stats().binaries, 1);
        assert_eq!(model.stats().variables, 2);
    }

    #[test]
    fn feasibility_subset_keeps_named_constraints_only() {
        let mut model = Model::new();
        let x = model.add_continuous_var(0.0, 1.0, "x");
        model.add_linear_constraint("low", geq(x, 0.5));
        model.add_linear_constraint("high", leq(x, 0.2));
        let keep: HashSet<&str> = ["low"].into_iter().collect();
        let subset = model.feasibility_subset(&keep);
        assert_eq!(subset.constraint_names().collect::<Vec<_>>(), vec!["low"]);
        assert_eq!(subset.objective(), &QuadExpr::new());
    }

    #[test]
    fn reports_violated_constraints() {
        let mut model = Model::new();
        let x = model.add_continuous_var(0.0, 1.0, "x");
        model.add_linear_constraint("low", geq(x, 0.5));
        assert_eq!(model.violations(&[0.2], 1e-9), vec!["low".to_string()]);
        assert!(model.violations(&[0.7], 1e-9).is_empty());
    }
}
