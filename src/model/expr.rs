use std::ops::{Add, Mul, Neg, Sub};

use super::VarId;

/// Affine expression `Σ coef·var + constant`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinExpr {
    pub terms: Vec<(VarId, f64)>,
    pub constant: f64,
}

impl LinExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    pub fn term(var: VarId, coef: f64) -> Self {
        Self {
            terms: vec![(var, coef)],
            constant: 0.0,
        }
    }

    /// Merges repeated variables and drops zero coefficients.
    pub fn simplified(mut self) -> Self {
        self.terms.sort_by_key(|(var, _)| *var);
        let mut merged: Vec<(VarId, f64)> = Vec::with_capacity(self.terms.len());
        for (var, coef) in self.terms {
            match merged.last_mut() {
                Some((last, total)) if *last == var => *total += coef,
                _ => merged.push((var, coef)),
            }
        }
        merged.retain(|(_, coef)| *coef != 0.0);
        self.terms = merged;
        self
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(var, coef)| coef * values[var.index()])
            .sum::<f64>()
            + self.constant
    }

    pub fn vars(&self) -> impl Iterator<Item = VarId> + '_ {
        self.terms.iter().map(|(var, _)| *var)
    }
}

impl From<VarId> for LinExpr {
    fn from(var: VarId) -> Self {
        LinExpr::term(var, 1.0)
    }
}

impl From<f64> for LinExpr {
    fn from(value: f64) -> Self {
        LinExpr::constant(value)
    }
}

impl<T: Into<LinExpr>> Add<T> for LinExpr {
    type Output = LinExpr;

    fn add(mut self, rhs: T) -> LinExpr {
        let rhs = rhs.into();
        self.terms.extend(rhs.terms);
        self.constant += rhs.constant;
        self
    }
}

impl<T: Into<LinExpr>> Sub<T> for LinExpr {
    type Output = LinExpr;

    fn sub(self, rhs: T) -> LinExpr {
        self + (-rhs.into())
    }
}

impl Mul<f64> for LinExpr {
    type Output = LinExpr;

    fn mul(mut self, rhs: f64) -> LinExpr {
        for (_, coef) in &mut self.terms {
            *coef *= rhs;
        }
        self.constant *= rhs;
        self
    }
}

impl Neg for LinExpr {
    type Output = LinExpr;

    fn neg(self) -> LinExpr {
        self * -1.0
    }
}

impl<T: Into<LinExpr>> Add<T> for VarId {
    type Output = LinExpr;

    fn add(self, rhs: T) -> LinExpr {
        LinExpr::from(self) + rhs
    }
}

impl<T: Into<LinExpr>> Sub<T> for VarId {
    type Output = LinExpr;

    fn sub(self, rhs: T) -> LinExpr {
        LinExpr::from(self) - rhs
    }
}

impl Mul<f64> for VarId {
    type Output = LinExpr;

    fn mul(self, rhs: f64) -> LinExpr {
        LinExpr::term(self, rhs)
    }
}

impl Neg for VarId {
    type Output = LinExpr;

    fn neg(self) -> LinExpr {
        LinExpr::term(self, -1.0)
    }
}

/// `linear + Σ coef·a·b + Σ weight·(expr)²`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuadExpr {
    pub linear: LinExpr,
    pub products: Vec<(VarId, VarId, f64)>,
    pub squares: Vec<(LinExpr, f64)>,
}

impl QuadExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_linear(&mut self, expr: impl Into<LinExpr>, weight: f64) {
        let expr = expr.into() * weight;
        self.linear = std::mem::take(&mut self.linear) + expr;
    }

    pub fn add_product(&mut self, a: VarId, b: VarId, coef: f64) {
        self.products.push((a, b, coef));
    }

    pub fn add_square(&mut self, expr: impl Into<LinExpr>, weight: f64) {
        self.squares.push((expr.into(), weight));
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        let products: f64 = self
            .products
            .iter()
            .map(|(a, b, coef)| coef * values[a.index()] * values[b.index()])
            .sum();
        let squares: f64 = self
            .squares
            .iter()
            .map(|(expr, weight)| {
                let value = expr.evaluate(values);
                weight * value * value
            })
            .sum();
        self.linear.evaluate(values) + products + squares
    }
}

impl From<LinExpr> for QuadExpr {
    fn from(linear: LinExpr) -> Self {
        Self {
            linear,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operators_build_affine_terms() {
        let x = VarId(0);
        let l = VarId(1);
        let expr = (x - l * 0.5 + 2.0).simplified();
        assert_eq!(expr.terms, vec![(x, 1.0), (l, -0.5)]);
        assert_eq!(expr.constant, 2.0);
        assert_eq!(expr.evaluate(&[1.0, 4.0]), 1.0);
    }

    #[test]
    fn simplified_merges_and_drops_zeroes() {
        let x = VarId(0);
        let expr = (x + x - x * 2.0 + VarId(1)).simplified();
        assert_eq!(expr.terms, vec![(VarId(1), 1.0)]);
    }

    #[test]
    fn quadratic_evaluation_sums_all_parts() {
        let mut quad = QuadExpr::new();
        quad.add_linear(VarId(0), 2.0);
        quad.add_product(VarId(0), VarId(1), 1.0);
        quad.add_square(VarId(1) - 1.0, 3.0);
        // 2*2 + 2*3 + 3*(3-1)^2
        assert_eq!(quad.evaluate(&[2.0, 3.0]), 4.0 + 6.0 + 12.0);
    }
}
