//! Seam to the external mixed-integer optimizer.
//!
//! The crate never solves anything itself. A backend receives the
//! formulation, an objective and the pass-through solver parameters and
//! returns variable values, or a `SolverInfeasible` / `SolverFailure` error.

use std::collections::HashMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::expr::{Formulation, LinearExpr, Var, VarDomain};
use crate::config::SolverParams;
use crate::error::SchedulingResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectiveSense {
    Maximize,
    Minimize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub sense: ObjectiveSense,
    pub expr: LinearExpr,
}

impl Objective {
    /// Maximize latency-weighted routed data volume, penalizing transition
    /// violations in relaxed mode.
    ///
    /// Slack variables are non-positive, so a positive `slack_penalty`
    /// weight on each one lowers the objective as violations grow.
    pub fn routed_data_volume(formulation: &Formulation, route_data_vols: &[f64], slack_penalty: f64) -> Self {
        let mut expr = LinearExpr::new();
        for score in &formulation.latency_scores {
            if let Some(dv) = route_data_vols.get(score.route_index) {
                expr.add_term(Var::RouteUtilization(score.route_index), dv * score.factor);
            }
        }
        for def in &formulation.variables {
            if let Var::Slack(_) = def.var {
                expr.add_term(def.var, slack_penalty);
            }
        }
        Self {
            sense: ObjectiveSense::Maximize,
            expr,
        }
    }
}

/// Variable values returned by an optimizer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Solution {
    pub values: HashMap<Var, f64>,
    pub objective_value: f64,
}

impl Solution {
    pub fn new(objective_value: f64) -> Self {
        Self {
            values: HashMap::new(),
            objective_value,
        }
    }

    pub fn with_value(mut self, var: Var, value: f64) -> Self {
        self.values.insert(var, value);
        self
    }

    /// Value of `var`; unassigned variables are zero.
    pub fn value(&self, var: Var) -> f64 {
        self.values.get(&var).copied().unwrap_or(0.0)
    }

    /// True if a binary variable came back within `binary_epsilon` of 1.
    pub fn is_on(&self, var: Var, binary_epsilon: f64) -> bool {
        self.value(var) >= 1.0 - binary_epsilon
    }
}

/// An external mixed-integer optimizer.
pub trait OptimizerBackend {
    /// Short name used in log messages.
    fn name(&self) -> &str;

    /// Solve `formulation` for `objective`.
    ///
    /// Blocks until the optimizer returns or its time budget in `params`
    /// runs out.
    fn solve(
        &mut self,
        formulation: &Formulation,
        objective: &Objective,
        params: &SolverParams,
    ) -> SchedulingResult<Solution>;
}

/// Lowers a formulation to CPLEX LP text, the input format most MILP
/// solvers accept.
#[derive(Debug, Clone, Default)]
pub struct LpWriter;

impl LpWriter {
    pub fn new() -> Self {
        Self
    }

    pub fn write(&self, formulation: &Formulation, objective: &Objective) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "\\ constellation activity schedule");
        let _ = writeln!(
            out,
            "{}",
            match objective.sense {
                ObjectiveSense::Maximize => "Maximize",
                ObjectiveSense::Minimize => "Minimize",
            }
        );
        let _ = writeln!(out, " obj: {}", Self::format_terms(&objective.expr));

        let _ = writeln!(out, "Subject To");
        for (i, c) in formulation.constraints.iter().enumerate() {
            // LP format keeps constants on the right-hand side.
            let rhs = c.rhs - c.expr.constant_part();
            let _ = writeln!(
                out,
                " c{}: {} {} {}",
                i,
                Self::format_terms(&c.expr),
                c.sense.as_str(),
                Self::format_number(rhs)
            );
        }

        let _ = writeln!(out, "Bounds");
        for def in &formulation.variables {
            if let VarDomain::Continuous { lower, upper } = def.domain {
                let _ = writeln!(
                    out,
                    " {} <= {} <= {}",
                    Self::format_number(lower),
                    def.var,
                    Self::format_number(upper)
                );
            }
        }

        let binaries: Vec<String> = formulation
            .variables
            .iter()
            .filter(|d| d.domain == VarDomain::Binary)
            .map(|d| d.var.to_string())
            .collect();
        if !binaries.is_empty() {
            let _ = writeln!(out, "Binaries");
            let _ = writeln!(out, " {}", binaries.join(" "));
        }
        let _ = writeln!(out, "End");
        out
    }

    fn format_terms(expr: &LinearExpr) -> String {
        if expr.terms().is_empty() {
            return "0".to_string();
        }
        let mut s = String::new();
        for (i, term) in expr.terms().iter().enumerate() {
            let sign = if term.coeff < 0.0 { "-" } else { "+" };
            let magnitude = Self::format_number(term.coeff.abs());
            if i == 0 && sign == "+" {
                let _ = write!(s, "{} {}", magnitude, term.var);
            } else if i == 0 {
                let _ = write!(s, "- {} {}", magnitude, term.var);
            } else {
                let _ = write!(s, " {} {} {}", sign, magnitude, term.var);
            }
        }
        s
    }

    fn format_number(value: f64) -> String {
        if value.fract() == 0.0 && value.abs() < 1e15 {
            format!("{}", value as i64)
        } else {
            format!("{}", value)
        }
    }
}
