//! Optimizer-agnostic constraint records.
//!
//! The generator emits plain data: variables with domains, linear
//! expressions and constraints tagged with the activities they concern.
//! Lowering to a concrete optimizer is left to an [`OptimizerBackend`].
//!
//! [`OptimizerBackend`]: super::backend::OptimizerBackend

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::WindowHandle;
use crate::routing::RoutingObjectId;

/// A decision variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Var {
    /// 1 if the activity window is scheduled at all.
    Indicator(WindowHandle),
    /// Fraction of the window's capacity that is used.
    Utilization(WindowHandle),
    /// Fraction of a multi-route's data volume that is scheduled.
    RouteUtilization(usize),
    /// Bounded violation of a relaxed transition constraint.
    Slack(usize),
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Var::Indicator(h) => write!(f, "indic_{}", h.index()),
            Var::Utilization(h) => write!(f, "util_{}", h.index()),
            Var::RouteUtilization(n) => write!(f, "route_{}", n),
            Var::Slack(n) => write!(f, "slack_{}", n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum VarDomain {
    Binary,
    Continuous { lower: f64, upper: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDef {
    pub var: Var,
    pub domain: VarDomain,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub var: Var,
    pub coeff: f64,
}

/// `Σ coeff·var + constant`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearExpr {
    terms: Vec<Term>,
    constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    /// Builder form of [`LinearExpr::add_term`].
    pub fn term(mut self, var: Var, coeff: f64) -> Self {
        self.add_term(var, coeff);
        self
    }

    /// Add `coeff·var`, merging with an existing term for `var`.
    pub fn add_term(&mut self, var: Var, coeff: f64) {
        match self.terms.iter_mut().find(|t| t.var == var) {
            Some(existing) => existing.coeff += coeff,
            None => self.terms.push(Term { var, coeff }),
        }
    }

    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn constant_part(&self) -> f64 {
        self.constant
    }

    /// Coefficient of `var`, zero if absent.
    pub fn coeff(&self, var: Var) -> f64 {
        self.terms
            .iter()
            .find(|t| t.var == var)
            .map(|t| t.coeff)
            .unwrap_or(0.0)
    }

    /// Value of the expression under an assignment; unassigned variables
    /// count as zero.
    pub fn evaluate(&self, values: &HashMap<Var, f64>) -> f64 {
        self.constant
            + self
                .terms
                .iter()
                .map(|t| t.coeff * values.get(&t.var).copied().unwrap_or(0.0))
                .sum::<f64>()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sense {
    Le,
    Ge,
    Eq,
}

impl Sense {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sense::Le => "<=",
            Sense::Ge => ">=",
            Sense::Eq => "=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// Utilization-scaled duration covers the minimum activity duration.
    Duration,
    /// Utilization may only be positive when the indicator is on.
    IndicatorLink,
    /// Two activities too close in center time to both run.
    MutualExclusion,
    /// Transition gap enforced only when both indicators are on.
    BigMTransition,
    /// Transition gap with a bounded violation slack.
    RelaxedTransition,
    /// Routed data volume through a window stays within its utilization.
    RouteCapacity,
}

/// Slack variable attached to a relaxed constraint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlackDescriptor {
    pub var: Var,
    pub lower: f64,
    pub upper: f64,
}

/// `expr sense rhs`, with the activities it concerns and an optional
/// binding expression that evaluates to zero exactly when the constraint
/// is tight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub expr: LinearExpr,
    pub sense: Sense,
    pub rhs: f64,
    pub activities: Vec<WindowHandle>,
    pub binding: Option<LinearExpr>,
    pub slack: Option<SlackDescriptor>,
}

impl Constraint {
    pub fn new(kind: ConstraintKind, expr: LinearExpr, sense: Sense, rhs: f64) -> Self {
        Self {
            kind,
            expr,
            sense,
            rhs,
            activities: Vec::new(),
            binding: None,
            slack: None,
        }
    }

    pub fn with_activities(mut self, activities: Vec<WindowHandle>) -> Self {
        self.activities = activities;
        self
    }

    pub fn with_binding(mut self, binding: LinearExpr) -> Self {
        self.binding = Some(binding);
        self
    }

    pub fn with_slack(mut self, slack: SlackDescriptor) -> Self {
        self.slack = Some(slack);
        self
    }

    /// True if `values` satisfy the constraint within `tolerance`.
    pub fn is_satisfied(&self, values: &HashMap<Var, f64>, tolerance: f64) -> bool {
        let lhs = self.expr.evaluate(values);
        match self.sense {
            Sense::Le => lhs <= self.rhs + tolerance,
            Sense::Ge => lhs >= self.rhs - tolerance,
            Sense::Eq => (lhs - self.rhs).abs() <= tolerance,
        }
    }
}

/// Score factor in (0, 1] for one candidate route of a data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyScore {
    pub route: RoutingObjectId,
    pub route_index: usize,
    pub data_source: WindowHandle,
    pub latency_mins: f64,
    pub factor: f64,
}

/// Everything handed to the optimizer for one scheduling pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Formulation {
    pub variables: Vec<VarDef>,
    pub constraints: Vec<Constraint>,
    pub latency_scores: Vec<LatencyScore>,
    #[serde(default)]
    slack_vars: usize,
}

impl Formulation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&mut self, var: Var, domain: VarDomain) {
        if matches!(var, Var::Slack(_)) {
            self.slack_vars += 1;
        }
        self.variables.push(VarDef { var, domain });
    }

    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn constraints_of_kind(&self, kind: ConstraintKind) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(move |c| c.kind == kind)
    }

    pub fn count(&self, kind: ConstraintKind) -> usize {
        self.constraints_of_kind(kind).count()
    }

    /// Constraints that mention the activity `window`.
    pub fn constraints_for(&self, window: WindowHandle) -> impl Iterator<Item = &Constraint> {
        self.constraints
            .iter()
            .filter(move |c| c.activities.contains(&window))
    }

    /// Number of slack variables added so far; the next one takes this index.
    pub fn slack_count(&self) -> usize {
        self.slack_vars
    }
}
