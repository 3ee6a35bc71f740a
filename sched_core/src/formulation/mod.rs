//! Constraint generation for the external optimizer and solution writeback.

pub mod backend;
pub mod expr;
pub mod flow;
pub mod generator;
pub mod writeback;


pub use backend::{LpWriter, Objective, ObjectiveSense, OptimizerBackend, Solution};
pub use expr::{
    Constraint, ConstraintKind, Formulation, LatencyScore, LinearExpr, Sense, SlackDescriptor,
    Term, Var, VarDef, VarDomain,
};
pub use flow::{max_flow_through_pair, OverlapFlow};
pub use generator::{ConstraintGenerator, GenerationStats};
pub use writeback::{
    apply_solution, binding_report, synthesize_executable_acts, BindingEntry, WritebackSummary,
};
