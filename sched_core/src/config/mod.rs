//! Configuration: activity parameters and the transition time table.

pub mod activity_params;
pub mod transition_table;

pub use activity_params::{
    ActivityParams, ActivityParamsFile, DirectionMethod, FormulationSettings, SolverParams,
    SUPPORTED_SCHEMA_VERSIONS,
};
pub use transition_table::{
    ActivityPair, RawTransitionTable, TransitionContext, TransitionTable, TransitionType,
};
