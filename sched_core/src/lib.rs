//! Activity scheduling core for a satellite constellation.
//!
//! Satellites collect data in observation windows, relay it over crosslinks
//! and deliver it to ground stations in downlink windows. This crate holds
//! the parts of the scheduler that carry its correctness invariants:
//!
//! * [`models`]: activity windows and the arena that shares them
//! * [`timing`]: minimum transition times between activities, classified by
//!   orbital topology
//! * [`routing`]: data routes from observation to downlink, and multi-routes
//!   that share window capacity without oversubscribing it
//! * [`formulation`]: linear constraints for an external mixed-integer
//!   optimizer, and writeback of its solution
//!
//! Logging goes through the `log` facade; installing a logger is up to the
//! embedding application.

pub mod config;
pub mod error;
pub mod formulation;
pub mod models;
pub mod routing;
pub mod time;
pub mod timing;

pub use config::{ActivityParams, FormulationSettings, SolverParams};
pub use error::{ErrorContext, SchedulingError, SchedulingResult};
pub use formulation::{ConstraintGenerator, Formulation, OptimizerBackend};
pub use models::{ActivityWindow, WindowArena, WindowHandle};
pub use routing::{DataMultiRoute, DataRoute, RoutingObjectId};
pub use timing::{OrbitTopology, TransitionTimingPolicy};
