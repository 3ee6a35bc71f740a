//! Transition timing policy and the orbital topology it classifies against.

pub mod topology;
pub mod transition;


pub use topology::{OrbitCrossing, OrbitDirection, OrbitTopology};
pub use transition::{TransitionCache, TransitionQuery, TransitionTimingPolicy};
