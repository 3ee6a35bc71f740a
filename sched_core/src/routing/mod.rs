//! Routing graph: simple data routes and the multi-routes that aggregate them.

pub mod id;
pub mod multi_route;
pub mod route;

#[cfg(test)]
mod route_tests;

pub use id::RoutingObjectId;
pub use multi_route::{
    Admission, DataMultiRoute, MemberRoute, RejectionReason, UTILIZATION_AGREEMENT_EPSILON,
};
pub use route::{DataRoute, LatencyAnchor, OverlapPolicy, SatStorageInterval, TimeOption};
