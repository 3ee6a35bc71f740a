//! Multi-routes: several simple routes sharing one observation and one
//! downlink, billed as a single unit.
//!
//! Each member route holds its own allocation of data volume. For every
//! window touched by any member, the sum of member allocations never exceeds
//! the window's capacity, so one utilization fraction can be applied to the
//! whole multi-route.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use super::id::RoutingObjectId;
use super::route::{DataRoute, LatencyAnchor, SatStorageInterval, TimeOption};
use crate::error::{ErrorContext, SchedulingError, SchedulingResult};
use crate::models::{GsIndex, SatIndex, WindowArena, WindowHandle, DV_EPSILON};

/// Member routes must agree on utilization to within this fraction.
pub const UTILIZATION_AGREEMENT_EPSILON: f64 = 0.001;

/// A simple route inside a multi-route, with its share of capacity.
#[derive(Debug, Clone)]
pub struct MemberRoute {
    pub route: DataRoute,
    pub allocated_dv: f64,
    pub scheduled_dv: Option<f64>,
}

/// Why a candidate route was not admitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RejectionReason {
    ObservationMismatch,
    DownlinkMismatch,
    InsufficientCapacity { admissible_dv: f64 },
}

/// Outcome of offering a route to a multi-route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Admission {
    Accepted { allocated_dv: f64 },
    Rejected(RejectionReason),
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accepted { .. })
    }
}

/// Aggregate of simple routes from one observation to one downlink.
#[derive(Debug, Clone)]
pub struct DataMultiRoute {
    id: RoutingObjectId,
    members: Vec<MemberRoute>,
    dv_epsilon: f64,
}

impl DataMultiRoute {
    /// Create a multi-route whose members each keep their full data volume.
    ///
    /// Fails if `routes` is empty. Shared-capacity consistency is checked by
    /// [`DataMultiRoute::validate`].
    pub fn new(id: RoutingObjectId, routes: Vec<DataRoute>) -> SchedulingResult<Self> {
        if routes.is_empty() {
            return Err(SchedulingError::route_validation(&id, 0, "multi-route needs at least one route"));
        }
        let members = routes
            .into_iter()
            .map(|route| MemberRoute {
                allocated_dv: route.data_vol(),
                route,
                scheduled_dv: None,
            })
            .collect();
        Ok(Self {
            id,
            members,
            dv_epsilon: DV_EPSILON,
        })
    }

    pub fn with_dv_epsilon(mut self, dv_epsilon: f64) -> Self {
        self.dv_epsilon = dv_epsilon;
        self
    }

    pub fn id(&self) -> &RoutingObjectId {
        &self.id
    }

    pub fn members(&self) -> &[MemberRoute] {
        &self.members
    }

    pub fn routes(&self) -> impl Iterator<Item = &DataRoute> {
        self.members.iter().map(|m| &m.route)
    }

    fn head(&self) -> &DataRoute {
        // Construction guarantees at least one member.
        &self.members[0].route
    }

    pub fn obs(&self) -> SchedulingResult<WindowHandle> {
        self.head().obs()
    }

    pub fn dlnk(&self, arena: &WindowArena) -> SchedulingResult<WindowHandle> {
        self.head().dlnk(arena)
    }

    /// Total allocated data volume.
    pub fn data_vol(&self) -> f64 {
        self.members.iter().map(|m| m.allocated_dv).sum()
    }

    /// Total scheduled data volume, once every member has one.
    pub fn scheduled_dv(&self) -> Option<f64> {
        self.members
            .iter()
            .map(|m| m.scheduled_dv)
            .sum::<Option<f64>>()
    }

    /// Every window used by any member.
    pub fn windows(&self) -> BTreeSet<WindowHandle> {
        self.routes().flat_map(|r| r.windows().iter().copied()).collect()
    }

    /// Allocated data volume passing through `window`.
    pub fn data_vol_for_wind(&self, window: WindowHandle) -> SchedulingResult<f64> {
        let sum: f64 = self
            .members
            .iter()
            .filter(|m| m.route.contains_window(window))
            .map(|m| m.allocated_dv)
            .sum();
        if sum == 0.0 {
            return Err(SchedulingError::not_found_with_context(
                format!("window {} carries no data volume in {}", window.index(), self.id),
                ErrorContext::new("data_vol_for_wind").with_entity("multi_route"),
            ));
        }
        Ok(sum)
    }

    /// Scheduled data volume passing through `window`, once scheduled.
    pub fn scheduled_dv_for_wind(&self, window: WindowHandle) -> Option<f64> {
        self.members
            .iter()
            .filter(|m| m.route.contains_window(window))
            .map(|m| m.scheduled_dv)
            .sum::<Option<f64>>()
    }

    /// Set the scheduled data volume, spread over members as one shared
    /// utilization fraction.
    pub fn set_scheduled_dv(&mut self, scheduled_dv: f64) -> SchedulingResult<()> {
        let data_vol = self.data_vol();
        if scheduled_dv > data_vol + self.dv_epsilon || scheduled_dv < 0.0 {
            return Err(SchedulingError::window_state_with_context(
                format!(
                    "scheduled data volume {} outside [0, capacity {}]",
                    scheduled_dv, data_vol
                ),
                ErrorContext::new("set_scheduled_dv")
                    .with_entity("multi_route")
                    .with_entity_id(&self.id),
            ));
        }
        let fraction = if data_vol > 0.0 {
            (scheduled_dv / data_vol).min(1.0)
        } else {
            0.0
        };
        self.set_scheduled_dv_frac(fraction)
    }

    /// Apply one utilization fraction to every member.
    pub fn set_scheduled_dv_frac(&mut self, fraction: f64) -> SchedulingResult<()> {
        if !(0.0..=1.0 + UTILIZATION_AGREEMENT_EPSILON).contains(&fraction) {
            return Err(SchedulingError::window_state_with_context(
                format!("utilization fraction {} outside [0, 1]", fraction),
                ErrorContext::new("set_scheduled_dv_frac")
                    .with_entity("multi_route")
                    .with_entity_id(&self.id),
            ));
        }
        let fraction = fraction.min(1.0);
        for member in &mut self.members {
            member.scheduled_dv = Some(member.allocated_dv * fraction);
            member.route.set_scheduled_dv(member.allocated_dv * fraction);
        }
        Ok(())
    }

    /// Shared utilization of the members; they must agree.
    pub fn sched_utilization(&self) -> SchedulingResult<f64> {
        let mut expected: Option<f64> = None;
        for (index, member) in self.members.iter().enumerate() {
            let scheduled = member.scheduled_dv.ok_or_else(|| {
                SchedulingError::route_validation(&self.id, index, "member route has no scheduled data volume")
            })?;
            let util = if member.allocated_dv > 0.0 {
                scheduled / member.allocated_dv
            } else {
                0.0
            };
            match expected {
                None => expected = Some(util),
                Some(e) if (util - e).abs() < UTILIZATION_AGREEMENT_EPSILON => {}
                Some(e) => {
                    return Err(SchedulingError::route_validation(
                        &self.id,
                        index,
                        format!("member utilization {} disagrees with {}", util, e),
                    ))
                }
            }
        }
        Ok(expected.unwrap_or(0.0))
    }

    pub fn has_xlnk(&self, arena: &WindowArena) -> SchedulingResult<bool> {
        for r in self.routes() {
            if r.has_xlnk(arena)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn has_sat_indx(&self, arena: &WindowArena, sat: SatIndex) -> SchedulingResult<bool> {
        for r in self.routes() {
            if r.has_sat_indx(arena, sat)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn has_gs_indx(&self, arena: &WindowArena, gs: GsIndex) -> SchedulingResult<bool> {
        for r in self.routes() {
            if r.has_gs_indx(arena, gs)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn latency(
        &self,
        arena: &WindowArena,
        obs_anchor: LatencyAnchor,
        dlnk_anchor: LatencyAnchor,
    ) -> SchedulingResult<f64> {
        self.head().latency(arena, obs_anchor, dlnk_anchor)
    }

    /// True if any member has `route` as a prefix.
    pub fn contains_route(&self, route: &DataRoute) -> bool {
        self.routes().any(|r| r.contains_route(route))
    }

    pub fn storage_intervals(&self, arena: &WindowArena) -> SchedulingResult<Vec<SatStorageInterval>> {
        let mut intervals = Vec::new();
        for r in self.routes() {
            intervals.extend(r.storage_intervals(arena)?);
        }
        Ok(intervals)
    }

    /// Sum of member allocations per window.
    fn allocated_by_window(&self) -> BTreeMap<WindowHandle, f64> {
        let mut allocated = BTreeMap::new();
        for member in &self.members {
            for h in member.route.windows() {
                *allocated.entry(*h).or_insert(0.0) += member.allocated_dv;
            }
        }
        allocated
    }

    /// Validate every member, shared endpoints and per-window conservation.
    ///
    /// # Errors
    /// * `RouteValidation` for a member failure or mismatched endpoints
    /// * `CapacityOversubscribed` if allocations on a window exceed its capacity
    pub fn validate(&self, arena: &WindowArena, time_option: TimeOption) -> SchedulingResult<()> {
        let obs = self.obs()?;
        let dlnk = self.dlnk(arena)?;
        for member in &self.members {
            let route = &member.route;
            route.validate(arena, time_option)?;
            if route.obs()? != obs {
                return Err(SchedulingError::route_validation(route.id(), 0, format!("observation differs from {}", self.id)));
            }
            if route.dlnk(arena)? != dlnk {
                return Err(SchedulingError::route_validation(
                    route.id(),
                    route.len() - 1,
                    format!("downlink differs from {}", self.id),
                ));
            }
            if member.allocated_dv > route.data_vol() + self.dv_epsilon {
                return Err(SchedulingError::route_validation(
                    route.id(),
                    0,
                    format!("allocation {} exceeds route data volume {}", member.allocated_dv, route.data_vol()),
                ));
            }
        }

        for (h, allocated) in self.allocated_by_window() {
            let window = arena.get(h)?;
            if allocated > window.data_vol() + self.dv_epsilon {
                return Err(SchedulingError::CapacityOversubscribed {
                    route: self.id.to_string(),
                    window: window.key().to_string(),
                    allocated,
                    capacity: window.data_vol(),
                    context: ErrorContext::new("validate").with_entity("multi_route"),
                });
            }
        }
        Ok(())
    }

    /// Offer a simple route to this multi-route.
    ///
    /// The candidate must share the observation and downlink. It is admitted
    /// with the largest data volume every window it touches can still carry
    /// (window capacity minus the allocations already made), capped at its own
    /// data volume, and only if that exceeds `min_candidate_dv`. A rejected
    /// candidate leaves the multi-route untouched.
    pub fn accumulate_dr(
        &mut self,
        arena: &WindowArena,
        candidate: DataRoute,
        min_candidate_dv: f64,
    ) -> SchedulingResult<Admission> {
        if candidate.obs()? != self.obs()? {
            debug!("Rejected {} for {}: observation mismatch", candidate.id(), self.id);
            return Ok(Admission::Rejected(RejectionReason::ObservationMismatch));
        }
        if candidate.dlnk(arena)? != self.dlnk(arena)? {
            debug!("Rejected {} for {}: downlink mismatch", candidate.id(), self.id);
            return Ok(Admission::Rejected(RejectionReason::DownlinkMismatch));
        }

        let allocated = self.allocated_by_window();
        let mut admissible = candidate.data_vol();
        for h in candidate.windows() {
            let capacity = arena.get(*h)?.data_vol();
            let residual = capacity - allocated.get(h).copied().unwrap_or(0.0);
            admissible = admissible.min(residual);
        }

        if admissible > min_candidate_dv {
            debug!("Admitted {} into {} with {:.3} Mb", candidate.id(), self.id, admissible);
            self.members.push(MemberRoute {
                route: candidate,
                allocated_dv: admissible,
                scheduled_dv: None,
            });
            Ok(Admission::Accepted {
                allocated_dv: admissible,
            })
        } else {
            debug!(
                "Rejected {} for {}: admissible {:.3} Mb not above {:.3} Mb",
                candidate.id(),
                self.id,
                admissible,
                min_candidate_dv
            );
            Ok(Admission::Rejected(RejectionReason::InsufficientCapacity {
                admissible_dv: admissible,
            }))
        }
    }
}

impl PartialEq for DataMultiRoute {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DataMultiRoute {}

impl fmt::Display for DataMultiRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .members
            .iter()
            .map(|m| match m.scheduled_dv {
                Some(s) => format!("{}: {:.0}/{:.0}", m.route.id(), s, m.allocated_dv),
                None => format!("{}: none/{:.0}", m.route.id(), m.allocated_dv),
            })
            .collect();
        write!(f, "(DataMultiRoute {}: {})", self.id, parts.join(", "))
    }
}
