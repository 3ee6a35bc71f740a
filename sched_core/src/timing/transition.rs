//! Minimum transition times between activities.
//!
//! The policy classifies a pair of activities by context (one satellite or
//! two), activity types and, for crosslink pairs on one satellite, by orbital
//! topology. The resulting key indexes the configured [`TransitionTable`].
//! Lookups are memoized in an explicit [`TransitionCache`].

use std::collections::HashMap;

use log::debug;
use qtty::Seconds;

use super::topology::{OrbitCrossing, OrbitTopology};
use crate::config::{
    ActivityPair, ActivityParams, DirectionMethod, TransitionContext, TransitionType,
};
use crate::error::{ErrorContext, SchedulingError, SchedulingResult};
use crate::models::{
    ActivityCapabilities, ActivityCode, ActivityKind, ActivityWindow, SatIndex, WindowKey,
    XlnkDirection,
};

/// Full identity of a transition query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransitionQuery {
    pub act1: WindowKey,
    pub act2: WindowKey,
    pub sat1: SatIndex,
    pub sat2: SatIndex,
}

/// Unbounded memo of resolved transition times.
///
/// Population is a write; anything sharing a policy across threads must
/// partition or guard it.
#[derive(Debug, Default, Clone)]
pub struct TransitionCache {
    entries: HashMap<TransitionQuery, Seconds>,
    hits: u64,
    misses: u64,
}

impl TransitionCache {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn get(&self, query: &TransitionQuery) -> Option<Seconds> {
        self.entries.get(query).copied()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }
}

/// Which leg of a relay a crosslink plays for the satellite of interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelayLeg {
    Inbound,
    Outbound,
}

/// Resolves minimum transition times between pairs of activities.
#[derive(Debug, Clone)]
pub struct TransitionTimingPolicy {
    topology: OrbitTopology,
    params: ActivityParams,
    cache: TransitionCache,
}

impl TransitionTimingPolicy {
    pub fn new(topology: OrbitTopology, params: ActivityParams) -> Self {
        Self {
            topology,
            params,
            cache: TransitionCache::default(),
        }
    }

    pub fn topology(&self) -> &OrbitTopology {
        &self.topology
    }

    pub fn params(&self) -> &ActivityParams {
        &self.params
    }

    pub fn cache(&self) -> &TransitionCache {
        &self.cache
    }

    /// Drop memoized lookups, e.g. after windows were re-keyed.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Minimum duration configured for the type of `act`.
    pub fn act_min_duration(&self, act: &ActivityWindow) -> SchedulingResult<Seconds> {
        self.params.act_min_duration(act)
    }

    /// Minimum time required between the end of `act1` (seen from `sat1`)
    /// and the start of `act2` (seen from `sat2`).
    ///
    /// `act2` must not be centered before `act1`.
    ///
    /// # Errors
    /// * `OrderingViolation` if `act2` is centered before `act1`
    /// * `Unimplemented` for a crosslink pair seen from two different satellites
    /// * `TopologyLookup` if a crosslink endpoint has no orbit
    /// * `Configuration` if the table has no entry for the resolved key
    pub fn get_transition_time_req(
        &mut self,
        act1: &ActivityWindow,
        act2: &ActivityWindow,
        sat1: SatIndex,
        sat2: SatIndex,
    ) -> SchedulingResult<Seconds> {
        if act2.center() < act1.center() {
            return Err(SchedulingError::ordering(
                format!("{} is centered before {}", act2, act1),
                ErrorContext::new("get_transition_time_req")
                    .with_entity("window")
                    .with_entity_id(act2.key()),
            ));
        }

        let query = TransitionQuery {
            act1: act1.key().clone(),
            act2: act2.key().clone(),
            sat1,
            sat2,
        };
        if let Some(seconds) = self.cache.get(&query) {
            self.cache.hits += 1;
            return Ok(seconds);
        }

        let seconds = self.resolve(act1, act2, sat1, sat2)?;
        self.cache.misses += 1;
        self.cache.entries.insert(query, seconds);
        Ok(seconds)
    }

    fn resolve(
        &self,
        act1: &ActivityWindow,
        act2: &ActivityWindow,
        sat1: SatIndex,
        sat2: SatIndex,
    ) -> SchedulingResult<Seconds> {
        let context = if sat1 == sat2 {
            TransitionContext::IntraSat
        } else {
            TransitionContext::InterSat
        };
        let pair = ActivityPair::new(act1.codename(), act2.codename());

        let ttype = if pair.first == ActivityCode::Xlnk && pair.second == ActivityCode::Xlnk {
            if sat1 != sat2 {
                return Err(SchedulingError::Unimplemented {
                    message: "crosslink pair transition seen from two different satellites"
                        .to_string(),
                    context: ErrorContext::new("get_transition_time_req")
                        .with_entity("window")
                        .with_details(format!("{} / {}", act1.key(), act2.key())),
                });
            }
            self.xlnk_transition_type(act1.kind(), act2.kind(), sat1)?
        } else {
            TransitionType::Default
        };

        let seconds = self.params.transition_times.lookup(context, pair, ttype)?;
        debug!(
            "Transition {} -> {} ({}, {}, {}): {}s",
            act1.key(),
            act2.key(),
            context.as_str(),
            pair,
            ttype,
            seconds.value()
        );
        Ok(seconds)
    }

    /// Transmitter and receiver of a crosslink for this traversal.
    ///
    /// Directed links have a fixed orientation. A symmetric link in a relay
    /// through `sat` is inbound (partner to `sat`) as the first activity and
    /// outbound (`sat` to partner) as the second.
    fn orient(&self, xlnk: &ActivityKind, sat: SatIndex, leg: RelayLeg) -> SchedulingResult<(SatIndex, SatIndex)> {
        let partner = xlnk.xlnk_partner(sat)?;
        match xlnk {
            ActivityKind::Xlnk {
                direction: XlnkDirection::Directed { tx_sat },
                ..
            } => {
                let rx = if *tx_sat == sat { partner } else { sat };
                Ok((*tx_sat, rx))
            }
            _ => match leg {
                RelayLeg::Inbound => Ok((partner, sat)),
                RelayLeg::Outbound => Ok((sat, partner)),
            },
        }
    }

    /// Bespoke classification of two crosslinks on satellite `sat`.
    pub fn xlnk_transition_type(
        &self,
        xlnk1: &ActivityKind,
        xlnk2: &ActivityKind,
        sat: SatIndex,
    ) -> SchedulingResult<TransitionType> {
        let (tx1, rx1) = self.orient(xlnk1, sat, RelayLeg::Inbound)?;
        let (tx2, rx2) = self.orient(xlnk2, sat, RelayLeg::Outbound)?;

        let crossing1 = self.topology.orbit_crossing(tx1, rx1)?;
        let crossing2 = self.topology.orbit_crossing(tx2, rx2)?;

        if crossing1 != crossing2 {
            return Ok(TransitionType::MixedOrbitCrossing);
        }

        match crossing1 {
            OrbitCrossing::IntraOrbit => match self.params.direction_method {
                DirectionMethod::ByIncreasingId => {
                    let dir1 = self.topology.intra_orbit_direction(tx1, rx1)?;
                    let dir2 = self.topology.intra_orbit_direction(tx2, rx2)?;
                    if dir1 == dir2 {
                        Ok(TransitionType::IntraOrbitSameDirection)
                    } else {
                        Ok(TransitionType::IntraOrbitDifferentDirection)
                    }
                }
            },
            OrbitCrossing::InterOrbit => {
                if tx1 == tx2 && rx1 == rx2 {
                    Ok(TransitionType::InterOrbitSameSatellite)
                } else if self.topology.same_orbit(tx1, rx2)? {
                    if tx1 == rx2 {
                        Ok(TransitionType::InterOrbitSameSatellite)
                    } else {
                        Ok(TransitionType::InterOrbitSameOrbitDifferentSatellite)
                    }
                } else {
                    Ok(TransitionType::InterOrbitDifferentOrbit)
                }
            }
        }
    }
}
