//! Simple data routes: one observation, zero or more crosslinks, one downlink.
//!
//! A route stores window handles, never window copies. Because crosslink
//! windows are undirected and shared by many routes, the satellite on which
//! data sits at the start of each window is recorded per route.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::RoutingObjectId;
use crate::error::{ErrorContext, SchedulingError, SchedulingResult};
use crate::models::{
    ActivityCapabilities, ActivityCode, ActivityKind, ActivityWindow, GsIndex, SatIndex,
    WindowArena, WindowHandle, DV_EPSILON,
};
use crate::time::seconds_between;

/// Which instant of a source/sink window anchors a latency calculation.
///
/// Only original-time and center anchors exist: the mutable start and end
/// move as windows are trimmed, which would make latency drift between
/// scheduling passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyAnchor {
    OriginalStart,
    OriginalEnd,
    Center,
}

impl LatencyAnchor {
    pub fn instant(&self, window: &ActivityWindow) -> DateTime<Utc> {
        match self {
            LatencyAnchor::OriginalStart => window.original_start(),
            LatencyAnchor::OriginalEnd => window.original_end(),
            LatencyAnchor::Center => window.center(),
        }
    }
}

/// Which window instants must be non-decreasing along a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeOption {
    /// Every window starts and ends no earlier than the previous one ended.
    StartEnd,
    /// Window centers are non-decreasing.
    Center,
}

/// How two routes sharing a crosslink are judged to overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlapPolicy {
    /// Only when the window cannot carry both routes' data volume.
    SharedWindow,
    /// Whenever they share the window at all.
    MutexWindow,
}

/// Interval during which a satellite may hold a route's data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SatStorageInterval {
    pub sat_indx: SatIndex,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// An ordered, non-branching chain of windows from an observation to a
/// downlink.
#[derive(Debug, Clone)]
pub struct DataRoute {
    id: RoutingObjectId,
    windows: Vec<WindowHandle>,
    start_sats: HashMap<WindowHandle, SatIndex>,
    data_vol: f64,
    scheduled_dv: Option<f64>,
    dv_epsilon: f64,
    obs_dv_multiplier: f64,
    allowed_overlaps_start: HashSet<WindowHandle>,
}

impl DataRoute {
    /// Create a route from an explicit window sequence and entry-satellite map.
    ///
    /// Nothing is checked here; call [`DataRoute::validate`].
    pub fn new(
        id: RoutingObjectId,
        windows: Vec<WindowHandle>,
        start_sats: HashMap<WindowHandle, SatIndex>,
        data_vol: f64,
    ) -> Self {
        Self {
            id,
            windows,
            start_sats,
            data_vol,
            scheduled_dv: None,
            dv_epsilon: DV_EPSILON,
            obs_dv_multiplier: 1.0,
            allowed_overlaps_start: HashSet::new(),
        }
    }

    /// Create a route from an unordered set of windows, sorting them by start
    /// time and tracing the entry satellite of each.
    pub fn from_windows(
        id: RoutingObjectId,
        arena: &WindowArena,
        mut windows: Vec<WindowHandle>,
        data_vol: f64,
    ) -> SchedulingResult<Self> {
        let start_sats = Self::determine_window_start_sats(arena, &mut windows)?;
        Ok(Self::new(id, windows, start_sats, data_vol))
    }

    pub fn with_dv_epsilon(mut self, dv_epsilon: f64) -> Self {
        self.dv_epsilon = dv_epsilon;
        self
    }

    /// Let the route carry up to `multiplier` times the observation's data
    /// volume.
    pub fn with_obs_dv_multiplier(mut self, multiplier: f64) -> Self {
        self.obs_dv_multiplier = multiplier;
        self
    }

    /// Tolerate a timing overlap at the start of `window` during validation.
    pub fn allow_overlap_at_start(&mut self, window: WindowHandle) {
        self.allowed_overlaps_start.insert(window);
    }

    /// Sort `windows` by start time and trace the satellite holding the data
    /// at the start of each.
    ///
    /// The first window must be an observation and the last a downlink.
    pub fn determine_window_start_sats(
        arena: &WindowArena,
        windows: &mut Vec<WindowHandle>,
    ) -> SchedulingResult<HashMap<WindowHandle, SatIndex>> {
        let mut keyed = Vec::with_capacity(windows.len());
        for h in windows.iter() {
            keyed.push((arena.get(*h)?.start(), *h));
        }
        keyed.sort();
        *windows = keyed.into_iter().map(|(_, h)| h).collect();

        let (first, last) = match (windows.first(), windows.last()) {
            (Some(f), Some(l)) => (arena.get(*f)?, arena.get(*l)?),
            _ => {
                return Err(SchedulingError::window_state_with_context(
                    "cannot trace an empty window list",
                    ErrorContext::new("determine_window_start_sats").with_entity("route"),
                ))
            }
        };
        if first.codename() != ActivityCode::Obs || last.codename() != ActivityCode::Dlnk {
            return Err(SchedulingError::window_state_with_context(
                "route windows must start with an observation and end with a downlink",
                ErrorContext::new("determine_window_start_sats").with_entity("route"),
            ));
        }

        let mut start_sats = HashMap::with_capacity(windows.len());
        let mut curr = first.kind().sat_indx();
        for h in windows.iter() {
            start_sats.insert(*h, curr);
            let w = arena.get(*h)?;
            if w.codename() == ActivityCode::Xlnk {
                curr = w.kind().xlnk_partner(curr)?;
            }
        }
        Ok(start_sats)
    }

    // ---- accessors ----

    pub fn id(&self) -> &RoutingObjectId {
        &self.id
    }

    pub fn windows(&self) -> &[WindowHandle] {
        &self.windows
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn contains_window(&self, window: WindowHandle) -> bool {
        self.windows.contains(&window)
    }

    /// Satellite holding the data when `window` starts, for this traversal.
    pub fn start_sat(&self, window: WindowHandle) -> Option<SatIndex> {
        self.start_sats.get(&window).copied()
    }

    pub fn data_vol(&self) -> f64 {
        self.data_vol
    }

    pub fn scheduled_dv(&self) -> Option<f64> {
        self.scheduled_dv
    }

    pub fn dv_epsilon(&self) -> f64 {
        self.dv_epsilon
    }

    /// Record the scheduled data volume; bounds are checked by `validate`.
    pub fn set_scheduled_dv(&mut self, scheduled_dv: f64) {
        self.scheduled_dv = Some(scheduled_dv);
    }

    /// Add data volume without validation.
    pub fn add_dv(&mut self, delta_dv: f64) {
        self.data_vol += delta_dv;
    }

    /// Remove data volume; fails if more is removed than the route carries.
    pub fn remove_dv(&mut self, delta_dv: f64) -> SchedulingResult<()> {
        if delta_dv > self.data_vol {
            return Err(SchedulingError::window_state_with_context(
                format!(
                    "delta dv ({}) is greater than remaining dv ({})",
                    delta_dv, self.data_vol
                ),
                ErrorContext::new("remove_dv")
                    .with_entity("route")
                    .with_entity_id(&self.id),
            ));
        }
        self.data_vol -= delta_dv;
        Ok(())
    }

    fn first(&self) -> SchedulingResult<WindowHandle> {
        self.windows
            .first()
            .copied()
            .ok_or_else(|| SchedulingError::route_validation(&self.id, 0, "empty route"))
    }

    fn last(&self) -> SchedulingResult<WindowHandle> {
        self.windows
            .last()
            .copied()
            .ok_or_else(|| SchedulingError::route_validation(&self.id, 0, "empty route"))
    }

    /// The observation at the head of the route.
    pub fn obs(&self) -> SchedulingResult<WindowHandle> {
        self.first()
    }

    /// The downlink at the tail of the route.
    pub fn dlnk(&self, arena: &WindowArena) -> SchedulingResult<WindowHandle> {
        let last = self.last()?;
        if arena.get(last)?.codename() != ActivityCode::Dlnk {
            return Err(SchedulingError::route_validation(
                &self.id,
                self.windows.len() - 1,
                "last window is not a downlink",
            ));
        }
        Ok(last)
    }

    pub fn has_xlnk(&self, arena: &WindowArena) -> SchedulingResult<bool> {
        for h in &self.windows {
            if arena.get(*h)?.codename() == ActivityCode::Xlnk {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn has_sat_indx(&self, arena: &WindowArena, sat: SatIndex) -> SchedulingResult<bool> {
        for h in &self.windows {
            if arena.get(*h)?.has_sat_indx(sat) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn has_gs_indx(&self, arena: &WindowArena, gs: GsIndex) -> SchedulingResult<bool> {
        for h in &self.windows {
            if arena.get(*h)?.kind().has_gs_indx(gs) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Minutes from the observation anchor to the downlink anchor.
    pub fn latency(
        &self,
        arena: &WindowArena,
        obs_anchor: LatencyAnchor,
        dlnk_anchor: LatencyAnchor,
    ) -> SchedulingResult<f64> {
        let obs = arena.get(self.obs()?)?;
        let dlnk = arena.get(self.dlnk(arena)?)?;
        Ok(seconds_between(obs_anchor.instant(obs), dlnk_anchor.instant(dlnk)) / 60.0)
    }

    // ---- validation ----

    /// Check ordering, satellite continuity, timing and data volume along
    /// the route.
    ///
    /// # Errors
    /// `RouteValidation` naming the route and the index of the first
    /// offending window.
    pub fn validate(&self, arena: &WindowArena, time_option: TimeOption) -> SchedulingResult<()> {
        let fail = |index: usize, reason: String| SchedulingError::route_validation(&self.id, index, reason);

        let first = self.first()?;
        let obs = arena.get(first)?;
        if obs.codename() != ActivityCode::Obs {
            return Err(fail(0, "first window is not an observation".to_string()));
        }
        if let Some(scheduled) = self.scheduled_dv {
            if scheduled < -self.dv_epsilon || scheduled > self.data_vol + self.dv_epsilon {
                return Err(fail(
                    0,
                    format!(
                        "scheduled data volume {} outside [0, route data volume {}]",
                        scheduled, self.data_vol
                    ),
                ));
            }
        }

        let last_index = self.windows.len() - 1;
        if last_index == 0 {
            return Err(fail(0, "route has no downlink".to_string()));
        }
        let mut next_sat = obs.kind().sat_indx();
        let mut last_time = obs.start();

        for (index, h) in self.windows.iter().enumerate() {
            let wind = arena.get(*h)?;
            let code = wind.codename();

            let position_ok = match code {
                ActivityCode::Obs => index == 0,
                ActivityCode::Dlnk => index == last_index,
                ActivityCode::Xlnk => index != 0 && index != last_index,
            };
            if !position_ok {
                let reason = if index == last_index {
                    format!("last window is {} not a downlink", code)
                } else {
                    format!("unexpected {} window inside the route", code)
                };
                return Err(fail(index, reason));
            }

            match self.start_sats.get(h) {
                Some(sat) if *sat == next_sat => {}
                Some(sat) => {
                    return Err(fail(
                        index,
                        format!("satellite discontinuity: entry sat {} but data is on sat {}", sat, next_sat),
                    ))
                }
                None => return Err(fail(index, "window has no entry satellite".to_string())),
            }
            if !wind.has_sat_indx(next_sat) {
                return Err(fail(
                    index,
                    format!("satellite discontinuity: window does not involve sat {}", next_sat),
                ));
            }

            let mut time_valid = match time_option {
                TimeOption::StartEnd => wind.start() >= last_time && wind.end() >= last_time,
                TimeOption::Center => wind.center() >= last_time,
            };
            if !time_valid && self.allowed_overlaps_start.contains(h) {
                time_valid = true;
            }
            if !time_valid {
                return Err(fail(index, "window starts before the previous window ended".to_string()));
            }

            let capacity = if code == ActivityCode::Obs {
                wind.data_vol() * self.obs_dv_multiplier
            } else {
                wind.data_vol()
            };
            if self.data_vol > capacity + self.dv_epsilon {
                return Err(fail(
                    index,
                    format!("route data volume {} exceeds window capacity {}", self.data_vol, capacity),
                ));
            }
            if wind.scheduled_dv() > wind.data_vol() + self.dv_epsilon {
                return Err(fail(
                    index,
                    format!(
                        "window scheduled data volume {} exceeds its capacity {}",
                        wind.scheduled_dv(),
                        wind.data_vol()
                    ),
                ));
            }

            if let ActivityKind::Xlnk { .. } = wind.kind() {
                let curr_sat = next_sat;
                next_sat = wind.kind().xlnk_partner(curr_sat)?;
                if let Some(tx) = wind.kind().tx_sat() {
                    if tx != curr_sat {
                        return Err(fail(
                            index,
                            format!("directed crosslink transmits from sat {} but data is on sat {}", tx, curr_sat),
                        ));
                    }
                }
            }

            last_time = match time_option {
                TimeOption::StartEnd => wind.end(),
                TimeOption::Center => wind.center(),
            };
        }
        Ok(())
    }

    // ---- structure queries ----

    /// The last window this route shares with `other`, walking both from the
    /// observation.
    pub fn split_window(&self, other: &DataRoute) -> SchedulingResult<WindowHandle> {
        if self.windows.first() != other.windows.first() || self.windows.is_empty() {
            return Err(SchedulingError::route_validation(
                &self.id,
                0,
                format!("route does not share its observation with {}", other.id),
            ));
        }
        let common = self
            .windows
            .iter()
            .zip(other.windows.iter())
            .take_while(|(a, b)| a == b)
            .count();
        Ok(self.windows[common - 1])
    }

    /// Number of crosslinks shared with `other` that count as overlapping
    /// under `policy`.
    pub fn count_overlap(
        &self,
        arena: &WindowArena,
        other: &DataRoute,
        policy: OverlapPolicy,
    ) -> SchedulingResult<usize> {
        let mut count = 0;
        for h in &self.windows {
            let wind = arena.get(*h)?;
            if wind.codename() != ActivityCode::Xlnk || !other.contains_window(*h) {
                continue;
            }
            let overlapping = match policy {
                OverlapPolicy::SharedWindow => self.data_vol + other.data_vol > wind.data_vol(),
                OverlapPolicy::MutexWindow => true,
            };
            if overlapping {
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn is_overlapping(
        &self,
        arena: &WindowArena,
        other: &DataRoute,
        policy: OverlapPolicy,
    ) -> SchedulingResult<bool> {
        Ok(self.count_overlap(arena, other, policy)? > 0)
    }

    /// True if `other` is a prefix of this route.
    pub fn contains_route(&self, other: &DataRoute) -> bool {
        other.windows.len() <= self.windows.len()
            && self.windows.iter().zip(other.windows.iter()).all(|(a, b)| a == b)
    }

    /// Conservative storage intervals: for each adjacent pair of windows, the
    /// entry satellite of the second holds the data from the start of the
    /// first to the end of the second.
    pub fn storage_intervals(&self, arena: &WindowArena) -> SchedulingResult<Vec<SatStorageInterval>> {
        let mut intervals = Vec::with_capacity(self.windows.len().saturating_sub(1));
        for (index, pair) in self.windows.windows(2).enumerate() {
            let wind1 = arena.get(pair[0])?;
            let wind2 = arena.get(pair[1])?;
            let sat_indx = self.start_sat(pair[1]).ok_or_else(|| {
                SchedulingError::route_validation(&self.id, index + 1, "window has no entry satellite")
            })?;
            intervals.push(SatStorageInterval {
                sat_indx,
                start: wind1.start(),
                end: wind2.end(),
            });
        }
        Ok(intervals)
    }

    /// Entry satellite of the window at `index`.
    fn entry_sat(&self, index: usize) -> SchedulingResult<SatIndex> {
        self.start_sat(self.windows[index]).ok_or_else(|| {
            SchedulingError::route_validation(&self.id, index, "window has no entry satellite")
        })
    }

    /// Whether `sat` takes the data in during the window at `index`, following
    /// this route's traversal rather than the window's own link roles.
    fn receives_at(&self, arena: &WindowArena, index: usize, sat: SatIndex) -> SchedulingResult<bool> {
        let wind = arena.get(self.windows[index])?;
        match wind.kind() {
            ActivityKind::Obs { sat_indx, .. } => Ok(*sat_indx == sat),
            ActivityKind::Xlnk { .. } => Ok(wind.kind().xlnk_partner(self.entry_sat(index)?)? == sat),
            ActivityKind::Dlnk { .. } => Ok(false),
        }
    }

    /// Whether `sat` sends the data on during the window at `index`.
    fn transmits_at(&self, arena: &WindowArena, index: usize, sat: SatIndex) -> SchedulingResult<bool> {
        let wind = arena.get(self.windows[index])?;
        match wind.kind() {
            ActivityKind::Obs { .. } => Ok(false),
            ActivityKind::Xlnk { .. } | ActivityKind::Dlnk { .. } => Ok(self.entry_sat(index)? == sat),
        }
    }

    /// Windows up to and including the first one in which `sat` receives.
    pub fn inflow_windows_rx_sat(&self, arena: &WindowArena, sat: SatIndex) -> SchedulingResult<Vec<WindowHandle>> {
        for index in 0..self.windows.len() {
            if self.receives_at(arena, index, sat)? {
                return Ok(self.windows[..=index].to_vec());
            }
        }
        Err(SchedulingError::not_found_with_context(
            format!("satellite {} never receives in route {}", sat, self.id),
            ErrorContext::new("inflow_windows_rx_sat").with_entity("route"),
        ))
    }

    /// Windows from the first one in which `sat` transmits to the end.
    pub fn outflow_windows_tx_sat(&self, arena: &WindowArena, sat: SatIndex) -> SchedulingResult<Vec<WindowHandle>> {
        for index in 0..self.windows.len() {
            if self.transmits_at(arena, index, sat)? {
                return Ok(self.windows[index..].to_vec());
            }
        }
        Err(SchedulingError::not_found_with_context(
            format!("satellite {} never transmits in route {}", sat, self.id),
            ErrorContext::new("outflow_windows_tx_sat").with_entity("route"),
        ))
    }

    /// Compact description, e.g. `o 1 s0 dv 100 -> x 4 s0,xs2 dv 80 -> d 9 s2 dv 60`.
    pub fn describe(&self, arena: &WindowArena) -> SchedulingResult<String> {
        let mut parts = Vec::with_capacity(self.windows.len());
        for h in &self.windows {
            let w = arena.get(*h)?;
            let part = match w.kind() {
                ActivityKind::Obs { sat_indx, .. } => {
                    format!("o {} s{} dv {:.0}", w.key(), sat_indx, w.data_vol())
                }
                ActivityKind::Xlnk { .. } => {
                    let sat = self.start_sat(*h).unwrap_or_else(|| w.kind().sat_indx());
                    let xsat = w.kind().xlnk_partner(sat)?;
                    format!("x {} s{},xs{} dv {:.0}", w.key(), sat, xsat, w.data_vol())
                }
                ActivityKind::Dlnk { sat_indx, .. } => {
                    format!("d {} s{} dv {:.0}", w.key(), sat_indx, w.data_vol())
                }
            };
            parts.push(part);
        }
        Ok(parts.join(" -> "))
    }
}

impl PartialEq for DataRoute {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DataRoute {}

impl fmt::Display for DataRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scheduled_dv {
            Some(s) => write!(f, "(dr {}: {} windows; sched dv: {:.0}/{:.0} Mb)", self.id, self.windows.len(), s, self.data_vol),
            None => write!(f, "(dr {}: {} windows; sched dv: none/{:.0} Mb)", self.id, self.windows.len(), self.data_vol),
        }
    }
}
