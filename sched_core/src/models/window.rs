//! Activity and event windows.
//!
//! An [`ActivityWindow`] freezes its original timing and capacity at
//! construction. Later trimming, re-centering and optimizer writeback mutate
//! only the current bounds and the scheduled/executable state, so capacity and
//! rate math always refer back to the original interval.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use log::warn;
use qtty::Seconds;
use serde::{Deserialize, Serialize};

use crate::define_id_type;
use crate::error::{ErrorContext, SchedulingError, SchedulingResult};
use crate::time::{midpoint, offset_by_seconds, seconds_between};

define_id_type! {
    /// Numeric part of a window identifier, unique within its namespace.
    WindowId(u64)
}

define_id_type! {
    /// Position of a satellite in the fleet's satellite ID order.
    SatIndex(usize)
}

define_id_type! {
    /// Position of a ground station in the station list.
    GsIndex(usize)
}

/// Tolerance on data volume comparisons (Mb).
pub const DV_EPSILON: f64 = 1e-5;

const UTILIZATION_EPSILON: f64 = 1e-9;

// =========================================================================
// Identity
// =========================================================================

/// Identity of a window: numeric ID plus an optional namespace so that ID
/// sequences from different producers never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowKey {
    pub id: WindowId,
    pub namespace: Option<String>,
}

impl WindowKey {
    pub fn new(id: u64) -> Self {
        Self {
            id: WindowId(id),
            namespace: None,
        }
    }

    pub fn namespaced(id: u64, namespace: impl Into<String>) -> Self {
        Self {
            id: WindowId(id),
            namespace: Some(namespace.into()),
        }
    }
}

impl fmt::Display for WindowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

// =========================================================================
// EventWindow
// =========================================================================

/// A plain time interval with cached center and duration.
///
/// Equality and hashing use only the [`WindowKey`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventWindow {
    key: WindowKey,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    center: DateTime<Utc>,
    duration: Seconds,
}

impl EventWindow {
    /// Create a window, rejecting intervals that end before they start.
    pub fn new(key: WindowKey, start: DateTime<Utc>, end: DateTime<Utc>) -> SchedulingResult<Self> {
        if end < start {
            return Err(SchedulingError::window_state_with_context(
                "window end precedes start",
                ErrorContext::new("new_window")
                    .with_entity("window")
                    .with_entity_id(&key),
            ));
        }
        Ok(Self {
            key,
            start,
            end,
            center: midpoint(start, end),
            duration: Seconds::new(seconds_between(start, end)),
        })
    }

    pub fn key(&self) -> &WindowKey {
        &self.key
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn center(&self) -> DateTime<Utc> {
        self.center
    }

    pub fn duration(&self) -> Seconds {
        self.duration
    }

    /// True if `t` lies within `[start, end]`.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t <= self.end
    }

    fn set_bounds(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) {
        self.start = start;
        self.end = end;
        self.center = midpoint(start, end);
        self.duration = Seconds::new(seconds_between(start, end));
    }
}

impl PartialEq for EventWindow {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for EventWindow {}

impl Hash for EventWindow {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl AsRef<EventWindow> for EventWindow {
    fn as_ref(&self) -> &EventWindow {
        self
    }
}

/// A satellite eclipse interval. Carries no capacity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EclipseWindow {
    event: EventWindow,
}

impl EclipseWindow {
    pub fn new(key: WindowKey, start: DateTime<Utc>, end: DateTime<Utc>) -> SchedulingResult<Self> {
        Ok(Self {
            event: EventWindow::new(key, start, end)?,
        })
    }

    pub fn event(&self) -> &EventWindow {
        &self.event
    }
}

impl AsRef<EventWindow> for EclipseWindow {
    fn as_ref(&self) -> &EventWindow {
        &self.event
    }
}

/// Step through windows sorted by start time and locate the one containing `t`.
///
/// Returns the containing window (if any) and the index of the first window
/// that has not ended before `t`. The search starts at `start_index`, so a
/// caller walking forward in time can reuse the returned index.
pub fn find_window_at<W: AsRef<EventWindow>>(
    t: DateTime<Utc>,
    start_index: usize,
    windows: &[W],
) -> (Option<&W>, Option<usize>) {
    if windows.is_empty() {
        return (None, None);
    }
    let mut index = start_index.min(windows.len() - 1);
    while index < windows.len() - 1 && t > windows[index].as_ref().end() {
        index += 1;
    }
    let candidate = &windows[index];
    if candidate.as_ref().contains(t) {
        (Some(candidate), Some(index))
    } else {
        (None, Some(index))
    }
}

// =========================================================================
// Activity variants
// =========================================================================

/// Short code for an activity type, as used in configuration tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityCode {
    Obs,
    Dlnk,
    Xlnk,
}

impl ActivityCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityCode::Obs => "obs",
            ActivityCode::Dlnk => "dlnk",
            ActivityCode::Xlnk => "xlnk",
        }
    }
}

impl fmt::Display for ActivityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "obs" => Ok(ActivityCode::Obs),
            "dlnk" => Ok(ActivityCode::Dlnk),
            "xlnk" => Ok(ActivityCode::Xlnk),
            other => Err(format!("Unknown activity code '{}'", other)),
        }
    }
}

/// Directionality of a crosslink.
///
/// A symmetric crosslink can carry data either way; which satellite transmits
/// is decided per route traversal, never stored on the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum XlnkDirection {
    Symmetric,
    Directed { tx_sat: SatIndex },
}

/// Type-specific payload of an activity window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActivityKind {
    Obs {
        sat_indx: SatIndex,
        target_ids: BTreeSet<String>,
        sat_target_indx: usize,
    },
    Dlnk {
        sat_indx: SatIndex,
        gs_indx: GsIndex,
        sat_gs_indx: usize,
    },
    Xlnk {
        sat_indx: SatIndex,
        xsat_indx: SatIndex,
        sat_xsat_indx: usize,
        direction: XlnkDirection,
    },
}

impl ActivityKind {
    pub fn obs<I, S>(sat_indx: SatIndex, target_ids: I, sat_target_indx: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ActivityKind::Obs {
            sat_indx,
            target_ids: target_ids.into_iter().map(Into::into).collect(),
            sat_target_indx,
        }
    }

    pub fn dlnk(sat_indx: SatIndex, gs_indx: GsIndex, sat_gs_indx: usize) -> Self {
        ActivityKind::Dlnk {
            sat_indx,
            gs_indx,
            sat_gs_indx,
        }
    }

    /// Build a crosslink payload.
    ///
    /// Fails if both ends are the same satellite or if a directed link names a
    /// transmitter that is not one of its endpoints.
    pub fn xlnk(
        sat_indx: SatIndex,
        xsat_indx: SatIndex,
        sat_xsat_indx: usize,
        direction: XlnkDirection,
    ) -> SchedulingResult<Self> {
        if sat_indx == xsat_indx {
            return Err(SchedulingError::window_state(format!(
                "crosslink endpoints must differ (both are sat {})",
                sat_indx
            )));
        }
        if let XlnkDirection::Directed { tx_sat } = direction {
            if tx_sat != sat_indx && tx_sat != xsat_indx {
                return Err(SchedulingError::window_state(format!(
                    "crosslink transmitter {} is not an endpoint of {}<->{}",
                    tx_sat, sat_indx, xsat_indx
                )));
            }
        }
        Ok(ActivityKind::Xlnk {
            sat_indx,
            xsat_indx,
            sat_xsat_indx,
            direction,
        })
    }

    /// Primary satellite (for crosslinks, side A of the link).
    pub fn sat_indx(&self) -> SatIndex {
        match self {
            ActivityKind::Obs { sat_indx, .. }
            | ActivityKind::Dlnk { sat_indx, .. }
            | ActivityKind::Xlnk { sat_indx, .. } => *sat_indx,
        }
    }

    pub fn gs_indx(&self) -> Option<GsIndex> {
        match self {
            ActivityKind::Dlnk { gs_indx, .. } => Some(*gs_indx),
            _ => None,
        }
    }

    pub fn has_gs_indx(&self, gs: GsIndex) -> bool {
        self.gs_indx() == Some(gs)
    }

    pub fn is_symmetric_xlnk(&self) -> bool {
        matches!(
            self,
            ActivityKind::Xlnk {
                direction: XlnkDirection::Symmetric,
                ..
            }
        )
    }

    /// Transmitting satellite of a directed crosslink.
    pub fn tx_sat(&self) -> Option<SatIndex> {
        match self {
            ActivityKind::Xlnk {
                direction: XlnkDirection::Directed { tx_sat },
                ..
            } => Some(*tx_sat),
            _ => None,
        }
    }

    /// Receiving satellite of a directed crosslink.
    pub fn rx_sat(&self) -> Option<SatIndex> {
        match self {
            ActivityKind::Xlnk {
                sat_indx,
                xsat_indx,
                direction: XlnkDirection::Directed { tx_sat },
                ..
            } => Some(if sat_indx != tx_sat { *sat_indx } else { *xsat_indx }),
            _ => None,
        }
    }

    /// The other end of a crosslink, from `sat`'s perspective.
    pub fn xlnk_partner(&self, sat: SatIndex) -> SchedulingResult<SatIndex> {
        match self {
            ActivityKind::Xlnk {
                sat_indx,
                xsat_indx,
                ..
            } => {
                if sat == *sat_indx {
                    Ok(*xsat_indx)
                } else if sat == *xsat_indx {
                    Ok(*sat_indx)
                } else {
                    Err(wrong_sat("xlnk_partner", sat))
                }
            }
            _ => Err(SchedulingError::window_state(format!(
                "{} window has no crosslink partner",
                self.codename()
            ))),
        }
    }
}

fn wrong_sat(operation: &str, sat: SatIndex) -> SchedulingError {
    SchedulingError::window_state_with_context(
        "queried activity window with a satellite it does not involve",
        ErrorContext::new(operation)
            .with_entity("satellite")
            .with_entity_id(sat),
    )
}

/// Capability queries shared by every activity variant.
pub trait ActivityCapabilities {
    /// Type code of the activity.
    fn codename(&self) -> ActivityCode;

    /// True if `sat` takes part in the activity.
    fn has_sat_indx(&self, sat: SatIndex) -> bool;

    /// True if `sat` receives data during the activity.
    fn is_rx(&self, sat: SatIndex) -> SchedulingResult<bool>;

    /// True if `sat` transmits data during the activity.
    fn is_tx(&self, sat: SatIndex) -> SchedulingResult<bool>;

    /// Energy-model code: `obs`, `dlnk`, `xlnk_tx` or `xlnk_rx`.
    fn e_dot_codename(&self, sat: SatIndex) -> SchedulingResult<&'static str>;
}

impl ActivityCapabilities for ActivityKind {
    fn codename(&self) -> ActivityCode {
        match self {
            ActivityKind::Obs { .. } => ActivityCode::Obs,
            ActivityKind::Dlnk { .. } => ActivityCode::Dlnk,
            ActivityKind::Xlnk { .. } => ActivityCode::Xlnk,
        }
    }

    fn has_sat_indx(&self, sat: SatIndex) -> bool {
        match self {
            ActivityKind::Obs { sat_indx, .. } | ActivityKind::Dlnk { sat_indx, .. } => {
                *sat_indx == sat
            }
            ActivityKind::Xlnk {
                sat_indx,
                xsat_indx,
                ..
            } => *sat_indx == sat || *xsat_indx == sat,
        }
    }

    fn is_rx(&self, sat: SatIndex) -> SchedulingResult<bool> {
        if !self.has_sat_indx(sat) {
            return Err(wrong_sat("is_rx", sat));
        }
        Ok(match self {
            ActivityKind::Obs { .. } => true,
            ActivityKind::Dlnk { .. } => false,
            ActivityKind::Xlnk { direction, .. } => match direction {
                XlnkDirection::Symmetric => true,
                XlnkDirection::Directed { tx_sat } => *tx_sat != sat,
            },
        })
    }

    fn is_tx(&self, sat: SatIndex) -> SchedulingResult<bool> {
        if !self.has_sat_indx(sat) {
            return Err(wrong_sat("is_tx", sat));
        }
        Ok(match self {
            ActivityKind::Obs { .. } => false,
            ActivityKind::Dlnk { .. } => true,
            ActivityKind::Xlnk { direction, .. } => match direction {
                XlnkDirection::Symmetric => true,
                XlnkDirection::Directed { tx_sat } => *tx_sat == sat,
            },
        })
    }

    fn e_dot_codename(&self, sat: SatIndex) -> SchedulingResult<&'static str> {
        if !self.has_sat_indx(sat) {
            return Err(wrong_sat("e_dot_codename", sat));
        }
        Ok(match self {
            ActivityKind::Obs { .. } => "obs",
            ActivityKind::Dlnk { .. } => "dlnk",
            ActivityKind::Xlnk { direction, .. } => match direction {
                XlnkDirection::Directed { tx_sat } if *tx_sat != sat => "xlnk_rx",
                _ => "xlnk_tx",
            },
        })
    }
}

// =========================================================================
// ActivityWindow
// =========================================================================

/// Start, end and data volume of a window as planned for (or observed during)
/// execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub data_vol: f64,
}

/// A candidate or scheduled observation, downlink or crosslink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityWindow {
    event: EventWindow,
    kind: ActivityKind,
    original_start: DateTime<Utc>,
    original_end: DateTime<Utc>,
    data_vol: f64,
    original_data_vol: f64,
    ave_data_rate: f64,
    timing_updated: bool,
    scheduled_dv: f64,
    executable: Option<ExecutionRecord>,
    executed: Option<ExecutionRecord>,
}

impl ActivityWindow {
    /// Create an activity window with its capacity.
    ///
    /// The original bounds, the original capacity and the average data rate
    /// (`data_vol / duration`) are frozen here.
    pub fn new(
        key: WindowKey,
        kind: ActivityKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        data_vol: f64,
    ) -> SchedulingResult<Self> {
        let event = EventWindow::new(key, start, end)?;
        let mut window = Self {
            event,
            kind,
            original_start: start,
            original_end: end,
            data_vol: 0.0,
            original_data_vol: 0.0,
            ave_data_rate: 0.0,
            timing_updated: false,
            scheduled_dv: 0.0,
            executable: None,
            executed: None,
        };
        window.set_data_vol(data_vol)?;
        Ok(window)
    }

    fn context(&self, operation: &str) -> ErrorContext {
        ErrorContext::new(operation)
            .with_entity(self.codename().as_str())
            .with_entity_id(self.key())
    }

    // ---- read accessors ----

    pub fn key(&self) -> &WindowKey {
        self.event.key()
    }

    pub fn event(&self) -> &EventWindow {
        &self.event
    }

    pub fn kind(&self) -> &ActivityKind {
        &self.kind
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.event.start()
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.event.end()
    }

    pub fn center(&self) -> DateTime<Utc> {
        self.event.center()
    }

    pub fn duration(&self) -> Seconds {
        self.event.duration()
    }

    pub fn original_start(&self) -> DateTime<Utc> {
        self.original_start
    }

    pub fn original_end(&self) -> DateTime<Utc> {
        self.original_end
    }

    pub fn original_duration(&self) -> Seconds {
        Seconds::new(seconds_between(self.original_start, self.original_end))
    }

    pub fn data_vol(&self) -> f64 {
        self.data_vol
    }

    pub fn original_data_vol(&self) -> f64 {
        self.original_data_vol
    }

    /// Average data rate over the original interval, frozen at capacity
    /// assignment.
    pub fn ave_data_rate(&self) -> f64 {
        self.ave_data_rate
    }

    pub fn scheduled_dv(&self) -> f64 {
        self.scheduled_dv
    }

    pub fn timing_updated(&self) -> bool {
        self.timing_updated
    }

    pub fn executable(&self) -> Option<&ExecutionRecord> {
        self.executable.as_ref()
    }

    pub fn executed(&self) -> Option<&ExecutionRecord> {
        self.executed.as_ref()
    }

    /// Fraction of current capacity that is scheduled.
    pub fn utilization(&self) -> f64 {
        if self.data_vol > 0.0 {
            self.scheduled_dv / self.data_vol
        } else {
            0.0
        }
    }

    // ---- capacity ----

    /// Assign capacity and refreeze the original capacity and average rate.
    ///
    /// Only legal before any timing mutation.
    pub fn set_data_vol(&mut self, data_vol: f64) -> SchedulingResult<()> {
        if self.timing_updated {
            return Err(SchedulingError::window_state_with_context(
                "cannot reassign capacity (and recompute the average data rate) after the window timing was updated",
                self.context("set_data_vol"),
            ));
        }
        if !data_vol.is_finite() || data_vol < 0.0 {
            return Err(SchedulingError::window_state_with_context(
                format!("invalid data volume {}", data_vol),
                self.context("set_data_vol"),
            ));
        }
        if self.scheduled_dv > data_vol + DV_EPSILON {
            return Err(SchedulingError::window_state_with_context(
                format!(
                    "capacity {} would fall below scheduled data volume {}",
                    data_vol, self.scheduled_dv
                ),
                self.context("set_data_vol"),
            ));
        }
        let duration_s = self.original_duration().value();
        self.data_vol = data_vol;
        self.original_data_vol = data_vol;
        self.ave_data_rate = if duration_s > 0.0 {
            data_vol / duration_s
        } else {
            0.0
        };
        Ok(())
    }

    /// Assign capacity from a constant data rate over the original interval.
    pub fn set_data_vol_from_rate(&mut self, rate: f64) -> SchedulingResult<()> {
        let data_vol = rate * self.original_duration().value();
        self.set_data_vol(data_vol)
    }

    /// Record the optimizer's scheduled data volume for this window.
    ///
    /// Values within [`DV_EPSILON`] below zero are clamped to zero.
    pub fn set_scheduled_dv(&mut self, scheduled_dv: f64) -> SchedulingResult<()> {
        if !scheduled_dv.is_finite()
            || scheduled_dv < -DV_EPSILON
            || scheduled_dv > self.data_vol + DV_EPSILON
        {
            return Err(SchedulingError::window_state_with_context(
                format!(
                    "scheduled data volume {} outside [0, {}]",
                    scheduled_dv, self.data_vol
                ),
                self.context("set_scheduled_dv"),
            ));
        }
        self.scheduled_dv = scheduled_dv.max(0.0);
        Ok(())
    }

    // ---- timing ----

    /// Move the start to `new_start` and the end symmetrically about the
    /// center, scaling capacity by the frozen average data rate.
    ///
    /// Trimming only proceeds from the original edges toward the center.
    pub fn modify_time(&mut self, new_start: DateTime<Utc>) -> SchedulingResult<()> {
        let center = self.center();
        if new_start > center {
            return Err(SchedulingError::window_state_with_context(
                "new start is past the window center",
                self.context("modify_time"),
            ));
        }
        if new_start < self.original_start {
            return Err(SchedulingError::window_state_with_context(
                "new start precedes the original start",
                self.context("modify_time"),
            ));
        }
        let half_s = seconds_between(new_start, center);
        let new_data_vol = self.ave_data_rate * 2.0 * half_s;
        if self.scheduled_dv > new_data_vol + DV_EPSILON {
            return Err(SchedulingError::window_state_with_context(
                format!(
                    "trimmed capacity {} is below scheduled data volume {}",
                    new_data_vol, self.scheduled_dv
                ),
                self.context("modify_time"),
            ));
        }
        let new_end = offset_by_seconds(center, half_s);
        self.event.set_bounds(new_start, new_end);
        self.data_vol = new_data_vol;
        self.timing_updated = true;
        Ok(())
    }

    /// Re-center the window so its duration carries exactly the scheduled
    /// data volume at the frozen average rate, floored at `min_duration`.
    pub fn update_duration_from_scheduled_dv(&mut self, min_duration: Seconds) -> SchedulingResult<()> {
        let original_s = self.original_duration().value();
        if original_s < min_duration.value() {
            return Err(SchedulingError::window_state_with_context(
                format!(
                    "original duration {}s is less than the minimum allowed duration {}s",
                    original_s,
                    min_duration.value()
                ),
                self.context("update_duration_from_scheduled_dv"),
            ));
        }
        let scheduled_s = if self.ave_data_rate > 0.0 {
            self.scheduled_dv / self.ave_data_rate
        } else {
            0.0
        };
        let scheduled_s = scheduled_s.max(min_duration.value());

        let center = self.center();
        self.event.set_bounds(
            offset_by_seconds(center, -scheduled_s / 2.0),
            offset_by_seconds(center, scheduled_s / 2.0),
        );
        self.data_vol = (self.ave_data_rate * scheduled_s).max(self.scheduled_dv);
        self.timing_updated = true;
        Ok(())
    }

    // ---- post-solve ----

    /// Set the executable interval and data volume from a time utilization
    /// and a data volume utilization.
    ///
    /// Execution assumes time and data volume scale together, so the two
    /// utilizations must agree.
    pub fn set_executable_utilization(&mut self, t_util: f64, dv_util: f64) -> SchedulingResult<()> {
        if (t_util - dv_util).abs() > UTILIZATION_EPSILON {
            return Err(SchedulingError::window_state_with_context(
                format!(
                    "time utilization {} differs from data volume utilization {}",
                    t_util, dv_util
                ),
                self.context("set_executable_utilization"),
            ));
        }
        if !(0.0..=1.0 + UTILIZATION_EPSILON).contains(&dv_util) {
            return Err(SchedulingError::window_state_with_context(
                format!("utilization {} outside [0, 1]", dv_util),
                self.context("set_executable_utilization"),
            ));
        }
        let half_s = self.duration().value() * t_util / 2.0;
        let center = self.center();
        self.executable = Some(ExecutionRecord {
            start: offset_by_seconds(center, -half_s),
            end: offset_by_seconds(center, half_s),
            data_vol: self.scheduled_dv * dv_util,
        });
        Ok(())
    }

    /// Derive executable properties from the data volume actually routed
    /// through this window, assuming time utilization equals data volume
    /// utilization.
    pub fn set_executable_properties(&mut self, dv_used: f64, dv_epsilon: f64) -> SchedulingResult<()> {
        if dv_used < -dv_epsilon || dv_used > self.scheduled_dv + dv_epsilon {
            return Err(SchedulingError::window_state_with_context(
                format!(
                    "data volume used {} outside [0, scheduled {}]",
                    dv_used, self.scheduled_dv
                ),
                self.context("set_executable_properties"),
            ));
        }
        let util = if self.scheduled_dv > dv_epsilon {
            (dv_used / self.scheduled_dv).clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.set_executable_utilization(util, util)
    }

    /// Record what actually happened during execution.
    ///
    /// Setting identical values again is a no-op; setting different values
    /// fails.
    pub fn set_executed_properties(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        data_vol: f64,
    ) -> SchedulingResult<()> {
        let record = ExecutionRecord {
            start,
            end,
            data_vol,
        };
        match &self.executed {
            Some(existing) if *existing == record => {
                warn!("Executed properties of window {} set again with identical values", self.key());
                Ok(())
            }
            Some(existing) => Err(SchedulingError::window_state_with_context(
                format!(
                    "executed properties already set ({:?}); refusing to overwrite with {:?}",
                    existing, record
                ),
                self.context("set_executed_properties"),
            )),
            None => {
                self.executed = Some(record);
                Ok(())
            }
        }
    }
}

impl ActivityCapabilities for ActivityWindow {
    fn codename(&self) -> ActivityCode {
        self.kind.codename()
    }

    fn has_sat_indx(&self, sat: SatIndex) -> bool {
        self.kind.has_sat_indx(sat)
    }

    fn is_rx(&self, sat: SatIndex) -> SchedulingResult<bool> {
        self.kind.is_rx(sat)
    }

    fn is_tx(&self, sat: SatIndex) -> SchedulingResult<bool> {
        self.kind.is_tx(sat)
    }

    fn e_dot_codename(&self, sat: SatIndex) -> SchedulingResult<&'static str> {
        self.kind.e_dot_codename(sat)
    }
}

impl PartialEq for ActivityWindow {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ActivityWindow {}

impl Hash for ActivityWindow {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl AsRef<EventWindow> for ActivityWindow {
    fn as_ref(&self) -> &EventWindow {
        &self.event
    }
}

impl fmt::Display for ActivityWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let detail = match &self.kind {
            ActivityKind::Obs { sat_indx, .. } => format!("sat {}", sat_indx),
            ActivityKind::Dlnk {
                sat_indx, gs_indx, ..
            } => format!("sat {} gs {}", sat_indx, gs_indx),
            ActivityKind::Xlnk {
                sat_indx,
                xsat_indx,
                direction,
                ..
            } => match direction {
                XlnkDirection::Symmetric => format!("sym. sats {}<->{}", sat_indx, xsat_indx),
                XlnkDirection::Directed { tx_sat } => {
                    let rx = if tx_sat == sat_indx { xsat_indx } else { sat_indx };
                    format!("uni. sats {}->{}", tx_sat, rx)
                }
            },
        };
        write!(
            f,
            "({} {} {} dv {:.3} {},{})",
            self.codename(),
            self.key(),
            detail,
            self.data_vol,
            self.start().format("%Y-%m-%dT%H:%M:%S"),
            self.end().format("%Y-%m-%dT%H:%M:%S")
        )
    }
}
