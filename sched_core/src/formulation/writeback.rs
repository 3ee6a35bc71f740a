//! Post-solve writeback into windows and routes.

use std::collections::BTreeMap;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::backend::Solution;
use super::expr::{ConstraintKind, Formulation, Var};
use crate::config::FormulationSettings;
use crate::error::SchedulingResult;
use crate::models::{WindowArena, WindowHandle};
use crate::routing::DataMultiRoute;

/// Solver values may stray this far outside [0, 1] before being reported.
const CLAMP_TOLERANCE: f64 = 1e-6;

fn clamp_fraction(value: f64, what: &str) -> f64 {
    if !(-CLAMP_TOLERANCE..=1.0 + CLAMP_TOLERANCE).contains(&value) {
        warn!("Solver returned {} = {}; clamping into [0, 1]", what, value);
    }
    value.clamp(0.0, 1.0)
}

/// What a writeback changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WritebackSummary {
    pub active_windows: usize,
    pub scheduled_routes: usize,
    pub scheduled_dv: f64,
}

/// Write a solution back into the arena and the multi-routes.
///
/// Windows whose indicator is off get zero scheduled data volume; the rest
/// get `utilization · capacity`. Each multi-route takes its route
/// utilization as one shared fraction.
///
/// # Errors
/// Fails if a window or route rejects its new scheduled data volume.
pub fn apply_solution(
    arena: &mut WindowArena,
    routes: &mut [DataMultiRoute],
    solution: &Solution,
    settings: &FormulationSettings,
) -> SchedulingResult<WritebackSummary> {
    let mut summary = WritebackSummary::default();

    let handles: Vec<WindowHandle> = arena.iter().map(|(h, _)| h).collect();
    for h in handles {
        let scheduled = if solution.is_on(Var::Indicator(h), settings.binary_epsilon) {
            summary.active_windows += 1;
            let util = clamp_fraction(solution.value(Var::Utilization(h)), "window utilization");
            arena.get(h)?.data_vol() * util
        } else {
            0.0
        };
        arena.set_scheduled_dv(h, scheduled)?;
    }

    for (n, dmr) in routes.iter_mut().enumerate() {
        let fraction = clamp_fraction(solution.value(Var::RouteUtilization(n)), "route utilization");
        dmr.set_scheduled_dv_frac(fraction)?;
        if fraction > 0.0 {
            summary.scheduled_routes += 1;
            summary.scheduled_dv += dmr.scheduled_dv().unwrap_or(0.0);
        }
    }

    info!(
        "Applied solution: {} active windows, {} scheduled routes, {:.1} Mb routed",
        summary.active_windows, summary.scheduled_routes, summary.scheduled_dv
    );
    Ok(summary)
}

/// A constraint found tight after the solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingEntry {
    pub constraint_index: usize,
    pub kind: ConstraintKind,
    pub activities: Vec<WindowHandle>,
    pub value: f64,
}

/// Constraints whose binding expression evaluates to within `tolerance` of
/// zero.
pub fn binding_report(formulation: &Formulation, solution: &Solution, tolerance: f64) -> Vec<BindingEntry> {
    formulation
        .constraints
        .iter()
        .enumerate()
        .filter_map(|(i, c)| {
            let value = c.binding.as_ref()?.evaluate(&solution.values);
            (value.abs() <= tolerance).then(|| BindingEntry {
                constraint_index: i,
                kind: c.kind,
                activities: c.activities.clone(),
                value,
            })
        })
        .collect()
}

/// Set executable properties on every window carrying scheduled route data.
///
/// Each route only accounts for its own share of a window, so the shares
/// are summed before the window derives its executable interval.
///
/// # Returns
/// Handles of the windows that were updated, in handle order.
pub fn synthesize_executable_acts(
    arena: &mut WindowArena,
    routes: &[DataMultiRoute],
    dv_epsilon: f64,
) -> SchedulingResult<Vec<WindowHandle>> {
    let mut dv_used: BTreeMap<WindowHandle, f64> = BTreeMap::new();
    for dmr in routes {
        for member in dmr.members() {
            let scheduled = member.scheduled_dv.unwrap_or(0.0);
            if scheduled <= 0.0 {
                continue;
            }
            for h in member.route.windows() {
                *dv_used.entry(*h).or_insert(0.0) += scheduled;
            }
        }
    }

    let mut updated = Vec::with_capacity(dv_used.len());
    for (h, used) in dv_used {
        arena.update(h, |w| w.set_executable_properties(used, dv_epsilon))?;
        updated.push(h);
    }
    Ok(updated)
}
