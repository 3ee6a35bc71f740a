//! Constraint generation for one scheduling pass.
//!
//! Turns the window arena, the transition timing policy and the candidate
//! multi-routes into a [`Formulation`]:
//!
//! * one binary indicator and one utilization variable per activity window
//! * one utilization variable per multi-route
//! * minimum-duration and indicator-link constraints per window
//! * transition constraints for every conflicting pair of activities, either
//!   on one satellite or on two satellites downlinking to the same ground
//!   station
//! * route-capacity constraints tying route utilization to window utilization
//! * latency score factors per data source

use std::collections::BTreeMap;

use log::{debug, info};

use super::expr::{
    Constraint, ConstraintKind, Formulation, LatencyScore, LinearExpr, Sense, SlackDescriptor,
    Var, VarDomain,
};
use crate::config::{ActivityParams, FormulationSettings};
use crate::error::SchedulingResult;
use crate::models::{
    ActivityCapabilities, ActivityCode, ActivityKind, ActivityWindow, SatIndex, WindowArena,
    WindowHandle,
};
use crate::routing::DataMultiRoute;
use crate::time::seconds_between;
use crate::timing::TransitionTimingPolicy;

/// Seconds of window time needed to carry the window's full capacity, halved.
///
/// Scaled by utilization, this is how far each boundary sits from the
/// center once the window is trimmed to the data volume it carries.
fn half_capacity_duration_s(window: &ActivityWindow) -> f64 {
    let rate = window.ave_data_rate();
    if rate > 0.0 {
        window.data_vol() / rate / 2.0
    } else {
        0.0
    }
}

/// Counters reported after generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationStats {
    pub pairs_considered: usize,
    pub pairs_skipped: usize,
}

pub struct ConstraintGenerator {
    settings: FormulationSettings,
}

impl ConstraintGenerator {
    pub fn new(settings: FormulationSettings) -> Self {
        Self { settings }
    }

    pub fn from_params(params: &ActivityParams) -> Self {
        Self::new(params.formulation.clone())
    }

    pub fn settings(&self) -> &FormulationSettings {
        &self.settings
    }

    /// Build the full formulation for the windows in `arena` and the
    /// candidate `routes`.
    ///
    /// # Arguments
    /// * `arena` - Every activity window of the pass
    /// * `policy` - Transition timing policy; its cache fills as pairs are resolved
    /// * `routes` - Candidate multi-routes; variable `RouteUtilization(n)` refers to `routes[n]`
    ///
    /// # Errors
    /// * `TopologyLookup` if a window involves a satellite outside the
    ///   policy's topology
    /// * any transition lookup or route lookup failure
    pub fn generate(
        &self,
        arena: &WindowArena,
        policy: &mut TransitionTimingPolicy,
        routes: &[DataMultiRoute],
    ) -> SchedulingResult<Formulation> {
        Self::check_satellites_known(arena, policy)?;
        let mut formulation = Formulation::new();

        for (h, _) in arena.iter() {
            formulation.add_variable(Var::Indicator(h), VarDomain::Binary);
            formulation.add_variable(
                Var::Utilization(h),
                VarDomain::Continuous {
                    lower: 0.0,
                    upper: 1.0,
                },
            );
        }
        for n in 0..routes.len() {
            formulation.add_variable(
                Var::RouteUtilization(n),
                VarDomain::Continuous {
                    lower: 0.0,
                    upper: 1.0,
                },
            );
        }

        self.add_duration_constraints(&mut formulation, arena, policy)?;
        let mut stats = self.add_intra_sat_constraints(&mut formulation, arena, policy)?;
        let inter = self.add_inter_sat_constraints(&mut formulation, arena, policy)?;
        stats.pairs_considered += inter.pairs_considered;
        stats.pairs_skipped += inter.pairs_skipped;
        self.add_route_capacity_constraints(&mut formulation, arena, routes)?;
        formulation.latency_scores = self.latency_scores(arena, routes)?;

        debug!(
            "Skipped {} of {} activity pairs with enough original spacing; transition cache {} hits, {} misses",
            stats.pairs_skipped,
            stats.pairs_considered,
            policy.cache().hits(),
            policy.cache().misses()
        );
        info!(
            "Generated {} constraints over {} windows and {} routes ({} mutual exclusion, {} big-M, {} relaxed)",
            formulation.constraints.len(),
            arena.len(),
            routes.len(),
            formulation.count(ConstraintKind::MutualExclusion),
            formulation.count(ConstraintKind::BigMTransition),
            formulation.count(ConstraintKind::RelaxedTransition),
        );
        Ok(formulation)
    }

    /// The pair sweep walks the topology's satellites, so a window on any
    /// other satellite would never be constrained.
    fn check_satellites_known(arena: &WindowArena, policy: &TransitionTimingPolicy) -> SchedulingResult<()> {
        for (_, window) in arena.iter() {
            let kind = window.kind();
            let sat = kind.sat_indx();
            policy.topology().sat_id(sat).map_err(|e| e.with_operation("generate"))?;
            if let ActivityKind::Xlnk { xsat_indx, .. } = kind {
                policy
                    .topology()
                    .sat_id(*xsat_indx)
                    .map_err(|e| e.with_operation("generate"))?;
            }
        }
        Ok(())
    }

    /// `utilization · capacity duration ≥ indicator · minimum duration` and
    /// `utilization ≤ indicator` for every window.
    fn add_duration_constraints(
        &self,
        formulation: &mut Formulation,
        arena: &WindowArena,
        policy: &TransitionTimingPolicy,
    ) -> SchedulingResult<()> {
        for (h, window) in arena.iter() {
            let min_duration = policy.act_min_duration(window)?.value();
            let expr = LinearExpr::new()
                .term(Var::Utilization(h), 2.0 * half_capacity_duration_s(window))
                .term(Var::Indicator(h), -min_duration);
            formulation.add_constraint(
                Constraint::new(ConstraintKind::Duration, expr.clone(), Sense::Ge, 0.0)
                    .with_activities(vec![h])
                    .with_binding(expr),
            );

            let link = LinearExpr::new()
                .term(Var::Utilization(h), 1.0)
                .term(Var::Indicator(h), -1.0);
            formulation.add_constraint(
                Constraint::new(ConstraintKind::IndicatorLink, link, Sense::Le, 0.0)
                    .with_activities(vec![h]),
            );
        }
        Ok(())
    }

    /// Every pair of activities on one satellite, in center order.
    fn add_intra_sat_constraints(
        &self,
        formulation: &mut Formulation,
        arena: &WindowArena,
        policy: &mut TransitionTimingPolicy,
    ) -> SchedulingResult<GenerationStats> {
        let mut stats = GenerationStats::default();
        for sat in 0..policy.topology().num_sats() {
            let sat = SatIndex(sat);
            let handles = arena.handles_for_sat(sat);
            for (i, h1) in handles.iter().enumerate() {
                for h2 in &handles[i + 1..] {
                    stats.pairs_considered += 1;
                    if !self.add_pair_if_conflicting(formulation, arena, policy, (*h1, sat), (*h2, sat))? {
                        stats.pairs_skipped += 1;
                    }
                }
            }
        }
        Ok(stats)
    }

    /// Downlinks from different satellites to the same ground station.
    fn add_inter_sat_constraints(
        &self,
        formulation: &mut Formulation,
        arena: &WindowArena,
        policy: &mut TransitionTimingPolicy,
    ) -> SchedulingResult<GenerationStats> {
        let mut stats = GenerationStats::default();
        let dlnks: Vec<(WindowHandle, &ActivityWindow)> = arena
            .iter()
            .filter(|(_, w)| w.codename() == ActivityCode::Dlnk)
            .collect();

        for (h1, w1) in &dlnks {
            for (h2, w2) in &dlnks {
                let sat1 = w1.kind().sat_indx();
                let sat2 = w2.kind().sat_indx();
                if sat1 == sat2 || w1.kind().gs_indx() != w2.kind().gs_indx() {
                    continue;
                }
                // Each unordered pair once: by center, then by satellite on ties.
                if w2.center() < w1.center() || (w2.center() == w1.center() && sat2 < sat1) {
                    continue;
                }
                stats.pairs_considered += 1;
                if !self.add_pair_if_conflicting(formulation, arena, policy, (*h1, sat1), (*h2, sat2))? {
                    stats.pairs_skipped += 1;
                }
            }
        }
        Ok(stats)
    }

    /// Emit the transition constraint for one ordered pair unless the original
    /// windows are already far enough apart. Returns whether one was emitted.
    fn add_pair_if_conflicting(
        &self,
        formulation: &mut Formulation,
        arena: &WindowArena,
        policy: &mut TransitionTimingPolicy,
        (h1, sat1): (WindowHandle, SatIndex),
        (h2, sat2): (WindowHandle, SatIndex),
    ) -> SchedulingResult<bool> {
        let act1 = arena.get(h1)?;
        let act2 = arena.get(h2)?;
        let req = policy.get_transition_time_req(act1, act2, sat1, sat2)?.value();

        // A negative gap (act2 starting before act1 ends) simply fails this test.
        if seconds_between(act1.original_end(), act2.original_start()) >= req {
            return Ok(false);
        }
        let constraint = self.pair_constraint(formulation.slack_count(), (h1, act1), (h2, act2), req);
        if let Some(slack) = constraint.slack {
            formulation.add_variable(
                slack.var,
                VarDomain::Continuous {
                    lower: slack.lower,
                    upper: slack.upper,
                },
            );
        }
        formulation.add_constraint(constraint);
        Ok(true)
    }

    /// Transition constraint between two activities that may conflict.
    ///
    /// With `center_diff` the center separation, `a_i = u_i · h_i` the
    /// utilization-scaled half duration of each window and `req` the required
    /// transition time:
    ///
    /// * `center_diff ≤ req`: `indic1 + indic2 ≤ 1`
    /// * otherwise `center_diff − a1 − a2 + M(1 − indic1) + M(1 − indic2) ≥ req`,
    ///   `M` the larger original duration
    /// * relaxed mode: `center_diff − a1 − a2 − req ≥ slack`, with
    ///   `slack ∈ [center_diff − h1 − h2 − req, 0]`
    pub fn pair_constraint(
        &self,
        slack_index: usize,
        (h1, act1): (WindowHandle, &ActivityWindow),
        (h2, act2): (WindowHandle, &ActivityWindow),
        req: f64,
    ) -> Constraint {
        let center_diff = seconds_between(act1.center(), act2.center());
        let half1 = half_capacity_duration_s(act1);
        let half2 = half_capacity_duration_s(act2);
        let activities = vec![h1, h2];

        if self.settings.allow_act_timing_constr_violations {
            let min_violation = center_diff - half1 - half2 - req;
            let slack = SlackDescriptor {
                var: Var::Slack(slack_index),
                lower: min_violation.min(0.0),
                upper: 0.0,
            };
            let expr = LinearExpr::constant(center_diff - req)
                .term(Var::Utilization(h1), -half1)
                .term(Var::Utilization(h2), -half2)
                .term(slack.var, -1.0);
            return Constraint::new(ConstraintKind::RelaxedTransition, expr.clone(), Sense::Ge, 0.0)
                .with_activities(activities)
                .with_binding(expr)
                .with_slack(slack);
        }

        if center_diff <= req {
            let expr = LinearExpr::new()
                .term(Var::Indicator(h1), 1.0)
                .term(Var::Indicator(h2), 1.0);
            let binding = LinearExpr::constant(1.0)
                .term(Var::Indicator(h1), -1.0)
                .term(Var::Indicator(h2), -1.0);
            return Constraint::new(ConstraintKind::MutualExclusion, expr, Sense::Le, 1.0)
                .with_activities(activities)
                .with_binding(binding);
        }

        let big_m = act1
            .original_duration()
            .value()
            .max(act2.original_duration().value());
        let expr = LinearExpr::constant(center_diff + 2.0 * big_m)
            .term(Var::Utilization(h1), -half1)
            .term(Var::Utilization(h2), -half2)
            .term(Var::Indicator(h1), -big_m)
            .term(Var::Indicator(h2), -big_m);
        let binding = LinearExpr::constant(center_diff - req)
            .term(Var::Utilization(h1), -half1)
            .term(Var::Utilization(h2), -half2);
        Constraint::new(ConstraintKind::BigMTransition, expr, Sense::Ge, req)
            .with_activities(activities)
            .with_binding(binding)
    }

    /// For every window carried by a route:
    /// `Σ allocation · route utilization ≤ capacity · window utilization`.
    fn add_route_capacity_constraints(
        &self,
        formulation: &mut Formulation,
        arena: &WindowArena,
        routes: &[DataMultiRoute],
    ) -> SchedulingResult<()> {
        let mut routed: BTreeMap<WindowHandle, LinearExpr> = BTreeMap::new();
        for (n, dmr) in routes.iter().enumerate() {
            for member in dmr.members() {
                for h in member.route.windows() {
                    routed
                        .entry(*h)
                        .or_default()
                        .add_term(Var::RouteUtilization(n), member.allocated_dv);
                }
            }
        }

        for (h, mut expr) in routed {
            let capacity = arena.get(h)?.data_vol();
            expr.add_term(Var::Utilization(h), -capacity);
            formulation.add_constraint(
                Constraint::new(ConstraintKind::RouteCapacity, expr, Sense::Le, 0.0)
                    .with_activities(vec![h]),
            );
        }
        Ok(())
    }

    /// Latency score factor of every route, relative to the lowest latency
    /// among the routes from the same observation.
    ///
    /// Latencies below `min_latency_for_sf_1_mins` are raised to it, so all
    /// routes that fast score 1.0.
    pub fn latency_scores(
        &self,
        arena: &WindowArena,
        routes: &[DataMultiRoute],
    ) -> SchedulingResult<Vec<LatencyScore>> {
        let floor = self.settings.min_latency_for_sf_1_mins;
        let mut by_source: BTreeMap<WindowHandle, Vec<(usize, f64)>> = BTreeMap::new();
        for (n, dmr) in routes.iter().enumerate() {
            let lat = dmr.latency(
                arena,
                self.settings.latency_obs_anchor,
                self.settings.latency_dlnk_anchor,
            )?;
            by_source.entry(dmr.obs()?).or_default().push((n, lat));
        }

        let mut scores = Vec::with_capacity(routes.len());
        for (source, candidates) in by_source {
            let min_lat = candidates
                .iter()
                .map(|(_, lat)| *lat)
                .fold(f64::INFINITY, f64::min)
                .max(floor);
            for (n, lat) in candidates {
                let denom = lat.max(floor);
                let factor = if denom > 0.0 { min_lat / denom } else { 1.0 };
                scores.push(LatencyScore {
                    route: routes[n].id().clone(),
                    route_index: n,
                    data_source: source,
                    latency_mins: lat,
                    factor,
                });
            }
        }
        scores.sort_by_key(|s| s.route_index);
        Ok(scores)
    }
}
