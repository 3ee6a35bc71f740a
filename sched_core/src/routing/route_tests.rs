use std::collections::HashMap;

use chrono::{DateTime, Duration, TimeZone, Utc};

use super::*;
use crate::error::SchedulingError;
use crate::models::{
    ActivityKind, ActivityWindow, GsIndex, SatIndex, WindowArena, WindowHandle, WindowKey,
    XlnkDirection,
};

// ==================== Helper Functions ====================

fn t(offset_s: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(offset_s)
}

struct Fixture {
    arena: WindowArena,
    obs: WindowHandle,
    x01: WindowHandle,
    x12: WindowHandle,
    x12b: WindowHandle,
    dlnk2: WindowHandle,
    dlnk1: WindowHandle,
}

fn add(arena: &mut WindowArena, id: u64, kind: ActivityKind, start: i64, end: i64, dv: f64) -> WindowHandle {
    arena
        .insert(ActivityWindow::new(WindowKey::new(id), kind, t(start), t(end), dv).unwrap())
        .unwrap()
}

fn directed(a: usize, b: usize, tx: usize) -> ActivityKind {
    ActivityKind::xlnk(
        SatIndex(a),
        SatIndex(b),
        0,
        XlnkDirection::Directed { tx_sat: SatIndex(tx) },
    )
    .unwrap()
}

/// Sat 0 observes, relays to sat 1, which relays to sat 2 for downlink.
fn fixture(x01_capacity: f64) -> Fixture {
    let mut arena = WindowArena::new();
    let obs = add(&mut arena, 1, ActivityKind::obs(SatIndex(0), ["target"], 0), 0, 100, 300.0);
    let x01 = add(&mut arena, 2, directed(0, 1, 0), 150, 250, x01_capacity);
    let x12 = add(&mut arena, 3, directed(1, 2, 1), 300, 400, 200.0);
    let x12b = add(&mut arena, 4, directed(1, 2, 1), 320, 420, 200.0);
    let dlnk2 = add(&mut arena, 5, ActivityKind::dlnk(SatIndex(2), GsIndex(0), 0), 500, 600, 400.0);
    let dlnk1 = add(&mut arena, 6, ActivityKind::dlnk(SatIndex(1), GsIndex(1), 0), 450, 550, 100.0);
    Fixture {
        arena,
        obs,
        x01,
        x12,
        x12b,
        dlnk2,
        dlnk1,
    }
}

fn route(f: &Fixture, index: usize, windows: Vec<WindowHandle>, dv: f64) -> DataRoute {
    DataRoute::from_windows(RoutingObjectId::new("gp", index), &f.arena, windows, dv).unwrap()
}

fn relay_route(f: &Fixture, dv: f64) -> DataRoute {
    route(f, 0, vec![f.obs, f.x01, f.x12, f.dlnk2], dv)
}

fn failing_index(err: SchedulingError) -> usize {
    match err {
        SchedulingError::RouteValidation { window_index, .. } => window_index,
        other => panic!("expected a route validation error, got {other}"),
    }
}

// ==================== DataRoute ====================

#[test]
fn test_well_formed_route_validates() {
    let f = fixture(150.0);
    let dr = relay_route(&f, 100.0);
    dr.validate(&f.arena, TimeOption::StartEnd).unwrap();
    dr.validate(&f.arena, TimeOption::Center).unwrap();
    assert_eq!(dr.start_sat(f.x12), Some(SatIndex(1)));
    assert_eq!(dr.start_sat(f.dlnk2), Some(SatIndex(2)));
    assert!(dr.has_xlnk(&f.arena).unwrap());
    assert!(dr.has_sat_indx(&f.arena, SatIndex(1)).unwrap());
    assert!(dr.has_gs_indx(&f.arena, GsIndex(0)).unwrap());
    assert!(!dr.has_gs_indx(&f.arena, GsIndex(1)).unwrap());
}

#[test]
fn test_from_windows_sorts_by_start() {
    let f = fixture(150.0);
    let dr = route(&f, 0, vec![f.dlnk2, f.x12, f.obs, f.x01], 50.0);
    assert_eq!(dr.windows(), &[f.obs, f.x01, f.x12, f.dlnk2]);
}

#[test]
fn test_from_windows_rejects_route_without_downlink() {
    let f = fixture(150.0);
    let res = DataRoute::from_windows(RoutingObjectId::new("gp", 0), &f.arena, vec![f.obs, f.x01], 10.0);
    assert!(matches!(res, Err(SchedulingError::WindowState { .. })));
}

#[test]
fn test_swapped_windows_fail_at_first_out_of_place_window() {
    let f = fixture(150.0);
    let good = relay_route(&f, 100.0);
    let start_sats: HashMap<_, _> = good
        .windows()
        .iter()
        .map(|h| (*h, good.start_sat(*h).unwrap()))
        .collect();
    let swapped = DataRoute::new(
        RoutingObjectId::new("gp", 1),
        vec![f.obs, f.x12, f.x01, f.dlnk2],
        start_sats,
        100.0,
    );
    let err = swapped.validate(&f.arena, TimeOption::StartEnd).unwrap_err();
    assert_eq!(failing_index(err), 1);
}

#[test]
fn test_inflated_route_dv_fails_at_observation() {
    let f = fixture(150.0);
    let mut dr = relay_route(&f, 100.0);
    dr.add_dv(250.0);
    let err = dr.validate(&f.arena, TimeOption::StartEnd).unwrap_err();
    assert_eq!(failing_index(err), 0);
}

#[test]
fn test_route_dv_over_crosslink_capacity_names_crosslink() {
    let f = fixture(150.0);
    let dr = relay_route(&f, 180.0);
    let err = dr.validate(&f.arena, TimeOption::StartEnd).unwrap_err();
    assert_eq!(failing_index(err), 1);
}

#[test]
fn test_obs_multiplier_relaxes_observation_capacity() {
    let f = fixture(500.0);
    let dr = route(&f, 0, vec![f.obs, f.x01, f.x12, f.dlnk2], 350.0);
    assert_eq!(failing_index(dr.validate(&f.arena, TimeOption::StartEnd).unwrap_err()), 0);

    let relaxed = dr.with_obs_dv_multiplier(2.0);
    // The observation passes; the 200 Mb crosslink is now the bottleneck.
    assert_eq!(failing_index(relaxed.validate(&f.arena, TimeOption::StartEnd).unwrap_err()), 2);
}

#[test]
fn test_inflated_scheduled_dv_fails() {
    let f = fixture(150.0);
    let mut dr = relay_route(&f, 100.0);
    dr.set_scheduled_dv(100.0);
    dr.validate(&f.arena, TimeOption::StartEnd).unwrap();
    dr.set_scheduled_dv(100.1);
    assert_eq!(failing_index(dr.validate(&f.arena, TimeOption::StartEnd).unwrap_err()), 0);
}

#[test]
fn test_broken_continuity_fails() {
    let f = fixture(150.0);
    let good = relay_route(&f, 100.0);
    let mut start_sats: HashMap<_, _> = good
        .windows()
        .iter()
        .map(|h| (*h, good.start_sat(*h).unwrap()))
        .collect();
    start_sats.insert(f.dlnk2, SatIndex(1));
    let broken = DataRoute::new(RoutingObjectId::new("gp", 1), good.windows().to_vec(), start_sats, 100.0);
    assert_eq!(failing_index(broken.validate(&f.arena, TimeOption::StartEnd).unwrap_err()), 3);
}

#[test]
fn test_wrong_transmitter_fails() {
    let mut f = fixture(150.0);
    let backwards = add(&mut f.arena, 7, directed(1, 2, 2), 300, 400, 200.0);
    let dr = route(&f, 0, vec![f.obs, f.x01, backwards, f.dlnk2], 100.0);
    assert_eq!(failing_index(dr.validate(&f.arena, TimeOption::StartEnd).unwrap_err()), 2);
}

#[test]
fn test_time_overlap_fails_unless_allowed() {
    let mut f = fixture(150.0);
    let early = add(&mut f.arena, 8, directed(1, 2, 1), 200, 300, 200.0);
    let mut dr = route(&f, 0, vec![f.obs, f.x01, early, f.dlnk2], 100.0);
    assert_eq!(failing_index(dr.validate(&f.arena, TimeOption::StartEnd).unwrap_err()), 2);
    // Centers (200 -> 250) are still ordered.
    dr.validate(&f.arena, TimeOption::Center).unwrap();

    dr.allow_overlap_at_start(early);
    dr.validate(&f.arena, TimeOption::StartEnd).unwrap();
}

#[test]
fn test_remove_dv_beyond_remaining_fails() {
    let f = fixture(150.0);
    let mut dr = relay_route(&f, 100.0);
    dr.remove_dv(40.0).unwrap();
    assert_eq!(dr.data_vol(), 60.0);
    assert!(dr.remove_dv(61.0).is_err());
}

#[test]
fn test_storage_intervals_follow_entry_satellites() {
    let f = fixture(150.0);
    let dr = relay_route(&f, 100.0);
    let intervals = dr.storage_intervals(&f.arena).unwrap();
    assert_eq!(
        intervals,
        vec![
            SatStorageInterval { sat_indx: SatIndex(0), start: t(0), end: t(250) },
            SatStorageInterval { sat_indx: SatIndex(1), start: t(150), end: t(400) },
            SatStorageInterval { sat_indx: SatIndex(2), start: t(300), end: t(600) },
        ]
    );
}

#[test]
fn test_split_window_and_prefix() {
    let f = fixture(150.0);
    let a = relay_route(&f, 100.0);
    let b = route(&f, 1, vec![f.obs, f.x01, f.dlnk1], 80.0);
    assert_eq!(a.split_window(&b).unwrap(), f.x01);

    let prefix = DataRoute::new(RoutingObjectId::new("gp", 2), vec![f.obs, f.x01], HashMap::new(), 0.0);
    assert!(a.contains_route(&prefix));
    assert!(!a.contains_route(&b));
}

#[test]
fn test_overlap_policies() {
    let f = fixture(150.0);
    let a = relay_route(&f, 100.0);
    let heavy = route(&f, 1, vec![f.obs, f.x01, f.dlnk1], 80.0);
    let light = route(&f, 2, vec![f.obs, f.x01, f.dlnk1], 40.0);

    assert_eq!(a.count_overlap(&f.arena, &heavy, OverlapPolicy::SharedWindow).unwrap(), 1);
    assert!(!a.is_overlapping(&f.arena, &light, OverlapPolicy::SharedWindow).unwrap());
    assert!(a.is_overlapping(&f.arena, &light, OverlapPolicy::MutexWindow).unwrap());
}

#[test]
fn test_inflow_and_outflow_windows() {
    let f = fixture(150.0);
    let dr = relay_route(&f, 100.0);
    assert_eq!(dr.inflow_windows_rx_sat(&f.arena, SatIndex(1)).unwrap(), vec![f.obs, f.x01]);
    assert_eq!(dr.outflow_windows_tx_sat(&f.arena, SatIndex(1)).unwrap(), vec![f.x12, f.dlnk2]);
    assert!(matches!(
        dr.outflow_windows_tx_sat(&f.arena, SatIndex(5)),
        Err(SchedulingError::NotFound { .. })
    ));
}

#[test]
fn test_inflow_and_outflow_follow_traversal_of_symmetric_link() {
    let mut arena = WindowArena::new();
    let obs = add(&mut arena, 1, ActivityKind::obs(SatIndex(0), ["target"], 0), 0, 100, 300.0);
    let sym = ActivityKind::xlnk(SatIndex(0), SatIndex(1), 0, XlnkDirection::Symmetric).unwrap();
    let x01 = add(&mut arena, 2, sym, 150, 250, 150.0);
    let dlnk = add(&mut arena, 3, ActivityKind::dlnk(SatIndex(1), GsIndex(0), 0), 450, 550, 100.0);
    let dr = DataRoute::from_windows(RoutingObjectId::new("gp", 0), &arena, vec![obs, x01, dlnk], 50.0).unwrap();

    assert_eq!(dr.outflow_windows_tx_sat(&arena, SatIndex(1)).unwrap(), vec![dlnk]);
    assert_eq!(dr.inflow_windows_rx_sat(&arena, SatIndex(1)).unwrap(), vec![obs, x01]);
    assert_eq!(dr.outflow_windows_tx_sat(&arena, SatIndex(0)).unwrap(), vec![x01, dlnk]);
    assert_eq!(dr.inflow_windows_rx_sat(&arena, SatIndex(0)).unwrap(), vec![obs]);
}

#[test]
fn test_latency_uses_anchors() {
    let f = fixture(150.0);
    let dr = relay_route(&f, 100.0);
    let lat = dr
        .latency(&f.arena, LatencyAnchor::OriginalEnd, LatencyAnchor::Center)
        .unwrap();
    assert!((lat - 7.5).abs() < 1e-9);
    let lat = dr
        .latency(&f.arena, LatencyAnchor::OriginalStart, LatencyAnchor::OriginalStart)
        .unwrap();
    assert!((lat - 500.0 / 60.0).abs() < 1e-9);
}

#[test]
fn test_describe() {
    let f = fixture(150.0);
    let dr = relay_route(&f, 100.0);
    let text = dr.describe(&f.arena).unwrap();
    assert!(text.starts_with("o 1 s0 dv 300 -> x 2 s0,xs1"));
    assert!(text.ends_with("d 5 s2 dv 400"));
}

// ==================== DataMultiRoute ====================

#[test]
fn test_accumulate_admits_residual_capacity() {
    let f = fixture(100.0);
    let first = relay_route(&f, 80.0);
    let mut mr = DataMultiRoute::new(RoutingObjectId::new("gp", 10), vec![first]).unwrap();

    let second = route(&f, 1, vec![f.obs, f.x01, f.x12b, f.dlnk2], 80.0);
    let admission = mr.accumulate_dr(&f.arena, second, 1.0).unwrap();
    match admission {
        Admission::Accepted { allocated_dv } => assert!((allocated_dv - 20.0).abs() < 1e-9),
        other => panic!("expected admission, got {other:?}"),
    }

    assert_eq!(mr.members().len(), 2);
    assert!((mr.data_vol() - 100.0).abs() < 1e-9);
    assert!((mr.data_vol_for_wind(f.x01).unwrap() - 100.0).abs() < 1e-9);
    assert!((mr.data_vol_for_wind(f.x12b).unwrap() - 20.0).abs() < 1e-9);
    mr.validate(&f.arena, TimeOption::StartEnd).unwrap();
}

#[test]
fn test_accumulate_rejects_without_mutation() {
    let f = fixture(100.0);
    let mut mr = DataMultiRoute::new(RoutingObjectId::new("gp", 10), vec![relay_route(&f, 100.0)]).unwrap();

    let saturated = route(&f, 1, vec![f.obs, f.x01, f.x12b, f.dlnk2], 50.0);
    let admission = mr.accumulate_dr(&f.arena, saturated, 1.0).unwrap();
    assert_eq!(
        admission,
        Admission::Rejected(RejectionReason::InsufficientCapacity { admissible_dv: 0.0 })
    );

    let elsewhere = route(&f, 2, vec![f.obs, f.x01, f.dlnk1], 10.0);
    let admission = mr.accumulate_dr(&f.arena, elsewhere, 1.0).unwrap();
    assert_eq!(admission, Admission::Rejected(RejectionReason::DownlinkMismatch));

    assert_eq!(mr.members().len(), 1);
    assert!((mr.data_vol() - 100.0).abs() < 1e-9);
}

#[test]
fn test_accumulate_threshold_is_strict() {
    let f = fixture(100.0);
    let mut mr = DataMultiRoute::new(RoutingObjectId::new("gp", 10), vec![relay_route(&f, 80.0)]).unwrap();
    let second = route(&f, 1, vec![f.obs, f.x01, f.x12b, f.dlnk2], 80.0);
    let admission = mr.accumulate_dr(&f.arena, second, 20.0).unwrap();
    assert!(!admission.is_accepted());
}

#[test]
fn test_oversubscribed_multi_route_fails_validation() {
    let f = fixture(100.0);
    let a = relay_route(&f, 80.0);
    let b = route(&f, 1, vec![f.obs, f.x01, f.x12b, f.dlnk2], 80.0);
    let mr = DataMultiRoute::new(RoutingObjectId::new("gp", 10), vec![a, b]).unwrap();
    let err = mr.validate(&f.arena, TimeOption::StartEnd).unwrap_err();
    match err {
        SchedulingError::CapacityOversubscribed { allocated, capacity, .. } => {
            assert!((allocated - 160.0).abs() < 1e-9);
            assert!((capacity - 100.0).abs() < 1e-9);
        }
        other => panic!("expected oversubscription, got {other}"),
    }
}

#[test]
fn test_scheduled_dv_spreads_as_one_fraction() {
    let f = fixture(100.0);
    let mut mr = DataMultiRoute::new(RoutingObjectId::new("gp", 10), vec![relay_route(&f, 80.0)]).unwrap();
    mr.accumulate_dr(&f.arena, route(&f, 1, vec![f.obs, f.x01, f.x12b, f.dlnk2], 80.0), 1.0)
        .unwrap();
    assert_eq!(mr.scheduled_dv(), None);

    mr.set_scheduled_dv(50.0).unwrap();
    assert!((mr.sched_utilization().unwrap() - 0.5).abs() < 1e-9);
    assert!((mr.scheduled_dv().unwrap() - 50.0).abs() < 1e-9);
    assert!((mr.scheduled_dv_for_wind(f.x12b).unwrap() - 10.0).abs() < 1e-9);
    assert!(mr.set_scheduled_dv(150.0).is_err());
    assert!(mr.set_scheduled_dv_frac(1.5).is_err());
}

#[test]
fn test_multi_route_rejects_empty() {
    assert!(DataMultiRoute::new(RoutingObjectId::new("gp", 0), Vec::new()).is_err());
}
