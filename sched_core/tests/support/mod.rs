//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use constellation_sched::config::ActivityParams;
use constellation_sched::models::{
    ActivityKind, ActivityWindow, GsIndex, SatIndex, WindowArena, WindowHandle, WindowKey,
    XlnkDirection,
};
use constellation_sched::timing::{OrbitTopology, TransitionTimingPolicy};

pub const SAMPLE_PARAMS: &str = include_str!("../../activity_params.toml");

pub fn t(offset_s: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::seconds(offset_s)
}

pub fn sample_params() -> ActivityParams {
    ActivityParams::from_toml_str(SAMPLE_PARAMS).unwrap()
}

/// Orbit "P1" holds sats 0..6, orbit "P2" sats 6..10.
pub fn topology() -> OrbitTopology {
    let ids: Vec<String> = (0..10).map(|i| format!("sat{}", i)).collect();
    let mut by_orbit = BTreeMap::new();
    by_orbit.insert("P1".to_string(), ids[0..6].to_vec());
    by_orbit.insert("P2".to_string(), ids[6..10].to_vec());
    OrbitTopology::new(ids, &by_orbit).unwrap()
}

/// A single orbit of `n` satellites.
pub fn ring(n: usize) -> OrbitTopology {
    let ids: Vec<String> = (0..n).map(|i| format!("sat{}", i)).collect();
    let mut by_orbit = BTreeMap::new();
    by_orbit.insert("ring".to_string(), ids.clone());
    OrbitTopology::new(ids, &by_orbit).unwrap()
}

pub fn policy() -> TransitionTimingPolicy {
    TransitionTimingPolicy::new(topology(), sample_params())
}

/// Builds windows into an arena with sequential identifiers.
#[derive(Default)]
pub struct WindowFactory {
    pub arena: WindowArena,
    next_id: u64,
}

impl WindowFactory {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, kind: ActivityKind, start: i64, end: i64, dv: f64) -> WindowHandle {
        self.next_id += 1;
        let window = ActivityWindow::new(WindowKey::new(self.next_id), kind, t(start), t(end), dv).unwrap();
        self.arena.insert(window).unwrap()
    }

    pub fn obs(&mut self, sat: usize, start: i64, end: i64, dv: f64) -> WindowHandle {
        self.insert(ActivityKind::obs(SatIndex(sat), ["target"], 0), start, end, dv)
    }

    pub fn dlnk(&mut self, sat: usize, gs: usize, start: i64, end: i64, dv: f64) -> WindowHandle {
        self.insert(ActivityKind::dlnk(SatIndex(sat), GsIndex(gs), 0), start, end, dv)
    }

    pub fn xlnk(&mut self, tx: usize, rx: usize, start: i64, end: i64, dv: f64) -> WindowHandle {
        let kind = ActivityKind::xlnk(
            SatIndex(tx.min(rx)),
            SatIndex(tx.max(rx)),
            0,
            XlnkDirection::Directed { tx_sat: SatIndex(tx) },
        )
        .unwrap();
        self.insert(kind, start, end, dv)
    }

    pub fn window(&self, h: WindowHandle) -> &ActivityWindow {
        self.arena.get(h).unwrap()
    }
}
