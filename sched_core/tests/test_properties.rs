//! Property-based tests for topology direction, multi-route conservation and
//! window capacity bounds.

mod support;

use constellation_sched::models::{SatIndex, DV_EPSILON};
use constellation_sched::routing::{DataMultiRoute, DataRoute, RoutingObjectId, TimeOption};
use proptest::prelude::*;

use support::{ring, t, WindowFactory};

#[derive(Debug, Clone)]
enum WindowOp {
    Schedule(f64),
    Trim(i64),
}

fn window_op() -> impl Strategy<Value = WindowOp> {
    prop_oneof![
        (0.0f64..150.0).prop_map(WindowOp::Schedule),
        (0i64..80).prop_map(WindowOp::Trim),
    ]
}

proptest! {
    #[test]
    fn prop_direction_reverses_when_swapped(n in 2usize..12, a in 0usize..12, b in 0usize..12) {
        prop_assume!(a < n && b < n && a != b);
        let topology = ring(n);
        let forward = topology.intra_orbit_direction(SatIndex(a), SatIndex(b)).unwrap();
        let backward = topology.intra_orbit_direction(SatIndex(b), SatIndex(a)).unwrap();
        prop_assert_eq!(forward.reversed(), backward);
    }

    #[test]
    fn prop_multi_route_never_oversubscribes(
        relay_caps in prop::collection::vec(10.0f64..200.0, 1..5),
        obs_cap in 50.0f64..300.0,
        dlnk_cap in 50.0f64..300.0,
        offers in prop::collection::vec((0usize..5, 0.0f64..300.0), 1..12),
        min_dv in 0.0f64..20.0,
    ) {
        let mut f = WindowFactory::new();
        let obs = f.obs(0, 0, 100, obs_cap);
        let relays: Vec<_> = relay_caps
            .iter()
            .map(|cap| f.xlnk(0, 1, 200, 300, *cap))
            .collect();
        let dlnk = f.dlnk(1, 0, 400, 500, dlnk_cap);

        let route_through = |index: usize, relay: usize, dv: f64| {
            let caps = [obs_cap, relay_caps[relay], dlnk_cap];
            let dv = caps.iter().fold(dv, |acc, cap| acc.min(*cap));
            DataRoute::from_windows(
                RoutingObjectId::new("prop", index),
                &f.arena,
                vec![obs, relays[relay], dlnk],
                dv,
            )
            .unwrap()
        };

        let mut mr = DataMultiRoute::new(
            RoutingObjectId::new("prop", 0),
            vec![route_through(1, 0, 10.0)],
        )
        .unwrap();
        for (i, (relay, dv)) in offers.iter().enumerate() {
            let relay = relay % relays.len();
            let candidate = route_through(i + 2, relay, *dv);
            mr.accumulate_dr(&f.arena, candidate, min_dv).unwrap();
        }

        prop_assert!(mr.validate(&f.arena, TimeOption::StartEnd).is_ok());
        for h in mr.windows() {
            let allocated: f64 = mr
                .members()
                .iter()
                .filter(|m| m.route.contains_window(h))
                .map(|m| m.allocated_dv)
                .sum();
            prop_assert!(allocated <= f.window(h).data_vol() + DV_EPSILON);
        }
    }

    #[test]
    fn prop_window_scheduled_dv_stays_within_capacity(
        cap in 10.0f64..150.0,
        ops in prop::collection::vec(window_op(), 1..20),
    ) {
        let mut f = WindowFactory::new();
        let h = f.obs(0, 0, 120, cap);
        for op in ops {
            // Rejected mutations must leave the window consistent too.
            let _ = match op {
                WindowOp::Schedule(dv) => f.arena.set_scheduled_dv(h, dv),
                WindowOp::Trim(offset) => f.arena.update(h, |w| w.modify_time(t(offset))),
            };
            let w = f.window(h);
            prop_assert!(w.scheduled_dv() >= 0.0);
            prop_assert!(w.scheduled_dv() <= w.data_vol() + DV_EPSILON);
            prop_assert!(w.data_vol() <= w.original_data_vol() + DV_EPSILON);
            prop_assert!(w.start() >= w.original_start());
            prop_assert!(w.end() <= w.original_end());
        }
    }
}
