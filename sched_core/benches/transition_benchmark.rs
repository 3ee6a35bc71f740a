use std::collections::BTreeMap;

use chrono::{Duration, TimeZone, Utc};
use constellation_sched::config::ActivityParams;
use constellation_sched::models::{
    ActivityKind, ActivityWindow, SatIndex, WindowKey, XlnkDirection,
};
use constellation_sched::timing::{OrbitTopology, TransitionTimingPolicy};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const PARAMS: &str = include_str!("../activity_params.toml");

fn policy(num_sats: usize) -> TransitionTimingPolicy {
    let ids: Vec<String> = (0..num_sats).map(|i| format!("sat{}", i)).collect();
    let half = num_sats / 2;
    let mut by_orbit = BTreeMap::new();
    by_orbit.insert("A".to_string(), ids[..half].to_vec());
    by_orbit.insert("B".to_string(), ids[half..].to_vec());
    let topology = OrbitTopology::new(ids, &by_orbit).unwrap();
    TransitionTimingPolicy::new(topology, ActivityParams::from_toml_str(PARAMS).unwrap())
}

/// Consecutive crosslinks relayed through satellite 1 from random-ish partners.
fn xlnk_chain(num_sats: usize, len: usize) -> Vec<ActivityWindow> {
    let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    (0..len)
        .map(|i| {
            let partner = (i * 7 + 2) % num_sats;
            let partner = if partner == 1 { 0 } else { partner };
            let kind = ActivityKind::xlnk(
                SatIndex(1.min(partner)),
                SatIndex(1.max(partner)),
                0,
                XlnkDirection::Symmetric,
            )
            .unwrap();
            let start = base + Duration::seconds(i as i64 * 600);
            ActivityWindow::new(
                WindowKey::new(i as u64),
                kind,
                start,
                start + Duration::seconds(300),
                100.0,
            )
            .unwrap()
        })
        .collect()
}

fn bench_transition_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("transition_time_req");

    for len in [10usize, 100, 1000] {
        let windows = xlnk_chain(20, len);

        let mut warm = policy(20);
        group.bench_with_input(BenchmarkId::new("cached", len), &windows, |b, windows| {
            b.iter(|| {
                for pair in windows.windows(2) {
                    let req = warm
                        .get_transition_time_req(&pair[0], &pair[1], SatIndex(1), SatIndex(1))
                        .unwrap();
                    black_box(req);
                }
            });
        });

        let mut cold = policy(20);
        group.bench_with_input(BenchmarkId::new("uncached", len), &windows, |b, windows| {
            b.iter(|| {
                cold.clear_cache();
                for pair in windows.windows(2) {
                    let req = cold
                        .get_transition_time_req(&pair[0], &pair[1], SatIndex(1), SatIndex(1))
                        .unwrap();
                    black_box(req);
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_transition_lookup);
criterion_main!(benches);
