//! Data volume flowable through two overlapping windows.
//!
//! When two windows carrying one contiguous data stream overlap in time, the
//! overlap can serve either the inbound or the outbound window but not both.
//! The best split is a two-variable linear program:
//!
//! ```text
//! max f
//!   f ≤ r1 · (pre1 + x)
//!   f ≤ r2 · (post2 + y)
//!   x + y ≤ L,  x, y ≥ 0
//! ```
//!
//! with `pre1` the time the first window runs before the overlap, `post2`
//! the time the second runs after it and `L` the overlap length. The optimum
//! lies on `x + y = L`, so only the two ends of that edge and the point where
//! both rate limits meet need evaluating.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorContext, SchedulingError, SchedulingResult};
use crate::models::ActivityWindow;
use crate::time::seconds_between;

/// Best split of an overlap between an inbound and an outbound window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlapFlow {
    /// Maximum data volume through both windows.
    pub data_vol: f64,
    /// Overlap seconds given to the first window.
    pub first_overlap_s: f64,
    /// Overlap seconds given to the second window.
    pub second_overlap_s: f64,
}

/// Maximum data volume that can enter through `first` and leave through
/// `second`.
///
/// # Errors
/// `OrderingViolation` if `second` is centered before `first`.
pub fn max_flow_through_pair(first: &ActivityWindow, second: &ActivityWindow) -> SchedulingResult<OverlapFlow> {
    if second.center() < first.center() {
        return Err(SchedulingError::ordering(
            format!("{} is centered before {}", second, first),
            ErrorContext::new("max_flow_through_pair")
                .with_entity("window")
                .with_entity_id(second.key()),
        ));
    }

    let r1 = first.ave_data_rate();
    let r2 = second.ave_data_rate();
    let overlap_start = first.start().max(second.start());
    let overlap_end = first.end().min(second.end());
    let overlap_s = seconds_between(overlap_start, overlap_end).max(0.0);

    let capacity_cap = first.data_vol().min(second.data_vol());
    if overlap_s == 0.0 {
        return Ok(OverlapFlow {
            data_vol: capacity_cap,
            first_overlap_s: 0.0,
            second_overlap_s: 0.0,
        });
    }

    let pre1 = seconds_between(first.start(), overlap_start).max(0.0);
    let post2 = seconds_between(overlap_end, second.end()).max(0.0);
    let flow_at = |x: f64| (r1 * (pre1 + x)).min(r2 * (post2 + overlap_s - x));

    let mut candidates = vec![0.0, overlap_s];
    if r1 + r2 > 0.0 {
        let crossing = (r2 * (post2 + overlap_s) - r1 * pre1) / (r1 + r2);
        candidates.push(crossing.clamp(0.0, overlap_s));
    }

    let mut best_x = 0.0;
    let mut best_flow = flow_at(0.0);
    for x in candidates {
        let flow = flow_at(x);
        if flow > best_flow {
            best_flow = flow;
            best_x = x;
        }
    }

    Ok(OverlapFlow {
        data_vol: best_flow.min(capacity_cap),
        first_overlap_s: best_x,
        second_overlap_s: overlap_s - best_x,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActivityKind, GsIndex, SatIndex, WindowKey, XlnkDirection};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t(offset_s: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(offset_s)
    }

    fn xlnk(start: i64, end: i64, dv: f64) -> ActivityWindow {
        let kind = ActivityKind::xlnk(SatIndex(0), SatIndex(1), 0, XlnkDirection::Symmetric).unwrap();
        ActivityWindow::new(WindowKey::new(1), kind, t(start), t(end), dv).unwrap()
    }

    fn dlnk(start: i64, end: i64, dv: f64) -> ActivityWindow {
        let kind = ActivityKind::dlnk(SatIndex(1), GsIndex(0), 0);
        ActivityWindow::new(WindowKey::new(2), kind, t(start), t(end), dv).unwrap()
    }

    #[test]
    fn test_disjoint_windows_limited_by_smaller_capacity() {
        let flow = max_flow_through_pair(&xlnk(0, 100, 100.0), &dlnk(200, 300, 50.0)).unwrap();
        assert_eq!(flow.data_vol, 50.0);
        assert_eq!(flow.first_overlap_s, 0.0);
    }

    #[test]
    fn test_equal_rates_split_overlap_evenly() {
        // Both at 1 Mb/s; 50 s overlap. pre1 = 50, post2 = 50.
        let flow = max_flow_through_pair(&xlnk(0, 100, 100.0), &dlnk(50, 150, 100.0)).unwrap();
        assert!((flow.data_vol - 75.0).abs() < 1e-9);
        assert!((flow.first_overlap_s - 25.0).abs() < 1e-9);
        assert!((flow.second_overlap_s - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_fast_downlink_takes_less_overlap() {
        // Inbound 1 Mb/s, outbound 3 Mb/s: 1·(50 + x) = 3·(50 + 50 − x) gives x = 62.5,
        // clipped to the 50 s overlap.
        let flow = max_flow_through_pair(&xlnk(0, 100, 100.0), &dlnk(50, 150, 300.0)).unwrap();
        assert!((flow.first_overlap_s - 50.0).abs() < 1e-9);
        assert!((flow.data_vol - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_reversed_pair_rejected() {
        let res = max_flow_through_pair(&dlnk(200, 300, 50.0), &xlnk(0, 100, 100.0));
        assert!(matches!(res, Err(SchedulingError::OrderingViolation { .. })));
    }
}
