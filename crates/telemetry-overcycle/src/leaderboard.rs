//! Per-line leaderboards built from the durable shift accumulator table
//! (spec §4.6 step 6, P6). Each stored row is one tick's *increment*; totals
//! are the count/seconds summed across the shift, but `max_over` tracks the
//! single largest overcycle event ever seen, not a sum of per-tick maxima.

use std::collections::HashMap;
use telemetry_model::station::StationId;
use telemetry_model::CumulativeAnchor;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StationTotals {
    pub station_id: StationId,
    pub cnt: u32,
    pub sum_over: f64,
    pub max_over: f64,
}

pub fn aggregate_totals(anchors: &[CumulativeAnchor]) -> Vec<StationTotals> {
    let mut by_station: HashMap<StationId, StationTotals> = HashMap::new();
    for a in anchors {
        let entry = by_station.entry(a.station_id).or_insert(StationTotals {
            station_id: a.station_id,
            cnt: 0,
            sum_over: 0.0,
            max_over: 0.0,
        });
        entry.cnt += a.inc_over_cnt;
        entry.sum_over += a.inc_over_sec;
        if a.inc_max_over_sec > entry.max_over {
            entry.max_over = a.inc_max_over_sec;
        }
    }
    by_station.into_values().collect()
}

/// `(sum_over desc, cnt desc)`, ties broken by `station_id asc`, truncated
/// to `max_top` (P6).
pub fn top_times(totals: &[StationTotals], max_top: usize) -> Vec<StationTotals> {
    let mut ranked = totals.to_vec();
    ranked.sort_by(|a, b| {
        b.sum_over
            .partial_cmp(&a.sum_over)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.cnt.cmp(&a.cnt))
            .then(a.station_id.cmp(&b.station_id))
    });
    ranked.truncate(max_top);
    ranked
}

/// `(cnt desc, sum_over desc)`, ties broken by `station_id asc`, truncated
/// to `max_top` (P6, Totals variant).
pub fn top_totals(totals: &[StationTotals], max_top: usize) -> Vec<StationTotals> {
    let mut ranked = totals.to_vec();
    ranked.sort_by(|a, b| {
        b.cnt
            .cmp(&a.cnt)
            .then(b.sum_over.partial_cmp(&a.sum_over).unwrap_or(std::cmp::Ordering::Equal))
            .then(a.station_id.cmp(&b.station_id))
    });
    ranked.truncate(max_top);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals(id: u32, cnt: u32, sum_over: f64, max_over: f64) -> StationTotals {
        StationTotals { station_id: StationId(id), cnt, sum_over, max_over }
    }

    #[test]
    fn aggregate_sums_cnt_and_seconds_but_maxes_the_max() {
        use chrono::TimeZone;
        let t0 = chrono::Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap();
        let t1 = chrono::Utc.with_ymd_and_hms(2026, 1, 5, 10, 15, 0).unwrap();
        let anchors = vec![
            CumulativeAnchor { station_id: StationId(1), as_of_local: t0, inc_over_cnt: 1, inc_over_sec: 5.0, inc_max_over_sec: 5.0, slot_duration_min: 15.0 },
            CumulativeAnchor { station_id: StationId(1), as_of_local: t1, inc_over_cnt: 1, inc_over_sec: 15.0, inc_max_over_sec: 15.0, slot_duration_min: 15.0 },
        ];
        let totals = aggregate_totals(&anchors);
        assert_eq!(totals.len(), 1);
        let t = totals[0];
        assert_eq!(t.cnt, 2);
        assert!((t.sum_over - 20.0).abs() < 1e-9);
        assert!((t.max_over - 15.0).abs() < 1e-9);
    }

    #[test]
    fn top_times_orders_by_sum_over_then_cnt_then_station_id() {
        let all = vec![totals(2, 1, 50.0, 50.0), totals(1, 3, 50.0, 20.0), totals(3, 1, 10.0, 10.0)];
        let ranked = top_times(&all, 5);
        assert_eq!(ranked[0].station_id, StationId(1));
        assert_eq!(ranked[1].station_id, StationId(2));
        assert_eq!(ranked[2].station_id, StationId(3));
    }

    #[test]
    fn top_totals_orders_by_cnt_then_sum_over() {
        let all = vec![totals(1, 2, 10.0, 5.0), totals(2, 2, 30.0, 5.0), totals(3, 5, 1.0, 1.0)];
        let ranked = top_totals(&all, 5);
        assert_eq!(ranked[0].station_id, StationId(3));
        assert_eq!(ranked[1].station_id, StationId(2));
        assert_eq!(ranked[2].station_id, StationId(1));
    }

    #[test]
    fn truncates_to_max_top() {
        let all: Vec<StationTotals> = (1..=10).map(|i| totals(i, i, i as f64, i as f64)).collect();
        assert_eq!(top_times(&all, 5).len(), 5);
    }
}
