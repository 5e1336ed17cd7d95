//! End-to-end scenarios 1 and 2 from spec §8: hourly rollover and a counter
//! reset absorbed mid-hour.

use chrono::{TimeZone, Utc};
use telemetry_config::{ShiftBreakIndex, StationCache, Tuning};
use telemetry_historian::fake::MemoryHistorian;
use telemetry_model::station::LineId;
use telemetry_model::{Station, StationId};
use telemetry_rollup::reader::fake::MemoryCounterSource;
use telemetry_rollup::RollupEngine;
use telemetry_store::memory::MemoryStore;

fn station() -> Station {
    Station {
        station_id: StationId(1),
        line_id: LineId(1),
        area: "A".into(),
        subarea: "B".into(),
        line: "L1".into(),
        station: "ST1".into(),
        is_turntable: false,
        fixtures_per_side: 1,
        is_critical: true,
        parallelism_factor: 0.0,
        tag_path: Some("A/B/L1/ST1".into()),
    }
}

fn dt(h: u32, m: u32, s: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, h, m, s).unwrap()
}

#[tokio::test]
async fn hourly_rollover_closes_with_expected_totals() {
    let store = MemoryStore::new();
    store.seed_stations(vec![station()]);
    let station_cache = StationCache::new(300);
    let historian = MemoryHistorian::new();
    historian.seed("A/B/L1/ST1", [(dt(9, 59, 55), 100.0)]);
    let counters = MemoryCounterSource::new();
    let shifts = ShiftBreakIndex::new();
    let tuning = Tuning::default();
    let mut engine = RollupEngine::new();

    counters.set(StationId(1), 100, true);
    engine.tick(dt(10, 0, 0), &station_cache, &counters, &historian, &store, &shifts, &tuning, chrono_tz::UTC).await;

    counters.set(StationId(1), 102, true);
    engine.tick(dt(10, 0, 1), &station_cache, &counters, &historian, &store, &shifts, &tuning, chrono_tz::UTC).await;

    counters.set(StationId(1), 150, true);
    engine.tick(dt(10, 30, 0), &station_cache, &counters, &historian, &store, &shifts, &tuning, chrono_tz::UTC).await;

    counters.set(StationId(1), 180, true);
    engine.tick(dt(10, 59, 59), &station_cache, &counters, &historian, &store, &shifts, &tuning, chrono_tz::UTC).await;

    let outcome = engine.tick(dt(11, 0, 0), &station_cache, &counters, &historian, &store, &shifts, &tuning, chrono_tz::UTC).await;

    let closed = outcome.hourly.iter().find(|r| r.is_closed).expect("expected a closed hour row");
    assert_eq!(closed.total_parts, 80);
    assert_eq!(closed.start_count, Some(100));
    assert_eq!(closed.end_count, Some(180));
    assert_eq!(closed.anchor_time, dt(10, 0, 0));

    let stored = store.hourly_rows();
    let closed_stored = stored.iter().find(|r| r.anchor_time == dt(10, 0, 0) && r.is_closed).unwrap();
    assert_eq!(closed_stored.total_parts, 80);
}

#[tokio::test]
async fn counter_reset_mid_hour_is_absorbed_not_subtracted() {
    let store = MemoryStore::new();
    store.seed_stations(vec![station()]);
    let station_cache = StationCache::new(300);
    let historian = MemoryHistorian::new();
    historian.seed("A/B/L1/ST1", [(dt(7, 59, 0), 0.0)]);
    let counters = MemoryCounterSource::new();
    let shifts = ShiftBreakIndex::new();
    let tuning = Tuning::default();
    let mut engine = RollupEngine::new();

    counters.set(StationId(1), 50, true);
    engine.tick(dt(8, 5, 0), &station_cache, &counters, &historian, &store, &shifts, &tuning, chrono_tz::UTC).await;

    counters.set(StationId(1), 55, true);
    engine.tick(dt(8, 15, 0), &station_cache, &counters, &historian, &store, &shifts, &tuning, chrono_tz::UTC).await;

    counters.set(StationId(1), 0, true);
    engine.tick(dt(8, 20, 0), &station_cache, &counters, &historian, &store, &shifts, &tuning, chrono_tz::UTC).await;

    counters.set(StationId(1), 7, true);
    let outcome = engine.tick(dt(8, 25, 0), &station_cache, &counters, &historian, &store, &shifts, &tuning, chrono_tz::UTC).await;

    let open_row = outcome.hourly.iter().find(|r| !r.is_closed).expect("expected an open hour row");
    assert_eq!(open_row.total_parts, 12);
}
