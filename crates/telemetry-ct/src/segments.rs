//! CT segment journal (spec §4.5 "CT Segment journal"): buffers a pending
//! segment when `(ct_eff, overcycle_multiplier, ct_mode)` changes, and
//! materializes it at the next observed counter increment — or immediately
//! when configuration is missing or materialization is forced.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use telemetry_historian::Historian;
use telemetry_model::{CtMode, CtSegment, Station, StationId};

#[derive(Clone)]
struct Pending {
    ct_eff_sec: f64,
    overcycle_multiplier: f64,
    ct_mode: CtMode,
    parts_json: String,
    requested_at: DateTime<Utc>,
    prev_counter_value: f64,
}

#[derive(Default)]
pub struct SegmentJournal {
    active: HashMap<StationId, CtSegment>,
    pending: HashMap<StationId, Pending>,
}

impl SegmentJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_for(&self, station_id: StationId) -> Option<&CtSegment> {
        self.active.get(&station_id)
    }

    /// One call per tick per station. Returns a segment that was just
    /// materialized and should be upserted, or `None` if nothing changed or
    /// a pending segment is still waiting on its pinning increment.
    pub async fn tick(
        &mut self,
        station: &Station,
        now: DateTime<Utc>,
        ct_eff_sec: f64,
        overcycle_multiplier: f64,
        ct_mode: CtMode,
        parts_json: String,
        prev_counter_value: f64,
        historian: &dyn Historian,
        force: bool,
    ) -> Option<CtSegment> {
        let station_id = station.station_id;

        // Compare against whichever target is currently "in flight": a
        // pending segment already buffering this exact change takes
        // priority over the still-active one it is about to replace.
        let current_target = self
            .pending
            .get(&station_id)
            .map(|p| (p.ct_eff_sec, p.overcycle_multiplier, p.ct_mode))
            .or_else(|| self.active.get(&station_id).map(|a| (a.ct_eff_sec, a.overcycle_multiplier, a.ct_mode)));
        let changed = current_target != Some((ct_eff_sec, overcycle_multiplier, ct_mode));

        if changed {
            if ct_mode == CtMode::MissingConfig || force {
                let segment = self.build_segment(station, now, ct_eff_sec, overcycle_multiplier, ct_mode, parts_json);
                self.active.insert(station_id, segment.clone());
                self.pending.remove(&station_id);
                return Some(segment);
            }
            self.pending.insert(
                station_id,
                Pending { ct_eff_sec, overcycle_multiplier, ct_mode, parts_json, requested_at: now, prev_counter_value },
            );
            return None;
        }

        let Some(pending) = self.pending.get(&station_id).cloned() else { return None };
        let Some(path) = station.tag_path.as_deref() else {
            let segment = self.build_segment(station, pending.requested_at, pending.ct_eff_sec, pending.overcycle_multiplier, pending.ct_mode, pending.parts_json);
            self.active.insert(station_id, segment.clone());
            self.pending.remove(&station_id);
            return Some(segment);
        };
        let crossing = telemetry_historian::first_increment_after(historian, path, pending.prev_counter_value, pending.requested_at, now)
            .await
            .ok()
            .flatten();
        if let Some(ts) = crossing {
            let segment = self.build_segment(station, ts, pending.ct_eff_sec, pending.overcycle_multiplier, pending.ct_mode, pending.parts_json);
            self.active.insert(station_id, segment.clone());
            self.pending.remove(&station_id);
            return Some(segment);
        }
        None
    }

    fn build_segment(&self, station: &Station, effective_from_utc: DateTime<Utc>, ct_eff_sec: f64, overcycle_multiplier: f64, ct_mode: CtMode, parts_json: String) -> CtSegment {
        CtSegment {
            station_id: station.station_id,
            effective_from_utc,
            ct_eff_sec,
            fixtures_per_side: station.fixtures_per_side,
            is_turntable: station.is_turntable,
            parallelism_factor: station.parallelism_factor,
            parts_json,
            ct_mode,
            overcycle_multiplier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use telemetry_historian::fake::MemoryHistorian;
    use telemetry_model::station::LineId;

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

    fn dt(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, h, m, s).unwrap()
    }

    #[tokio::test]
    async fn missing_config_materializes_immediately() {
        let st = station();
        let hist = MemoryHistorian::new();
        let mut journal = SegmentJournal::new();
        let seg = journal
            .tick(&st, dt(10, 0, 0), 0.0, 1.0, CtMode::MissingConfig, "[]".into(), 0.0, &hist, false)
            .await;
        assert!(seg.is_some());
        assert_eq!(seg.unwrap().effective_from_utc, dt(10, 0, 0));
    }

    #[tokio::test]
    async fn live_fixtures_change_waits_for_next_increment() {
        let st = station();
        let hist = MemoryHistorian::new();
        let mut journal = SegmentJournal::new();

        // First tick establishes the active baseline immediately (no prior segment).
        let first = journal
            .tick(&st, dt(10, 0, 0), 30.0, 2.0, CtMode::LiveFixtures, "[]".into(), 100.0, &hist, true)
            .await;
        assert!(first.is_some());

        // CT changes: this should buffer, not materialize yet.
        let pending = journal
            .tick(&st, dt(10, 1, 0), 32.5, 2.0, CtMode::LiveFixtures, "[]".into(), 100.0, &hist, false)
            .await;
        assert!(pending.is_none());

        hist.seed("A/B/L1/ST1", [(dt(10, 2, 0), 101.0)]);
        let materialized = journal
            .tick(&st, dt(10, 3, 0), 32.5, 2.0, CtMode::LiveFixtures, "[]".into(), 100.0, &hist, false)
            .await;
        let seg = materialized.expect("expected the pending segment to materialize");
        assert_eq!(seg.effective_from_utc, dt(10, 2, 0));
        assert_eq!(seg.ct_eff_sec, 32.5);
    }

    #[tokio::test]
    async fn unchanged_ct_is_a_no_op() {
        let st = station();
        let hist = MemoryHistorian::new();
        let mut journal = SegmentJournal::new();
        journal.tick(&st, dt(10, 0, 0), 30.0, 2.0, CtMode::LiveFixtures, "[]".into(), 100.0, &hist, true).await;
        let again = journal.tick(&st, dt(10, 5, 0), 30.0, 2.0, CtMode::LiveFixtures, "[]".into(), 100.0, &hist, false).await;
        assert!(again.is_none());
    }
}
