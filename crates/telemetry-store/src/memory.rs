//! In-memory `Store` fake used by tests and local/dev runs. Upserts key on
//! natural identity so replaying a batch twice leaves the same state (P7).

use crate::{Hierarchy, LineSlotRow, PublishLogRow, QueryOutcome, RollupKey, Store, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use telemetry_model::station::LineId;
use telemetry_model::{BaseTargetRow, BreakSpan, CtSegment, CumulativeAnchor, PartCtConfig, RollupRow, ShiftWindow, Station, StationId};

#[derive(Default)]
struct Inner {
    stations: Vec<Station>,
    part_cts: HashMap<StationId, PartCtConfig>,
    shifts_by_date: HashMap<NaiveDate, Vec<ShiftWindow>>,
    breaks_by_date: HashMap<NaiveDate, Vec<BreakSpan>>,
    hierarchy: HashMap<StationId, Hierarchy>,

    hourly: HashMap<RollupKey, RollupRow>,
    shift: HashMap<RollupKey, RollupRow>,
    weekly: HashMap<RollupKey, RollupRow>,

    hourly_targets: HashMap<(StationId, DateTime<Utc>), BaseTargetRow>,
    shift_targets: HashMap<(StationId, String, NaiveDate), BaseTargetRow>,

    slot_station: HashMap<(StationId, String, NaiveDate), CumulativeAnchor>,
    slot_line: HashMap<(LineId, String, NaiveDate), LineSlotRow>,

    ct_segments: HashMap<StationId, Vec<CtSegment>>,
    publish_log: Vec<PublishLogRow>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_stations(&self, stations: Vec<Station>) {
        self.inner.lock().unwrap().stations = stations;
    }

    pub fn seed_part_cts(&self, station_id: StationId, cts: PartCtConfig) {
        self.inner.lock().unwrap().part_cts.insert(station_id, cts);
    }

    pub fn seed_shifts(&self, date: NaiveDate, shifts: Vec<ShiftWindow>) {
        self.inner.lock().unwrap().shifts_by_date.insert(date, shifts);
    }

    pub fn seed_breaks(&self, date: NaiveDate, breaks: Vec<BreakSpan>) {
        self.inner.lock().unwrap().breaks_by_date.insert(date, breaks);
    }

    pub fn seed_hierarchy(&self, station_id: StationId, hierarchy: Hierarchy) {
        self.inner.lock().unwrap().hierarchy.insert(station_id, hierarchy);
    }

    pub fn hourly_rows(&self) -> Vec<RollupRow> {
        self.inner.lock().unwrap().hourly.values().cloned().collect()
    }

    pub fn shift_rows(&self) -> Vec<RollupRow> {
        self.inner.lock().unwrap().shift.values().cloned().collect()
    }

    pub fn weekly_rows(&self) -> Vec<RollupRow> {
        self.inner.lock().unwrap().weekly.values().cloned().collect()
    }

    pub fn ct_segments_for(&self, station_id: StationId) -> Vec<CtSegment> {
        self.inner.lock().unwrap().ct_segments.get(&station_id).cloned().unwrap_or_default()
    }

    pub fn slot_station_rows(&self) -> Vec<CumulativeAnchor> {
        self.inner.lock().unwrap().slot_station.values().copied().collect()
    }

    pub fn slot_line_rows(&self) -> Vec<LineSlotRow> {
        self.inner.lock().unwrap().slot_line.values().cloned().collect()
    }

    pub fn publish_log_rows(&self) -> Vec<PublishLogRow> {
        self.inner.lock().unwrap().publish_log.clone()
    }

    fn key_of(row: &RollupRow) -> RollupKey {
        RollupKey { station_id: row.station_id, anchor_time: row.anchor_time, shift_id: row.shift_id.clone() }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_active_stations_for_rollup(&self, critical_only: bool) -> Result<QueryOutcome<Vec<Station>>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let rows: Vec<Station> = inner
            .stations
            .iter()
            .filter(|s| !critical_only || s.is_critical)
            .cloned()
            .collect();
        Ok(if rows.is_empty() { QueryOutcome::Empty } else { QueryOutcome::Rows(rows) })
    }

    async fn get_part_cts_for_station(&self, station_id: StationId) -> Result<QueryOutcome<PartCtConfig>, StoreError> {
        let inner = self.inner.lock().unwrap();
        match inner.part_cts.get(&station_id) {
            Some(cfg) => Ok(QueryOutcome::Rows(cfg.clone())),
            None => Ok(QueryOutcome::Empty),
        }
    }

    async fn get_shift_schedule_on_date(&self, date: NaiveDate) -> Result<QueryOutcome<Vec<ShiftWindow>>, StoreError> {
        let inner = self.inner.lock().unwrap();
        match inner.shifts_by_date.get(&date) {
            Some(rows) if !rows.is_empty() => Ok(QueryOutcome::Rows(rows.clone())),
            _ => Ok(QueryOutcome::Empty),
        }
    }

    async fn get_breaks_on_date(&self, date: NaiveDate) -> Result<QueryOutcome<Vec<BreakSpan>>, StoreError> {
        let inner = self.inner.lock().unwrap();
        match inner.breaks_by_date.get(&date) {
            Some(rows) if !rows.is_empty() => Ok(QueryOutcome::Rows(rows.clone())),
            _ => Ok(QueryOutcome::Empty),
        }
    }

    async fn get_hierarchy_for_stations(&self, station_ids: &[StationId]) -> Result<QueryOutcome<Vec<(StationId, Hierarchy)>>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let rows: Vec<(StationId, Hierarchy)> = station_ids
            .iter()
            .filter_map(|sid| inner.hierarchy.get(sid).map(|h| (*sid, h.clone())))
            .collect();
        Ok(if rows.is_empty() { QueryOutcome::Empty } else { QueryOutcome::Rows(rows) })
    }

    async fn upsert_hourly_batch(&self, rows: Vec<RollupRow>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        for row in rows {
            inner.hourly.insert(Self::key_of(&row), row);
        }
        Ok(())
    }

    async fn upsert_shift_batch(&self, rows: Vec<RollupRow>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        for row in rows {
            inner.shift.insert(Self::key_of(&row), row);
        }
        Ok(())
    }

    async fn upsert_weekly_batch(&self, rows: Vec<RollupRow>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        for row in rows {
            inner.weekly.insert(Self::key_of(&row), row);
        }
        Ok(())
    }

    async fn upsert_hourly_targets_batch(&self, rows: Vec<BaseTargetRow>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        for row in rows {
            if let Some(hour) = row.hour_start_utc {
                inner.hourly_targets.insert((row.station_id, hour), row);
            }
        }
        Ok(())
    }

    async fn upsert_shift_targets_batch(&self, rows: Vec<BaseTargetRow>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        for row in rows {
            if let (Some(shift_id), Some(date)) = (row.shift_id.clone(), row.shift_date) {
                inner.shift_targets.insert((row.station_id, shift_id, date), row);
            }
        }
        Ok(())
    }

    async fn upsert_slot_station_batch(&self, rows: Vec<CumulativeAnchor>, _created_by: &str) -> Result<(), StoreError> {
        // Keyed externally by (line, shift, station); this fake keys purely
        // by station + as_of date since it doesn't carry line/shift context
        // in `CumulativeAnchor` itself — callers pass that via the slot-line
        // batch instead.
        let mut inner = self.inner.lock().unwrap();
        for row in rows {
            let date = row.as_of_local.date_naive();
            inner.slot_station.insert((row.station_id, String::new(), date), row);
        }
        Ok(())
    }

    async fn upsert_slot_line_batch(&self, rows: Vec<LineSlotRow>, _created_by: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        for row in rows {
            inner.slot_line.insert((row.line_id, row.shift_id.clone(), row.shift_date), row);
        }
        Ok(())
    }

    async fn ct_segment_upsert_on_change(&self, segment: CtSegment) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let segs = inner.ct_segments.entry(segment.station_id).or_default();
        if let Some(existing) = segs.iter_mut().find(|s| s.effective_from_utc == segment.effective_from_utc) {
            *existing = segment;
        } else {
            segs.push(segment);
            segs.sort_by_key(|s| s.effective_from_utc);
        }
        Ok(())
    }

    async fn get_hourly_rows_missing_target(&self, now: DateTime<Utc>, lookback_hours: i64) -> Result<QueryOutcome<Vec<RollupRow>>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let cutoff = now - chrono::Duration::hours(lookback_hours);
        let rows: Vec<RollupRow> = inner
            .hourly
            .values()
            .filter(|r| r.anchor_time >= cutoff)
            .filter(|r| !inner.hourly_targets.contains_key(&(r.station_id, r.anchor_time)))
            .cloned()
            .collect();
        Ok(if rows.is_empty() { QueryOutcome::Empty } else { QueryOutcome::Rows(rows) })
    }

    async fn get_shift_rows_missing_target(&self, now: DateTime<Utc>, lookback_days: i64) -> Result<QueryOutcome<Vec<RollupRow>>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let cutoff = now - chrono::Duration::days(lookback_days);
        let rows: Vec<RollupRow> = inner
            .shift
            .values()
            .filter(|r| r.anchor_time >= cutoff)
            .filter(|r| match &r.shift_id {
                Some(sid) => !inner.shift_targets.contains_key(&(r.station_id, sid.clone(), r.anchor_time.date_naive())),
                None => false,
            })
            .cloned()
            .collect();
        Ok(if rows.is_empty() { QueryOutcome::Empty } else { QueryOutcome::Rows(rows) })
    }

    async fn get_hourly_rows_to_publish(&self, _lookback_hours: i64, _catchup_hours: i64) -> Result<QueryOutcome<Vec<RollupRow>>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let rows: Vec<RollupRow> = inner.hourly.values().filter(|r| !r.is_published).cloned().collect();
        Ok(if rows.is_empty() { QueryOutcome::Empty } else { QueryOutcome::Rows(rows) })
    }

    async fn get_ended_shift_rows_to_publish(&self, _day0: NaiveDate, _day1: NaiveDate, now: DateTime<Utc>) -> Result<QueryOutcome<Vec<RollupRow>>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let rows: Vec<RollupRow> = inner
            .shift
            .values()
            .filter(|r| !r.is_published && r.is_closed && r.anchor_time <= now)
            .cloned()
            .collect();
        Ok(if rows.is_empty() { QueryOutcome::Empty } else { QueryOutcome::Rows(rows) })
    }

    async fn get_weekly_rows_to_publish(&self, _now: DateTime<Utc>) -> Result<QueryOutcome<Vec<RollupRow>>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let rows: Vec<RollupRow> = inner.weekly.values().filter(|r| !r.is_published).cloned().collect();
        Ok(if rows.is_empty() { QueryOutcome::Empty } else { QueryOutcome::Rows(rows) })
    }

    async fn mark_hourly_published(&self, keys: Vec<RollupKey>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        for key in keys {
            if let Some(row) = inner.hourly.get_mut(&key) {
                row.is_published = true;
            }
        }
        Ok(())
    }

    async fn mark_shift_published(&self, keys: Vec<RollupKey>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        for key in keys {
            if let Some(row) = inner.shift.get_mut(&key) {
                row.is_published = true;
            }
        }
        Ok(())
    }

    async fn mark_weekly_published(&self, keys: Vec<RollupKey>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        for key in keys {
            if let Some(row) = inner.weekly.get_mut(&key) {
                row.is_published = true;
            }
        }
        Ok(())
    }

    async fn get_shift_accum_for_line(
        &self,
        line_id: LineId,
        shift_id: &str,
        _shift_start_local: DateTime<Utc>,
        as_of_local: DateTime<Utc>,
    ) -> Result<QueryOutcome<Vec<CumulativeAnchor>>, StoreError> {
        let inner = self.inner.lock().unwrap();
        // Mirrors the Postgres query's `EXISTS` guard: a shift's per-station
        // rows only become visible once its `overcycle_slot_line` row exists.
        let has_slot_line = inner.slot_line.keys().any(|(l, s, _)| *l == line_id && s == shift_id);
        if !has_slot_line {
            return Ok(QueryOutcome::Empty);
        }
        let station_ids: std::collections::HashSet<StationId> =
            inner.stations.iter().filter(|s| s.line_id == line_id).map(|s| s.station_id).collect();
        let rows: Vec<CumulativeAnchor> = inner
            .slot_station
            .values()
            .filter(|r| station_ids.contains(&r.station_id) && r.as_of_local <= as_of_local)
            .copied()
            .collect();
        Ok(if rows.is_empty() { QueryOutcome::Empty } else { QueryOutcome::Rows(rows) })
    }

    async fn get_ct_segments_for_station_between(
        &self,
        station_id: StationId,
        start_utc: DateTime<Utc>,
        end_utc: DateTime<Utc>,
    ) -> Result<QueryOutcome<Vec<CtSegment>>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let rows: Vec<CtSegment> = inner
            .ct_segments
            .get(&station_id)
            .map(|segs| {
                segs.iter()
                    .filter(|s| s.effective_from_utc < end_utc)
                    .filter(|s| {
                        // A segment overlaps [start_utc, end_utc) if it is
                        // still in force at start_utc or begins before end_utc.
                        s.effective_from_utc >= start_utc || s.effective_from_utc <= start_utc
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(if rows.is_empty() { QueryOutcome::Empty } else { QueryOutcome::Rows(rows) })
    }

    async fn insert_publish_log_batch(&self, rows: Vec<PublishLogRow>) -> Result<(), StoreError> {
        self.inner.lock().unwrap().publish_log.extend(rows);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn station(id: u32) -> Station {
        Station {
            station_id: StationId(id),
            line_id: LineId(1),
            area: "A".into(),
            subarea: "B".into(),
            line: "L1".into(),
            station: format!("ST{id}"),
            is_turntable: false,
            fixtures_per_side: 1,
            is_critical: true,
            parallelism_factor: 0.0,
            tag_path: Some(format!("A/B/L1/ST{id}")),
        }
    }

    #[tokio::test]
    async fn repeated_upsert_of_same_row_is_a_no_op_beyond_the_first() {
        let store = MemoryStore::new();
        let t = Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap();
        let row = RollupRow {
            kind: telemetry_model::RollupKind::Hour,
            station_id: StationId(1),
            line_id: LineId(1),
            anchor_time: t,
            shift_id: None,
            total_parts: 80,
            start_count: Some(100),
            end_count: Some(180),
            is_closed: true,
            is_published: false,
        };
        store.upsert_hourly_batch(vec![row.clone()]).await.unwrap();
        store.upsert_hourly_batch(vec![row.clone()]).await.unwrap();
        let rows = store.hourly_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_parts, 80);
    }

    #[tokio::test]
    async fn get_active_stations_filters_by_critical() {
        let store = MemoryStore::new();
        let mut s2 = station(2);
        s2.is_critical = false;
        store.seed_stations(vec![station(1), s2]);
        let QueryOutcome::Rows(rows) = store.get_active_stations_for_rollup(true).await.unwrap() else {
            panic!("expected rows");
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].station_id, StationId(1));
    }

    #[tokio::test]
    async fn missing_part_cts_is_empty_not_error() {
        let store = MemoryStore::new();
        let outcome = store.get_part_cts_for_station(StationId(99)).await.unwrap();
        assert_eq!(outcome, QueryOutcome::Empty);
    }
}
