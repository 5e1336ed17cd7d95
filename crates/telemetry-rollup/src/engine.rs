//! Rollup Engine tick (spec §4.4): reset-safe accumulation, hour/shift/week
//! rollover, idle flush, late reconciliation, batched upsert.

use crate::bootstrap::bootstrap;
use crate::reader::{CounterReading, CounterSource};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use telemetry_clock::{floor_hour_utc, local_date, local_midnight_utc, week_start_utc};
use telemetry_config::{ShiftBreakIndex, StationCache, Tuning};
use telemetry_historian::Historian;
use telemetry_model::station::LineId;
use telemetry_model::{RollupKind, RollupRow, Station, StationId, StationLiveState};
use telemetry_store::Store;
use tracing::{debug, warn};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RollupTickOutcome {
    pub hourly: Vec<RollupRow>,
    pub shift: Vec<RollupRow>,
    pub weekly: Vec<RollupRow>,
}

impl RollupTickOutcome {
    pub fn is_empty(&self) -> bool {
        self.hourly.is_empty() && self.shift.is_empty() && self.weekly.is_empty()
    }
}

pub struct RollupEngine {
    live: HashMap<StationId, StationLiveState>,
}

impl Default for RollupEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RollupEngine {
    pub fn new() -> Self {
        Self { live: HashMap::new() }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn tick(
        &mut self,
        now: DateTime<Utc>,
        station_cache: &StationCache,
        counters: &dyn CounterSource,
        historian: &dyn Historian,
        store: &dyn Store,
        shifts: &ShiftBreakIndex,
        tuning: &Tuning,
        tz: Tz,
    ) -> RollupTickOutcome {
        let stations = station_cache.stations(store).await;
        let station_ids: Vec<StationId> = stations.iter().map(|s| s.station_id).collect();
        let readings = counters.read_counters(&station_ids).await;
        let week_start_dow = telemetry_clock::weekday_from_iso(tuning.week_start_dow);
        let grace = Duration::minutes(tuning.final_grace_min);
        let write_idle = Duration::seconds(tuning.write_idle_sec as i64);

        let mut outcome = RollupTickOutcome::default();

        for station in stations.iter() {
            let Some(reading) = readings.get(&station.station_id).copied() else {
                debug!(target: "telemetry_rollup", station_id = station.station_id.0, "no_live_reading_skipping");
                continue;
            };
            if !reading.quality_ok {
                warn!(target: "telemetry_rollup", station_id = station.station_id.0, "quality_bad_freezing_state");
                continue;
            }

            if !self.live.contains_key(&station.station_id) {
                let state = bootstrap(station, now, reading, historian, shifts, tz, week_start_dow).await;
                self.live.insert(station.station_id, state);
                // Bootstrap already reflects state as-of `now`; nothing more
                // to do for this station this tick.
                continue;
            }

            let state = self.live.get_mut(&station.station_id).unwrap();
            tick_one_station(station, state, now, reading, historian, shifts, tz, week_start_dow, grace, write_idle, &mut outcome).await;
        }

        if !outcome.hourly.is_empty() {
            let _ = store.upsert_hourly_batch(outcome.hourly.clone()).await;
        }
        if !outcome.shift.is_empty() {
            let _ = store.upsert_shift_batch(outcome.shift.clone()).await;
        }
        if !outcome.weekly.is_empty() {
            let _ = store.upsert_weekly_batch(outcome.weekly.clone()).await;
        }
        outcome
    }
}

#[allow(clippy::too_many_arguments)]
async fn tick_one_station(
    station: &Station,
    state: &mut StationLiveState,
    now: DateTime<Utc>,
    reading: CounterReading,
    historian: &dyn Historian,
    shifts: &ShiftBreakIndex,
    tz: Tz,
    week_start_dow: chrono::Weekday,
    grace: Duration,
    write_idle: Duration,
    outcome: &mut RollupTickOutcome,
) {
    let path = station.tag_path.as_deref();
    let line_id = station.line_id;

    // Step 2: hour rollover.
    let floor_now = floor_hour_utc(now);
    if floor_now != state.hour_start_utc {
        outcome.hourly.push(RollupRow {
            kind: RollupKind::Hour,
            station_id: station.station_id,
            line_id,
            anchor_time: state.hour_start_utc,
            shift_id: None,
            total_parts: state.hour_total,
            start_count: Some(state.hour_start_count),
            end_count: Some(state.last_peak),
            is_closed: true,
            is_published: false,
        });
        let anchor_count = match path {
            Some(p) => telemetry_historian::anchor(historian, p, floor_now).await.ok().flatten(),
            None => None,
        }
        .map(|v| v.round() as i64)
        .unwrap_or(reading.value);
        state.hour_start_utc = floor_now;
        state.hour_start_count = anchor_count;
        state.hour_total = 0;
        state.last_peak = anchor_count;
        state.hour_last_flush_ms = 0;
    }

    // Step 3: reset-safe accumulation.
    state.accumulate(reading.value);

    // Step 4: idle flush.
    let since_flush = Duration::milliseconds(now.timestamp_millis() - state.hour_last_flush_ms);
    if state.hour_last_flush_ms == 0 || since_flush >= write_idle {
        outcome.hourly.push(RollupRow {
            kind: RollupKind::Hour,
            station_id: station.station_id,
            line_id,
            anchor_time: state.hour_start_utc,
            shift_id: None,
            total_parts: state.hour_total,
            start_count: Some(state.hour_start_count),
            end_count: None,
            is_closed: false,
            is_published: false,
        });
        state.hour_last_flush_ms = now.timestamp_millis();
    }

    // Step 5: shift transition.
    let active = shifts.active_shift(line_id, now).await;
    let active_key = active.as_ref().map(|w| (w.shift_id.clone(), w.shift_local_date));
    let stored_key = state.shift_id.clone().zip(state.shift_date);
    if active_key != stored_key {
        if let (Some(prev_id), Some(prev_date)) = (state.shift_id.clone(), state.shift_date) {
            outcome.shift.push(RollupRow {
                kind: RollupKind::Shift,
                station_id: station.station_id,
                line_id,
                anchor_time: now,
                shift_id: Some(prev_id),
                total_parts: state.shift_total,
                start_count: Some(state.shift_start_count),
                end_count: Some(state.last_peak),
                is_closed: true,
                is_published: false,
            });
            let _ = prev_date;
        }
        match &active {
            Some(w) => {
                let shift_start_count = match path {
                    Some(p) => telemetry_historian::anchor(historian, p, w.start).await.ok().flatten(),
                    None => None,
                }
                .map(|v| v.round() as i64)
                .unwrap_or(reading.value);
                let shift_total = match path {
                    Some(p) => telemetry_historian::positive_delta(historian, p, w.start, now).await.unwrap_or(0),
                    None => 0,
                };
                state.shift_id = Some(w.shift_id.clone());
                state.shift_date = Some(w.shift_local_date);
                state.shift_start_count = shift_start_count;
                state.shift_total = shift_total;
            }
            None => {
                state.shift_id = None;
                state.shift_date = None;
                state.shift_start_count = 0;
                state.shift_total = 0;
            }
        }
    }

    // Always emit an open-shift snapshot so deleted rows self-heal.
    if let Some(w) = &active {
        outcome.shift.push(RollupRow {
            kind: RollupKind::Shift,
            station_id: station.station_id,
            line_id,
            anchor_time: w.start,
            shift_id: Some(w.shift_id.clone()),
            total_parts: state.shift_total,
            start_count: Some(state.shift_start_count),
            end_count: None,
            is_closed: false,
            is_published: false,
        });
    }

    // Step 6: week rollover.
    let week_start = week_start_utc(now, tz, week_start_dow);
    let week_start_local = local_date(week_start, tz);
    if week_start_local != state.week_start_local {
        outcome.weekly.push(RollupRow {
            kind: RollupKind::Week,
            station_id: station.station_id,
            line_id,
            anchor_time: local_midnight_utc(state.week_start_local, tz),
            shift_id: None,
            total_parts: state.week_total,
            start_count: None,
            end_count: None,
            is_closed: true,
            is_published: false,
        });
        let new_total = match path {
            Some(p) => telemetry_historian::positive_delta(historian, p, week_start, now).await.unwrap_or(0),
            None => 0,
        };
        state.week_start_local = week_start_local;
        state.week_total = new_total;
    }

    // Step 7: late reconciliation for just-ended shifts within grace.
    if let Some(ended) = shifts.last_ended_shift(line_id, now, grace).await {
        if !state.shift_already_reconciled(&ended.shift_id, ended.shift_local_date) {
            let total = match path {
                Some(p) => telemetry_historian::positive_delta(historian, p, ended.start, ended.end).await.unwrap_or(0),
                None => 0,
            };
            let end_count = match path {
                Some(p) => telemetry_historian::anchor(historian, p, ended.end).await.ok().flatten().map(|v| v.round() as i64),
                None => None,
            };
            outcome.shift.push(RollupRow {
                kind: RollupKind::Shift,
                station_id: station.station_id,
                line_id,
                anchor_time: ended.start,
                shift_id: Some(ended.shift_id.clone()),
                total_parts: total,
                start_count: None,
                end_count,
                is_closed: true,
                is_published: false,
            });
            state.mark_shift_reconciled(ended.shift_id.clone(), ended.shift_local_date);
        }
    }
}

/// Anchor for the rollup row keyed on `(station, line)` rather than a fully
/// qualified identity — exposed for the back-fill pass (spec §4.4
/// `backfillDayDense`).
pub fn line_of(station_id: StationId, stations: &[Station]) -> Option<LineId> {
    stations.iter().find(|s| s.station_id == station_id).map(|s| s.line_id)
}
