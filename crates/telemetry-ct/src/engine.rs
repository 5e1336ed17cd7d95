//! CT & Target Engine tick (spec §4.5): parts snapshot -> effective CT ->
//! debounce -> segment journal -> break-aware base targets.

use crate::debounce::Debouncer;
use crate::fixtures::{snapshot_parts, FixtureSource};
use crate::segments::SegmentJournal;
use crate::{blend, targets};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use telemetry_clock::floor_hour_utc;
use telemetry_config::{PartCtCache, ShiftBreakIndex, StationCache, Tuning};
use telemetry_historian::Historian;
use telemetry_model::{BaseTargetRow, CtMode, CtSegment, PartCtConfig, Station, StationId};
use telemetry_rollup::CounterSource;
use telemetry_store::Store;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CtTickOutcome {
    pub segments: Vec<CtSegment>,
    pub hourly_targets: Vec<BaseTargetRow>,
    pub shift_targets: Vec<BaseTargetRow>,
}

pub struct CtEngine {
    journal: SegmentJournal,
    debounce: Debouncer,
    last_hourly_target: HashMap<StationId, (DateTime<Utc>, i64)>,
    last_shift_target: HashMap<StationId, (String, NaiveDate, i64)>,
}

impl Default for CtEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CtEngine {
    pub fn new() -> Self {
        Self {
            journal: SegmentJournal::new(),
            debounce: Debouncer::new(),
            last_hourly_target: HashMap::new(),
            last_shift_target: HashMap::new(),
        }
    }

    pub fn active_ct_eff(&self, station_id: StationId) -> Option<f64> {
        self.journal.active_for(station_id).map(|s| s.ct_eff_sec)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn tick(
        &mut self,
        now: DateTime<Utc>,
        station_cache: &StationCache,
        part_ct_cache: &PartCtCache,
        fixtures: &dyn FixtureSource,
        counters: &dyn CounterSource,
        historian: &dyn Historian,
        store: &dyn Store,
        shifts: &ShiftBreakIndex,
        tuning: &Tuning,
    ) -> CtTickOutcome {
        let stations = station_cache.stations(store).await;
        let station_ids: Vec<StationId> = stations.iter().map(|s| s.station_id).collect();
        let readings = counters.read_counters(&station_ids).await;

        let mut outcome = CtTickOutcome::default();

        for station in stations.iter() {
            let parts = snapshot_parts(station, fixtures).await;
            let config = part_ct_cache.part_ct(store, station.station_id).await;
            let (cts, mults, ct_mode) = resolve_cts(&parts, &config);
            let lambda = station.parallelism_factor;
            let ct_eff = blend::effective_ct(&cts, lambda);
            let mult_eff = blend::effective_multiplier(&mults, lambda);

            let missing_config = ct_mode == CtMode::MissingConfig;
            let Some(_accepted) = self.debounce.observe(station.station_id, parts.clone(), missing_config, tuning.debounce_ticks) else {
                continue;
            };

            let parts_json = serde_json::to_string(&parts).unwrap_or_else(|_| "[]".to_string());
            let prev_counter_value = readings.get(&station.station_id).map(|r| r.value as f64).unwrap_or(0.0);
            if let Some(segment) = self
                .journal
                .tick(station, now, ct_eff, mult_eff, ct_mode, parts_json, prev_counter_value, historian, false)
                .await
            {
                let _ = store.ct_segment_upsert_on_change(segment.clone()).await;
                outcome.segments.push(segment);
            }

            if ct_eff <= 0.0 {
                continue;
            }

            self.emit_hourly_target(station, now, shifts, ct_eff, &mut outcome).await;
            self.emit_shift_target(station, now, shifts, ct_eff, &mut outcome).await;
        }

        if !outcome.hourly_targets.is_empty() {
            let _ = store.upsert_hourly_targets_batch(outcome.hourly_targets.clone()).await;
        }
        if !outcome.shift_targets.is_empty() {
            let _ = store.upsert_shift_targets_batch(outcome.shift_targets.clone()).await;
        }
        outcome
    }

    async fn emit_hourly_target(&mut self, station: &Station, now: DateTime<Utc>, shifts: &ShiftBreakIndex, ct_eff: f64, outcome: &mut CtTickOutcome) {
        let hour_start = floor_hour_utc(now);
        let hour_end = hour_start + chrono::Duration::hours(1);
        let working_ms = shifts.working_ms(station.line_id, hour_start, hour_end).await;
        let target = targets::base_target(working_ms, ct_eff);
        let should_emit = self
            .last_hourly_target
            .get(&station.station_id)
            .is_none_or(|(h, v)| *h != hour_start || *v != target);
        if should_emit {
            outcome.hourly_targets.push(BaseTargetRow::hourly(station.station_id, hour_start, target));
            self.last_hourly_target.insert(station.station_id, (hour_start, target));
        }
    }

    async fn emit_shift_target(&mut self, station: &Station, now: DateTime<Utc>, shifts: &ShiftBreakIndex, ct_eff: f64, outcome: &mut CtTickOutcome) {
        let Some(active) = shifts.active_shift(station.line_id, now).await else { return };
        let working_ms = shifts.working_ms(station.line_id, active.start, active.end).await;
        let target = targets::base_target(working_ms, ct_eff);
        let should_emit = self
            .last_shift_target
            .get(&station.station_id)
            .is_none_or(|(id, date, v)| *id != active.shift_id || *date != active.shift_local_date || *v != target);
        if should_emit {
            outcome.shift_targets.push(BaseTargetRow::shift(station.station_id, active.shift_id.clone(), active.shift_local_date, target));
            self.last_shift_target.insert(station.station_id, (active.shift_id.clone(), active.shift_local_date, target));
        }
    }
}

/// Look up each fixture's part number in the station's CT config. A part
/// observed with no matching config entry falls the whole station back to
/// `missing-config` (spec §7 "ConfigMissing"); an empty parts list does too,
/// since `k=0` has no CT to report either way.
fn resolve_cts(parts: &[String], config: &PartCtConfig) -> (Vec<f64>, Vec<f64>, CtMode) {
    if parts.is_empty() {
        return (Vec::new(), Vec::new(), CtMode::MissingConfig);
    }
    let mut cts = Vec::with_capacity(parts.len());
    let mut mults = Vec::with_capacity(parts.len());
    for part in parts {
        match config.get(part) {
            Some(ct) => {
                cts.push(ct.cycle_time_sec);
                mults.push(ct.overcycle_multiplier);
            }
            None => return (Vec::new(), Vec::new(), CtMode::MissingConfig),
        }
    }
    (cts, mults, CtMode::LiveFixtures)
}
