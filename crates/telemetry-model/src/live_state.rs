//! Per-station live state owned exclusively by the Rollup Engine (spec §3
//! "Per-Station Live State"). Created on first observation, mutated only by
//! the engine's own tick, never shared for write.

use crate::station::StationId;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct StationLiveState {
    pub station_id: StationId,

    pub hour_start_utc: DateTime<Utc>,
    pub hour_start_count: i64,
    pub hour_total: i64,
    pub last_peak: i64,
    pub hour_last_flush_ms: i64,

    pub shift_id: Option<String>,
    pub shift_date: Option<NaiveDate>,
    pub shift_start_count: i64,
    pub shift_total: i64,

    pub week_start_local: NaiveDate,
    pub week_total: i64,

    /// `(shift_id, shift_date)` pairs already reconciled for this station,
    /// preventing duplicate late-reconciliation writes (spec §4.4 step 7,
    /// §4.6 finalization).
    pub past_shift_done_keys: HashSet<(String, NaiveDate)>,
}

impl StationLiveState {
    pub fn new(
        station_id: StationId,
        hour_start_utc: DateTime<Utc>,
        hour_start_count: i64,
        week_start_local: NaiveDate,
        week_total: i64,
    ) -> Self {
        Self {
            station_id,
            hour_start_utc,
            hour_start_count,
            hour_total: 0,
            last_peak: hour_start_count,
            hour_last_flush_ms: 0,
            shift_id: None,
            shift_date: None,
            shift_start_count: 0,
            shift_total: 0,
            week_start_local,
            week_total,
            past_shift_done_keys: HashSet::new(),
        }
    }

    /// Reset-safe accumulation (spec §4.4 step 3, P2): increases only are
    /// added to every open window total; a drop in the counter (reset) is
    /// absorbed silently by rebaselining `last_peak`.
    pub fn accumulate(&mut self, curr: i64) {
        if curr >= self.last_peak {
            let delta = curr - self.last_peak;
            self.hour_total += delta;
            self.shift_total += delta;
            self.week_total += delta;
        }
        self.last_peak = curr;
    }

    pub fn mark_shift_reconciled(&mut self, shift_id: String, shift_date: NaiveDate) {
        self.past_shift_done_keys.insert((shift_id, shift_date));
    }

    pub fn shift_already_reconciled(&self, shift_id: &str, shift_date: NaiveDate) -> bool {
        self.past_shift_done_keys.contains(&(shift_id.to_string(), shift_date))
    }
}
