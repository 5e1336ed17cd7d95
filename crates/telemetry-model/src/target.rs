//! Base target rows (spec §3, §4.5).

use crate::station::StationId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// `target_parts_base` for either `(station_id, hour_start_utc)` or
/// `(station_id, shift_id, shift_date)`. Hourly rows leave `shift_id`/
/// `shift_date` unset and vice versa; the two halves share a store table in
/// the original system but are modeled as one row shape since the fields
/// are mutually exclusive and the engine that produces each is distinct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseTargetRow {
    pub station_id: StationId,
    pub hour_start_utc: Option<DateTime<Utc>>,
    pub shift_id: Option<String>,
    pub shift_date: Option<NaiveDate>,
    pub target_parts_base: i64,
}

impl BaseTargetRow {
    pub fn hourly(station_id: StationId, hour_start_utc: DateTime<Utc>, target_parts_base: i64) -> Self {
        Self {
            station_id,
            hour_start_utc: Some(hour_start_utc),
            shift_id: None,
            shift_date: None,
            target_parts_base,
        }
    }

    pub fn shift(
        station_id: StationId,
        shift_id: String,
        shift_date: NaiveDate,
        target_parts_base: i64,
    ) -> Self {
        Self {
            station_id,
            hour_start_utc: None,
            shift_id: Some(shift_id),
            shift_date: Some(shift_date),
            target_parts_base,
        }
    }
}
