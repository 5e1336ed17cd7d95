//! Rollup rows (spec §3 "Rollup Row (hour / shift / week)").

use crate::station::{LineId, StationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RollupKind {
    Hour,
    Shift,
    Week,
}

/// One row of accumulated production for a station over an hour, shift, or
/// week window. `anchor_time` carries the window identity: top-of-hour UTC
/// for `Hour`, `(shift_id, shift_local_date)` is carried out-of-band by the
/// engine for `Shift` rows (this type stores the shift's start as the
/// anchor for upsert-key purposes), and the local week-start date for
/// `Week`.
///
/// Once `is_closed` is set, `total_parts` must never change again (P1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollupRow {
    pub kind: RollupKind,
    pub station_id: StationId,
    pub line_id: LineId,
    pub anchor_time: DateTime<Utc>,
    pub shift_id: Option<String>,
    pub total_parts: i64,
    pub start_count: Option<i64>,
    pub end_count: Option<i64>,
    pub is_closed: bool,
    pub is_published: bool,
}

impl RollupRow {
    pub fn new_open(
        kind: RollupKind,
        station_id: StationId,
        line_id: LineId,
        anchor_time: DateTime<Utc>,
        shift_id: Option<String>,
        start_count: Option<i64>,
    ) -> Self {
        Self {
            kind,
            station_id,
            line_id,
            anchor_time,
            shift_id,
            total_parts: 0,
            start_count,
            end_count: None,
            is_closed: false,
            is_published: false,
        }
    }

    /// Natural upsert identity used by the store's idempotent upsert
    /// operations (P7): `(station, anchor)` for hour/week, `(station,
    /// shift_id, anchor)` for shift.
    pub fn identity_key(&self) -> (StationId, RollupKind, DateTime<Utc>, Option<String>) {
        (self.station_id, self.kind, self.anchor_time, self.shift_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn identity_key_distinguishes_kinds_sharing_an_anchor() {
        let t = Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap();
        let hour = RollupRow::new_open(RollupKind::Hour, StationId(1), LineId(1), t, None, Some(100));
        let shift = RollupRow::new_open(RollupKind::Shift, StationId(1), LineId(1), t, Some("DAY".into()), Some(100));
        assert_ne!(hour.identity_key(), shift.identity_key());
    }
}
