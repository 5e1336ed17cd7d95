//! Shift windows and break spans (spec §3, §4.3).

use crate::station::LineId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A named production period on a line. End-exclusive; windows on the same
/// line never overlap (invariant enforced by `telemetry-config` on load, not
/// by this type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftWindow {
    pub shift_id: String,
    pub line_id: LineId,
    pub shift_local_date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ShiftWindow {
    /// `true` when `start <= at < end`.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }

    pub fn has_ended(&self, at: DateTime<Utc>) -> bool {
        self.end <= at
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }
}

/// A break span merged per line into a sorted list of disjoint `[start,end)`
/// intervals by `telemetry-config`. `is_active` mirrors the source schedule
/// row; inactive breaks are kept so a later config change can reactivate
/// them without reloading history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakSpan {
    pub line_id: LineId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub is_active: bool,
}

impl BreakSpan {
    /// Overlap of this break with `[start, end)`, clamped to `>= 0`.
    pub fn overlap(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> chrono::Duration {
        if !self.is_active {
            return chrono::Duration::zero();
        }
        let lo = self.start.max(start);
        let hi = self.end.min(end);
        if hi > lo { hi - lo } else { chrono::Duration::zero() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn dt(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, h, m, 0).unwrap()
    }

    #[test]
    fn shift_window_is_end_exclusive() {
        let w = ShiftWindow {
            shift_id: "DAY".into(),
            line_id: LineId(1),
            shift_local_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            start: dt(6, 0),
            end: dt(14, 0),
        };
        assert!(w.contains(dt(6, 0)));
        assert!(!w.contains(dt(14, 0)));
        assert!(w.has_ended(dt(14, 0)));
    }

    #[test]
    fn break_overlap_clamped_to_window() {
        let brk = BreakSpan { line_id: LineId(1), start: dt(10, 15), end: dt(10, 30), is_active: true };
        assert_eq!(brk.overlap(dt(10, 0), dt(11, 0)), chrono::Duration::minutes(15));
        assert_eq!(brk.overlap(dt(10, 20), dt(10, 25)), chrono::Duration::minutes(5));
        assert_eq!(brk.overlap(dt(11, 0), dt(12, 0)), chrono::Duration::zero());
    }

    #[test]
    fn inactive_break_contributes_no_overlap() {
        let brk = BreakSpan { line_id: LineId(1), start: dt(10, 0), end: dt(10, 30), is_active: false };
        assert_eq!(brk.overlap(dt(9, 0), dt(11, 0)), chrono::Duration::zero());
    }
}
