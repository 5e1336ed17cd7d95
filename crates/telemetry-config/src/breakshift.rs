//! Break/Shift Index (spec §4.3): per-line merged break spans and sorted
//! shift windows covering today + yesterday, plus working-time arithmetic.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashMap;
use telemetry_model::station::LineId;
use telemetry_model::{BreakSpan, ShiftWindow};
use telemetry_store::Store;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct ShiftBreakIndex {
    shifts_by_line: RwLock<HashMap<LineId, Vec<ShiftWindow>>>,
    breaks_by_line: RwLock<HashMap<LineId, Vec<BreakSpan>>>,
}

impl ShiftBreakIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `today` and `yesterday` to accommodate shifts spanning midnight,
    /// and groups windows per line sorted by start (spec §4.3).
    pub async fn refresh_shifts(&self, store: &dyn Store, today: NaiveDate) {
        let mut by_line: HashMap<LineId, Vec<ShiftWindow>> = HashMap::new();
        for date in [today - Duration::days(1), today] {
            let rows = store
                .get_shift_schedule_on_date(date)
                .await
                .map(|o| o.into_rows())
                .unwrap_or_default();
            for w in rows {
                by_line.entry(w.line_id).or_default().push(w);
            }
        }
        for windows in by_line.values_mut() {
            windows.sort_by_key(|w| w.start);
        }
        *self.shifts_by_line.write().await = by_line;
    }

    pub async fn refresh_breaks(&self, store: &dyn Store, today: NaiveDate) {
        let mut by_line: HashMap<LineId, Vec<BreakSpan>> = HashMap::new();
        for date in [today - Duration::days(1), today] {
            let rows = store
                .get_breaks_on_date(date)
                .await
                .map(|o| o.into_rows())
                .unwrap_or_default();
            for b in rows {
                by_line.entry(b.line_id).or_default().push(b);
            }
        }
        for breaks in by_line.values_mut() {
            *breaks = merge_breaks(std::mem::take(breaks));
        }
        *self.breaks_by_line.write().await = by_line;
    }

    /// `activeShift(line, now)`: the single window with `start <= now < end`.
    pub async fn active_shift(&self, line_id: LineId, now: DateTime<Utc>) -> Option<ShiftWindow> {
        self.shifts_by_line
            .read()
            .await
            .get(&line_id)
            .and_then(|windows| windows.iter().find(|w| w.contains(now)).cloned())
    }

    /// `lastEndedShift(line, now, grace)`: most recent window with `end <= now`
    /// and `now - end <= grace`.
    pub async fn last_ended_shift(&self, line_id: LineId, now: DateTime<Utc>, grace: Duration) -> Option<ShiftWindow> {
        self.shifts_by_line.read().await.get(&line_id).and_then(|windows| {
            windows
                .iter()
                .filter(|w| w.has_ended(now) && (now - w.end) <= grace)
                .max_by_key(|w| w.end)
                .cloned()
        })
    }

    /// `workingMs(start, end, line)` (P4): `(end - start)` minus the sum of
    /// break overlaps, clamped to `>= 0`.
    pub async fn working_ms(&self, line_id: LineId, start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
        let total = (end - start).num_milliseconds().max(0);
        let breaks_ms: i64 = self
            .breaks_by_line
            .read()
            .await
            .get(&line_id)
            .map(|breaks| breaks.iter().map(|b| b.overlap(start, end).num_milliseconds()).sum())
            .unwrap_or(0);
        (total - breaks_ms).max(0)
    }
}

/// Sort by start, then fold consecutive overlapping/adjacent spans for the
/// same line with matching `is_active` into one disjoint interval.
fn merge_breaks(mut breaks: Vec<BreakSpan>) -> Vec<BreakSpan> {
    breaks.sort_by_key(|b| b.start);
    let mut merged: Vec<BreakSpan> = Vec::with_capacity(breaks.len());
    for b in breaks {
        if let Some(last) = merged.last_mut() {
            if last.is_active == b.is_active && b.start <= last.end {
                last.end = last.end.max(b.end);
                continue;
            }
        }
        merged.push(b);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn dt(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, h, m, 0).unwrap()
    }

    #[test]
    fn merge_breaks_combines_overlapping_active_spans() {
        let breaks = vec![
            BreakSpan { line_id: LineId(1), start: dt(10, 0), end: dt(10, 20), is_active: true },
            BreakSpan { line_id: LineId(1), start: dt(10, 15), end: dt(10, 30), is_active: true },
            BreakSpan { line_id: LineId(1), start: dt(12, 0), end: dt(12, 15), is_active: true },
        ];
        let merged = merge_breaks(breaks);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].start, dt(10, 0));
        assert_eq!(merged[0].end, dt(10, 30));
    }

    #[test]
    fn merge_breaks_keeps_inactive_spans_separate_from_active() {
        let breaks = vec![
            BreakSpan { line_id: LineId(1), start: dt(10, 0), end: dt(10, 20), is_active: true },
            BreakSpan { line_id: LineId(1), start: dt(10, 5), end: dt(10, 25), is_active: false },
        ];
        let merged = merge_breaks(breaks);
        assert_eq!(merged.len(), 2);
    }
}
