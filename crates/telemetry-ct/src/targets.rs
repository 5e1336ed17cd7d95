//! Base targets (spec §4.5 "Base targets", "Repair pass").

use telemetry_config::ShiftBreakIndex;
use telemetry_model::station::LineId;
use telemetry_model::{BaseTargetRow, RollupRow};
use telemetry_store::Store;

/// `floor(workingMs / 1000 / ct_eff)`. Callers only invoke this when
/// `ct_eff_sec > 0`.
pub fn base_target(working_ms: i64, ct_eff_sec: f64) -> i64 {
    ((working_ms as f64 / 1000.0) / ct_eff_sec).floor() as i64
}

/// Repair pass (spec §4.5, every ~2 min): hourly rows missing
/// `target_parts_base` in the last `lookback_hours`, recomputed from the
/// station's current effective CT and re-upserted. `ct_eff_for` resolves a
/// station's current effective CT; rows for a station with no resolvable CT
/// yet are left alone for a later pass.
pub async fn repair_hourly_targets<F>(
    store: &dyn Store,
    shifts: &ShiftBreakIndex,
    now: chrono::DateTime<chrono::Utc>,
    lookback_hours: i64,
    ct_eff_for: F,
) -> Vec<BaseTargetRow>
where
    F: Fn(&RollupRow) -> Option<f64>,
{
    let rows = match store.get_hourly_rows_missing_target(now, lookback_hours).await {
        Ok(outcome) => outcome.into_rows(),
        Err(_) => return Vec::new(),
    };
    let mut repaired = Vec::new();
    for row in rows {
        let Some(ct_eff) = ct_eff_for(&row) else { continue };
        if ct_eff <= 0.0 {
            continue;
        }
        let hour_end = row.anchor_time + chrono::Duration::hours(1);
        let working_ms = shifts.working_ms(row.line_id, row.anchor_time, hour_end).await;
        repaired.push(BaseTargetRow::hourly(row.station_id, row.anchor_time, base_target(working_ms, ct_eff)));
    }
    repaired
}

/// Same shape for shift rows missing a target, over `lookback_days`. Shift
/// bounds are recovered from the break/shift index by `(line, shift row's
/// anchor date)` since `RollupRow` only carries the shift's start.
pub async fn repair_shift_targets<F>(
    store: &dyn Store,
    shifts: &ShiftBreakIndex,
    now: chrono::DateTime<chrono::Utc>,
    lookback_days: i64,
    line_of: impl Fn(telemetry_model::StationId) -> Option<LineId>,
    ct_eff_for: F,
) -> Vec<BaseTargetRow>
where
    F: Fn(&RollupRow) -> Option<f64>,
{
    let rows = match store.get_shift_rows_missing_target(now, lookback_days).await {
        Ok(outcome) => outcome.into_rows(),
        Err(_) => return Vec::new(),
    };
    let mut repaired = Vec::new();
    for row in rows {
        let Some(shift_id) = row.shift_id.clone() else { continue };
        let Some(ct_eff) = ct_eff_for(&row) else { continue };
        if ct_eff <= 0.0 {
            continue;
        }
        let Some(line_id) = line_of(row.station_id) else { continue };
        let Some(window) = shifts.active_shift(line_id, row.anchor_time).await else { continue };
        let working_ms = shifts.working_ms(line_id, window.start, window.end).await;
        repaired.push(BaseTargetRow::shift(row.station_id, shift_id, window.shift_local_date, base_target(working_ms, ct_eff)));
    }
    repaired
}
