//! Per-station state initialization on first observation (spec §4.4 "State
//! initialization").

use crate::reader::CounterReading;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use telemetry_clock::{floor_hour_utc, local_date, week_start_utc};
use telemetry_config::ShiftBreakIndex;
use telemetry_historian::Historian;
use telemetry_model::{Station, StationLiveState};

pub async fn bootstrap(
    station: &Station,
    now: DateTime<Utc>,
    reading: CounterReading,
    historian: &dyn Historian,
    shifts: &ShiftBreakIndex,
    tz: Tz,
    week_start_dow: chrono::Weekday,
) -> StationLiveState {
    let hour_start_utc = floor_hour_utc(now);
    let path = station.tag_path.as_deref();

    let hour_start_count = match path {
        Some(p) => telemetry_historian::anchor(historian, p, hour_start_utc).await.ok().flatten(),
        None => None,
    }
    .map(|v| v.round() as i64)
    .unwrap_or(reading.value);

    let hour_total = match path {
        Some(p) => telemetry_historian::positive_delta(historian, p, hour_start_utc, now).await.unwrap_or(0),
        None => 0,
    };

    let week_start = week_start_utc(now, tz, week_start_dow);
    let week_start_local = local_date(week_start, tz);
    let week_total = match path {
        Some(p) => telemetry_historian::positive_delta(historian, p, week_start, now).await.unwrap_or(0),
        None => 0,
    };

    let mut state = StationLiveState::new(station.station_id, hour_start_utc, hour_start_count, week_start_local, week_total);
    state.hour_total = hour_total;

    if let Some(active) = shifts.active_shift(station.line_id, now).await {
        let shift_start_count = match path {
            Some(p) => telemetry_historian::anchor(historian, p, active.start).await.ok().flatten(),
            None => None,
        }
        .map(|v| v.round() as i64)
        .unwrap_or(reading.value);
        let shift_total = match path {
            Some(p) => telemetry_historian::positive_delta(historian, p, active.start, now).await.unwrap_or(0),
            None => 0,
        };
        state.shift_id = Some(active.shift_id.clone());
        state.shift_date = Some(active.shift_local_date);
        state.shift_start_count = shift_start_count;
        state.shift_total = shift_total;
    }

    // Bootstrap computes every window's total as-of `now` directly from the
    // historian, so the live `last_peak` must start at the current reading
    // to avoid double-counting the same delta on the very next accumulate.
    state.last_peak = reading.value;
    state
}
