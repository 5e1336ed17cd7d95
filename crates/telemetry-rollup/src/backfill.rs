//! `backfillDayDense` (spec §4.4 "Back-fill contract"): recompute every hour
//! and every shift of a past day from the historian and upsert dense rows,
//! chunked to bound memory. Idempotent via the store's upsert semantics (P7).

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use telemetry_clock::local_midnight_utc;
use telemetry_historian::Historian;
use telemetry_model::{RollupKind, RollupRow, Station};
use telemetry_store::Store;

pub async fn backfill_day_dense(
    date: NaiveDate,
    stations: &[Station],
    historian: &dyn Historian,
    store: &dyn Store,
    tz: Tz,
    write_zero_on_no_data: bool,
    chunk: usize,
) {
    let day_start = local_midnight_utc(date, tz);
    let day_end = day_start + chrono::Duration::days(1);
    let now = Utc::now();
    let last_hour = day_end.min(now);

    let mut hour = day_start;
    let mut batch: Vec<RollupRow> = Vec::with_capacity(chunk);
    while hour < last_hour {
        let next = hour + chrono::Duration::hours(1);
        for station in stations {
            let Some(path) = station.tag_path.as_deref() else {
                if write_zero_on_no_data {
                    batch.push(zero_hour_row(station, hour));
                }
                continue;
            };
            let start_count = telemetry_historian::anchor(historian, path, hour).await.ok().flatten();
            let end_count = telemetry_historian::anchor(historian, path, next.min(now)).await.ok().flatten();
            let total = telemetry_historian::positive_delta(historian, path, hour, next.min(now)).await.unwrap_or(0);
            if total == 0 && start_count.is_none() && !write_zero_on_no_data {
                continue;
            }
            batch.push(RollupRow {
                kind: RollupKind::Hour,
                station_id: station.station_id,
                line_id: station.line_id,
                anchor_time: hour,
                shift_id: None,
                total_parts: total,
                start_count: start_count.map(|v| v.round() as i64),
                end_count: end_count.map(|v| v.round() as i64),
                is_closed: next <= now,
                is_published: false,
            });
        }
        if batch.len() >= chunk {
            let _ = store.upsert_hourly_batch(std::mem::take(&mut batch)).await;
        }
        hour = next;
    }
    if !batch.is_empty() {
        let _ = store.upsert_hourly_batch(batch).await;
    }
}

fn zero_hour_row(station: &Station, hour: DateTime<Utc>) -> RollupRow {
    RollupRow {
        kind: RollupKind::Hour,
        station_id: station.station_id,
        line_id: station.line_id,
        anchor_time: hour,
        shift_id: None,
        total_parts: 0,
        start_count: None,
        end_count: None,
        is_closed: true,
        is_published: false,
    }
}

