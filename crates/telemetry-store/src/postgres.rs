//! `sqlx`-backed `Store` implementation. Uses the runtime query API
//! (`sqlx::query`/`query_as`) rather than the compile-time `query!` macros,
//! since there is no live database to validate against at build time.

use crate::{Hierarchy, LineSlotRow, PublishLogRow, QueryOutcome, RollupKey, Store, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use telemetry_model::station::LineId;
use telemetry_model::{
    BaseTargetRow, BreakSpan, CtMode, CtSegment, CumulativeAnchor, PartCt, PartCtConfig, RollupKind,
    RollupRow, ShiftWindow, Station, StationId,
};

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn unavailable(operation: &'static str, err: sqlx::Error) -> StoreError {
        StoreError::Unavailable { operation, message: err.to_string() }
    }
}

fn station_from_row(row: &PgRow) -> Station {
    Station {
        station_id: StationId(row.get::<i32, _>("station_id") as u32),
        line_id: LineId(row.get::<i32, _>("line_id") as u32),
        area: row.get("area"),
        subarea: row.get("subarea"),
        line: row.get("line"),
        station: row.get("station"),
        is_turntable: row.get("is_turntable"),
        fixtures_per_side: row.get::<i16, _>("fixtures_per_side") as u8,
        is_critical: row.get("is_critical"),
        parallelism_factor: row.get("parallelism_factor"),
        tag_path: row.get("tag_path"),
    }
}

fn rollup_row_from_row(row: &PgRow, kind: RollupKind) -> RollupRow {
    RollupRow {
        kind,
        station_id: StationId(row.get::<i32, _>("station_id") as u32),
        line_id: LineId(row.get::<i32, _>("line_id") as u32),
        anchor_time: row.get("anchor_time"),
        shift_id: row.get("shift_id"),
        total_parts: row.get("total_parts"),
        start_count: row.get("start_count"),
        end_count: row.get("end_count"),
        is_closed: row.get("is_closed"),
        is_published: row.get("is_published"),
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn get_active_stations_for_rollup(&self, critical_only: bool) -> Result<QueryOutcome<Vec<Station>>, StoreError> {
        let rows = sqlx::query(
            "SELECT station_id, line_id, area, subarea, line, station, is_turntable, \
             fixtures_per_side, is_critical, parallelism_factor, tag_path \
             FROM station WHERE is_active AND (NOT $1 OR is_critical)",
        )
        .bind(critical_only)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::unavailable("get_active_stations_for_rollup", e))?;
        if rows.is_empty() {
            return Ok(QueryOutcome::Empty);
        }
        Ok(QueryOutcome::Rows(rows.iter().map(station_from_row).collect()))
    }

    async fn get_part_cts_for_station(&self, station_id: StationId) -> Result<QueryOutcome<PartCtConfig>, StoreError> {
        let rows = sqlx::query("SELECT part_number, cycle_time_sec, overcycle_multiplier FROM part_ct WHERE station_id = $1")
            .bind(station_id.0 as i32)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Self::unavailable("get_part_cts_for_station", e))?;
        if rows.is_empty() {
            return Ok(QueryOutcome::Empty);
        }
        let mut cfg = PartCtConfig::default();
        for row in rows {
            let part_number: String = row.get("part_number");
            let cycle_time_sec: f64 = row.get("cycle_time_sec");
            let overcycle_multiplier: f64 = row.get("overcycle_multiplier");
            if let Some(part_ct) = PartCt::new(cycle_time_sec, overcycle_multiplier) {
                cfg.by_part.insert(part_number, part_ct);
            }
        }
        Ok(QueryOutcome::Rows(cfg))
    }

    async fn get_shift_schedule_on_date(&self, date: NaiveDate) -> Result<QueryOutcome<Vec<ShiftWindow>>, StoreError> {
        let rows = sqlx::query("SELECT shift_id, line_id, shift_local_date, start_ts, end_ts FROM shift_schedule WHERE shift_local_date = $1")
            .bind(date)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Self::unavailable("get_shift_schedule_on_date", e))?;
        if rows.is_empty() {
            return Ok(QueryOutcome::Empty);
        }
        let windows = rows
            .iter()
            .map(|row| ShiftWindow {
                shift_id: row.get("shift_id"),
                line_id: LineId(row.get::<i32, _>("line_id") as u32),
                shift_local_date: row.get("shift_local_date"),
                start: row.get("start_ts"),
                end: row.get("end_ts"),
            })
            .collect();
        Ok(QueryOutcome::Rows(windows))
    }

    async fn get_breaks_on_date(&self, date: NaiveDate) -> Result<QueryOutcome<Vec<BreakSpan>>, StoreError> {
        let rows = sqlx::query(
            "SELECT line_id, start_ts, end_ts, is_active FROM break_schedule \
             WHERE start_ts::date = $1 OR end_ts::date = $1",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::unavailable("get_breaks_on_date", e))?;
        if rows.is_empty() {
            return Ok(QueryOutcome::Empty);
        }
        let spans = rows
            .iter()
            .map(|row| BreakSpan {
                line_id: LineId(row.get::<i32, _>("line_id") as u32),
                start: row.get("start_ts"),
                end: row.get("end_ts"),
                is_active: row.get("is_active"),
            })
            .collect();
        Ok(QueryOutcome::Rows(spans))
    }

    async fn get_hierarchy_for_stations(&self, station_ids: &[StationId]) -> Result<QueryOutcome<Vec<(StationId, Hierarchy)>>, StoreError> {
        let ids: Vec<i32> = station_ids.iter().map(|s| s.0 as i32).collect();
        let rows = sqlx::query(
            "SELECT station_id, division, plant, area, subarea, line, station \
             FROM station_hierarchy WHERE station_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::unavailable("get_hierarchy_for_stations", e))?;
        if rows.is_empty() {
            return Ok(QueryOutcome::Empty);
        }
        let out = rows
            .iter()
            .map(|row| {
                (
                    StationId(row.get::<i32, _>("station_id") as u32),
                    Hierarchy {
                        division: row.get("division"),
                        plant: row.get("plant"),
                        area: row.get("area"),
                        subarea: row.get("subarea"),
                        line: row.get("line"),
                        station: row.get("station"),
                    },
                )
            })
            .collect();
        Ok(QueryOutcome::Rows(out))
    }

    async fn upsert_hourly_batch(&self, rows: Vec<RollupRow>) -> Result<(), StoreError> {
        upsert_rollup_batch(&self.pool, "rollup_hourly", rows).await
    }

    async fn upsert_shift_batch(&self, rows: Vec<RollupRow>) -> Result<(), StoreError> {
        upsert_rollup_batch(&self.pool, "rollup_shift", rows).await
    }

    async fn upsert_weekly_batch(&self, rows: Vec<RollupRow>) -> Result<(), StoreError> {
        upsert_rollup_batch(&self.pool, "rollup_weekly", rows).await
    }

    async fn upsert_hourly_targets_batch(&self, rows: Vec<BaseTargetRow>) -> Result<(), StoreError> {
        for row in rows {
            sqlx::query(
                "INSERT INTO target_hourly (station_id, hour_start_utc, target_parts_base) \
                 VALUES ($1, $2, $3) \
                 ON CONFLICT (station_id, hour_start_utc) DO UPDATE SET target_parts_base = EXCLUDED.target_parts_base",
            )
            .bind(row.station_id.0 as i32)
            .bind(row.hour_start_utc)
            .bind(row.target_parts_base)
            .execute(&self.pool)
            .await
            .map_err(|e| Self::unavailable("upsert_hourly_targets_batch", e))?;
        }
        Ok(())
    }

    async fn upsert_shift_targets_batch(&self, rows: Vec<BaseTargetRow>) -> Result<(), StoreError> {
        for row in rows {
            sqlx::query(
                "INSERT INTO target_shift (station_id, shift_id, shift_date, target_parts_base) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (station_id, shift_id, shift_date) DO UPDATE SET target_parts_base = EXCLUDED.target_parts_base",
            )
            .bind(row.station_id.0 as i32)
            .bind(row.shift_id)
            .bind(row.shift_date)
            .bind(row.target_parts_base)
            .execute(&self.pool)
            .await
            .map_err(|e| Self::unavailable("upsert_shift_targets_batch", e))?;
        }
        Ok(())
    }

    async fn upsert_slot_station_batch(&self, rows: Vec<CumulativeAnchor>, created_by: &str) -> Result<(), StoreError> {
        for row in rows {
            sqlx::query(
                "INSERT INTO overcycle_slot_station \
                 (station_id, as_of_local, inc_over_cnt, inc_over_sec, inc_max_over_sec, slot_duration_min, created_by) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 ON CONFLICT (station_id, as_of_local) DO UPDATE SET \
                 inc_over_cnt = EXCLUDED.inc_over_cnt, inc_over_sec = EXCLUDED.inc_over_sec, \
                 inc_max_over_sec = EXCLUDED.inc_max_over_sec, slot_duration_min = EXCLUDED.slot_duration_min",
            )
            .bind(row.station_id.0 as i32)
            .bind(row.as_of_local)
            .bind(row.inc_over_cnt as i32)
            .bind(row.inc_over_sec)
            .bind(row.inc_max_over_sec)
            .bind(row.slot_duration_min)
            .bind(created_by)
            .execute(&self.pool)
            .await
            .map_err(|e| Self::unavailable("upsert_slot_station_batch", e))?;
        }
        Ok(())
    }

    async fn upsert_slot_line_batch(&self, rows: Vec<LineSlotRow>, created_by: &str) -> Result<(), StoreError> {
        for row in rows {
            sqlx::query(
                "INSERT INTO overcycle_slot_line \
                 (line_id, shift_id, shift_date, top_times_json, top_totals_json, is_final, created_by) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 ON CONFLICT (line_id, shift_id, shift_date) DO UPDATE SET \
                 top_times_json = EXCLUDED.top_times_json, top_totals_json = EXCLUDED.top_totals_json, \
                 is_final = EXCLUDED.is_final",
            )
            .bind(row.line_id.0 as i32)
            .bind(row.shift_id)
            .bind(row.shift_date)
            .bind(row.top_times_json)
            .bind(row.top_totals_json)
            .bind(row.is_final)
            .bind(created_by)
            .execute(&self.pool)
            .await
            .map_err(|e| Self::unavailable("upsert_slot_line_batch", e))?;
        }
        Ok(())
    }

    async fn ct_segment_upsert_on_change(&self, segment: CtSegment) -> Result<(), StoreError> {
        let ct_mode = match segment.ct_mode {
            CtMode::LiveFixtures => "live_fixtures",
            CtMode::FallbackConfig => "fallback_config",
            CtMode::MissingConfig => "missing_config",
        };
        sqlx::query(
            "INSERT INTO ct_segment \
             (station_id, effective_from_utc, ct_eff_sec, fixtures_per_side, is_turntable, \
              parallelism_factor, parts_json, ct_mode, overcycle_multiplier) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (station_id, effective_from_utc) DO UPDATE SET \
             ct_eff_sec = EXCLUDED.ct_eff_sec, fixtures_per_side = EXCLUDED.fixtures_per_side, \
             is_turntable = EXCLUDED.is_turntable, parallelism_factor = EXCLUDED.parallelism_factor, \
             parts_json = EXCLUDED.parts_json, ct_mode = EXCLUDED.ct_mode, \
             overcycle_multiplier = EXCLUDED.overcycle_multiplier",
        )
        .bind(segment.station_id.0 as i32)
        .bind(segment.effective_from_utc)
        .bind(segment.ct_eff_sec)
        .bind(segment.fixtures_per_side as i16)
        .bind(segment.is_turntable)
        .bind(segment.parallelism_factor)
        .bind(segment.parts_json)
        .bind(ct_mode)
        .bind(segment.overcycle_multiplier)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::unavailable("ct_segment_upsert_on_change", e))?;
        Ok(())
    }

    async fn get_hourly_rows_missing_target(&self, now: DateTime<Utc>, lookback_hours: i64) -> Result<QueryOutcome<Vec<RollupRow>>, StoreError> {
        let rows = sqlx::query(
            "SELECT h.station_id, h.line_id, h.anchor_time, h.shift_id, h.total_parts, h.start_count, h.end_count, h.is_closed, h.is_published \
             FROM rollup_hourly h \
             LEFT JOIN target_hourly t ON t.station_id = h.station_id AND t.hour_start_utc = h.anchor_time \
             WHERE t.station_id IS NULL AND h.anchor_time >= $1 - ($2 || ' hours')::interval",
        )
        .bind(now)
        .bind(lookback_hours)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::unavailable("get_hourly_rows_missing_target", e))?;
        if rows.is_empty() {
            return Ok(QueryOutcome::Empty);
        }
        Ok(QueryOutcome::Rows(rows.iter().map(|r| rollup_row_from_row(r, RollupKind::Hour)).collect()))
    }

    async fn get_shift_rows_missing_target(&self, now: DateTime<Utc>, lookback_days: i64) -> Result<QueryOutcome<Vec<RollupRow>>, StoreError> {
        let rows = sqlx::query(
            "SELECT s.station_id, s.line_id, s.anchor_time, s.shift_id, s.total_parts, s.start_count, s.end_count, s.is_closed, s.is_published \
             FROM rollup_shift s \
             LEFT JOIN target_shift t ON t.station_id = s.station_id AND t.shift_id = s.shift_id AND t.shift_date = s.anchor_time::date \
             WHERE t.station_id IS NULL AND s.anchor_time >= $1 - ($2 || ' days')::interval",
        )
        .bind(now)
        .bind(lookback_days)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::unavailable("get_shift_rows_missing_target", e))?;
        if rows.is_empty() {
            return Ok(QueryOutcome::Empty);
        }
        Ok(QueryOutcome::Rows(rows.iter().map(|r| rollup_row_from_row(r, RollupKind::Shift)).collect()))
    }

    async fn get_hourly_rows_to_publish(&self, lookback_hours: i64, catchup_hours: i64) -> Result<QueryOutcome<Vec<RollupRow>>, StoreError> {
        let rows = sqlx::query(
            "SELECT station_id, line_id, anchor_time, shift_id, total_parts, start_count, end_count, is_closed, is_published \
             FROM rollup_hourly \
             WHERE NOT is_published AND anchor_time >= now() - ($1 || ' hours')::interval \
             AND anchor_time <= now() - ($2 || ' hours')::interval",
        )
        .bind(lookback_hours)
        .bind(catchup_hours)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::unavailable("get_hourly_rows_to_publish", e))?;
        if rows.is_empty() {
            return Ok(QueryOutcome::Empty);
        }
        Ok(QueryOutcome::Rows(rows.iter().map(|r| rollup_row_from_row(r, RollupKind::Hour)).collect()))
    }

    async fn get_ended_shift_rows_to_publish(&self, day0: NaiveDate, day1: NaiveDate, now: DateTime<Utc>) -> Result<QueryOutcome<Vec<RollupRow>>, StoreError> {
        let rows = sqlx::query(
            "SELECT station_id, line_id, anchor_time, shift_id, total_parts, start_count, end_count, is_closed, is_published \
             FROM rollup_shift \
             WHERE NOT is_published AND is_closed AND anchor_time <= $3 \
             AND anchor_time::date BETWEEN $1 AND $2",
        )
        .bind(day0)
        .bind(day1)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::unavailable("get_ended_shift_rows_to_publish", e))?;
        if rows.is_empty() {
            return Ok(QueryOutcome::Empty);
        }
        Ok(QueryOutcome::Rows(rows.iter().map(|r| rollup_row_from_row(r, RollupKind::Shift)).collect()))
    }

    async fn get_weekly_rows_to_publish(&self, now: DateTime<Utc>) -> Result<QueryOutcome<Vec<RollupRow>>, StoreError> {
        let rows = sqlx::query(
            "SELECT station_id, line_id, anchor_time, shift_id, total_parts, start_count, end_count, is_closed, is_published \
             FROM rollup_weekly WHERE NOT is_published AND anchor_time <= $1",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::unavailable("get_weekly_rows_to_publish", e))?;
        if rows.is_empty() {
            return Ok(QueryOutcome::Empty);
        }
        Ok(QueryOutcome::Rows(rows.iter().map(|r| rollup_row_from_row(r, RollupKind::Week)).collect()))
    }

    async fn mark_hourly_published(&self, keys: Vec<RollupKey>) -> Result<(), StoreError> {
        mark_published(&self.pool, "rollup_hourly", keys).await
    }

    async fn mark_shift_published(&self, keys: Vec<RollupKey>) -> Result<(), StoreError> {
        mark_published(&self.pool, "rollup_shift", keys).await
    }

    async fn mark_weekly_published(&self, keys: Vec<RollupKey>) -> Result<(), StoreError> {
        mark_published(&self.pool, "rollup_weekly", keys).await
    }

    async fn get_shift_accum_for_line(
        &self,
        line_id: LineId,
        shift_id: &str,
        shift_start_local: DateTime<Utc>,
        as_of_local: DateTime<Utc>,
    ) -> Result<QueryOutcome<Vec<CumulativeAnchor>>, StoreError> {
        let rows = sqlx::query(
            "SELECT s.station_id, s.as_of_local, s.inc_over_cnt, s.inc_over_sec, s.inc_max_over_sec, s.slot_duration_min \
             FROM overcycle_slot_station s \
             JOIN station st ON st.station_id = s.station_id \
             WHERE st.line_id = $1 AND s.as_of_local BETWEEN $2 AND $3 \
             AND EXISTS (SELECT 1 FROM overcycle_slot_line l WHERE l.line_id = $1 AND l.shift_id = $4)",
        )
        .bind(line_id.0 as i32)
        .bind(shift_start_local)
        .bind(as_of_local)
        .bind(shift_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::unavailable("get_shift_accum_for_line", e))?;
        if rows.is_empty() {
            return Ok(QueryOutcome::Empty);
        }
        let out = rows
            .iter()
            .map(|row| CumulativeAnchor {
                station_id: StationId(row.get::<i32, _>("station_id") as u32),
                as_of_local: row.get("as_of_local"),
                inc_over_cnt: row.get::<i32, _>("inc_over_cnt") as u32,
                inc_over_sec: row.get("inc_over_sec"),
                inc_max_over_sec: row.get("inc_max_over_sec"),
                slot_duration_min: row.get("slot_duration_min"),
            })
            .collect();
        Ok(QueryOutcome::Rows(out))
    }

    async fn get_ct_segments_for_station_between(
        &self,
        station_id: StationId,
        start_utc: DateTime<Utc>,
        end_utc: DateTime<Utc>,
    ) -> Result<QueryOutcome<Vec<CtSegment>>, StoreError> {
        let rows = sqlx::query(
            "SELECT station_id, effective_from_utc, ct_eff_sec, fixtures_per_side, is_turntable, \
             parallelism_factor, parts_json, ct_mode, overcycle_multiplier \
             FROM ct_segment \
             WHERE station_id = $1 AND effective_from_utc < $3 \
             ORDER BY effective_from_utc ASC",
        )
        .bind(station_id.0 as i32)
        .bind(start_utc)
        .bind(end_utc)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::unavailable("get_ct_segments_for_station_between", e))?;
        if rows.is_empty() {
            return Ok(QueryOutcome::Empty);
        }
        let out = rows
            .iter()
            .map(|row| {
                let ct_mode = match row.get::<String, _>("ct_mode").as_str() {
                    "live_fixtures" => CtMode::LiveFixtures,
                    "fallback_config" => CtMode::FallbackConfig,
                    _ => CtMode::MissingConfig,
                };
                CtSegment {
                    station_id: StationId(row.get::<i32, _>("station_id") as u32),
                    effective_from_utc: row.get("effective_from_utc"),
                    ct_eff_sec: row.get("ct_eff_sec"),
                    fixtures_per_side: row.get::<i16, _>("fixtures_per_side") as u8,
                    is_turntable: row.get("is_turntable"),
                    parallelism_factor: row.get("parallelism_factor"),
                    parts_json: row.get("parts_json"),
                    ct_mode,
                    overcycle_multiplier: row.get("overcycle_multiplier"),
                }
            })
            .collect();
        Ok(QueryOutcome::Rows(out))
    }

    async fn insert_publish_log_batch(&self, rows: Vec<PublishLogRow>) -> Result<(), StoreError> {
        for row in rows {
            sqlx::query(
                "INSERT INTO tag_publish_log \
                 (config_id, topic_id, qos, retain, value_type, value_num, value_text, value_bool, quality_ok, quality, src_ts) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(row.config_id)
            .bind(row.topic_id)
            .bind(row.qos as i16)
            .bind(row.retain)
            .bind(row.value_type)
            .bind(row.value_num)
            .bind(row.value_text)
            .bind(row.value_bool)
            .bind(row.quality_ok)
            .bind(row.quality)
            .bind(row.src_ts)
            .execute(&self.pool)
            .await
            .map_err(|e| Self::unavailable("insert_publish_log_batch", e))?;
        }
        Ok(())
    }
}

async fn upsert_rollup_batch(pool: &PgPool, table: &'static str, rows: Vec<RollupRow>) -> Result<(), StoreError> {
    for row in rows {
        let sql = format!(
            "INSERT INTO {table} \
             (station_id, line_id, anchor_time, shift_id, total_parts, start_count, end_count, is_closed, is_published) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, false) \
             ON CONFLICT (station_id, anchor_time, shift_id) DO UPDATE SET \
             total_parts = EXCLUDED.total_parts, start_count = EXCLUDED.start_count, \
             end_count = EXCLUDED.end_count, is_closed = EXCLUDED.is_closed"
        );
        sqlx::query(&sql)
            .bind(row.station_id.0 as i32)
            .bind(row.line_id.0 as i32)
            .bind(row.anchor_time)
            .bind(row.shift_id)
            .bind(row.total_parts)
            .bind(row.start_count)
            .bind(row.end_count)
            .bind(row.is_closed)
            .execute(pool)
            .await
            .map_err(|e| PostgresStore::unavailable("upsert_rollup_batch", e))?;
    }
    Ok(())
}

async fn mark_published(pool: &PgPool, table: &'static str, keys: Vec<RollupKey>) -> Result<(), StoreError> {
    for key in keys {
        let sql = format!("UPDATE {table} SET is_published = true WHERE station_id = $1 AND anchor_time = $2 AND shift_id IS NOT DISTINCT FROM $3");
        sqlx::query(&sql)
            .bind(key.station_id.0 as i32)
            .bind(key.anchor_time)
            .bind(key.shift_id)
            .execute(pool)
            .await
            .map_err(|e| PostgresStore::unavailable("mark_published", e))?;
    }
    Ok(())
}
