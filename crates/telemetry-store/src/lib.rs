//! Durable store boundary (spec §6 "Durable store — named operations").
//!
//! The store is an external collaborator described only by its interface:
//! a fixed set of named read/write operations the engines call every tick.
//! This crate owns the `Store` trait, the row/key types each operation
//! moves, and two implementations: `memory::MemoryStore` (a fake used by
//! tests and local runs) and, behind the `postgres` feature,
//! `postgres::PostgresStore` backed by `sqlx`.
//!
//! All writes are upserts keyed by natural identity, so repeated delivery
//! of the same batch is a no-op (P7, spec §5 "Idempotency").

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use telemetry_model::{BaseTargetRow, CtSegment, CumulativeAnchor, PartCtConfig, RollupRow, Station, StationId};
use thiserror::Error;

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store operation {operation} unavailable: {message}")]
    Unavailable { operation: &'static str, message: String },
}

/// Result shape for read operations (spec §9 "Exception-as-control-flow →
/// result values"): the source swallowed a "no result set" quirk behind a
/// broad exception; here that state is just `Empty`, distinct from an
/// actual failure.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome<T> {
    Rows(T),
    Empty,
}

impl<T: Default> QueryOutcome<T> {
    pub fn into_rows(self) -> T {
        match self {
            QueryOutcome::Rows(t) => t,
            QueryOutcome::Empty => T::default(),
        }
    }
}

/// Plant hierarchy display names for a station, independent of the
/// station's own `area`/`subarea`/`line`/`station` path fields (spec §6
/// `getHierarchyForStations`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hierarchy {
    pub division: String,
    pub plant: String,
    pub area: String,
    pub subarea: String,
    pub line: String,
    pub station: String,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_active_stations_for_rollup(&self, critical_only: bool) -> Result<QueryOutcome<Vec<Station>>, StoreError>;
    async fn get_part_cts_for_station(&self, station_id: StationId) -> Result<QueryOutcome<PartCtConfig>, StoreError>;
    async fn get_shift_schedule_on_date(&self, date: NaiveDate) -> Result<QueryOutcome<Vec<telemetry_model::ShiftWindow>>, StoreError>;
    async fn get_breaks_on_date(&self, date: NaiveDate) -> Result<QueryOutcome<Vec<telemetry_model::BreakSpan>>, StoreError>;
    async fn get_hierarchy_for_stations(&self, station_ids: &[StationId]) -> Result<QueryOutcome<Vec<(StationId, Hierarchy)>>, StoreError>;

    async fn upsert_hourly_batch(&self, rows: Vec<RollupRow>) -> Result<(), StoreError>;
    async fn upsert_shift_batch(&self, rows: Vec<RollupRow>) -> Result<(), StoreError>;
    async fn upsert_weekly_batch(&self, rows: Vec<RollupRow>) -> Result<(), StoreError>;

    async fn upsert_hourly_targets_batch(&self, rows: Vec<BaseTargetRow>) -> Result<(), StoreError>;
    async fn upsert_shift_targets_batch(&self, rows: Vec<BaseTargetRow>) -> Result<(), StoreError>;

    async fn upsert_slot_station_batch(&self, rows: Vec<CumulativeAnchor>, created_by: &str) -> Result<(), StoreError>;
    async fn upsert_slot_line_batch(&self, rows: Vec<LineSlotRow>, created_by: &str) -> Result<(), StoreError>;

    async fn ct_segment_upsert_on_change(&self, segment: CtSegment) -> Result<(), StoreError>;

    /// Rows with no matching `target_hourly`/`target_shift` row, within a
    /// look-back window (spec §4.5 "Repair pass").
    async fn get_hourly_rows_missing_target(&self, now: DateTime<Utc>, lookback_hours: i64) -> Result<QueryOutcome<Vec<RollupRow>>, StoreError>;
    async fn get_shift_rows_missing_target(&self, now: DateTime<Utc>, lookback_days: i64) -> Result<QueryOutcome<Vec<RollupRow>>, StoreError>;

    async fn get_hourly_rows_to_publish(&self, lookback_hours: i64, catchup_hours: i64) -> Result<QueryOutcome<Vec<RollupRow>>, StoreError>;
    async fn get_ended_shift_rows_to_publish(&self, day0: NaiveDate, day1: NaiveDate, now: DateTime<Utc>) -> Result<QueryOutcome<Vec<RollupRow>>, StoreError>;
    async fn get_weekly_rows_to_publish(&self, now: DateTime<Utc>) -> Result<QueryOutcome<Vec<RollupRow>>, StoreError>;

    async fn mark_hourly_published(&self, keys: Vec<RollupKey>) -> Result<(), StoreError>;
    async fn mark_shift_published(&self, keys: Vec<RollupKey>) -> Result<(), StoreError>;
    async fn mark_weekly_published(&self, keys: Vec<RollupKey>) -> Result<(), StoreError>;

    async fn get_shift_accum_for_line(
        &self,
        line_id: telemetry_model::station::LineId,
        shift_id: &str,
        shift_start_local: DateTime<Utc>,
        as_of_local: DateTime<Utc>,
    ) -> Result<QueryOutcome<Vec<CumulativeAnchor>>, StoreError>;

    async fn get_ct_segments_for_station_between(
        &self,
        station_id: StationId,
        start_utc: DateTime<Utc>,
        end_utc: DateTime<Utc>,
    ) -> Result<QueryOutcome<Vec<CtSegment>>, StoreError>;

    /// One row per publish (spec §4.7 "All publications log a typed row").
    async fn insert_publish_log_batch(&self, rows: Vec<PublishLogRow>) -> Result<(), StoreError>;
}

/// Identity key used by `mark_*_published` — the same natural key the
/// upsert operations key on (spec §5 "Idempotency").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RollupKey {
    pub station_id: StationId,
    pub anchor_time: DateTime<Utc>,
    pub shift_id: Option<String>,
}

/// Line-level overcycle snapshot row (spec §4.6 step 7): the leaderboard
/// payload plus whether this reconciles a just-ended shift.
#[derive(Debug, Clone, PartialEq)]
pub struct LineSlotRow {
    pub line_id: telemetry_model::station::LineId,
    pub shift_id: String,
    pub shift_date: NaiveDate,
    pub top_times_json: String,
    pub top_totals_json: String,
    pub is_final: bool,
}

/// Typed log row written for every Tag-Change Publisher publication (spec
/// §4.7). `value_type` mirrors `TaggedValue`'s serde tag (`"num"`, `"text"`,
/// `"bool"`, `"datetime"`); exactly one of the `value_*` fields is set.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishLogRow {
    pub config_id: i64,
    pub topic_id: String,
    pub qos: u8,
    pub retain: bool,
    pub value_type: &'static str,
    pub value_num: Option<f64>,
    pub value_text: Option<String>,
    pub value_bool: Option<bool>,
    pub quality_ok: bool,
    pub quality: String,
    pub src_ts: DateTime<Utc>,
}
