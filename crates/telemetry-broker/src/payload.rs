//! Published JSON payload shapes (spec §6, bit-exact keys) and the tagged
//! coercions that render into them (spec §9 "Dynamic typing → tagged
//! variants").

use chrono::{DateTime, Utc};
use serde::Serialize;
use telemetry_model::TriBool;

pub const PAYLOAD_VERSION: &str = "1.0.0";

/// `m:ss` rendering used by `TopOvercycleTimes` values.
pub fn format_mm_ss(seconds: f64) -> String {
    let total = seconds.round().max(0.0) as i64;
    format!("{}:{:02}", total / 60, total % 60)
}

#[derive(Debug, Serialize)]
pub struct HourlyProduction {
    #[serde(rename = "ProductionDate")]
    pub production_date: String,
    #[serde(rename = "ProductionHour")]
    pub production_hour: String,
    #[serde(rename = "Actual")]
    pub actual: i64,
    #[serde(rename = "HourlyTarget")]
    pub hourly_target: i64,
    #[serde(rename = "LiveTarget")]
    pub live_target: i64,
    #[serde(rename = "BucketID")]
    pub bucket_id: i64,
}

#[derive(Debug, Serialize)]
pub struct HourlyProductionEnvelope {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "HourlyProduction")]
    pub hourly_production: HourlyProduction,
}

impl HourlyProductionEnvelope {
    pub fn new(at: DateTime<Utc>, body: HourlyProduction) -> Self {
        Self { version: PAYLOAD_VERSION.to_string(), timestamp: at, hourly_production: body }
    }
}

#[derive(Debug, Serialize)]
pub struct ShiftProduction {
    #[serde(rename = "ProductionDate")]
    pub production_date: String,
    #[serde(rename = "Actual")]
    pub actual: i64,
    #[serde(rename = "ProductionTarget")]
    pub production_target: i64,
    #[serde(rename = "LiveTarget")]
    pub live_target: i64,
    #[serde(rename = "BucketID")]
    pub bucket_id: i64,
}

#[derive(Debug, Serialize)]
pub struct ShiftProductionEnvelope {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "ShiftProduction")]
    pub shift_production: ShiftProduction,
}

impl ShiftProductionEnvelope {
    pub fn new(at: DateTime<Utc>, body: ShiftProduction) -> Self {
        Self { version: PAYLOAD_VERSION.to_string(), timestamp: at, shift_production: body }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductionWeekly {
    #[serde(rename = "Stn_ID")]
    pub stn_id: u32,
    #[serde(rename = "Value")]
    pub value: i64,
}

#[derive(Debug, Serialize)]
pub struct ProductionWeeklyEnvelope {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "ProductionWeekly")]
    pub production_weekly: ProductionWeekly,
}

impl ProductionWeeklyEnvelope {
    pub fn new(at: DateTime<Utc>, body: ProductionWeekly) -> Self {
        Self { version: PAYLOAD_VERSION.to_string(), timestamp: at, production_weekly: body }
    }
}

#[derive(Debug, Serialize)]
pub struct OvercycleEntry<V: Serialize> {
    #[serde(rename = "ID")]
    pub id: u8,
    #[serde(rename = "StnID")]
    pub stn_id: u32,
    #[serde(rename = "Value")]
    pub value: V,
}

#[derive(Debug, Serialize)]
pub struct TopOvercyclesBody<V: Serialize> {
    #[serde(rename = "Overcycles")]
    pub overcycles: Vec<OvercycleEntry<V>>,
    #[serde(rename = "LineId", skip_serializing_if = "Option::is_none")]
    pub line_id: Option<u32>,
    #[serde(rename = "ShiftId", skip_serializing_if = "Option::is_none")]
    pub shift_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TopOvercyclesEnvelope<V: Serialize> {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "TopOvercycles")]
    pub top_overcycles: TopOvercyclesBody<V>,
}

impl<V: Serialize> TopOvercyclesEnvelope<V> {
    pub fn new(at: DateTime<Utc>, body: TopOvercyclesBody<V>) -> Self {
        Self { version: PAYLOAD_VERSION.to_string(), timestamp: at, top_overcycles: body }
    }
}

pub type TopOvercycleTimesEnvelope = TopOvercyclesEnvelope<String>;
pub type TopOvercycleTotalsEnvelope = TopOvercyclesEnvelope<i64>;

#[derive(Debug, Serialize)]
pub struct FixtureValue {
    #[serde(rename = "FixtureID")]
    pub fixture_id: u8,
    #[serde(rename = "PartNumber", skip_serializing_if = "Option::is_none")]
    pub part_number: Option<String>,
    #[serde(rename = "CycleTime", skip_serializing_if = "Option::is_none")]
    pub cycle_time: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct StationSideSnapshot {
    #[serde(rename = "SideID")]
    pub side_id: u8,
    #[serde(rename = "CycleTime", skip_serializing_if = "Option::is_none")]
    pub cycle_time: Option<f64>,
    #[serde(rename = "TotalParts", skip_serializing_if = "Option::is_none")]
    pub total_parts: Option<i64>,
    pub fixtures: Vec<FixtureValue>,
}

/// `{version, timestamp, data:[...]}` — lower-case keys, unlike every other
/// payload shape (bit-exact per spec §4.7).
#[derive(Debug, Serialize)]
pub struct StatusPayload {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub data: Vec<StationSideSnapshot>,
}

impl StatusPayload {
    pub fn new(at: DateTime<Utc>, data: Vec<StationSideSnapshot>) -> Self {
        Self { version: PAYLOAD_VERSION.to_string(), timestamp: at, data }
    }
}

/// `{Version, Timestamp, Value}` used by the node-group and cycle-group
/// publications (spec §4.7). `Value` is rendered total: tri-state booleans
/// become `true`/`false`/`null`; a missing numeric reading becomes `null`.
#[derive(Debug, Serialize)]
pub struct ValueEnvelope {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "Value")]
    pub value: serde_json::Value,
}

pub fn node_group_envelope(at: DateTime<Utc>, value: TriBool) -> ValueEnvelope {
    let value = match value {
        TriBool::True => serde_json::Value::Bool(true),
        TriBool::False => serde_json::Value::Bool(false),
        TriBool::Unknown => serde_json::Value::Null,
    };
    ValueEnvelope { version: PAYLOAD_VERSION.to_string(), timestamp: at, value }
}

pub fn cycle_group_envelope(at: DateTime<Utc>, value: Option<f64>) -> ValueEnvelope {
    let value = value
        .and_then(serde_json::Number::from_f64)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null);
    ValueEnvelope { version: PAYLOAD_VERSION.to_string(), timestamp: at, value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap()
    }

    #[test]
    fn format_mm_ss_pads_seconds() {
        assert_eq!(format_mm_ss(65.0), "1:05");
        assert_eq!(format_mm_ss(5.0), "0:05");
        assert_eq!(format_mm_ss(600.0), "10:00");
    }

    #[test]
    fn hourly_production_envelope_uses_bit_exact_keys() {
        let env = HourlyProductionEnvelope::new(
            at(),
            HourlyProduction {
                production_date: "2026-01-05T00:00:00".into(),
                production_hour: "10:00".into(),
                actual: 80,
                hourly_target: 90,
                live_target: 45,
                bucket_id: 10,
            },
        );
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["Version"], "1.0.0");
        assert_eq!(json["HourlyProduction"]["Actual"], 80);
        assert_eq!(json["HourlyProduction"]["BucketID"], 10);
    }

    #[test]
    fn top_overcycle_times_entries_carry_mm_ss_strings() {
        let body = TopOvercyclesBody {
            overcycles: vec![OvercycleEntry { id: 1, stn_id: 10, value: format_mm_ss(65.0) }],
            line_id: Some(1),
            shift_id: Some("DAY".into()),
        };
        let env = TopOvercycleTimesEnvelope::new(at(), body);
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["TopOvercycles"]["Overcycles"][0]["Value"], "1:05");
    }

    #[test]
    fn node_group_envelope_renders_unknown_as_null() {
        let env = node_group_envelope(at(), TriBool::Unknown);
        let json = serde_json::to_value(&env).unwrap();
        assert!(json["Value"].is_null());
    }

    #[test]
    fn status_payload_uses_lowercase_keys() {
        let payload = StatusPayload::new(at(), vec![]);
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("version").is_some());
        assert!(json.get("Version").is_none());
    }
}
