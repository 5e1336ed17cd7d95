//! Node group (faults/andons/alerts) and cycle group reducers (spec §4.7).
//! A group is a named set of member tag paths published together behind one
//! `{Version, Timestamp, Value}` envelope.

use crate::tag::{TagReading, TagSource};
use telemetry_model::{and_reduce, TaggedValue, TriBool};

#[derive(Debug, Clone)]
pub struct GroupConfig {
    pub config_id: i64,
    pub topic_id: String,
    pub station_id: telemetry_model::StationId,
    pub scope_slug: String,
    pub member_paths: Vec<String>,
    pub qos: u8,
    pub retain: bool,
}

pub async fn read_group(cfg: &GroupConfig, source: &dyn TagSource) -> Vec<TagReading> {
    let mut out = Vec::with_capacity(cfg.member_paths.len());
    for path in &cfg.member_paths {
        out.push(source.read_tag(path).await);
    }
    out
}

/// AND-reduce over members' tri-state coercion (spec §4.7): a bad-quality
/// read contributes `Unknown`, same as a value that does not coerce.
pub fn node_group_value(readings: &[TagReading]) -> TriBool {
    and_reduce(readings.iter().map(|r| r.value.as_ref().map(TaggedValue::to_tri_bool).unwrap_or(TriBool::Unknown)))
}

/// First good numeric among members (spec §4.7 "Cycle group").
pub fn cycle_group_value(readings: &[TagReading]) -> Option<f64> {
    TaggedValue::first_numeric(readings.iter().filter_map(|r| r.value.as_ref()))
}

/// Latest member read timestamp, used as the logged row's `src_ts` — the
/// group payload reflects whichever member changed most recently.
pub fn latest_ts(readings: &[TagReading]) -> chrono::DateTime<chrono::Utc> {
    readings.iter().map(|r| r.ts).max().unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn dt(s: i64) -> chrono::DateTime<chrono::Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap() + chrono::Duration::seconds(s)
    }

    #[test]
    fn a_bad_quality_member_reduces_to_unknown_not_true() {
        let readings = vec![TagReading::good(TaggedValue::Bool(true), dt(0)), TagReading::bad("BadQuality", dt(1))];
        assert_eq!(node_group_value(&readings), TriBool::Unknown);
    }

    #[test]
    fn any_false_member_dominates() {
        let readings = vec![TagReading::good(TaggedValue::Bool(true), dt(0)), TagReading::good(TaggedValue::Bool(false), dt(1))];
        assert_eq!(node_group_value(&readings), TriBool::False);
    }

    #[test]
    fn cycle_group_skips_non_numeric_and_bad_members() {
        let readings = vec![
            TagReading::bad("BadQuality", dt(0)),
            TagReading::good(TaggedValue::Text("x".into()), dt(1)),
            TagReading::good(TaggedValue::Num(12.5), dt(2)),
        ];
        assert_eq!(cycle_group_value(&readings), Some(12.5));
    }

    #[test]
    fn latest_ts_picks_the_max_member_timestamp() {
        let readings = vec![TagReading::good(TaggedValue::Bool(true), dt(0)), TagReading::good(TaggedValue::Bool(true), dt(5))];
        assert_eq!(latest_ts(&readings), dt(5));
    }
}
