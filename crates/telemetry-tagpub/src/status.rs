//! Status snapshot builder (spec §4.7): browse all leaves under a station
//! root and compose one `StatusPayload`. Flat stations get one `data` entry;
//! turntables get one entry per side, each with its own fixtures array.

use crate::tag::TagSource;
use chrono::{DateTime, Utc};
use telemetry_broker::payload::{FixtureValue, StationSideSnapshot, StatusPayload};
use telemetry_model::{Station, TaggedValue};

async fn numeric(path: &str, source: &dyn TagSource) -> Option<f64> {
    match source.read_tag(path).await.value {
        Some(TaggedValue::Num(n)) => Some(n),
        _ => None,
    }
}

async fn text(path: &str, source: &dyn TagSource) -> Option<String> {
    match source.read_tag(path).await.value {
        Some(TaggedValue::Text(s)) => Some(s),
        _ => None,
    }
}

pub async fn compose_status(station: &Station, at: DateTime<Utc>, source: &dyn TagSource) -> StatusPayload {
    let base = station.path();
    let sides: &[u8] = if station.is_turntable { &[1, 2] } else { &[1] };

    let mut data = Vec::with_capacity(sides.len());
    for &side in sides {
        let cycle_time = numeric(&format!("{base}/Side{side}/CycleTime"), source).await;
        let total_parts = numeric(&format!("{base}/Side{side}/TotalParts"), source).await.map(|v| v as i64);

        let mut fixtures = Vec::with_capacity(station.fixtures_per_side as usize);
        for idx in 1..=station.fixtures_per_side {
            let part_number = text(&format!("{base}/Side{side}/Fixture{idx}/PartNumber"), source).await;
            let cycle_time = numeric(&format!("{base}/Side{side}/Fixture{idx}/CycleTime"), source).await;
            fixtures.push(FixtureValue { fixture_id: idx, part_number, cycle_time });
        }
        data.push(StationSideSnapshot { side_id: side, cycle_time, total_parts, fixtures });
    }
    StatusPayload::new(at, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::{fake::MemoryTagSource, TagReading};
    use chrono::TimeZone;
    use telemetry_model::station::LineId;
    use telemetry_model::StationId;

    fn dt() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap()
    }

    fn station(is_turntable: bool, fixtures_per_side: u8) -> Station {
        Station {
            station_id: StationId(1),
            line_id: LineId(1),
            area: "A".into(),
            subarea: "B".into(),
            line: "L1".into(),
            station: "ST1".into(),
            is_turntable,
            fixtures_per_side,
            is_critical: true,
            parallelism_factor: 0.0,
            tag_path: Some("A/B/L1/ST1".into()),
        }
    }

    #[tokio::test]
    async fn flat_station_gets_one_data_entry() {
        let st = station(false, 1);
        let source = MemoryTagSource::new();
        source.set("A/B/L1/ST1/Side1/CycleTime", TagReading::good(TaggedValue::Num(30.0), dt()));
        source.set("A/B/L1/ST1/Side1/Fixture1/PartNumber", TagReading::good(TaggedValue::Text("P1".into()), dt()));
        let payload = compose_status(&st, dt(), &source).await;
        assert_eq!(payload.data.len(), 1);
        assert_eq!(payload.data[0].cycle_time, Some(30.0));
        assert_eq!(payload.data[0].fixtures.len(), 1);
        assert_eq!(payload.data[0].fixtures[0].part_number, Some("P1".to_string()));
    }

    #[tokio::test]
    async fn turntable_gets_one_entry_per_side() {
        let st = station(true, 1);
        let source = MemoryTagSource::new();
        let payload = compose_status(&st, dt(), &source).await;
        assert_eq!(payload.data.len(), 2);
        assert_eq!(payload.data[0].side_id, 1);
        assert_eq!(payload.data[1].side_id, 2);
    }

    #[tokio::test]
    async fn missing_reads_render_as_none_not_zero() {
        let st = station(false, 1);
        let source = MemoryTagSource::new();
        let payload = compose_status(&st, dt(), &source).await;
        assert_eq!(payload.data[0].cycle_time, None);
        assert_eq!(payload.data[0].total_parts, None);
    }
}
