//! Parts snapshot (spec §4.5): read `fixtures_per_side` fixture slots per
//! station; turntables read both sides of the same fixture index and keep
//! whichever value timestamp is newer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use telemetry_model::Station;

#[derive(Debug, Clone)]
pub struct FixtureValue {
    pub part_number: Option<String>,
    pub ts: DateTime<Utc>,
}

/// Live read of one `(side, fixture_index)` slot. A separate boundary from
/// `telemetry_rollup::CounterSource`: the CT engine watches part numbers,
/// not the production counter.
#[async_trait]
pub trait FixtureSource: Send + Sync {
    async fn read_fixture(&self, station: &Station, side: u8, fixture_index: u8) -> FixtureValue;
}

/// Ordered list of part numbers currently occupying a station's fixtures,
/// empty slots skipped (spec §4.5 "Parts snapshot").
pub async fn snapshot_parts(station: &Station, source: &dyn FixtureSource) -> Vec<String> {
    let mut parts = Vec::with_capacity(station.fixtures_per_side as usize);
    for idx in 1..=station.fixtures_per_side {
        let part = if station.is_turntable {
            let side1 = source.read_fixture(station, 1, idx).await;
            let side2 = source.read_fixture(station, 2, idx).await;
            pick_newer(side1, side2)
        } else {
            source.read_fixture(station, 1, idx).await.part_number
        };
        if let Some(p) = part {
            parts.push(p);
        }
    }
    parts
}

/// Side whose value timestamp is newer; ties (and either side missing a
/// value) resolve to side 1.
fn pick_newer(side1: FixtureValue, side2: FixtureValue) -> Option<String> {
    match (&side1.part_number, &side2.part_number) {
        (None, None) => None,
        (Some(_), None) => side1.part_number,
        (None, Some(_)) => side2.part_number,
        (Some(_), Some(_)) => {
            if side2.ts > side1.ts {
                side2.part_number
            } else {
                side1.part_number
            }
        }
    }
}

/// In-memory `FixtureSource` fake used by tests and local/dev runs.
pub mod fake {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use telemetry_model::StationId;

    #[derive(Default)]
    pub struct MemoryFixtureSource {
        values: Mutex<HashMap<(StationId, u8, u8), FixtureValue>>,
    }

    impl MemoryFixtureSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set(&self, station_id: StationId, side: u8, fixture_index: u8, part_number: Option<&str>, ts: DateTime<Utc>) {
            self.values.lock().unwrap().insert(
                (station_id, side, fixture_index),
                FixtureValue { part_number: part_number.map(str::to_string), ts },
            );
        }
    }

    #[async_trait]
    impl FixtureSource for MemoryFixtureSource {
        async fn read_fixture(&self, station: &Station, side: u8, fixture_index: u8) -> FixtureValue {
            self.values
                .lock()
                .unwrap()
                .get(&(station.station_id, side, fixture_index))
                .cloned()
                .unwrap_or(FixtureValue { part_number: None, ts: DateTime::<Utc>::MIN_UTC })
        }
    }
}
