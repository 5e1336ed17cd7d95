//! Live counter reads (spec §4.4 step 1: "read all station counters in one
//! batch"). A separate boundary from the `Historian` (which answers
//! questions about the past): this one answers "what is `TotalParts` right
//! now, and is the reading good quality".

use async_trait::async_trait;
use std::collections::HashMap;
use telemetry_model::StationId;

#[derive(Debug, Clone, Copy)]
pub struct CounterReading {
    pub value: i64,
    pub quality_ok: bool,
}

#[async_trait]
pub trait CounterSource: Send + Sync {
    async fn read_counters(&self, station_ids: &[StationId]) -> HashMap<StationId, CounterReading>;
}

/// In-memory `CounterSource` fake used by tests and local/dev runs.
pub mod fake {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MemoryCounterSource {
        values: Mutex<HashMap<StationId, CounterReading>>,
    }

    impl MemoryCounterSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set(&self, station_id: StationId, value: i64, quality_ok: bool) {
            self.values.lock().unwrap().insert(station_id, CounterReading { value, quality_ok });
        }
    }

    #[async_trait]
    impl CounterSource for MemoryCounterSource {
        async fn read_counters(&self, station_ids: &[StationId]) -> HashMap<StationId, CounterReading> {
            let guard = self.values.lock().unwrap();
            station_ids.iter().filter_map(|id| guard.get(id).map(|r| (*id, *r))).collect()
        }
    }
}
