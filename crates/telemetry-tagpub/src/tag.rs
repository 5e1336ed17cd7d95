//! Live tag read boundary (spec §4.7): a single `(path) -> reading` read,
//! distinct from `telemetry_ct::FixtureSource` and `telemetry_rollup::CounterSource`
//! since the Tag-Change Publisher reads arbitrary status/node/cycle tags,
//! not just counters or fixture slots.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use telemetry_model::TaggedValue;

/// One tag read, carrying the quality bits the publish-log row needs
/// (spec §4.7 "quality_ok, quality").
#[derive(Debug, Clone)]
pub struct TagReading {
    pub value: Option<TaggedValue>,
    pub quality_ok: bool,
    pub quality: String,
    pub ts: DateTime<Utc>,
}

impl TagReading {
    pub fn good(value: TaggedValue, ts: DateTime<Utc>) -> Self {
        Self { value: Some(value), quality_ok: true, quality: "Good".to_string(), ts }
    }

    pub fn bad(quality: impl Into<String>, ts: DateTime<Utc>) -> Self {
        Self { value: None, quality_ok: false, quality: quality.into(), ts }
    }
}

#[async_trait]
pub trait TagSource: Send + Sync {
    async fn read_tag(&self, path: &str) -> TagReading;
}

pub mod fake {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MemoryTagSource {
        values: Mutex<HashMap<String, TagReading>>,
    }

    impl MemoryTagSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set(&self, path: impl Into<String>, reading: TagReading) {
            self.values.lock().unwrap().insert(path.into(), reading);
        }
    }

    #[async_trait]
    impl TagSource for MemoryTagSource {
        async fn read_tag(&self, path: &str) -> TagReading {
            self.values
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .unwrap_or_else(|| TagReading::bad("NotFound", DateTime::<Utc>::MIN_UTC))
        }
    }
}
