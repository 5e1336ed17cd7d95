//! In-memory `Historian` fake used by tests and local/dev runs.

use crate::{Historian, HistorianError, HistorySample};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryHistorian {
    series: Mutex<HashMap<String, Vec<HistorySample>>>,
}

impl MemoryHistorian {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the series for `path` with the given `(timestamp, value)`
    /// pairs, sorted by timestamp.
    pub fn seed<I: IntoIterator<Item = (DateTime<Utc>, f64)>>(&self, path: &str, samples: I) {
        let mut data: Vec<HistorySample> = samples.into_iter().map(|(ts, value)| HistorySample { ts, value }).collect();
        data.sort_by_key(|s| s.ts);
        self.series.lock().unwrap().insert(path.to_string(), data);
    }

    pub fn push(&self, path: &str, ts: DateTime<Utc>, value: f64) {
        let mut guard = self.series.lock().unwrap();
        let entry = guard.entry(path.to_string()).or_default();
        entry.push(HistorySample { ts, value });
        entry.sort_by_key(|s| s.ts);
    }
}

#[async_trait]
impl Historian for MemoryHistorian {
    async fn query_history(
        &self,
        path: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        include_bounding: bool,
    ) -> Result<Vec<HistorySample>, HistorianError> {
        let guard = self.series.lock().unwrap();
        let Some(series) = guard.get(path) else { return Ok(Vec::new()) };
        Ok(series
            .iter()
            .filter(|s| {
                if include_bounding {
                    s.ts >= start && s.ts <= end
                } else {
                    s.ts >= start && s.ts < end
                }
            })
            .copied()
            .collect())
    }
}
