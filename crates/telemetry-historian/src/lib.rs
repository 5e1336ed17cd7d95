//! Historian Adapter (spec §4.1): anchor lookup, reset-safe positive delta,
//! and first-increment pinpointing over an external time-series store.
//!
//! The historian itself is an external collaborator (spec §1/§6) — this
//! crate owns only the algorithms and the trait boundary. `MemoryHistorian`
//! is a fake used by tests and local runs; a real deployment would provide
//! its own `Historian` implementation against whatever tag-history system it
//! talks to.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

pub mod fake;

/// One `(timestamp, value)` observation. Values are `f64` because historian
/// tags may be floating point (e.g. `CycleTime`) even though counters are
/// logically integers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistorySample {
    pub ts: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Error)]
pub enum HistorianError {
    #[error("historian query for {path} failed: {message}")]
    QueryFailed { path: String, message: String },
}

/// Boundary to the external historian. `query_history` is the only I/O
/// primitive; `anchor`/`positive_delta`/`first_increment_after` below are
/// pure functions over its results so they can be unit tested without a
/// historian at all.
#[async_trait]
pub trait Historian: Send + Sync {
    async fn query_history(
        &self,
        path: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        include_bounding: bool,
    ) -> Result<Vec<HistorySample>, HistorianError>;
}

const ANCHOR_LOOKBACK: Duration = Duration::hours(48);

/// `anchor(path, at)` — last value at or before `at`, using inclusive
/// bounding over a 48h look-back. `None` means "no history anchor
/// available"; callers fall back to the live value (spec §4.1).
pub async fn anchor(
    historian: &dyn Historian,
    path: &str,
    at: DateTime<Utc>,
) -> Result<Option<f64>, HistorianError> {
    let samples = historian
        .query_history(path, at - ANCHOR_LOOKBACK, at, true)
        .await?;
    Ok(samples
        .into_iter()
        .filter(|s| s.ts <= at)
        .max_by_key(|s| s.ts)
        .map(|s| s.value))
}

/// `positiveDelta(path, start, end)` — reset-safe sum of increases over
/// `[start, end)` (spec §4.1, P2). Resets and dips are absorbed by
/// rebaselining `peak` rather than subtracted.
pub async fn positive_delta(
    historian: &dyn Historian,
    path: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<i64, HistorianError> {
    let samples = historian.query_history(path, start, end, false).await?;
    Ok(positive_delta_over(&samples))
}

/// Pure form of the reset-safe delta algorithm, exposed directly so P2 can
/// be tested without an async historian.
pub fn positive_delta_over(samples: &[HistorySample]) -> i64 {
    let mut iter = samples.iter();
    let Some(first) = iter.next() else { return 0 };
    let mut peak = first.value;
    let mut total = 0.0;
    for s in iter {
        if s.value > peak {
            total += s.value - peak;
            peak = s.value;
        }
        // v <= peak: reset or dip, absorbed silently.
    }
    total.round() as i64
}

/// `firstIncrementAfter(path, prevValue, start, end)` — timestamp of the
/// first sample strictly greater than `prevValue` within `[start, end)`, or
/// `None`. Used to pin CT-segment boundaries to an actual production event
/// (spec §4.1, §4.5).
pub async fn first_increment_after(
    historian: &dyn Historian,
    path: &str,
    prev_value: f64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, HistorianError> {
    let samples = historian.query_history(path, start, end, false).await?;
    Ok(samples
        .into_iter()
        .find(|s| s.value > prev_value)
        .map(|s| s.ts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::MemoryHistorian;
    use chrono::TimeZone;

    fn dt(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, h, m, s).unwrap()
    }

    #[test]
    fn positive_delta_over_matches_p2_literal_example() {
        let samples: Vec<HistorySample> = [10, 11, 12, 3, 4, 5, 13]
            .into_iter()
            .enumerate()
            .map(|(i, v)| HistorySample { ts: dt(8, i as u32, 0), value: v as f64 })
            .collect();
        assert_eq!(positive_delta_over(&samples), 13);
    }

    #[test]
    fn positive_delta_over_empty_is_zero() {
        assert_eq!(positive_delta_over(&[]), 0);
    }

    #[tokio::test]
    async fn anchor_ignores_samples_after_at() {
        let hist = MemoryHistorian::new();
        hist.seed("L1/ST10/TotalParts", [
            (dt(9, 0, 0), 100.0),
            (dt(10, 0, 0), 150.0),
            (dt(11, 0, 0), 200.0),
        ]);
        let at = dt(10, 30, 0);
        let value = anchor(&hist, "L1/ST10/TotalParts", at).await.unwrap();
        assert_eq!(value, Some(150.0));
    }

    #[tokio::test]
    async fn anchor_is_none_when_no_history_exists() {
        let hist = MemoryHistorian::new();
        let value = anchor(&hist, "L1/ST99/TotalParts", dt(10, 0, 0)).await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn first_increment_after_pinpoints_the_crossing_sample() {
        let hist = MemoryHistorian::new();
        hist.seed("L1/ST10/TotalParts", [
            (dt(10, 0, 0), 180.0),
            (dt(10, 5, 0), 180.0),
            (dt(10, 7, 0), 181.0),
        ]);
        let ts = first_increment_after(&hist, "L1/ST10/TotalParts", 180.0, dt(10, 0, 0), dt(11, 0, 0))
            .await
            .unwrap();
        assert_eq!(ts, Some(dt(10, 7, 0)));
    }
}
