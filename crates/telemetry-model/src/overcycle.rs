//! CT segments and cumulative overcycle anchors (spec §3).

use crate::station::StationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CtMode {
    LiveFixtures,
    FallbackConfig,
    MissingConfig,
}

/// A contiguous time range during which a station's effective CT is
/// constant. Segments for the same station never overlap and have strictly
/// increasing `effective_from_utc` (spec §5 ordering guarantee, P3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtSegment {
    pub station_id: StationId,
    pub effective_from_utc: DateTime<Utc>,
    pub ct_eff_sec: f64,
    pub fixtures_per_side: u8,
    pub is_turntable: bool,
    pub parallelism_factor: f64,
    /// JSON-encoded snapshot of the per-fixture part numbers/CTs that
    /// produced `ct_eff_sec`, kept for audit/replay.
    pub parts_json: String,
    pub ct_mode: CtMode,
    pub overcycle_multiplier: f64,
}

impl CtSegment {
    /// `(ct, mult)` bundle for overcycle classification (spec §4.6).
    pub fn ct_and_multiplier(&self) -> (f64, f64) {
        (self.ct_eff_sec, self.overcycle_multiplier)
    }
}

/// `ct_at(t)` — segment with the greatest `effective_from_utc <= t` (P3).
/// `segments` must already be sorted by `effective_from_utc` ascending.
pub fn segment_at(segments: &[CtSegment], t: DateTime<Utc>) -> Option<&CtSegment> {
    segments
        .iter()
        .rev()
        .find(|seg| seg.effective_from_utc <= t)
}

/// Per `(line, shift_id, shift_date, station_id)`, the latest cumulative
/// overcycle anchor. `as_of_local` is monotonically non-decreasing within a
/// shift (spec §3 invariant); the totals are sums over all published
/// deltas, never recomputed from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CumulativeAnchor {
    pub station_id: StationId,
    pub as_of_local: DateTime<Utc>,
    pub inc_over_cnt: u32,
    pub inc_over_sec: f64,
    pub inc_max_over_sec: f64,
    pub slot_duration_min: f64,
}
