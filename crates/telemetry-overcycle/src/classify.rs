//! Overcycle classification over a `CycleTime` history window (spec §4.6
//! steps 2-4, P8): `ct < act ≤ ct · mult`.

use telemetry_historian::HistorySample;
use telemetry_model::overcycle::segment_at;
use telemetry_model::CtSegment;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowStats {
    pub cnt: u32,
    pub sum_over: f64,
    pub max_over: f64,
}

/// `segments` must be sorted ascending by `effective_from_utc` (P3); samples
/// with no applicable segment, or `ct ≤ 0` (no config), are skipped.
pub fn classify_window(segments: &[CtSegment], samples: &[HistorySample]) -> WindowStats {
    let mut stats = WindowStats::default();
    for sample in samples {
        let Some(segment) = segment_at(segments, sample.ts) else { continue };
        let (ct, mult) = segment.ct_and_multiplier();
        if ct <= 0.0 {
            continue;
        }
        let act = sample.value;
        if act <= ct || act > ct * mult {
            continue;
        }
        let over = act - ct;
        stats.cnt += 1;
        stats.sum_over += over;
        if over > stats.max_over {
            stats.max_over = over;
        }
    }
    stats
}
