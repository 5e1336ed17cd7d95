//! Effective CT and overcycle-multiplier blend (spec §4.5 "Effective CT").

/// `k=0 => 0.0`, `k=1 => c_1`, `k>=2 => (1-λ)·mean(c) + λ·(max(c)/k)`.
/// λ=0 assumes fully sequential fixtures (arithmetic mean); λ=1 assumes full
/// parallelism of the slowest fixture.
pub fn effective_ct(cts: &[f64], lambda: f64) -> f64 {
    match cts.len() {
        0 => 0.0,
        1 => cts[0],
        k => {
            let mean = cts.iter().sum::<f64>() / k as f64;
            let max = cts.iter().cloned().fold(f64::MIN, f64::max);
            (1.0 - lambda) * mean + lambda * (max / k as f64)
        }
    }
}

/// Same blend, but with `min` in place of `max` (spec §4.5 "Multiplier
/// blend uses the same λ but blends mean with min, not max"). No parts
/// present leaves the multiplier at `1.0`; it is unused when `ct_eff=0`.
pub fn effective_multiplier(mults: &[f64], lambda: f64) -> f64 {
    match mults.len() {
        0 => 1.0,
        1 => mults[0],
        k => {
            let mean = mults.iter().sum::<f64>() / k as f64;
            let min = mults.iter().cloned().fold(f64::MAX, f64::min);
            (1.0 - lambda) * mean + lambda * (min / k as f64)
        }
    }
}
