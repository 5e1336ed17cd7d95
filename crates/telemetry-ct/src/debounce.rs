//! Debounce (spec §4.5): a parts-set change only takes effect after it has
//! been observed stable for `DEBOUNCE_TICKS` consecutive ticks (default 1,
//! i.e. seen twice). Missing configuration bypasses debounce entirely.

use std::collections::HashMap;
use telemetry_model::StationId;

struct Pending {
    signature: Vec<String>,
    streak: u32,
}

#[derive(Default)]
pub struct Debouncer {
    pending: HashMap<StationId, Pending>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Some(parts)` once the given parts set is accepted as the
    /// current, debounced snapshot for this station; `None` while it is
    /// still settling.
    pub fn observe(&mut self, station_id: StationId, parts: Vec<String>, missing_config: bool, debounce_ticks: u32) -> Option<Vec<String>> {
        if missing_config {
            self.pending.remove(&station_id);
            return Some(parts);
        }
        let required = debounce_ticks + 1;
        let entry = self.pending.entry(station_id).or_insert_with(|| Pending { signature: Vec::new(), streak: 0 });
        if entry.signature == parts {
            entry.streak += 1;
        } else {
            entry.signature = parts.clone();
            entry.streak = 1;
        }
        if entry.streak >= required {
            Some(parts)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_debounce_requires_the_same_parts_twice() {
        let mut d = Debouncer::new();
        let parts = vec!["A".to_string()];
        assert_eq!(d.observe(StationId(1), parts.clone(), false, 1), None);
        assert_eq!(d.observe(StationId(1), parts.clone(), false, 1), Some(parts));
    }

    #[test]
    fn a_changing_signature_resets_the_streak() {
        let mut d = Debouncer::new();
        assert_eq!(d.observe(StationId(1), vec!["A".into()], false, 1), None);
        assert_eq!(d.observe(StationId(1), vec!["B".into()], false, 1), None);
        assert_eq!(d.observe(StationId(1), vec!["B".into()], false, 1), Some(vec!["B".into()]));
    }

    #[test]
    fn missing_config_bypasses_debounce() {
        let mut d = Debouncer::new();
        assert_eq!(d.observe(StationId(1), vec![], true, 1), Some(vec![]));
    }

    #[test]
    fn zero_debounce_ticks_requires_only_a_single_observation() {
        let mut d = Debouncer::new();
        assert_eq!(d.observe(StationId(1), vec!["A".into()], false, 0), Some(vec!["A".into()]));
    }
}
