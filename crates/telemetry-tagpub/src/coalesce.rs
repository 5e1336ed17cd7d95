//! Coalescing windows (spec §4.7): a group only fires once its last observed
//! change has sat quiet for its window — 150 ms for status snapshots, 75 ms
//! for node/cycle groups. Generalizes `telemetry_ct::debounce::Debouncer`'s
//! tick-count streak to wall-clock time, since this engine is reactive
//! rather than tick-driven.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;

pub struct Coalescer<K> {
    dirty_since: HashMap<K, DateTime<Utc>>,
}

impl<K> Default for Coalescer<K> {
    fn default() -> Self {
        Self { dirty_since: HashMap::new() }
    }
}

impl<K: Eq + Hash + Clone> Coalescer<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change to `key` observed at `now`. Repeated changes within
    /// the window keep pushing the quiet-period start forward.
    pub fn note_change(&mut self, key: K, now: DateTime<Utc>) {
        self.dirty_since.insert(key, now);
    }

    /// If `key` has been quiet for at least `window_ms` since its last
    /// recorded change, consumes the pending mark and fires. Keys with no
    /// pending change never fire.
    pub fn ready(&mut self, key: &K, now: DateTime<Utc>, window_ms: i64) -> bool {
        match self.dirty_since.get(key) {
            Some(&since) if now - since >= Duration::milliseconds(window_ms) => {
                self.dirty_since.remove(key);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn dt(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap() + Duration::milliseconds(ms)
    }

    #[test]
    fn not_ready_before_window_elapses() {
        let mut c: Coalescer<u32> = Coalescer::new();
        c.note_change(1, dt(0));
        assert!(!c.ready(&1, dt(100), 150));
    }

    #[test]
    fn ready_once_window_elapses() {
        let mut c: Coalescer<u32> = Coalescer::new();
        c.note_change(1, dt(0));
        assert!(c.ready(&1, dt(150), 150));
    }

    #[test]
    fn a_repeated_change_resets_the_quiet_window() {
        let mut c: Coalescer<u32> = Coalescer::new();
        c.note_change(1, dt(0));
        c.note_change(1, dt(100));
        assert!(!c.ready(&1, dt(150), 150));
        assert!(c.ready(&1, dt(250), 150));
    }

    #[test]
    fn firing_clears_the_pending_mark() {
        let mut c: Coalescer<u32> = Coalescer::new();
        c.note_change(1, dt(0));
        assert!(c.ready(&1, dt(150), 150));
        assert!(!c.ready(&1, dt(300), 150));
    }

    #[test]
    fn keys_without_a_pending_change_never_fire() {
        let mut c: Coalescer<u32> = Coalescer::new();
        assert!(!c.ready(&1, dt(1000), 150));
    }
}
