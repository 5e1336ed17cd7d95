//! Tuning constants (spec §6 "Configuration") with TOML overrides.

use serde::Deserialize;

/// Defaults from the spec's Configuration section. All are overridable via
/// `[tuning]` in the plant config file; unset fields keep these defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tuning {
    pub window_min: i64,
    pub max_top: usize,
    pub final_grace_min: i64,
    pub shift_refresh_sec: u64,
    pub breaks_refresh_sec: u64,
    pub station_cache_sec: u64,
    pub write_idle_sec: u64,
    pub debounce_ticks: u32,
    pub status_coalesce_ms: u64,
    pub node_coalesce_ms: u64,
    pub hourly_publish_lookback_hrs: i64,
    pub hourly_catchup_closed_hrs: i64,
    pub week_start_dow: u8,
    /// Effective shift-cache TTL. The source config module assigned this
    /// twice — once to 60, immediately overwritten with 8 — so the value
    /// that actually took effect at runtime was 8, not 60. Kept as the
    /// effective default here; see DESIGN.md.
    pub shift_cache_sec: u64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            window_min: 15,
            max_top: 5,
            final_grace_min: 18 * 60,
            shift_refresh_sec: 60,
            breaks_refresh_sec: 120,
            station_cache_sec: 300,
            write_idle_sec: 30,
            debounce_ticks: 1,
            status_coalesce_ms: 150,
            node_coalesce_ms: 75,
            hourly_publish_lookback_hrs: 6,
            hourly_catchup_closed_hrs: 48,
            week_start_dow: 1,
            shift_cache_sec: 8,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct TuningFile {
    pub window_min: Option<i64>,
    pub max_top: Option<usize>,
    pub final_grace_min: Option<i64>,
    pub shift_refresh_sec: Option<u64>,
    pub breaks_refresh_sec: Option<u64>,
    pub station_cache_sec: Option<u64>,
    pub write_idle_sec: Option<u64>,
    pub debounce_ticks: Option<u32>,
    pub status_coalesce_ms: Option<u64>,
    pub node_coalesce_ms: Option<u64>,
    pub hourly_publish_lookback_hrs: Option<i64>,
    pub hourly_catchup_closed_hrs: Option<i64>,
    pub week_start_dow: Option<u8>,
    pub shift_cache_sec: Option<u64>,
}

impl Tuning {
    pub fn from_file(file: TuningFile) -> Self {
        let default = Self::default();
        Self {
            window_min: file.window_min.unwrap_or(default.window_min),
            max_top: file.max_top.unwrap_or(default.max_top),
            final_grace_min: file.final_grace_min.unwrap_or(default.final_grace_min),
            shift_refresh_sec: file.shift_refresh_sec.unwrap_or(default.shift_refresh_sec),
            breaks_refresh_sec: file.breaks_refresh_sec.unwrap_or(default.breaks_refresh_sec),
            station_cache_sec: file.station_cache_sec.unwrap_or(default.station_cache_sec),
            write_idle_sec: file.write_idle_sec.unwrap_or(default.write_idle_sec),
            debounce_ticks: file.debounce_ticks.unwrap_or(default.debounce_ticks),
            status_coalesce_ms: file.status_coalesce_ms.unwrap_or(default.status_coalesce_ms),
            node_coalesce_ms: file.node_coalesce_ms.unwrap_or(default.node_coalesce_ms),
            hourly_publish_lookback_hrs: file.hourly_publish_lookback_hrs.unwrap_or(default.hourly_publish_lookback_hrs),
            hourly_catchup_closed_hrs: file.hourly_catchup_closed_hrs.unwrap_or(default.hourly_catchup_closed_hrs),
            week_start_dow: file.week_start_dow.unwrap_or(default.week_start_dow),
            shift_cache_sec: file.shift_cache_sec.unwrap_or(default.shift_cache_sec),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let t = Tuning::default();
        assert_eq!(t.window_min, 15);
        assert_eq!(t.max_top, 5);
        assert_eq!(t.final_grace_min, 1080);
        assert_eq!(t.shift_cache_sec, 8);
    }

    #[test]
    fn file_overrides_only_set_fields() {
        let file = TuningFile { max_top: Some(10), ..Default::default() };
        let t = Tuning::from_file(file);
        assert_eq!(t.max_top, 10);
        assert_eq!(t.window_min, 15);
    }
}
