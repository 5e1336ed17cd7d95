//! Station identity and per-part cycle-time configuration (spec §3).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Newtype over the station's natural key so station ids can't be confused
/// with line ids or raw integers at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StationId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineId(pub u32);

/// A single production station. `(area, subarea, line, station)` is the
/// filesystem-style path used to locate the station's historian tags; it is
/// precomputed once by the config cache rather than rebuilt on every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub station_id: StationId,
    pub line_id: LineId,
    pub area: String,
    pub subarea: String,
    pub line: String,
    pub station: String,
    pub is_turntable: bool,
    /// 1..=8, validated by the config cache on load.
    pub fixtures_per_side: u8,
    pub is_critical: bool,
    /// 0.0 = fully sequential fixtures, 1.0 = fully parallel.
    pub parallelism_factor: f64,
    /// Precomputed historian tag path, or `None` when the tag is missing.
    /// A missing tag does not drop the station: it still seeds dense zero
    /// rows (spec §4.2).
    pub tag_path: Option<String>,
}

impl Station {
    /// The `area/subarea/line/station` path used as the historian tag root,
    /// independent of whether a concrete tag was resolved for it.
    pub fn path(&self) -> String {
        format!("{}/{}/{}/{}", self.area, self.subarea, self.line, self.station)
    }
}

/// Per-part cycle time and overcycle multiplier for one station.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartCt {
    pub cycle_time_sec: f64,
    pub overcycle_multiplier: f64,
}

impl PartCt {
    pub fn new(cycle_time_sec: f64, overcycle_multiplier: f64) -> Option<Self> {
        if cycle_time_sec > 0.0 && overcycle_multiplier > 0.0 {
            Some(Self { cycle_time_sec, overcycle_multiplier })
        } else {
            None
        }
    }
}

/// `station_id -> (part_number -> PartCt)`, the shape `telemetry-config`
/// hands out from `partCT(station_id)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartCtConfig {
    pub by_part: HashMap<String, PartCt>,
}

impl PartCtConfig {
    pub fn get(&self, part_number: &str) -> Option<PartCt> {
        self.by_part.get(part_number).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn station_path_joins_hierarchy() {
        let st = Station {
            station_id: StationId(1),
            line_id: LineId(1),
            area: "BodyShop".into(),
            subarea: "Underbody".into(),
            line: "L1".into(),
            station: "ST10".into(),
            is_turntable: false,
            fixtures_per_side: 1,
            is_critical: true,
            parallelism_factor: 0.0,
            tag_path: None,
        };
        assert_eq!(st.path(), "BodyShop/Underbody/L1/ST10");
    }

    #[test]
    fn part_ct_rejects_non_positive() {
        assert!(PartCt::new(0.0, 2.0).is_none());
        assert!(PartCt::new(30.0, 0.0).is_none());
        assert!(PartCt::new(30.0, 2.0).is_some());
    }
}
