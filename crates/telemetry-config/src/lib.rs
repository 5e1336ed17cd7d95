//! Config Cache and Break/Shift Index (spec §4.2, §4.3), plus the plant
//! configuration file (tuning constants + plant identity) loaded the way the
//! editor's own `core-config` loads `oxidized.toml`: discover a path, parse
//! it, and fall back to defaults rather than failing startup.

pub mod breakshift;
pub mod cache;
pub mod file;
pub mod station_cache;
pub mod tuning;

pub use breakshift::ShiftBreakIndex;
pub use file::{discover, load_from, PlantConfig};
pub use station_cache::{PartCtCache, StationCache};
pub use tuning::Tuning;
