//! Tag-Change Publisher (spec §4.7): status-snapshot, node-group, and
//! cycle-group fan-out under their respective coalescing windows.

pub mod coalesce;
pub mod engine;
pub mod group;
pub mod status;
pub mod tag;

pub use coalesce::Coalescer;
pub use engine::{TagPublishEngine, TagPublishTickOutcome, GROUP_COALESCE_MS, STATUS_COALESCE_MS};
pub use group::{cycle_group_value, node_group_value, GroupConfig};
pub use status::compose_status;
pub use tag::{TagReading, TagSource};
