//! Production Rollup Engine (spec §4.4): incremental, reset-safe
//! accumulation of monotonic counters anchored to historian snapshots, dense
//! daily bootstrap, and late-arrival reconciliation of just-ended shifts.

pub mod backfill;
pub mod bootstrap;
pub mod engine;
pub mod reader;

pub use backfill::backfill_day_dense;
pub use engine::{RollupEngine, RollupTickOutcome};
pub use reader::{CounterReading, CounterSource};
