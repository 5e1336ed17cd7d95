//! Overcycle Detection & Publish Engine (spec §4.6): classification of
//! `CycleTime` samples against CT segments, per-station cumulative anchors,
//! and per-line top-N leaderboards published through the broker.

pub mod classify;
pub mod engine;
pub mod leaderboard;

pub use classify::{classify_window, WindowStats};
pub use engine::{OvercycleEngine, OvercycleTickOutcome};
pub use leaderboard::{aggregate_totals, top_times, top_totals, StationTotals};
