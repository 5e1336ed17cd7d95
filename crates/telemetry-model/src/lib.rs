//! Shared data model for the production telemetry engine.
//!
//! These types are the nouns every other crate in the workspace operates on:
//! stations and the lines/breaks/shifts they belong to, the rollup rows the
//! Rollup Engine accumulates, the CT segments the CT Engine journals, and the
//! cumulative anchors the Overcycle Engine maintains. None of these types
//! perform I/O; they are plain data plus the small amount of arithmetic that
//! is an invariant of the shape itself (e.g. a shift window's duration).

pub mod live_state;
pub mod overcycle;
pub mod rollup;
pub mod shift;
pub mod station;
pub mod target;
pub mod value;

pub use live_state::StationLiveState;
pub use overcycle::{CtSegment, CtMode, CumulativeAnchor};
pub use rollup::{RollupKind, RollupRow};
pub use shift::{BreakSpan, ShiftWindow};
pub use station::{PartCtConfig, Station, StationId};
pub use target::BaseTargetRow;
pub use value::{and_reduce, TaggedValue, TriBool};
