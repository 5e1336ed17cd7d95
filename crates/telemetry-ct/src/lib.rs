//! CT & Target Engine (spec §4.5): parts snapshot, effective-CT blend,
//! debounce, CT segment journal, and break-aware base targets.

pub mod blend;
pub mod debounce;
pub mod engine;
pub mod fixtures;
pub mod segments;
pub mod targets;

pub use blend::{effective_ct, effective_multiplier};
pub use engine::{CtEngine, CtTickOutcome};
pub use fixtures::{snapshot_parts, FixtureSource, FixtureValue};
