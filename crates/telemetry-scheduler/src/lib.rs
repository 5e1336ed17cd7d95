//! Scheduler (spec §5/§9 "Coroutine / timer model → explicit scheduler"):
//! one independent `tokio::task` per registered engine cadence, generalizing
//! the teacher's single-channel `AsyncEventSource` (`core-events`) to many
//! independently-ticked engines with per-tick timeouts.

pub mod engine_task;
pub mod scheduler;

pub use engine_task::EngineTask;
pub use scheduler::{Scheduler, DEFAULT_TICK_TIMEOUT};
