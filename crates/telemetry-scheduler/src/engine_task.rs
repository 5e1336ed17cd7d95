use std::time::Duration;

/// One periodically-ticked engine (rollup, CT, overcycle, tagpub, ...).
///
/// Generalizes the teacher's `AsyncEventSource` (`core-events`): instead of
/// one source pushing `Event`s into a shared channel, each `EngineTask` owns
/// its own cadence and runs its own tick body directly, so a slow engine
/// never backs up another engine's channel.
#[async_trait::async_trait]
pub trait EngineTask: Send + 'static {
    /// Stable identifier used for logging (mirrors `AsyncEventSource::name`).
    fn name(&self) -> &'static str;

    /// How often this engine should tick.
    fn cadence(&self) -> Duration;

    /// Run one tick. Errors are the engine's own responsibility to log and
    /// swallow (§7: a failing station/line is skipped, not the whole tick);
    /// `tick` itself only returns `Err` for conditions the scheduler should
    /// know about (e.g. the engine considers itself unrecoverable).
    async fn tick(&mut self);
}
