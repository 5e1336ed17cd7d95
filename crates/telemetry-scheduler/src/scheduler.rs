use crate::engine_task::EngineTask;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Default per-tick budget an engine is given before it is skipped rather
/// than allowed to stall its own cadence (§5 "Cancellation & timeouts").
pub const DEFAULT_TICK_TIMEOUT: Duration = Duration::from_secs(20);

/// Registry of `EngineTask`s, generalizing `core-events`'s
/// `EventSourceRegistry`: instead of one shared channel fed by many sources,
/// each engine gets its own `tokio::task` and its own `tokio::time::interval`.
pub struct Scheduler {
    tasks: Vec<(Box<dyn EngineTask>, Duration)>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Register an engine, spawned with its own `tick_timeout` (defaults to
    /// `DEFAULT_TICK_TIMEOUT` via `register`).
    pub fn register_with_timeout<T: EngineTask>(&mut self, task: T, tick_timeout: Duration) {
        self.tasks.push((Box::new(task), tick_timeout));
    }

    pub fn register<T: EngineTask>(&mut self, task: T) {
        self.register_with_timeout(task, DEFAULT_TICK_TIMEOUT);
    }

    /// Spawn one `tokio::task` per registered engine, returning their
    /// `JoinHandle`s. Each task runs `tokio::time::interval(cadence)` with
    /// `MissedTickBehavior::Delay`: a tick that overruns its cadence still
    /// completes, but the next tick is coalesced into a single catch-up tick
    /// rather than queued as a burst (§5 "Suspension points").
    pub fn spawn_all(&mut self, tick_timeout_override: Option<Duration>) -> Vec<JoinHandle<()>> {
        let mut out = Vec::with_capacity(self.tasks.len());
        for (mut task, tick_timeout) in self.tasks.drain(..) {
            let name = task.name();
            let cadence = task.cadence();
            let timeout = tick_timeout_override.unwrap_or(tick_timeout);
            tracing::info!(target: "scheduler", engine = name, cadence_ms = cadence.as_millis() as u64, "spawning engine task");
            out.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(cadence);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    interval.tick().await;
                    match tokio::time::timeout(timeout, task.tick()).await {
                        Ok(()) => {}
                        Err(_) => {
                            tracing::warn!(target: "scheduler", engine = name, timeout_ms = timeout.as_millis() as u64, "engine tick timed out, skipping");
                        }
                    }
                }
            }));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    struct CountingTask {
        count: Arc<AtomicUsize>,
        notify: Arc<Notify>,
        cadence: Duration,
    }

    #[async_trait::async_trait]
    impl EngineTask for CountingTask {
        fn name(&self) -> &'static str {
            "counting"
        }
        fn cadence(&self) -> Duration {
            self.cadence
        }
        async fn tick(&mut self) {
            self.count.fetch_add(1, Ordering::SeqCst);
            self.notify.notify_one();
        }
    }

    struct StuckTask {
        ticked: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl EngineTask for StuckTask {
        fn name(&self) -> &'static str {
            "stuck"
        }
        fn cadence(&self) -> Duration {
            Duration::from_millis(10)
        }
        async fn tick(&mut self) {
            self.ticked.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
    }

    #[tokio::test]
    async fn a_registered_engine_ticks_repeatedly_on_its_cadence() {
        let count = Arc::new(AtomicUsize::new(0));
        let notify = Arc::new(Notify::new());
        let mut sched = Scheduler::new();
        sched.register(CountingTask {
            count: count.clone(),
            notify: notify.clone(),
            cadence: Duration::from_millis(5),
        });
        let handles = sched.spawn_all(None);

        for _ in 0..3 {
            tokio::time::timeout(Duration::from_secs(1), notify.notified())
                .await
                .expect("expected ticks to keep arriving");
        }
        assert!(count.load(Ordering::SeqCst) >= 3);

        for h in handles {
            h.abort();
        }
    }

    #[tokio::test]
    async fn a_slow_tick_is_skipped_by_its_timeout_instead_of_stalling_forever() {
        let ticked = Arc::new(AtomicUsize::new(0));
        let mut sched = Scheduler::new();
        sched.register_with_timeout(
            StuckTask { ticked: ticked.clone() },
            Duration::from_millis(20),
        );
        let handles = sched.spawn_all(None);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(
            ticked.load(Ordering::SeqCst) >= 1,
            "tick should have started at least once before timing out"
        );

        for h in handles {
            h.abort();
        }
    }
}
