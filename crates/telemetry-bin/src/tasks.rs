//! `EngineTask` wrappers: each holds the shared read-side caches plus the
//! adapters one engine needs, and drives that engine's own `tick`. Every
//! engine already persists and publishes its own outcome (spec §4.4-§4.7),
//! so a wrapper's job ends at calling `tick` and logging what came back.

use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use telemetry_broker::{Broker, ServerCache, ServerDirectory};
use telemetry_config::{PartCtCache, ShiftBreakIndex, StationCache, Tuning};
use telemetry_ct::{CtEngine, FixtureSource};
use telemetry_historian::Historian;
use telemetry_model::StationId;
use telemetry_overcycle::OvercycleEngine;
use telemetry_rollup::{CounterSource, RollupEngine};
use telemetry_scheduler::EngineTask;
use telemetry_store::Store;
use telemetry_tagpub::{GroupConfig, TagPublishEngine, TagSource};
use tokio::sync::Mutex as AsyncMutex;
use tracing::info;

pub struct RollupTask {
    pub engine: RollupEngine,
    pub station_cache: Arc<StationCache>,
    pub counters: Arc<dyn CounterSource>,
    pub historian: Arc<dyn Historian>,
    pub store: Arc<dyn Store>,
    pub shifts: Arc<ShiftBreakIndex>,
    pub tuning: Arc<Tuning>,
    pub tz: Tz,
}

#[async_trait]
impl EngineTask for RollupTask {
    fn name(&self) -> &'static str {
        "rollup"
    }

    fn cadence(&self) -> Duration {
        Duration::from_secs(5)
    }

    async fn tick(&mut self) {
        let outcome = self
            .engine
            .tick(
                Utc::now(),
                &self.station_cache,
                self.counters.as_ref(),
                self.historian.as_ref(),
                self.store.as_ref(),
                &self.shifts,
                &self.tuning,
                self.tz,
            )
            .await;
        if !outcome.is_empty() {
            info!(
                target: "telemetryd",
                hourly = outcome.hourly.len(),
                shift = outcome.shift.len(),
                weekly = outcome.weekly.len(),
                "rollup_tick"
            );
        }
    }
}

pub struct CtTask {
    pub engine: Arc<AsyncMutex<CtEngine>>,
    pub station_cache: Arc<StationCache>,
    pub part_ct_cache: Arc<PartCtCache>,
    pub fixtures: Arc<dyn FixtureSource>,
    pub counters: Arc<dyn CounterSource>,
    pub historian: Arc<dyn Historian>,
    pub store: Arc<dyn Store>,
    pub shifts: Arc<ShiftBreakIndex>,
    pub tuning: Arc<Tuning>,
}

#[async_trait]
impl EngineTask for CtTask {
    fn name(&self) -> &'static str {
        "ct"
    }

    fn cadence(&self) -> Duration {
        Duration::from_secs(5)
    }

    async fn tick(&mut self) {
        let mut engine = self.engine.lock().await;
        let outcome = engine
            .tick(
                Utc::now(),
                &self.station_cache,
                &self.part_ct_cache,
                self.fixtures.as_ref(),
                self.counters.as_ref(),
                self.historian.as_ref(),
                self.store.as_ref(),
                &self.shifts,
                &self.tuning,
            )
            .await;
        if !outcome.segments.is_empty() || !outcome.hourly_targets.is_empty() || !outcome.shift_targets.is_empty() {
            info!(
                target: "telemetryd",
                segments = outcome.segments.len(),
                hourly_targets = outcome.hourly_targets.len(),
                shift_targets = outcome.shift_targets.len(),
                "ct_tick"
            );
        }
    }
}

pub struct OvercycleTask {
    pub engine: OvercycleEngine,
    pub station_cache: Arc<StationCache>,
    pub shifts: Arc<ShiftBreakIndex>,
    pub historian: Arc<dyn Historian>,
    pub store: Arc<dyn Store>,
    pub broker: Arc<dyn Broker>,
    pub server_cache: Arc<ServerCache>,
    pub server_directory: Arc<dyn ServerDirectory>,
    pub tuning: Arc<Tuning>,
}

#[async_trait]
impl EngineTask for OvercycleTask {
    fn name(&self) -> &'static str {
        "overcycle"
    }

    fn cadence(&self) -> Duration {
        Duration::from_secs(20)
    }

    async fn tick(&mut self) {
        let stations = self.station_cache.stations(self.store.as_ref()).await;
        let outcome = self
            .engine
            .tick(
                Utc::now(),
                stations.as_slice(),
                &self.shifts,
                self.historian.as_ref(),
                self.store.as_ref(),
                self.broker.as_ref(),
                &self.server_cache,
                self.server_directory.as_ref(),
                self.tuning.final_grace_min,
                self.tuning.max_top,
            )
            .await;
        if outcome.anchors_written > 0 || outcome.lines_published > 0 {
            info!(
                target: "telemetryd",
                anchors_written = outcome.anchors_written,
                lines_published = outcome.lines_published,
                "overcycle_tick"
            );
        }
    }
}

pub struct TagPublishTask {
    pub engine: TagPublishEngine,
    pub station_cache: Arc<StationCache>,
    pub node_groups: Vec<GroupConfig>,
    pub cycle_groups: Vec<GroupConfig>,
    pub source: Arc<dyn TagSource>,
    pub store: Arc<dyn Store>,
    pub broker: Arc<dyn Broker>,
    pub server_cache: Arc<ServerCache>,
    pub server_directory: Arc<dyn ServerDirectory>,
}

#[async_trait]
impl EngineTask for TagPublishTask {
    fn name(&self) -> &'static str {
        "tagpub"
    }

    /// Well under both coalescing windows (§4.7, 150ms status / 75ms group)
    /// so dirty marks are serviced promptly once a live `TagSource` starts
    /// calling `notify_station_dirty`/`notify_group_dirty`.
    fn cadence(&self) -> Duration {
        Duration::from_millis(25)
    }

    async fn tick(&mut self) {
        let stations = self.station_cache.stations(self.store.as_ref()).await;
        let outcome = self
            .engine
            .tick(
                Utc::now(),
                stations.as_slice(),
                &self.node_groups,
                &self.cycle_groups,
                self.source.as_ref(),
                self.store.as_ref(),
                self.broker.as_ref(),
                &self.server_cache,
                self.server_directory.as_ref(),
            )
            .await;
        if outcome.status_published > 0 || outcome.groups_published > 0 {
            info!(
                target: "telemetryd",
                status_published = outcome.status_published,
                groups_published = outcome.groups_published,
                "tagpub_tick"
            );
        }
    }
}

pub struct ShiftRefreshTask {
    pub store: Arc<dyn Store>,
    pub shifts: Arc<ShiftBreakIndex>,
    pub tz: Tz,
}

#[async_trait]
impl EngineTask for ShiftRefreshTask {
    fn name(&self) -> &'static str {
        "shift_refresh"
    }

    fn cadence(&self) -> Duration {
        Duration::from_secs(60)
    }

    async fn tick(&mut self) {
        let today = telemetry_clock::local_date(Utc::now(), self.tz);
        self.shifts.refresh_shifts(self.store.as_ref(), today).await;
    }
}

pub struct BreakRefreshTask {
    pub store: Arc<dyn Store>,
    pub shifts: Arc<ShiftBreakIndex>,
    pub tz: Tz,
}

#[async_trait]
impl EngineTask for BreakRefreshTask {
    fn name(&self) -> &'static str {
        "break_refresh"
    }

    fn cadence(&self) -> Duration {
        Duration::from_secs(120)
    }

    async fn tick(&mut self) {
        let today = telemetry_clock::local_date(Utc::now(), self.tz);
        self.shifts.refresh_breaks(self.store.as_ref(), today).await;
    }
}

/// Recomputes base targets left blank by a CT engine that hadn't yet
/// resolved an effective CT at write time (§4.5 "Repair pass").
pub struct RepairTask {
    pub store: Arc<dyn Store>,
    pub shifts: Arc<ShiftBreakIndex>,
    pub station_cache: Arc<StationCache>,
    pub ct_engine: Arc<AsyncMutex<CtEngine>>,
    pub lookback_hours: i64,
    pub lookback_days: i64,
}

#[async_trait]
impl EngineTask for RepairTask {
    fn name(&self) -> &'static str {
        "repair"
    }

    fn cadence(&self) -> Duration {
        Duration::from_secs(120)
    }

    async fn tick(&mut self) {
        let now = Utc::now();
        let stations = self.station_cache.stations(self.store.as_ref()).await;
        let line_of: HashMap<StationId, telemetry_model::station::LineId> =
            stations.iter().map(|s| (s.station_id, s.line_id)).collect();

        let ct = self.ct_engine.lock().await;
        let hourly = telemetry_ct::targets::repair_hourly_targets(self.store.as_ref(), &self.shifts, now, self.lookback_hours, |row| {
            ct.active_ct_eff(row.station_id)
        })
        .await;
        let shift = telemetry_ct::targets::repair_shift_targets(
            self.store.as_ref(),
            &self.shifts,
            now,
            self.lookback_days,
            |station_id| line_of.get(&station_id).copied(),
            |row| ct.active_ct_eff(row.station_id),
        )
        .await;
        drop(ct);

        if !hourly.is_empty() {
            let _ = self.store.upsert_hourly_targets_batch(hourly.clone()).await;
        }
        if !shift.is_empty() {
            let _ = self.store.upsert_shift_targets_batch(shift.clone()).await;
        }
        if !hourly.is_empty() || !shift.is_empty() {
            info!(target: "telemetryd", hourly_repaired = hourly.len(), shift_repaired = shift.len(), "repair_tick");
        }
    }
}
