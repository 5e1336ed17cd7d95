//! Tag-Change Publisher (spec §4.7): status-snapshot, node-group, and
//! cycle-group publishing under two coalescing windows, each logging a typed
//! row to the durable store.

use crate::coalesce::Coalescer;
use crate::group::{cycle_group_value, latest_ts, node_group_value, read_group, GroupConfig};
use crate::status::compose_status;
use crate::tag::TagSource;
use chrono::{DateTime, Utc};
use telemetry_broker::payload::{cycle_group_envelope, node_group_envelope};
use telemetry_broker::{Broker, ServerCache, ServerDirectory};
use telemetry_model::{Station, StationId};
use telemetry_store::{PublishLogRow, Store};

pub const STATUS_COALESCE_MS: i64 = 150;
pub const GROUP_COALESCE_MS: i64 = 75;

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct TagPublishTickOutcome {
    pub status_published: usize,
    pub groups_published: usize,
}

#[derive(Default)]
pub struct TagPublishEngine {
    status_coalescer: Coalescer<StationId>,
    group_coalescer: Coalescer<i64>,
}

impl TagPublishEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a station's status subtree dirty; call this whenever a counter
    /// or fixture read under that station changes.
    pub fn notify_station_dirty(&mut self, station_id: StationId, now: DateTime<Utc>) {
        self.status_coalescer.note_change(station_id, now);
    }

    /// Marks a node/cycle group dirty; call this whenever one of its member
    /// tags changes.
    pub fn notify_group_dirty(&mut self, config_id: i64, now: DateTime<Utc>) {
        self.group_coalescer.note_change(config_id, now);
    }

    /// Runs the status, node-group, and cycle-group passes for this tick.
    /// `node_groups`/`cycle_groups` are disjoint config sets sharing one
    /// `config_id` namespace, so each has its own `Coalescer` entry.
    #[allow(clippy::too_many_arguments)]
    pub async fn tick(
        &mut self,
        now: DateTime<Utc>,
        stations: &[Station],
        node_groups: &[GroupConfig],
        cycle_groups: &[GroupConfig],
        source: &dyn TagSource,
        store: &dyn Store,
        broker: &dyn Broker,
        server_cache: &ServerCache,
        server_directory: &dyn ServerDirectory,
    ) -> TagPublishTickOutcome {
        let status_published = self.tick_status(now, stations, source, store, broker, server_cache, server_directory).await;
        let node_published = self.tick_node_groups(now, node_groups, source, store, broker, server_cache, server_directory).await;
        let cycle_published = self.tick_cycle_groups(now, cycle_groups, source, store, broker, server_cache, server_directory).await;
        TagPublishTickOutcome { status_published, groups_published: node_published + cycle_published }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn tick_status(
        &mut self,
        now: DateTime<Utc>,
        stations: &[Station],
        source: &dyn TagSource,
        store: &dyn Store,
        broker: &dyn Broker,
        server_cache: &ServerCache,
        server_directory: &dyn ServerDirectory,
    ) -> usize {
        let mut fired = 0;
        for station in stations {
            if !self.status_coalescer.ready(&station.station_id, now, STATUS_COALESCE_MS) {
                continue;
            }
            let hierarchy = store
                .get_hierarchy_for_stations(&[station.station_id])
                .await
                .ok()
                .map(|o| o.into_rows())
                .and_then(|rows| rows.into_iter().next())
                .map(|(_, h)| h);
            let Some(hierarchy) = hierarchy else { continue };

            let payload = compose_status(station, now, source).await;
            let topic = telemetry_broker::topic_for(&hierarchy, "Status");
            let server = server_cache.resolve(server_directory).await;
            if let Ok(bytes) = serde_json::to_vec(&payload) {
                let _ = broker.publish(&server, &topic, bytes, 0, true).await;
            }
            fired += 1;
        }
        fired
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn tick_node_groups(
        &mut self,
        now: DateTime<Utc>,
        groups: &[GroupConfig],
        source: &dyn TagSource,
        store: &dyn Store,
        broker: &dyn Broker,
        server_cache: &ServerCache,
        server_directory: &dyn ServerDirectory,
    ) -> usize {
        let mut fired = 0;
        for cfg in groups {
            if !self.group_coalescer.ready(&cfg.config_id, now, GROUP_COALESCE_MS) {
                continue;
            }
            let readings = read_group(cfg, source).await;
            let value = node_group_value(&readings);
            let src_ts = latest_ts(&readings);

            let Some(hierarchy) = resolve_hierarchy(store, cfg.station_id).await else { continue };
            let topic = telemetry_broker::topic_for(&hierarchy, &cfg.scope_slug);
            let envelope = node_group_envelope(now, value);
            let server = server_cache.resolve(server_directory).await;
            if let Ok(bytes) = serde_json::to_vec(&envelope) {
                let _ = broker.publish(&server, &topic, bytes, cfg.qos, cfg.retain).await;
            }

            let row = PublishLogRow {
                config_id: cfg.config_id,
                topic_id: cfg.topic_id.clone(),
                qos: cfg.qos,
                retain: cfg.retain,
                value_type: "bool",
                value_num: None,
                value_text: None,
                value_bool: match value {
                    telemetry_model::TriBool::True => Some(true),
                    telemetry_model::TriBool::False => Some(false),
                    telemetry_model::TriBool::Unknown => None,
                },
                quality_ok: !matches!(value, telemetry_model::TriBool::Unknown),
                quality: if matches!(value, telemetry_model::TriBool::Unknown) { "Unknown".to_string() } else { "Good".to_string() },
                src_ts,
            };
            let _ = store.insert_publish_log_batch(vec![row]).await;
            fired += 1;
        }
        fired
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn tick_cycle_groups(
        &mut self,
        now: DateTime<Utc>,
        groups: &[GroupConfig],
        source: &dyn TagSource,
        store: &dyn Store,
        broker: &dyn Broker,
        server_cache: &ServerCache,
        server_directory: &dyn ServerDirectory,
    ) -> usize {
        let mut fired = 0;
        for cfg in groups {
            if !self.group_coalescer.ready(&cfg.config_id, now, GROUP_COALESCE_MS) {
                continue;
            }
            let readings = read_group(cfg, source).await;
            let value = cycle_group_value(&readings);
            let src_ts = latest_ts(&readings);

            let Some(hierarchy) = resolve_hierarchy(store, cfg.station_id).await else { continue };
            let topic = telemetry_broker::topic_for(&hierarchy, &cfg.scope_slug);
            let envelope = cycle_group_envelope(now, value);
            let server = server_cache.resolve(server_directory).await;
            if let Ok(bytes) = serde_json::to_vec(&envelope) {
                let _ = broker.publish(&server, &topic, bytes, cfg.qos, cfg.retain).await;
            }

            let row = PublishLogRow {
                config_id: cfg.config_id,
                topic_id: cfg.topic_id.clone(),
                qos: cfg.qos,
                retain: cfg.retain,
                value_type: "num",
                value_num: value,
                value_text: None,
                value_bool: None,
                quality_ok: value.is_some(),
                quality: if value.is_some() { "Good".to_string() } else { "Unknown".to_string() },
                src_ts,
            };
            let _ = store.insert_publish_log_batch(vec![row]).await;
            fired += 1;
        }
        fired
    }
}

async fn resolve_hierarchy(store: &dyn Store, station_id: StationId) -> Option<telemetry_store::Hierarchy> {
    store
        .get_hierarchy_for_stations(&[station_id])
        .await
        .ok()
        .map(|o| o.into_rows())
        .and_then(|rows| rows.into_iter().next())
        .map(|(_, h)| h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::{fake::MemoryTagSource, TagReading};
    use chrono::TimeZone;
    use telemetry_broker::fake::RecordingBroker;
    use telemetry_model::station::LineId;
    use telemetry_model::TaggedValue;
    use telemetry_store::memory::MemoryStore;

    fn dt(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap() + chrono::Duration::milliseconds(ms)
    }

    fn station() -> Station {
        Station {
            station_id: StationId(1),
            line_id: LineId(1),
            area: "A".into(),
            subarea: "B".into(),
            line: "L1".into(),
            station: "ST1".into(),
            is_turntable: false,
            fixtures_per_side: 1,
            is_critical: true,
            parallelism_factor: 0.0,
            tag_path: Some("A/B/L1/ST1".into()),
        }
    }

    struct FixedDirectory;

    #[async_trait::async_trait]
    impl ServerDirectory for FixedDirectory {
        async fn read_broker_name_tag(&self) -> Option<String> {
            None
        }
        async fn enumerated_servers(&self) -> Vec<String> {
            vec![]
        }
    }

    fn seed_hierarchy(store: &MemoryStore, station_id: StationId) {
        store.seed_hierarchy(
            station_id,
            telemetry_store::Hierarchy {
                division: "NA".into(),
                plant: "P1".into(),
                area: "A".into(),
                subarea: "B".into(),
                line: "L1".into(),
                station: "ST1".into(),
            },
        );
    }

    #[tokio::test]
    async fn status_does_not_fire_before_the_coalesce_window_elapses() {
        let st = station();
        let store = MemoryStore::new();
        seed_hierarchy(&store, st.station_id);
        let source = MemoryTagSource::new();
        let broker = RecordingBroker::default();
        let server_cache = ServerCache::new();
        let directory = FixedDirectory;

        let mut engine = TagPublishEngine::new();
        engine.notify_station_dirty(st.station_id, dt(0));
        let fired = engine.tick_status(dt(50), &[st], &source, &store, &broker, &server_cache, &directory).await;
        assert_eq!(fired, 0);
    }

    #[tokio::test]
    async fn status_fires_once_quiet_for_the_full_window() {
        let st = station();
        let store = MemoryStore::new();
        seed_hierarchy(&store, st.station_id);
        let source = MemoryTagSource::new();
        let broker = RecordingBroker::default();
        let server_cache = ServerCache::new();
        let directory = FixedDirectory;

        let mut engine = TagPublishEngine::new();
        engine.notify_station_dirty(st.station_id, dt(0));
        let fired = engine.tick_status(dt(150), &[st], &source, &store, &broker, &server_cache, &directory).await;
        assert_eq!(fired, 1);
        assert_eq!(broker.published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn node_group_bad_quality_member_logs_unknown() {
        let store = MemoryStore::new();
        seed_hierarchy(&store, StationId(1));
        let source = MemoryTagSource::new();
        source.set("A/B/L1/ST1/Andon1", TagReading::good(TaggedValue::Bool(true), dt(0)));
        let broker = RecordingBroker::default();
        let server_cache = ServerCache::new();
        let directory = FixedDirectory;

        let cfg = GroupConfig {
            config_id: 10,
            topic_id: "andon-group".into(),
            station_id: StationId(1),
            scope_slug: "Andons".into(),
            member_paths: vec!["A/B/L1/ST1/Andon1".into(), "A/B/L1/ST1/Andon2".into()],
            qos: 0,
            retain: true,
        };

        let mut engine = TagPublishEngine::new();
        engine.notify_group_dirty(cfg.config_id, dt(0));
        let fired = engine.tick_node_groups(dt(75), &[cfg], &source, &store, &broker, &server_cache, &directory).await;
        assert_eq!(fired, 1);
        let rows = store.publish_log_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value_bool, None);
        assert!(!rows[0].quality_ok);
    }

    #[tokio::test]
    async fn combined_tick_runs_status_and_both_group_kinds() {
        let st = station();
        let store = MemoryStore::new();
        seed_hierarchy(&store, st.station_id);
        let source = MemoryTagSource::new();
        source.set("A/B/L1/ST1/Cycle1", TagReading::good(TaggedValue::Num(10.0), dt(0)));
        let broker = RecordingBroker::default();
        let server_cache = ServerCache::new();
        let directory = FixedDirectory;

        let node_cfg = GroupConfig {
            config_id: 1,
            topic_id: "andon-group".into(),
            station_id: st.station_id,
            scope_slug: "Andons".into(),
            member_paths: vec!["A/B/L1/ST1/Andon1".into()],
            qos: 0,
            retain: true,
        };
        let cycle_cfg = GroupConfig {
            config_id: 2,
            topic_id: "cycle-group".into(),
            station_id: st.station_id,
            scope_slug: "CycleGroup".into(),
            member_paths: vec!["A/B/L1/ST1/Cycle1".into()],
            qos: 0,
            retain: true,
        };

        let mut engine = TagPublishEngine::new();
        engine.notify_station_dirty(st.station_id, dt(0));
        engine.notify_group_dirty(node_cfg.config_id, dt(0));
        engine.notify_group_dirty(cycle_cfg.config_id, dt(0));

        let outcome = engine
            .tick(dt(150), &[st], &[node_cfg], &[cycle_cfg], &source, &store, &broker, &server_cache, &directory)
            .await;
        assert_eq!(outcome.status_published, 1);
        assert_eq!(outcome.groups_published, 2);
        assert_eq!(broker.published.lock().unwrap().len(), 3);
        assert_eq!(store.publish_log_rows().len(), 2);
    }
}
