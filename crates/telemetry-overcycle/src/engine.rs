//! Overcycle Detection & Publish Engine (spec §4.6): per-line scan of
//! `CycleTime` history against CT segments, cumulative anchors, top-N
//! leaderboards, and shift finalization via `past_shift_done_keys`.

use crate::classify::classify_window;
use crate::leaderboard::{aggregate_totals, top_times, top_totals, StationTotals};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use telemetry_broker::payload::{
    format_mm_ss, OvercycleEntry, TopOvercycleTimesEnvelope, TopOvercycleTotalsEnvelope, TopOvercyclesBody,
};
use telemetry_broker::{Broker, ServerCache, ServerDirectory};
use telemetry_config::ShiftBreakIndex;
use telemetry_model::station::LineId;
use telemetry_model::{CumulativeAnchor, ShiftWindow, Station, StationId};
use telemetry_store::{LineSlotRow, Store};

type ShiftKey = (LineId, String, NaiveDate);

#[derive(Debug, Default, Clone, PartialEq)]
pub struct OvercycleTickOutcome {
    pub anchors_written: usize,
    pub lines_published: usize,
}

pub struct OvercycleEngine {
    last_as_of: HashMap<ShiftKey, DateTime<Utc>>,
    emitted_this_shift: HashSet<(ShiftKey, StationId)>,
    past_shift_done_keys: HashSet<ShiftKey>,
}

impl Default for OvercycleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl OvercycleEngine {
    pub fn new() -> Self {
        Self { last_as_of: HashMap::new(), emitted_this_shift: HashSet::new(), past_shift_done_keys: HashSet::new() }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn tick(
        &mut self,
        now: DateTime<Utc>,
        stations: &[Station],
        shifts: &ShiftBreakIndex,
        historian: &dyn telemetry_historian::Historian,
        store: &dyn Store,
        broker: &dyn Broker,
        server_cache: &ServerCache,
        server_directory: &dyn ServerDirectory,
        final_grace_min: i64,
        max_top: usize,
    ) -> OvercycleTickOutcome {
        let mut by_line: HashMap<LineId, Vec<&Station>> = HashMap::new();
        for station in stations {
            by_line.entry(station.line_id).or_default().push(station);
        }

        let mut outcome = OvercycleTickOutcome::default();
        let grace = Duration::minutes(final_grace_min);

        for (line_id, line_stations) in by_line {
            if let Some(active) = shifts.active_shift(line_id, now).await {
                self.reconcile_shift(&active, now, false, &line_stations, historian, store, broker, server_cache, server_directory, max_top, &mut outcome)
                    .await;
            }
            if let Some(ended) = shifts.last_ended_shift(line_id, now, grace).await {
                let key = (line_id, ended.shift_id.clone(), ended.shift_local_date);
                if !self.past_shift_done_keys.contains(&key) {
                    self.reconcile_shift(&ended, ended.end, true, &line_stations, historian, store, broker, server_cache, server_directory, max_top, &mut outcome)
                        .await;
                    self.past_shift_done_keys.insert(key);
                }
            }
        }
        outcome
    }

    #[allow(clippy::too_many_arguments)]
    async fn reconcile_shift(
        &mut self,
        window: &ShiftWindow,
        b: DateTime<Utc>,
        is_final: bool,
        stations: &[&Station],
        historian: &dyn telemetry_historian::Historian,
        store: &dyn Store,
        broker: &dyn Broker,
        server_cache: &ServerCache,
        server_directory: &dyn ServerDirectory,
        max_top: usize,
        outcome: &mut OvercycleTickOutcome,
    ) {
        let key: ShiftKey = (window.line_id, window.shift_id.clone(), window.shift_local_date);
        let a = self.last_as_of.get(&key).copied().unwrap_or(window.start);
        if b <= a {
            return;
        }

        let slot_duration_min = (b - window.start).num_seconds() as f64 / 60.0;
        let mut anchors = Vec::new();
        for station in stations {
            let segments = store
                .get_ct_segments_for_station_between(station.station_id, a, b)
                .await
                .map(|o| o.into_rows())
                .unwrap_or_default();
            let path = format!("{}/CycleTime", station.path());
            let samples = historian.query_history(&path, a, b, false).await.unwrap_or_default();
            let stats = classify_window(&segments, &samples);

            let station_key = (key.clone(), station.station_id);
            let had_prior_row = self.emitted_this_shift.contains(&station_key);
            let include_zero = stats.cnt > 0 || had_prior_row || !segments.is_empty();
            if !include_zero {
                continue;
            }
            anchors.push(CumulativeAnchor {
                station_id: station.station_id,
                as_of_local: b,
                inc_over_cnt: stats.cnt,
                inc_over_sec: stats.sum_over,
                inc_max_over_sec: stats.max_over,
                slot_duration_min,
            });
            self.emitted_this_shift.insert(station_key);
        }

        if !anchors.is_empty() {
            let _ = store.upsert_slot_station_batch(anchors.clone(), "overcycle-engine").await;
            outcome.anchors_written += anchors.len();
        }
        self.last_as_of.insert(key.clone(), b);

        let accum = store
            .get_shift_accum_for_line(window.line_id, &window.shift_id, window.start, b)
            .await
            .map(|o| o.into_rows())
            .unwrap_or_default();
        let totals = aggregate_totals(&accum);
        let times_ranked = top_times(&totals, max_top);
        let totals_ranked = top_totals(&totals, max_top);

        let Some(first_station) = stations.first() else { return };
        let hierarchy = store
            .get_hierarchy_for_stations(&[first_station.station_id])
            .await
            .ok()
            .map(|o| o.into_rows())
            .and_then(|rows| rows.into_iter().next())
            .map(|(_, h)| h);
        let Some(hierarchy) = hierarchy else { return };

        let times_json = render_times_body(&times_ranked, window.line_id.0, &window.shift_id);
        let totals_json = render_totals_body(&totals_ranked, window.line_id.0, &window.shift_id);

        let top_times_json = serde_json::to_string(&times_json).unwrap_or_default();
        let top_totals_json = serde_json::to_string(&totals_json).unwrap_or_default();

        let server = server_cache.resolve(server_directory).await;
        let times_topic = telemetry_broker::topic_for(&hierarchy, "TopOvercycleTimes");
        let totals_topic = telemetry_broker::topic_for(&hierarchy, "TopOvercycleTotals");
        let times_envelope = TopOvercycleTimesEnvelope::new(b, times_json);
        let totals_envelope = TopOvercycleTotalsEnvelope::new(b, totals_json);
        if let Ok(payload) = serde_json::to_vec(&times_envelope) {
            let _ = broker.publish(&server, &times_topic, payload, 0, true).await;
        }
        if let Ok(payload) = serde_json::to_vec(&totals_envelope) {
            let _ = broker.publish(&server, &totals_topic, payload, 0, true).await;
        }

        let line_row = LineSlotRow {
            line_id: window.line_id,
            shift_id: window.shift_id.clone(),
            shift_date: window.shift_local_date,
            top_times_json,
            top_totals_json,
            is_final,
        };
        let _ = store.upsert_slot_line_batch(vec![line_row], "overcycle-engine").await;
        outcome.lines_published += 1;
    }
}

fn render_times_body(ranked: &[StationTotals], line_id: u32, shift_id: &str) -> TopOvercyclesBody<String> {
    TopOvercyclesBody {
        overcycles: ranked
            .iter()
            .enumerate()
            .map(|(i, t)| OvercycleEntry { id: (i + 1) as u8, stn_id: t.station_id.0, value: format_mm_ss(t.sum_over) })
            .collect(),
        line_id: Some(line_id),
        shift_id: Some(shift_id.to_string()),
    }
}

fn render_totals_body(ranked: &[StationTotals], line_id: u32, shift_id: &str) -> TopOvercyclesBody<i64> {
    TopOvercyclesBody {
        overcycles: ranked
            .iter()
            .enumerate()
            .map(|(i, t)| OvercycleEntry { id: (i + 1) as u8, stn_id: t.station_id.0, value: t.cnt as i64 })
            .collect(),
        line_id: Some(line_id),
        shift_id: Some(shift_id.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use telemetry_broker::fake::RecordingBroker;
    use telemetry_historian::fake::MemoryHistorian;
    use telemetry_model::station::LineId;
    use telemetry_model::{CtMode, CtSegment};
    use telemetry_store::memory::MemoryStore;

    fn dt(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, h, m, s).unwrap()
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

    #[tokio::test]
    async fn live_shift_tick_publishes_a_leaderboard_and_records_an_anchor() {
        let st = station();
        let store = MemoryStore::new();
        store.seed_stations(vec![st.clone()]);
        store.seed_hierarchy(
            st.station_id,
            telemetry_store::Hierarchy {
                division: "NA".into(),
                plant: "P1".into(),
                area: "A".into(),
                subarea: "B".into(),
                line: "L1".into(),
                station: "ST1".into(),
            },
        );
        store
            .ct_segment_upsert_on_change(CtSegment {
                station_id: st.station_id,
                effective_from_utc: dt(6, 0, 0),
                ct_eff_sec: 30.0,
                fixtures_per_side: 1,
                is_turntable: false,
                parallelism_factor: 0.0,
                parts_json: "[]".into(),
                ct_mode: CtMode::LiveFixtures,
                overcycle_multiplier: 2.0,
            })
            .await
            .unwrap();

        let historian = MemoryHistorian::new();
        historian.seed("A/B/L1/ST1/CycleTime", [(dt(10, 5, 0), 35.0), (dt(10, 6, 0), 45.0)]);

        let shifts = ShiftBreakIndex::new();
        let shift_date = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        store.seed_shifts(
            shift_date,
            vec![telemetry_model::ShiftWindow {
                shift_id: "DAY".into(),
                line_id: LineId(1),
                shift_local_date: shift_date,
                start: dt(6, 0, 0),
                end: dt(14, 0, 0),
            }],
        );
        shifts.refresh_shifts(&store, shift_date).await;

        let broker = RecordingBroker::default();
        let server_cache = ServerCache::new();
        let directory = FixedDirectory;

        let mut engine = OvercycleEngine::new();
        let outcome = engine
            .tick(dt(10, 30, 0), &[st.clone()], &shifts, &historian, &store, &broker, &server_cache, &directory, 1080, 5)
            .await;

        assert_eq!(outcome.anchors_written, 1);
        assert_eq!(outcome.lines_published, 1);
        assert_eq!(broker.published.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn shift_finalization_is_idempotent_via_done_keys() {
        let st = station();
        let store = MemoryStore::new();
        store.seed_stations(vec![st.clone()]);
        store.seed_hierarchy(
            st.station_id,
            telemetry_store::Hierarchy {
                division: "NA".into(),
                plant: "P1".into(),
                area: "A".into(),
                subarea: "B".into(),
                line: "L1".into(),
                station: "ST1".into(),
            },
        );
        let historian = MemoryHistorian::new();
        let shifts = ShiftBreakIndex::new();
        let shift_date = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        store.seed_shifts(
            shift_date,
            vec![telemetry_model::ShiftWindow {
                shift_id: "DAY".into(),
                line_id: LineId(1),
                shift_local_date: shift_date,
                start: dt(6, 0, 0),
                end: dt(14, 0, 0),
            }],
        );
        shifts.refresh_shifts(&store, shift_date).await;

        let broker = RecordingBroker::default();
        let server_cache = ServerCache::new();
        let directory = FixedDirectory;
        let mut engine = OvercycleEngine::new();

        let first = engine.tick(dt(14, 5, 0), &[st.clone()], &shifts, &historian, &store, &broker, &server_cache, &directory, 1080, 5).await;
        assert_eq!(first.lines_published, 1);

        let second = engine.tick(dt(14, 10, 0), &[st.clone()], &shifts, &historian, &store, &broker, &server_cache, &directory, 1080, 5).await;
        assert_eq!(second.lines_published, 0, "a second tick must not re-finalize the same shift");
    }
}
