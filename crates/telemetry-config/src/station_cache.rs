//! Config Cache (spec §4.2): station list on a TTL, per-station part→CT map
//! refreshed on demand.

use crate::cache::TtlCache;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use telemetry_model::{PartCtConfig, Station, StationId};
use telemetry_store::Store;
use tokio::sync::RwLock;

pub struct StationCache {
    stations: TtlCache<Arc<Vec<Station>>>,
}

impl StationCache {
    pub fn new(ttl_sec: u64) -> Self {
        Self { stations: TtlCache::new(Duration::from_secs(ttl_sec)) }
    }

    /// `stations()` (spec §4.2): tag-path precomputed on the `Station` rows
    /// themselves by the store adapter; a station with no resolvable tag is
    /// retained with `tag_path: None` rather than dropped.
    pub async fn stations(&self, store: &dyn Store) -> Arc<Vec<Station>> {
        self.stations
            .get_or_refresh(|| async {
                match store.get_active_stations_for_rollup(false).await {
                    Ok(outcome) => Arc::new(outcome.into_rows()),
                    Err(_) => Arc::new(Vec::new()),
                }
            })
            .await
    }

    pub async fn invalidate(&self) {
        self.stations.invalidate().await;
    }
}

/// Per-station part→CT map, refreshed on demand (unknown part observed, or
/// explicit `invalidate`) rather than on a fixed TTL.
#[derive(Default)]
pub struct PartCtCache {
    by_station: RwLock<HashMap<StationId, PartCtConfig>>,
}

impl PartCtCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `partCT(station_id)`: empty map when the store has no rows, never an
    /// error surfaced to callers.
    pub async fn part_ct(&self, store: &dyn Store, station_id: StationId) -> PartCtConfig {
        if let Some(cfg) = self.by_station.read().await.get(&station_id).cloned() {
            return cfg;
        }
        let cfg = store
            .get_part_cts_for_station(station_id)
            .await
            .map(|o| o.into_rows())
            .unwrap_or_default();
        self.by_station.write().await.insert(station_id, cfg.clone());
        cfg
    }

    /// Drop the cached map for one station, or all stations when `None`.
    pub async fn invalidate(&self, station_id: Option<StationId>) {
        let mut guard = self.by_station.write().await;
        match station_id {
            Some(id) => {
                guard.remove(&id);
            }
            None => guard.clear(),
        }
    }
}
