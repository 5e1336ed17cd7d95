//! `telemetryd` entrypoint: loads plant configuration, wires adapters (an
//! in-memory default, or Postgres when `--database-url` is given), and
//! spawns one scheduler task per engine cadence.

mod tasks;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use telemetry_broker::fake::{RecordingBroker, StaticServerDirectory};
use telemetry_broker::ServerCache;
use telemetry_config::{PartCtCache, ShiftBreakIndex, StationCache};
use telemetry_ct::fixtures::fake::MemoryFixtureSource;
use telemetry_ct::CtEngine;
use telemetry_historian::fake::MemoryHistorian;
use telemetry_overcycle::OvercycleEngine;
use telemetry_rollup::reader::fake::MemoryCounterSource;
use telemetry_rollup::RollupEngine;
use telemetry_store::memory::MemoryStore;
use telemetry_store::postgres::PostgresStore;
use telemetry_store::Store;
use telemetry_tagpub::tag::fake::MemoryTagSource;
use telemetry_tagpub::TagPublishEngine;
use tokio::sync::Mutex as AsyncMutex;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "telemetryd", version, about = "Manufacturing telemetry engine")]
struct Args {
    /// Plant configuration file (overrides discovery of `telemetry.toml`).
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Directory for the rolling daily log file.
    #[arg(long = "log-dir", default_value = ".")]
    log_dir: PathBuf,

    /// Postgres connection string. Falls back to the in-memory store and
    /// fake adapters when absent.
    #[arg(long = "database-url", env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Run a one-shot dense back-fill for this local date, then exit,
    /// instead of starting the scheduler (spec §4.4 "Back-fill contract").
    #[arg(long = "backfill-date")]
    backfill_date: Option<NaiveDate>,
}

fn configure_logging(log_dir: &Path) -> Option<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(log_dir, "telemetryd.log");
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    match tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(nb_writer)
        .try_init()
    {
        Ok(_) => Some(guard),
        Err(_) => None,
    }
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

async fn build_store(database_url: Option<&str>) -> Result<Arc<dyn Store>> {
    match database_url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new().max_connections(10).connect(url).await?;
            Ok(Arc::new(PostgresStore::new(pool)))
        }
        None => Ok(Arc::new(MemoryStore::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = configure_logging(&args.log_dir);
    install_panic_hook();

    let plant = telemetry_config::load_from(args.config.as_deref());
    info!(target: "telemetryd", division = ?plant.division, plant = ?plant.plant, timezone = %plant.timezone, "startup");

    let store = build_store(args.database_url.as_deref()).await?;
    let historian: Arc<dyn telemetry_historian::Historian> = Arc::new(MemoryHistorian::new());
    let counters: Arc<dyn telemetry_rollup::CounterSource> = Arc::new(MemoryCounterSource::new());
    let fixtures: Arc<dyn telemetry_ct::FixtureSource> = Arc::new(MemoryFixtureSource::new());
    let tag_source: Arc<dyn telemetry_tagpub::TagSource> = Arc::new(MemoryTagSource::new());
    let broker: Arc<dyn telemetry_broker::Broker> = Arc::new(RecordingBroker::default());
    let server_directory: Arc<dyn telemetry_broker::ServerDirectory> =
        Arc::new(StaticServerDirectory::new(vec![telemetry_broker::DEFAULT_SERVER.to_string()]));
    let server_cache = Arc::new(ServerCache::new());

    let tuning = Arc::new(plant.tuning.clone());
    let tz = plant.timezone;
    let station_cache = Arc::new(StationCache::new(300));
    let part_ct_cache = Arc::new(PartCtCache::new());
    let shifts = Arc::new(ShiftBreakIndex::new());

    let today = telemetry_clock::local_date(chrono::Utc::now(), tz);
    shifts.refresh_shifts(store.as_ref(), today).await;
    shifts.refresh_breaks(store.as_ref(), today).await;

    if let Some(date) = args.backfill_date {
        let stations = station_cache.stations(store.as_ref()).await;
        telemetry_rollup::backfill_day_dense(date, stations.as_slice(), historian.as_ref(), store.as_ref(), tz, false, 200).await;
        info!(target: "telemetryd", %date, "backfill_complete");
        return Ok(());
    }

    let ct_engine = Arc::new(AsyncMutex::new(CtEngine::new()));

    let mut scheduler = telemetry_scheduler::Scheduler::new();

    scheduler.register(tasks::RollupTask {
        engine: RollupEngine::new(),
        station_cache: station_cache.clone(),
        counters: counters.clone(),
        historian: historian.clone(),
        store: store.clone(),
        shifts: shifts.clone(),
        tuning: tuning.clone(),
        tz,
    });

    scheduler.register(tasks::CtTask {
        engine: ct_engine.clone(),
        station_cache: station_cache.clone(),
        part_ct_cache: part_ct_cache.clone(),
        fixtures: fixtures.clone(),
        counters: counters.clone(),
        historian: historian.clone(),
        store: store.clone(),
        shifts: shifts.clone(),
        tuning: tuning.clone(),
    });

    scheduler.register(tasks::OvercycleTask {
        engine: OvercycleEngine::new(),
        station_cache: station_cache.clone(),
        shifts: shifts.clone(),
        historian: historian.clone(),
        store: store.clone(),
        broker: broker.clone(),
        server_cache: server_cache.clone(),
        server_directory: server_directory.clone(),
        tuning: tuning.clone(),
    });

    scheduler.register(tasks::TagPublishTask {
        engine: TagPublishEngine::new(),
        station_cache: station_cache.clone(),
        node_groups: Vec::new(),
        cycle_groups: Vec::new(),
        source: tag_source.clone(),
        store: store.clone(),
        broker: broker.clone(),
        server_cache: server_cache.clone(),
        server_directory: server_directory.clone(),
    });

    scheduler.register(tasks::ShiftRefreshTask { store: store.clone(), shifts: shifts.clone(), tz });
    scheduler.register(tasks::BreakRefreshTask { store: store.clone(), shifts: shifts.clone(), tz });

    scheduler.register(tasks::RepairTask {
        store: store.clone(),
        shifts: shifts.clone(),
        station_cache: station_cache.clone(),
        ct_engine: ct_engine.clone(),
        lookback_hours: 24,
        lookback_days: 7,
    });

    let handles = scheduler.spawn_all(None);
    info!(target: "telemetryd", engines = handles.len(), "scheduler_running");

    for handle in handles {
        let _ = handle.await;
    }
    Ok(())
}
