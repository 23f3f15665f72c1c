use boardtrace::config::Config;
use boardtrace::cycle::{run_ingestion_loop, IngestionCycle};
use boardtrace::dedup::DuplicateIndex;
use boardtrace::ledger::OrderLedger;
use boardtrace::snapshot::SnapshotHandle;
use boardtrace::source::TraceFileSource;
use boardtrace::store::{KvStore, RedisStore};
use std::sync::Arc;

/// Index keys older than this many calendar months are swept at startup.
const SWEEP_MONTHS_AGO: u32 = 2;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let config = Config::from_env()?;

    // Logs go to stderr so a terminal dashboard can own stdout
    let mut builder = if config.rust_log.is_some() {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
    } else {
        env_logger::Builder::from_default_env()
    };
    builder.target(env_logger::Target::Stderr).init();

    log::info!("Starting boardtrace");
    log::info!("   watch dir: {}", config.watch_dir);
    log::info!("   processed dir: {}", config.processed_dir);
    log::info!("   extension: {}", config.file_extension);
    log::info!("   poll interval: {}ms", config.interval_delay_ms);
    log::info!(
        "   store: {}:{}/{}",
        config.redis_host,
        config.redis_port,
        config.redis_db
    );

    // The only failure allowed to kill the process: no store, no ledger.
    let store: Arc<dyn KvStore> = Arc::new(RedisStore::connect(&config.redis_url()).await?);

    let ledger = OrderLedger::new(store.clone());
    let dedup = DuplicateIndex::new(store.clone());
    let source = TraceFileSource::new(
        &config.watch_dir,
        &config.processed_dir,
        &config.file_extension,
    );
    let snapshot = SnapshotHandle::new();

    // One sweep per process lifetime bounds index growth
    match dedup.sweep_expired(SWEEP_MONTHS_AGO).await {
        Ok(removed) => log::info!("Startup sweep removed {} expired index keys", removed),
        Err(err) => log::warn!("Startup sweep failed: {}", err),
    }

    let cycle = IngestionCycle::new(source, ledger, dedup, snapshot);
    run_ingestion_loop(cycle, config.interval_delay_ms).await;

    Ok(())
}
