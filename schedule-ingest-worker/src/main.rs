use std::sync::Arc;

use tracing::Instrument;

use schedule_ingest_worker::config::Config;
use schedule_ingest_worker::db::init_pool;
use schedule_ingest_worker::monitoring::logging::init_structured_logging;
use schedule_ingest_worker::pipeline::{InMemoryLayoutParser, InMemoryOcrEngine, InMemoryShiftNormalizer};
use schedule_ingest_worker::Runner;

#[cfg(feature = "monitoring")]
use schedule_ingest_worker::monitoring::metrics;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_structured_logging();

    // Entered for the process lifetime so every log line carries `service`,
    // the one required structured-log field `tracing_subscriber`'s JSON
    // formatter doesn't attach on its own (timestamp and level are built in).
    let root_span = tracing::info_span!("worker", service = "schedule-ingest-worker");
    run().instrument(root_span).await;
}

async fn run() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(event = "config.invalid", error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    #[cfg(feature = "monitoring")]
    if let Err(err) = metrics::init_metrics() {
        tracing::error!(event = "metrics.init_failed", error = %err, "failed to register Prometheus metrics");
    }

    let pool = match init_pool(&config.database_url, &config.db_schema) {
        Ok(pool) => pool,
        Err(err) => {
            tracing::error!(event = "db.pool_init_failed", error = %err, "failed to build the connection pool");
            std::process::exit(1);
        }
    };

    tracing::info!(
        event = "worker.starting",
        worker_id = %config.worker_id,
        db_schema = %config.db_schema,
        "worker starting"
    );

    // The real OCR backend, layout parser, and semantic normalizer are
    // external collaborators out of scope for this crate; wiring a
    // production implementation in here means swapping these three lines
    // for adapters behind the same traits, with no change to the runner.
    let ocr = Arc::new(InMemoryOcrEngine::default());
    let layout = Arc::new(InMemoryLayoutParser);
    let normalizer = Arc::new(InMemoryShiftNormalizer);

    let runner = Runner::new(pool, config, ocr, layout, normalizer);
    runner.run().await;
}
