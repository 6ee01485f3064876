use std::sync::Arc;

use book_catalog::config::{CatalogConfig, CliArgs};
use book_catalog::ingest::{ConsumerStats, QueueConsumer, WatcherStats};
use book_catalog::{lookup, telemetry, Resources};
use clap::Parser;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = CatalogConfig::try_from(args)?;

    telemetry::init_tracing(config.log_json)?;
    log_startup_info(&config);

    let resources = Resources::from_config(&config);

    let consumer = QueueConsumer::spawn(
        resources.ingestion_worker(),
        resources.queue.clone(),
        config.poll_interval,
    );

    let watcher = resources.watch_bucket(&config.data_bucket, config.watch_interval);
    tracing::info!(bucket = %config.data_bucket, "watching for uploads");

    let service = Arc::new(resources.lookup_service());
    let served = lookup::serve(service, &config.server_addr, shutdown_signal()).await;

    let watched = watcher.stop();
    let consumed = consumer.stop();
    log_shutdown(&resources, watched, consumed);

    served?;
    tracing::info!("Service shut down successfully");
    Ok(())
}

fn log_startup_info(config: &CatalogConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting book catalog with full config: {:#?}", config);
    } else {
        tracing::info!(
            addr = %config.server_addr,
            table = %config.table_name,
            auth = config.auth.is_some(),
            "Starting book catalog"
        );
    }
}

fn log_shutdown(resources: &Resources, watched: WatcherStats, stats: ConsumerStats) {
    tracing::info!(
        scans = watched.scans,
        queued = watched.queued,
        failed_scans = watched.failed_scans,
        "bucket watcher stopped"
    );
    tracing::info!(
        acknowledged = stats.acknowledged,
        redelivered = stats.redelivered,
        dead_lettered = stats.dead_lettered,
        polls = stats.polls,
        pending = resources.queue.len(),
        "ingestion consumer stopped"
    );

    for letter in resources.queue.dead_letters() {
        tracing::warn!(
            message_id = %letter.event.id,
            receive_count = letter.receive_count,
            reason = %letter.reason,
            "dead letter awaiting inspection"
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");
}
