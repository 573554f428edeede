use anyhow::Context;
use product_import::config::ImportConfig;
use product_import::shared::utils::init_logger;
use product_import::shared::Database;
use product_import::ImportSystem;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logger();

    let config = ImportConfig::from_env().context("Invalid import configuration")?;
    let database = Arc::new(Database::new().context("Failed to connect to the database")?);
    database
        .run_migrations()
        .context("Failed to run database migrations")?;

    let pool_status = database.pool_status();
    log::debug!(
        "Database pool: {}/{} connections ({} idle)",
        pool_status.connections,
        pool_status.max_size,
        pool_status.idle_connections
    );

    let system = ImportSystem::with_postgres(database, config);
    let pool = system.start_workers();
    let mut events = system.aggregator.subscribe();
    let mut stall_sweep = tokio::time::interval(system.config.reaper_interval);

    log::info!(
        "Import worker running ({} workers, {} attempts per row)",
        system.config.worker_concurrency,
        system.config.max_attempts
    );

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for shutdown signal")?;
                log::info!("Shutdown requested, waiting for in-flight rows");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => log::debug!("Import {} reached a terminal state", event.job_id()),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("Missed {} job events", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            _ = stall_sweep.tick() => {
                match system.service.fail_stalled_jobs(system.config.stall_threshold()).await {
                    Ok(0) => {}
                    Ok(failed) => log::warn!("Failed {} imports that were never dispatched", failed),
                    Err(e) => log::warn!("Stalled import sweep failed: {}", e),
                }
            }
        }
    }

    pool.shutdown().await;
    Ok(())
}
