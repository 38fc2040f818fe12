// ==========================================
// VitalVida Sync Pipeline - worker binary
// ==========================================
// Runs the queue worker and the notification dispatcher
// until Ctrl-C.
//
// Environment:
// - VITALVIDA_DB_PATH          database file
// - VITALVIDA_WORKER_POLL_MS   queue poll interval (default 1000)
// - VITALVIDA_LOG_FORMAT=json  JSON log lines
// ==========================================

use std::time::Duration;

use tokio::sync::watch;
use vitalvida_sync::app::{get_default_db_path, AppState};
use vitalvida_sync::logging;

const NOTIFY_BATCH_SIZE: i64 = 50;

fn poll_interval() -> Duration {
    let ms = std::env::var("VITALVIDA_WORKER_POLL_MS")
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .unwrap_or(1_000);
    Duration::from_millis(ms)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match std::env::var("VITALVIDA_LOG_FORMAT").as_deref() {
        Ok("json") => logging::init_json(),
        _ => logging::init(),
    }

    tracing::info!("==================================================");
    tracing::info!("{} {}", vitalvida_sync::APP_NAME, vitalvida_sync::VERSION);
    tracing::info!("==================================================");

    let db_path = get_default_db_path();
    let interval = poll_interval();
    tracing::info!(%db_path, poll_ms = interval.as_millis() as u64, "starting worker");

    let state = AppState::with_poll_interval(db_path, interval)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker = state.worker.clone();
    let worker_rx = shutdown_rx.clone();
    let worker_task = tokio::spawn(async move { worker.run(worker_rx).await });

    let dispatcher = state.notification_dispatcher.clone();
    let notify_task =
        tokio::spawn(async move { dispatcher.run(interval, NOTIFY_BATCH_SIZE, shutdown_rx).await });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    shutdown_tx.send(true)?;

    let (worker_res, notify_res) = tokio::join!(worker_task, notify_task);
    worker_res?;
    notify_res?;

    tracing::info!("worker stopped");
    Ok(())
}
