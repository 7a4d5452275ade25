use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use innkeep::api::{self, ApiState};
use innkeep::engine::Engine;
use innkeep::maintenance;
use innkeep::notify::NotifyHub;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("INNKEEP_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    innkeep::observability::init(metrics_port);

    let port = std::env::var("INNKEEP_PORT").unwrap_or_else(|_| "8080".into());
    let bind = std::env::var("INNKEEP_BIND").unwrap_or_else(|_| "0.0.0.0".into());
    let data_dir = std::env::var("INNKEEP_DATA_DIR").unwrap_or_else(|_| "./data".into());
    let compact_threshold: u64 = std::env::var("INNKEEP_COMPACT_THRESHOLD")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1000);
    let dev_errors = std::env::var("INNKEEP_DEV_ERRORS")
        .is_ok_and(|s| s == "1" || s.eq_ignore_ascii_case("true"));

    // Ensure data directory exists
    std::fs::create_dir_all(&data_dir)?;

    let journal_path = PathBuf::from(&data_dir).join("innkeep.journal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Arc::new(Engine::new(journal_path, notify)?);

    let compactor_engine = engine.clone();
    tokio::spawn(async move {
        maintenance::run_compactor(compactor_engine, compact_threshold).await;
    });

    let app = api::router(ApiState {
        engine: engine.clone(),
        dev_errors,
    });

    let addr = format!("{bind}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("innkeep listening on {addr}");
    info!("  data_dir: {data_dir}");
    info!("  rooms: {}", engine.room_count());
    info!("  compact_threshold: {compact_threshold}");
    info!(
        "  metrics: {}",
        metrics_port.map_or("disabled".to_string(), |p| format!(
            "http://0.0.0.0:{p}/metrics"
        ))
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("innkeep stopped");
    Ok(())
}

/// Resolve on SIGTERM or ctrl-c; axum then stops accepting and drains
/// in-flight requests.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
    info!("shutdown signal received");
}
