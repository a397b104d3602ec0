mod config;
mod routes;

use std::sync::Arc;

use cdc_engine::{Manager, notifier_from_env};
use cdc_store::OffsetStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::IngestorConfig;
use crate::routes::AppState;

#[tokio::main]
async fn main() {
    let ingestor_config = IngestorConfig::from_env().expect("invalid ingestor configuration");

    tracing_subscriber::fmt().with_env_filter(EnvFilter::new(ingestor_config.log_level.clone())).init();

    info!("connecting to database...");
    let pool = cdc_store::db::create_pool(&ingestor_config.database_url, ingestor_config.db_max_connections)
        .await
        .expect("failed to create database pool");
    cdc_store::db::run_migrations(&pool).await.expect("failed to run migrations");
    info!("migrations applied");

    let offset_store = Arc::new(OffsetStore::new(pool.clone()));
    let notifier = Arc::from(notifier_from_env());
    let manager = Arc::new(Manager::new(pool.clone(), offset_store, notifier));

    match manager.autostart_active().await {
        Ok(response) => info!(started = response.started, "autostarted active clients"),
        Err(err) => tracing::error!(%err, "failed to autostart active clients"),
    }

    let state = AppState { manager, pool };
    let router = routes::build_router(state);

    let listener = tokio::net::TcpListener::bind(&ingestor_config.bind_addr).await.expect("failed to bind");
    info!(addr = %ingestor_config.bind_addr, "ingestor listening");
    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await.expect("server error");
    info!("ingestor shut down gracefully");
}

/// Waits for SIGTERM or Ctrl-C (SIGINT) and returns to trigger graceful
/// shutdown. Graceful shutdown here only stops accepting new HTTP control
/// requests; in-flight listener supervisors are left running so an operator
/// restart of this process doesn't interrupt active event delivery.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C, shutting down"); },
        _ = terminate => { info!("received SIGTERM, shutting down"); },
    }
}

