use tenantdb_gateway::api::{self, AppState};
use tenantdb_gateway::config::Config;
use tenantdb_gateway::engine::{EngineSet, MemoryEngine, PostgresEngine};
use tenantdb_gateway::gateway::Gateway;
use tenantdb_gateway::ops::AccountImporter;

use std::sync::Arc;
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from .env file if present
    let dotenv = dotenvy::dotenv();

    let config = Config::from_env()?;

    // Create log directory if it doesn't exist
    std::fs::create_dir_all(&config.log_dir).unwrap_or_else(|e| {
        eprintln!(
            "Warning: Could not create log directory {}: {}",
            config.log_dir.display(),
            e
        );
    });

    // Create file appender with daily rotation
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &config.log_dir, "tenantdb-gateway.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("debug,tenantdb_gateway=trace")),
        )
        // Console output
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        // File output with JSON format for easy parsing
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .with_writer(non_blocking),
        )
        .init();

    debug!("Logging initialized - log directory: {}", config.log_dir.display());

    if let Err(e) = dotenv {
        warn!("No .env file found or error loading it: {}", e);
    }

    let socket_addr = config.socket_addr()?;

    info!("Starting TenantDB Gateway on {}", socket_addr);
    info!("Data directory: {}", config.data_dir.display());
    info!("Provision mode: {:?}", config.provision_mode);
    info!("Max connections per pool: {}", config.max_connections_per_pool);

    let engines = EngineSet::new()
        .with(Arc::new(PostgresEngine::new(config.pool_settings())))
        .with(Arc::new(MemoryEngine::new()));

    let importer = AccountImporter::new(config.import_timeout)?;
    let gateway = Arc::new(Gateway::open(&config.data_dir, engines, importer)?);

    // Reconnect tenants and re-attach their models from the stored metadata
    let restored = gateway.restore().await?;
    if !restored.failed_datasources.is_empty() {
        warn!("Datasources not restored: {:?}", restored.failed_datasources);
    }
    if !restored.failed_storages.is_empty() {
        warn!("Storages still not provisioned: {:?}", restored.failed_storages);
    }

    let app = api::router(Arc::new(AppState::new(gateway, config.provision_mode)));

    // Create listener
    let listener = tokio::net::TcpListener::bind(&socket_addr).await?;
    info!("Server listening on {}", socket_addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}
