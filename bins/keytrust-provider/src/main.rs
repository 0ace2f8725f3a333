//! Keytrust provider service.
//!
//! Answers "which key belongs to this address, and how well is it verified?" for registered
//! client applications, and stores their per-application trust overrides.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use keytrust_provider::access::{PackageResolver, PackageTable};
use keytrust_provider::api::rest::{self, AppState};
use keytrust_provider::config::Config;
use keytrust_provider::db;
use keytrust_provider::notify::ChangeNotifier;

const DEFAULT_LOG_FILTER: &str = "keytrust_provider=debug,info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    info!("Starting keytrust provider...");

    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;

    info!(
        "Configuration loaded: REST port {}, max connections {}",
        config.rest_port, config.max_connections
    );

    let packages = match &config.packages_file {
        Some(path) => {
            let table = PackageTable::load(path)?;
            info!("Loaded package table from {}", path.display());
            table
        }
        None => {
            warn!("PACKAGES_FILE not set, registration lookups will fail for every uid");
            PackageTable::new()
        }
    };
    let packages: Arc<dyn PackageResolver> = Arc::new(packages);

    // Connect to database and run migrations
    let pool = db::create_pool(&config.database_url, config.max_connections).await?;

    let state = AppState {
        pool,
        notifier: ChangeNotifier::default(),
        packages,
    };

    let app = rest::create_router(state);

    let rest_addr = config.rest_addr();
    info!("REST API listening on http://{}", rest_addr);

    let listener = tokio::net::TcpListener::bind(rest_addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Provider shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
