//! tally-api — HTTP boundary for the Tally stock ledger
//!
//! Long-running service that:
//! - Applies audited stock adjustments and answers quantity lookups
//! - Runs the stock receipt create/verify/reject workflow
//! - Maintains customer credit balances
//! - Serves the transaction history and audit feed to the dashboard

use tally_api::config::ApiConfig;
use tally_api::routes;
use tally_api::state::AppState;
use tally_db::{Database, DbConfig};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally_api=info,tally_db=info,tower_http=info".into()),
        )
        .init();

    let config = ApiConfig::load()?;
    tracing::info!(
        db = %config.database_path.display(),
        "Starting tally-api"
    );

    let db = Database::new(
        DbConfig::new(&config.database_path).max_connections(config.max_connections),
    )
    .await?;

    let app = routes::router(AppState::new(db.clone()));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("tally-api listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    tracing::info!("tally-api shut down");

    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM so in-flight ledger writes finish cleanly.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("Failed to install SIGTERM handler: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
