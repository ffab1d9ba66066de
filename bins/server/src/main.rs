//! Daybook API Server
//!
//! Main entry point for the ledger statement service.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use daybook_api::{AppState, create_router};
use daybook_db::{StatementLocks, connect};
use daybook_shared::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "daybook=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load()?;

    // Connect to database
    let db = connect(&config.database).await?;
    info!("Connected to database");

    // Cancelled on ctrl-c; a running regeneration sweep stops at the
    // next date boundary.
    let shutdown = CancellationToken::new();

    let state = AppState {
        db: Arc::new(db),
        statement_locks: StatementLocks::new(),
        shutdown: shutdown.clone(),
    };

    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
            }
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
