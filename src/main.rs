use std::sync::Arc;

use lms_api::billing::StripeClient;
use lms_api::database::DatabaseManager;
use lms_api::state::AppState;
use lms_api::{config, jobs, logging, routes, storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before the config singleton is first touched
    let _ = dotenvy::dotenv();
    logging::init();

    let config = config::config();
    tracing::info!("Starting LMS API in {:?} mode", config.environment);
    if lms_api::is_production!() && config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set in production");
    }

    let pool = DatabaseManager::pool(&config.database)?;
    if config.database.run_migrations {
        DatabaseManager::run_migrations(&pool).await?;
    }

    let billing = Arc::new(StripeClient::new(&config.billing));
    let storage = storage::from_config(&config.storage)?;
    let state = AppState::new(pool.clone(), billing.clone(), storage);

    if config.jobs.enabled {
        jobs::spawn_daily_jobs(pool, billing, config.jobs.clone());
    }

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("LMS API listening on http://{}", bind_addr);

    axum::serve(listener, routes::app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
