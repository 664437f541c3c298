//! Stockroom server: application entry point.

use std::process::ExitCode;

use stockroom_core::error::StockroomError;
use stockroom_db::DbManager;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use stockroom_server::{AppConfig, AppContext};

#[derive(Debug, Error)]
enum ServerError {
    #[error("configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("database: {0}")]
    Database(#[from] surrealdb::Error),

    #[error("migration: {0}")]
    Migration(#[from] stockroom_db::DbError),

    #[error(transparent)]
    Stockroom(#[from] StockroomError),

    #[error("signal handler: {0}")]
    Signal(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stockroom=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Stockroom server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), ServerError> {
    info!("Starting Stockroom server...");
    let config = AppConfig::load()?;

    let manager = DbManager::connect(&config.db).await?;
    stockroom_db::run_migrations(manager.client()).await?;

    let ctx = AppContext::new(manager.client(), &config);
    ctx.users
        .ensure_admin(config.admin_password.as_deref())
        .await?;
    ctx.scheduler.start(config.backup.schedule).await?;

    info!("Stockroom server ready");
    tokio::signal::ctrl_c().await?;

    ctx.scheduler.shutdown().await;
    info!("Stockroom server stopped.");
    Ok(())
}
