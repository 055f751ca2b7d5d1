//! Scholaris Server: application entry point.

mod config;
mod state;

use scholaris_core::ScholarisError;
use scholaris_core::models::principal::{Principal, Role};
use scholaris_core::scope::{self, Operation, RequestTenant};
use scholaris_db::{DbError, DbManager};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{ConfigError, ServerConfig};
use crate::state::AppState;

#[derive(Debug, Error)]
enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("database: {0}")]
    Database(#[from] DbError),

    #[error("startup probe: {0}")]
    Probe(#[from] ScholarisError),

    #[error("signal handling: {0}")]
    Signal(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scholaris=info")),
        )
        .json()
        .init();

    info!("Starting Scholaris server...");

    let config = ServerConfig::from_env()?;
    let db = DbManager::connect(&config.db).await?;
    info!(schema_version = db.schema_version(), "Schema up to date");

    let state = AppState::new(db.client(), config.engine.clone());
    info!(
        default_page_size = config.engine.default_page_size,
        max_page_size = config.engine.max_page_size,
        "Services ready"
    );

    let system = scope::resolve(
        Some(&Principal {
            subject_id: "scholaris-server".into(),
            role: Role::SuperAdmin,
            tenant_id: None,
        }),
        RequestTenant::default(),
        Operation::Read,
    )?;
    let tenants = state
        .tenants
        .list_tenants(&system, 1, 1)
        .await?;
    info!(tenants = tenants.total, "Tenant registry reachable");

    // TODO: Mount the REST transport on `state` once the HTTP layer lands.
    tokio::signal::ctrl_c().await?;

    info!("Scholaris server stopped.");
    Ok(())
}
