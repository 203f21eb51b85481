use std::sync::Arc;

use smartscoop_agent::{AgentError, ShoppingAssistant};
use smartscoop_core::config::{AppConfig, ConfigError};
use smartscoop_db::{connect_with_settings, migrations, DbPool, SqlUserProfileRepository};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub assistant: Arc<ShoppingAssistant>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("assistant initialization failed: {0}")]
    Assistant(#[from] AgentError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let profiles = Arc::new(SqlUserProfileRepository::new(db_pool.clone()));
    let assistant = Arc::new(ShoppingAssistant::build(&config, profiles)?);
    info!(
        event_name = "system.bootstrap.assistant_ready",
        correlation_id = "bootstrap",
        catalog_provider = assistant.catalog_provider(),
        "shopping assistant initialized"
    );

    Ok(Application { config, db_pool, assistant })
}
