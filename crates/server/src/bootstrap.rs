use std::sync::Arc;

use axum::Router;
use roomwise_agent::guardrails::GuardrailPolicy;
use roomwise_agent::AgentRuntime;
use roomwise_core::booking::SchedulingPolicy;
use roomwise_core::config::{AppConfig, ConfigError, LoadOptions};
use roomwise_db::{booking_engine, connect_with_settings, migrations, DbPool};
use thiserror::Error;
use tracing::info;

use crate::{api, health};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub agent_runtime: AgentRuntime,
}

impl Application {
    pub fn router(&self) -> Router {
        health::router(self.db_pool.clone()).merge(api::router(self.agent_runtime.clone()))
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

#[cfg_attr(not(test), allow(dead_code))]
pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let policy = SchedulingPolicy::from_config(&config.scheduling)?;

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

    let engine = Arc::new(booking_engine(db_pool.clone(), policy));
    let guardrails = GuardrailPolicy::from_config(&config.guardrails);
    info!(
        event_name = "system.bootstrap.guardrails",
        correlation_id = "bootstrap",
        writes_enabled = guardrails.writes_enabled,
        guests_can_search = guardrails.guests_can_search,
        "agent guardrails configured"
    );
    Ok(Application {
        config,
        db_pool,
        agent_runtime: AgentRuntime::new(engine, guardrails),
    })
}
