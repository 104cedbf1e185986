//! Process startup helpers: logging, database pools, migrations.

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Install the global tracing subscriber. `RUST_LOG` overrides the
/// default filter.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ingest_core=debug,site_crawler=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Main relational pool. Connections are validated before use and
/// recycled hourly; long-idle connections otherwise go stale behind
/// load balancers.
pub async fn connect_main_pool(config: &Config) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(30)
        .max_lifetime(Duration::from_secs(3600))
        .test_before_acquire(true)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to main database")
}

/// Separate, smaller pool for the vector database.
pub async fn connect_vector_pool(config: &Config) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(15)
        .max_lifetime(Duration::from_secs(3600))
        .test_before_acquire(true)
        .connect(&config.vector_database_url)
        .await
        .context("Failed to connect to vector database")
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to run main database migrations")
}

pub async fn run_vector_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations_vector")
        .run(pool)
        .await
        .context("Failed to run vector database migrations")
}
