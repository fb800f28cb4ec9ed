use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

use crate::config::IndexConfig;

#[derive(Clone)]
pub struct DbPool {
    pool: PgPool,
}

impl DbPool {
    pub async fn new(config: &IndexConfig) -> Result<Self> {
        let url = config
            .database_url
            .as_deref()
            .context("index.database_url is not configured")?;

        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max_size.max(1))
            .acquire_timeout(Duration::from_secs(config.pool_timeout_seconds.max(1)))
            .connect(url)
            .await
            .context("Failed to connect to Postgres")?;

        info!("Postgres pool ready (max {} connections)", config.pool_max_size);
        Ok(Self { pool })
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }
}
