mod system_store;
mod vector_store;

pub use system_store::PgSystemStore;
pub use vector_store::PgVectorStore;

use crate::config::DatabaseConfig;
use crate::utils::error::{Result, ServiceError};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tokio::sync::RwLock;

/// Connection settings shared by the Postgres stores.
#[derive(Debug, Clone)]
pub struct PgSettings {
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
}

impl PgSettings {
    pub fn new(url: String, config: &DatabaseConfig) -> Self {
        Self {
            url,
            min_connections: config.pool_min_size,
            max_connections: config.pool_max_size,
        }
    }
}

/// Pool slot that is empty until `connect` and after `close`.
#[derive(Debug)]
struct PoolSlot {
    settings: PgSettings,
    pool: RwLock<Option<PgPool>>,
}

impl PoolSlot {
    fn new(settings: PgSettings) -> Self {
        Self {
            settings,
            pool: RwLock::new(None),
        }
    }

    async fn open(&self) -> Result<PgPool> {
        let mut slot = self.pool.write().await;
        if let Some(pool) = slot.as_ref().filter(|pool| !pool.is_closed()) {
            return Ok(pool.clone());
        }

        let pool = PgPoolOptions::new()
            .min_connections(self.settings.min_connections)
            .max_connections(self.settings.max_connections)
            .connect(&self.settings.url)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create pool: {}", e);
                ServiceError::DatabaseError(e)
            })?;
        *slot = Some(pool.clone());
        Ok(pool)
    }

    async fn get(&self, component: &str) -> Result<PgPool> {
        self.pool
            .read()
            .await
            .clone()
            .ok_or_else(|| ServiceError::not_initialized(format!("{} pool", component)))
    }

    async fn close(&self) {
        if let Some(pool) = self.pool.write().await.take() {
            pool.close().await;
        }
    }
}
