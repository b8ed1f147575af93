use super::{PgSettings, PoolSlot};
use crate::domain::ports::SystemStore;
use crate::utils::error::{Result, ServiceError};
use crate::utils::validation::validate_identifier;
use async_trait::async_trait;
use sqlx::types::Json;

/// JSONB key/value table in Postgres.
#[derive(Debug)]
pub struct PgSystemStore {
    table: String,
    slot: PoolSlot,
}

impl PgSystemStore {
    const COMPONENT: &'static str = "System store";

    pub fn new(settings: PgSettings, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_identifier("database.system_table", &table)?;
        Ok(Self {
            table,
            slot: PoolSlot::new(settings),
        })
    }
}

#[async_trait]
impl SystemStore for PgSystemStore {
    async fn connect(&self) -> Result<()> {
        let pool = self.slot.open().await?;
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id SERIAL PRIMARY KEY,
                key TEXT UNIQUE NOT NULL,
                value JSONB NOT NULL
            )",
            self.table
        ))
        .execute(&pool)
        .await?;
        tracing::debug!("System store table '{}' ready", self.table);
        Ok(())
    }

    async fn drop_table(&self) -> Result<()> {
        let pool = self.slot.get(Self::COMPONENT).await?;
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", self.table))
            .execute(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to drop table '{}': {}", self.table, e);
                e
            })?;
        tracing::info!("Table '{}' dropped", self.table);
        Ok(())
    }

    async fn close(&self) {
        self.slot.close().await;
        tracing::debug!("System store pool closed");
    }

    async fn add_item(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let pool = self.slot.get(Self::COMPONENT).await?;
        sqlx::query(&format!(
            "INSERT INTO {} (key, value) VALUES ($1, $2)",
            self.table
        ))
        .bind(key)
        .bind(Json(value))
        .execute(&pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                ServiceError::DuplicateKey {
                    key: key.to_string(),
                }
            }
            other => ServiceError::DatabaseError(other),
        })?;
        Ok(())
    }

    async fn upsert_item(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let pool = self.slot.get(Self::COMPONENT).await?;
        sqlx::query(&format!(
            "INSERT INTO {} (key, value) VALUES ($1, $2)
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
            self.table
        ))
        .bind(key)
        .bind(Json(value))
        .execute(&pool)
        .await?;
        Ok(())
    }

    async fn get_item(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let pool = self.slot.get(Self::COMPONENT).await?;
        let value: Option<Json<serde_json::Value>> =
            sqlx::query_scalar(&format!("SELECT value FROM {} WHERE key = $1", self.table))
                .bind(key)
                .fetch_optional(&pool)
                .await?;
        Ok(value.map(|Json(value)| value))
    }

    async fn delete_item(&self, key: &str) -> Result<()> {
        let pool = self.slot.get(Self::COMPONENT).await?;
        sqlx::query(&format!("DELETE FROM {} WHERE key = $1", self.table))
            .bind(key)
            .execute(&pool)
            .await?;
        Ok(())
    }
}
