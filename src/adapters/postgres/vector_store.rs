use super::{PgSettings, PoolSlot};
use crate::core::vector_index::rank_documents;
use crate::domain::model::{Document, Metadata, SearchHit};
use crate::domain::ports::VectorStore;
use crate::utils::error::{Result, ServiceError};
use crate::utils::validation::validate_identifier;
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgConnection, PgExecutor};

/// Documents in a plain Postgres table; embeddings are `REAL[]` and ranking
/// happens in-process after a JSONB containment pre-filter.
///
/// Every search reads all rows that pass the filter, so a lookup costs a full
/// scan of the code table. That is acceptable for the WITS tables (a few
/// thousand rows) but not for larger corpora.
#[derive(Debug)]
pub struct PgVectorStore {
    table: String,
    vector_size: usize,
    slot: PoolSlot,
}

impl PgVectorStore {
    const COMPONENT: &'static str = "Vector store";

    pub fn new(settings: PgSettings, table: impl Into<String>, vector_size: usize) -> Result<Self> {
        let table = table.into();
        validate_identifier("vector_store table", &table)?;
        Ok(Self {
            table,
            vector_size,
            slot: PoolSlot::new(settings),
        })
    }

    async fn create_table<'e, E>(&self, executor: E) -> Result<()>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id BIGSERIAL PRIMARY KEY,
                content TEXT NOT NULL,
                metadata JSONB NOT NULL DEFAULT '{{}}'::jsonb,
                embedding REAL[] NOT NULL
            )",
            self.table
        ))
        .execute(executor)
        .await?;
        Ok(())
    }

    fn check_dimensions(&self, documents: &[Document]) -> Result<()> {
        match documents.iter().find(|doc| doc.embedding.len() != self.vector_size) {
            Some(doc) => Err(ServiceError::EmbeddingError {
                message: format!(
                    "vector of size {} does not fit table '{}' (vector_size = {})",
                    doc.embedding.len(),
                    self.table,
                    self.vector_size
                ),
            }),
            None => Ok(()),
        }
    }

    async fn insert_documents(&self, conn: &mut PgConnection, documents: &[Document]) -> Result<()> {
        let insert = format!(
            "INSERT INTO {} (content, metadata, embedding) VALUES ($1, $2, $3)",
            self.table
        );
        for doc in documents {
            sqlx::query(&insert)
                .bind(&doc.content)
                .bind(Json(&doc.metadata))
                .bind(&doc.embedding)
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    fn table_name(&self) -> &str {
        &self.table
    }

    async fn connect(&self) -> Result<()> {
        let pool = self.slot.open().await?;
        self.create_table(&pool).await
    }

    async fn truncate(&self) -> Result<()> {
        let pool = self.slot.get(Self::COMPONENT).await?;
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", self.table))
            .execute(&pool)
            .await?;
        self.create_table(&pool).await?;
        tracing::debug!("Vector table '{}' re-created", self.table);
        Ok(())
    }

    async fn add_documents(&self, documents: Vec<Document>) -> Result<()> {
        self.check_dimensions(&documents)?;
        let pool = self.slot.get(Self::COMPONENT).await?;
        let mut tx = pool.begin().await?;
        self.insert_documents(&mut *tx, &documents).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn replace_documents(&self, documents: Vec<Document>) -> Result<()> {
        self.check_dimensions(&documents)?;
        let pool = self.slot.get(Self::COMPONENT).await?;
        let mut tx = pool.begin().await?;
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", self.table))
            .execute(&mut *tx)
            .await?;
        self.create_table(&mut *tx).await?;
        self.insert_documents(&mut *tx, &documents).await?;
        tx.commit().await?;
        tracing::debug!(
            "Vector table '{}' replaced with {} documents",
            self.table,
            documents.len()
        );
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        filter: &Metadata,
    ) -> Result<Vec<SearchHit>> {
        let pool = self.slot.get(Self::COMPONENT).await?;
        let rows: Vec<(String, Json<Metadata>, Vec<f32>)> = sqlx::query_as(&format!(
            "SELECT content, metadata, embedding FROM {} WHERE metadata @> $1",
            self.table
        ))
        .bind(Json(filter))
        .fetch_all(&pool)
        .await?;

        Ok(rank_documents(
            query,
            top_k,
            filter,
            rows.iter().map(|(content, Json(metadata), embedding)| {
                (content.as_str(), metadata, embedding.as_slice())
            }),
        ))
    }

    async fn drop_table(&self) -> Result<()> {
        let pool = self.slot.get(Self::COMPONENT).await?;
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", self.table))
            .execute(&pool)
            .await?;
        tracing::info!("Vector table '{}' dropped", self.table);
        Ok(())
    }

    async fn close(&self) {
        self.slot.close().await;
    }
}
