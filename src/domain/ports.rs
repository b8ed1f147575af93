use crate::domain::model::{Document, Metadata, SearchHit, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Key/value store for JSON documents (service settings, column metadata).
#[async_trait]
pub trait SystemStore: Send + Sync {
    /// Opens the pool and creates the table if it does not exist.
    async fn connect(&self) -> Result<()>;
    async fn drop_table(&self) -> Result<()>;
    async fn close(&self);

    /// Fails with `DuplicateKey` when the key exists.
    async fn add_item(&self, key: &str, value: &serde_json::Value) -> Result<()>;
    async fn upsert_item(&self, key: &str, value: &serde_json::Value) -> Result<()>;
    async fn get_item(&self, key: &str) -> Result<Option<serde_json::Value>>;
    async fn delete_item(&self, key: &str) -> Result<()>;
}

/// Storage backend for embedded documents.
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn table_name(&self) -> &str;
    async fn connect(&self) -> Result<()>;
    /// Drops and re-creates the table.
    async fn truncate(&self) -> Result<()>;
    async fn add_documents(&self, documents: Vec<Document>) -> Result<()>;
    /// Swaps the table's rows for `documents` in one step, re-creating the
    /// table if it was dropped. Readers never see an empty table in between.
    async fn replace_documents(&self, documents: Vec<Document>) -> Result<()>;
    /// Hits ordered by descending cosine similarity; every `filter` pair must
    /// be present in a hit's metadata.
    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        filter: &Metadata,
    ) -> Result<Vec<SearchHit>>;
    async fn drop_table(&self) -> Result<()>;
    async fn close(&self);
}

#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Extract/transform/load steps run by `RefreshEngine`.
#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<String>;
    async fn transform(&self, raw: String) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<usize>;
}
