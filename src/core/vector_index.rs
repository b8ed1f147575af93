use crate::domain::model::{Document, Metadata, MetadataColumn, Record, SearchHit};
use crate::domain::ports::{Embedder, VectorStore};
use crate::utils::error::{Result, ServiceError};
use std::sync::Arc;

/// Documents are embedded in batches of this size.
const EMBED_BATCH_SIZE: usize = 64;

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

pub fn metadata_matches(metadata: &Metadata, filter: &Metadata) -> bool {
    filter
        .iter()
        .all(|(key, value)| metadata.get(key) == Some(value))
}

/// Filters, scores and keeps the `top_k` best candidates.
pub fn rank_documents<'a, I>(query: &[f32], top_k: usize, filter: &Metadata, candidates: I) -> Vec<SearchHit>
where
    I: IntoIterator<Item = (&'a str, &'a Metadata, &'a [f32])>,
{
    let mut scored: Vec<(f32, &str, &Metadata)> = candidates
        .into_iter()
        .filter(|(_, metadata, _)| metadata_matches(metadata, filter))
        .map(|(content, metadata, embedding)| {
            (cosine_similarity(query, embedding), content, metadata)
        })
        .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored
        .into_iter()
        .take(top_k)
        .map(|(_, content, metadata)| SearchHit {
            content: content.to_string(),
            metadata: metadata.clone(),
        })
        .collect()
}

/// A vector table holding one text column as content and the rest as metadata.
pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    content_column: String,
}

impl VectorIndex {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        content_column: impl Into<String>,
    ) -> Self {
        Self {
            store,
            embedder,
            content_column: content_column.into(),
        }
    }

    pub fn table_name(&self) -> &str {
        self.store.table_name()
    }

    pub fn content_column(&self) -> &str {
        &self.content_column
    }

    pub async fn connect(&self) -> Result<()> {
        self.store.connect().await
    }

    pub async fn drop_table(&self) -> Result<()> {
        self.store.drop_table().await
    }

    pub async fn close(&self) {
        self.store.close().await
    }

    /// Metadata columns minus the content column.
    pub fn metadata_columns<'a>(&self, columns: &'a [MetadataColumn]) -> Vec<&'a MetadataColumn> {
        columns
            .iter()
            .filter(|column| column.name != self.content_column)
            .collect()
    }

    /// Embeds every record that has content; nothing is written to the store.
    pub async fn embed_records(
        &self,
        records: &[Record],
        columns: &[MetadataColumn],
    ) -> Result<Vec<Document>> {
        let metadata_columns = self.metadata_columns(columns);

        let usable: Vec<&Record> = records
            .iter()
            .filter(|record| {
                let has_content = record
                    .get(&self.content_column)
                    .map(|content| !content.trim().is_empty())
                    .unwrap_or(false);
                if !has_content {
                    tracing::warn!(
                        "Skipping record without '{}' in {}: {:?}",
                        self.content_column,
                        self.table_name(),
                        record.data
                    );
                }
                has_content
            })
            .collect();

        let mut documents = Vec::with_capacity(usable.len());
        for batch in usable.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch
                .iter()
                .filter_map(|record| record.get(&self.content_column))
                .map(str::to_string)
                .collect();
            let embeddings = self.embedder.embed(&texts).await?;
            if embeddings.len() != texts.len() {
                return Err(ServiceError::EmbeddingError {
                    message: format!(
                        "expected {} embeddings, got {}",
                        texts.len(),
                        embeddings.len()
                    ),
                });
            }

            documents.extend(batch.iter().zip(texts).zip(embeddings).map(
                |((record, content), embedding)| Document {
                    content,
                    metadata: metadata_columns
                        .iter()
                        .filter_map(|column| {
                            record
                                .data
                                .get(&column.name)
                                .map(|value| (column.name.clone(), value.clone()))
                        })
                        .collect(),
                    embedding,
                },
            ));
            tracing::debug!("Embedded {} documents for {}", documents.len(), self.table_name());
        }

        Ok(documents)
    }

    pub async fn add_records(&self, records: &[Record], columns: &[MetadataColumn]) -> Result<usize> {
        let documents = self.embed_records(records, columns).await?;
        let added = documents.len();
        self.store.add_documents(documents).await?;
        Ok(added)
    }

    /// Embeds first, then swaps the table's rows; a failed embedding leaves
    /// the current rows in place.
    pub async fn replace_records(
        &self,
        records: &[Record],
        columns: &[MetadataColumn],
    ) -> Result<usize> {
        let documents = self.embed_records(records, columns).await?;
        let added = documents.len();
        self.store.replace_documents(documents).await?;
        tracing::debug!("Indexed {} documents into {}", added, self.table_name());
        Ok(added)
    }

    pub async fn find_content(
        &self,
        query: &str,
        top_k: usize,
        filter: &Metadata,
    ) -> Result<Vec<SearchHit>> {
        let mut embeddings = self.embedder.embed(&[query.to_string()]).await?;
        let query_vector = embeddings.pop().ok_or_else(|| ServiceError::EmbeddingError {
            message: "embedder returned no vector for the query".to_string(),
        })?;
        self.store.search(&query_vector, top_k, filter).await
    }
}
