use crate::core::refresh::RefreshEngine;
use crate::core::sources::{parse_csv, CodeSource};
use crate::core::vector_index::VectorIndex;
use crate::domain::model::{Metadata, MetadataColumn, SearchHit, TransformResult};
use crate::domain::ports::{Pipeline, SystemStore};
use crate::utils::error::{Result, ServiceError};
use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Where a refresh reads its payload from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataInput {
    /// The source's WITS endpoint.
    Api,
    /// A CSV export with a header row.
    CsvFile(PathBuf),
}

#[derive(Debug, Default)]
struct RepoState {
    connected: bool,
    metadata_columns: Option<Vec<MetadataColumn>>,
}

/// A code table searchable by description, refreshed from WITS.
pub struct VectorRepo<S: CodeSource> {
    source: S,
    system_store: Arc<dyn SystemStore>,
    index: VectorIndex,
    client: Client,
    base_url: String,
    state: Mutex<RepoState>,
}

impl<S: CodeSource> VectorRepo<S> {
    pub fn new(
        source: S,
        system_store: Arc<dyn SystemStore>,
        index: VectorIndex,
        client: Client,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            source,
            system_store,
            index,
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            state: Mutex::new(RepoState::default()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn table_name(&self) -> &str {
        self.index.table_name()
    }

    pub fn api_url(&self) -> String {
        format!("{}{}", self.base_url, self.source.api_path())
    }

    /// Connects both stores once.
    pub async fn connect(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.connect_locked(&mut state).await
    }

    async fn connect_locked(&self, state: &mut RepoState) -> Result<()> {
        if !state.connected {
            self.system_store.connect().await?;
            self.index.connect().await?;
            state.connected = true;
            tracing::debug!("{} repository connected ({})", self.source.name(), self.table_name());
        }
        Ok(())
    }

    async fn ensure_initialized(&self) -> Result<Vec<MetadataColumn>> {
        let mut state = self.state.lock().await;
        self.connect_locked(&mut state).await?;

        if let Some(columns) = &state.metadata_columns {
            return Ok(columns.clone());
        }

        let columns = match self.system_store.get_item(self.source.metadata_key()).await? {
            Some(value) => serde_json::from_value::<Vec<MetadataColumn>>(value)?,
            None => {
                tracing::warn!(
                    "No '{}' entry in the system store; has {} been refreshed?",
                    self.source.metadata_key(),
                    self.source.name()
                );
                Vec::new()
            }
        };
        state.metadata_columns = Some(columns.clone());
        Ok(columns)
    }

    /// Column list recorded by the last refresh, empty when none is recorded.
    pub async fn metadata_columns(&self) -> Result<Vec<MetadataColumn>> {
        self.ensure_initialized().await
    }

    pub async fn find_items(
        &self,
        query: &str,
        top_k: usize,
        filter: &Metadata,
    ) -> Result<Vec<SearchHit>> {
        self.ensure_initialized().await?;
        let hits = self.index.find_content(query, top_k, filter).await?;
        tracing::debug!(
            "{} search '{}' returned {} hits",
            self.source.name(),
            query,
            hits.len()
        );
        Ok(hits)
    }

    /// Replaces the table's content with `input` and records its columns.
    pub async fn refresh(&self, input: DataInput) -> Result<usize> {
        self.connect().await?;
        tracing::info!("Refreshing {} from {:?}", self.source.name(), input);
        RefreshEngine::new(RefreshPipeline { repo: self, input })
            .run()
            .await
    }

    pub async fn drop_table(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.connect_locked(&mut state).await?;
        self.index.drop_table().await?;
        self.system_store.delete_item(self.source.metadata_key()).await?;
        state.metadata_columns = None;
        // The vector table is gone; the next use re-creates it.
        state.connected = false;
        tracing::info!("{} table '{}' dropped", self.source.name(), self.table_name());
        Ok(())
    }

    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        self.index.close().await;
        self.system_store.close().await;
        *state = RepoState::default();
    }
}

struct RefreshPipeline<'a, S: CodeSource> {
    repo: &'a VectorRepo<S>,
    input: DataInput,
}

#[async_trait]
impl<S: CodeSource> Pipeline for RefreshPipeline<'_, S> {
    async fn extract(&self) -> Result<String> {
        match &self.input {
            DataInput::Api => {
                let url = self.repo.api_url();
                tracing::debug!("Making API request to: {}", url);
                let response = self.repo.client.get(&url).send().await?;
                tracing::debug!("API response status: {}", response.status());

                if !response.status().is_success() {
                    return Err(ServiceError::UpstreamStatusError {
                        url,
                        status: response.status().as_u16(),
                    });
                }
                Ok(response.text().await?)
            }
            DataInput::CsvFile(path) => Ok(tokio::fs::read_to_string(path).await?),
        }
    }

    async fn transform(&self, raw: String) -> Result<TransformResult> {
        let source = &self.repo.source;
        let result = match self.input {
            DataInput::Api => source.parse_response(&raw)?,
            DataInput::CsvFile(_) => parse_csv(&raw)?,
        };

        if result.records.is_empty() {
            return Err(ServiceError::processing(format!(
                "no {} records found in the payload",
                source.name()
            )));
        }
        if !result
            .columns
            .iter()
            .any(|column| column.name == source.content_column())
        {
            return Err(ServiceError::processing(format!(
                "{} payload has no '{}' column",
                source.name(),
                source.content_column()
            )));
        }
        Ok(result)
    }

    async fn load(&self, result: TransformResult) -> Result<usize> {
        let repo = self.repo;
        let mut state = repo.state.lock().await;

        let added = repo
            .index
            .replace_records(&result.records, &result.columns)
            .await?;

        let value = serde_json::to_value(&result.columns)?;
        repo.system_store
            .upsert_item(repo.source.metadata_key(), &value)
            .await?;
        state.metadata_columns = Some(result.columns);

        Ok(added)
    }
}
