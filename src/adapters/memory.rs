//! In-process stores for `backend = "memory"` and tests.

use crate::core::vector_index::rank_documents;
use crate::domain::model::{Document, Metadata, SearchHit};
use crate::domain::ports::{SystemStore, VectorStore};
use crate::utils::error::{Result, ServiceError};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// `None` while the table does not exist.
#[derive(Debug)]
struct Table<T> {
    connected: bool,
    rows: Option<T>,
}

impl<T: Default> Table<T> {
    fn new() -> Self {
        Self {
            connected: false,
            rows: None,
        }
    }

    fn connect(&mut self) {
        self.connected = true;
        self.rows.get_or_insert_with(T::default);
    }

    fn rows(&self, component: &str, name: &str) -> Result<&T> {
        if !self.connected {
            return Err(ServiceError::not_initialized(component));
        }
        self.rows
            .as_ref()
            .ok_or_else(|| ServiceError::not_initialized(format!("Table '{}'", name)))
    }

    fn rows_mut(&mut self, component: &str, name: &str) -> Result<&mut T> {
        if !self.connected {
            return Err(ServiceError::not_initialized(component));
        }
        self.rows
            .as_mut()
            .ok_or_else(|| ServiceError::not_initialized(format!("Table '{}'", name)))
    }
}

#[derive(Debug)]
pub struct MemorySystemStore {
    name: String,
    table: RwLock<Table<HashMap<String, serde_json::Value>>>,
}

impl MemorySystemStore {
    const COMPONENT: &'static str = "System store";

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: RwLock::new(Table::new()),
        }
    }
}

#[async_trait]
impl SystemStore for MemorySystemStore {
    async fn connect(&self) -> Result<()> {
        self.table.write().await.connect();
        Ok(())
    }

    async fn drop_table(&self) -> Result<()> {
        let mut table = self.table.write().await;
        if !table.connected {
            return Err(ServiceError::not_initialized(Self::COMPONENT));
        }
        table.rows = None;
        tracing::info!("Table '{}' dropped", self.name);
        Ok(())
    }

    async fn close(&self) {
        self.table.write().await.connected = false;
    }

    async fn add_item(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let mut table = self.table.write().await;
        let rows = table.rows_mut(Self::COMPONENT, &self.name)?;
        if rows.contains_key(key) {
            return Err(ServiceError::DuplicateKey {
                key: key.to_string(),
            });
        }
        rows.insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn upsert_item(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let mut table = self.table.write().await;
        table
            .rows_mut(Self::COMPONENT, &self.name)?
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn get_item(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let table = self.table.read().await;
        Ok(table.rows(Self::COMPONENT, &self.name)?.get(key).cloned())
    }

    async fn delete_item(&self, key: &str) -> Result<()> {
        let mut table = self.table.write().await;
        table.rows_mut(Self::COMPONENT, &self.name)?.remove(key);
        Ok(())
    }
}

#[derive(Debug)]
pub struct MemoryVectorStore {
    name: String,
    table: RwLock<Table<Vec<Document>>>,
}

impl MemoryVectorStore {
    const COMPONENT: &'static str = "Vector store";

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: RwLock::new(Table::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.table
            .read()
            .await
            .rows
            .as_ref()
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    fn table_name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> Result<()> {
        self.table.write().await.connect();
        Ok(())
    }

    async fn truncate(&self) -> Result<()> {
        let mut table = self.table.write().await;
        if !table.connected {
            return Err(ServiceError::not_initialized(Self::COMPONENT));
        }
        table.rows = Some(Vec::new());
        Ok(())
    }

    async fn add_documents(&self, documents: Vec<Document>) -> Result<()> {
        let mut table = self.table.write().await;
        table
            .rows_mut(Self::COMPONENT, &self.name)?
            .extend(documents);
        Ok(())
    }

    async fn replace_documents(&self, documents: Vec<Document>) -> Result<()> {
        let mut table = self.table.write().await;
        if !table.connected {
            return Err(ServiceError::not_initialized(Self::COMPONENT));
        }
        table.rows = Some(documents);
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        filter: &Metadata,
    ) -> Result<Vec<SearchHit>> {
        let table = self.table.read().await;
        let rows = table.rows(Self::COMPONENT, &self.name)?;
        Ok(rank_documents(
            query,
            top_k,
            filter,
            rows.iter()
                .map(|doc| (doc.content.as_str(), &doc.metadata, doc.embedding.as_slice())),
        ))
    }

    async fn drop_table(&self) -> Result<()> {
        let mut table = self.table.write().await;
        if !table.connected {
            return Err(ServiceError::not_initialized(Self::COMPONENT));
        }
        table.rows = None;
        Ok(())
    }

    async fn close(&self) {
        self.table.write().await.connected = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_operations_require_connect() {
        let store = MemorySystemStore::new("settings");
        let result = store.get_item("anything").await;
        assert!(matches!(result, Err(ServiceError::NotInitialized { .. })));
    }

    #[tokio::test]
    async fn test_drop_then_use_fails_until_reconnect() {
        let store = MemorySystemStore::new("settings");
        store.connect().await.unwrap();
        store.upsert_item("k", &json!(1)).await.unwrap();

        store.drop_table().await.unwrap();
        assert!(store.get_item("k").await.is_err());

        store.connect().await.unwrap();
        assert_eq!(store.get_item("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_vector_store_truncate_keeps_table() {
        let store = MemoryVectorStore::new("vectors");
        store.connect().await.unwrap();
        store
            .add_documents(vec![Document {
                content: "Brazil".to_string(),
                metadata: Metadata::new(),
                embedding: vec![1.0, 0.0],
            }])
            .await
            .unwrap();
        assert_eq!(store.len().await, 1);

        store.truncate().await.unwrap();
        assert_eq!(store.len().await, 0);
        assert!(store
            .search(&[1.0, 0.0], 3, &Metadata::new())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_vector_store_replace_recreates_dropped_table() {
        let store = MemoryVectorStore::new("vectors");
        store.connect().await.unwrap();
        store.drop_table().await.unwrap();

        store
            .replace_documents(vec![Document {
                content: "Iraq".to_string(),
                metadata: Metadata::new(),
                embedding: vec![0.0, 1.0],
            }])
            .await
            .unwrap();
        assert_eq!(store.len().await, 1);
    }
}
