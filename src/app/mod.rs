//! Builds the tariff service from configuration.

use crate::adapters::embedding::{HashingEmbedder, TeiEmbedder};
use crate::adapters::memory::{MemorySystemStore, MemoryVectorStore};
use crate::adapters::postgres::{PgSettings, PgSystemStore, PgVectorStore};
use crate::config::{AppConfig, EmbeddingProvider, StorageBackend};
use crate::core::sources::{CodeSource, CountryCodeSource, HsCodeSource};
use crate::core::wits::WitsClient;
use crate::core::wto::WtoClient;
use crate::core::{TariffService, VectorIndex, VectorRepo};
use crate::domain::ports::{Embedder, SystemStore, VectorStore};
use crate::utils::error::Result;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

pub fn http_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(concat!("air-supply/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

pub fn build_embedder(config: &AppConfig) -> Result<Arc<dyn Embedder>> {
    let dimension = config.vector_store.vector_size;
    Ok(match config.embedding.provider {
        EmbeddingProvider::Hashing => Arc::new(HashingEmbedder::new(dimension)),
        EmbeddingProvider::Tei => Arc::new(TeiEmbedder::new(
            http_client(config.embedding_timeout())?,
            config.embedding.endpoint.clone(),
            dimension,
        )),
    })
}

pub fn build_system_store(config: &AppConfig) -> Result<Arc<dyn SystemStore>> {
    let table = config.database.system_table.clone();
    Ok(match config.database.backend {
        StorageBackend::Postgres => Arc::new(PgSystemStore::new(pg_settings(config)?, table)?),
        StorageBackend::Memory => Arc::new(MemorySystemStore::new(table)),
    })
}

pub fn build_vector_store(config: &AppConfig, table: &str) -> Result<Arc<dyn VectorStore>> {
    Ok(match config.database.backend {
        StorageBackend::Postgres => Arc::new(PgVectorStore::new(
            pg_settings(config)?,
            table,
            config.vector_store.vector_size,
        )?),
        StorageBackend::Memory => Arc::new(MemoryVectorStore::new(table)),
    })
}

fn pg_settings(config: &AppConfig) -> Result<PgSettings> {
    Ok(PgSettings::new(config.database_url()?, &config.database))
}

fn code_repo<S: CodeSource>(
    config: &AppConfig,
    source: S,
    table: &str,
    system_store: Arc<dyn SystemStore>,
    embedder: Arc<dyn Embedder>,
    client: Client,
) -> Result<Arc<VectorRepo<S>>> {
    let index = VectorIndex::new(
        build_vector_store(config, table)?,
        embedder,
        source.content_column(),
    );
    Ok(Arc::new(VectorRepo::new(
        source,
        system_store,
        index,
        client,
        config.wits.base_url.clone(),
    )))
}

/// Wires stores, embedder and upstream clients without connecting anything.
pub fn build_tariff_service(config: &AppConfig) -> Result<TariffService> {
    let system_store = build_system_store(config)?;
    let embedder = build_embedder(config)?;
    let wits_client = http_client(config.wits_timeout())?;

    let hs_codes = code_repo(
        config,
        HsCodeSource,
        &config.vector_store.hs_code_table,
        system_store.clone(),
        embedder.clone(),
        wits_client.clone(),
    )?;
    let countries = code_repo(
        config,
        CountryCodeSource,
        &config.vector_store.country_code_table,
        system_store,
        embedder,
        wits_client.clone(),
    )?;

    let wto = match config.wto_api_key() {
        Some(key) => Some(WtoClient::new(
            http_client(config.wto_timeout())?,
            config.wto.base_url.clone(),
            key,
        )),
        None => {
            tracing::info!("No WTO API key configured; WTO cross-check disabled");
            None
        }
    };

    Ok(TariffService::new(
        hs_codes,
        countries,
        WitsClient::new(wits_client, config.wits.base_url.clone()),
        wto,
    ))
}

/// Builds the service and connects its stores.
pub async fn connect_tariff_service(config: &AppConfig) -> Result<TariffService> {
    let service = build_tariff_service(config)?;
    service.connect().await?;
    tracing::info!(
        "Tariff service ready ({:?} backend, {:?} embeddings)",
        config.database.backend,
        config.embedding.provider
    );
    Ok(service)
}
