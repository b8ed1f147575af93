#[cfg(feature = "cli")]
pub mod cli;

use crate::utils::error::{Result, ServiceError};
use crate::utils::validation::{
    validate_identifier, validate_non_empty_string, validate_positive_number, validate_range,
    validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "air-supply.toml";

static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("static pattern"));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub vector_store: VectorStoreConfig,
    pub embedding: EmbeddingConfig,
    pub wits: WitsConfig,
    pub wto: WtoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub system_table: String,
    pub pool_min_size: u32,
    pub pool_max_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Postgres,
            host: "localhost".to_string(),
            port: 5432,
            user: "air_supply_user".to_string(),
            password: "air_supply_password".to_string(),
            database: "air_supply_db".to_string(),
            system_table: "air_supply_system_table".to_string(),
            pool_min_size: 1,
            pool_max_size: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub vector_size: usize,
    pub hs_code_table: String,
    pub country_code_table: String,
    pub hs_code_file: String,
    pub country_code_file: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            vector_size: 384,
            hs_code_table: "hs_code_table".to_string(),
            country_code_table: "country_code_table".to_string(),
            hs_code_file: "data/hs_code.csv".to_string(),
            country_code_file: "data/country_code.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Feature hashing, no external service.
    Hashing,
    /// Hugging Face text-embeddings-inference server.
    Tei,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub endpoint: String,
    pub timeout_seconds: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Hashing,
            endpoint: "http://localhost:8080/embed".to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WitsConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for WitsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://wits.worldbank.org/API/V1".to_string(),
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WtoConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for WtoConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.wto.org/timeseries/v1".to_string(),
            api_key: None,
            timeout_seconds: 10,
        }
    }
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ServiceError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| ServiceError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// An explicit path must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH),
            None => {
                tracing::info!(
                    "No {} found, using built-in defaults",
                    DEFAULT_CONFIG_PATH
                );
                Ok(Self::default())
            }
        }
    }

    /// 替換環境變數 (例如 ${WTO_API_KEY})
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_PATTERN
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn database_url(&self) -> Result<String> {
        let db = &self.database;
        let mut url = Url::parse(&format!("postgres://{}:{}/{}", db.host, db.port, db.database))
            .map_err(|e| ServiceError::InvalidConfigValueError {
                field: "database.host".to_string(),
                value: db.host.clone(),
                reason: e.to_string(),
            })?;
        url.set_username(&db.user)
            .and_then(|_| url.set_password(Some(&db.password)))
            .map_err(|_| ServiceError::config("database credentials cannot be encoded in a URL"))?;
        Ok(url.into())
    }

    /// `None` when the key is blank or its `${VAR}` placeholder was not resolved.
    pub fn wto_api_key(&self) -> Option<&str> {
        self.wto
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty() && !ENV_VAR_PATTERN.is_match(key))
    }

    pub fn wits_timeout(&self) -> Duration {
        Duration::from_secs(self.wits.timeout_seconds)
    }

    pub fn wto_timeout(&self) -> Duration {
        Duration::from_secs(self.wto.timeout_seconds)
    }

    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding.timeout_seconds)
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("server.host", &self.server.host)?;
        validate_positive_number("server.port", self.server.port as usize, 1)?;

        if self.database.backend == StorageBackend::Postgres {
            validate_non_empty_string("database.host", &self.database.host)?;
            validate_non_empty_string("database.user", &self.database.user)?;
            validate_non_empty_string("database.database", &self.database.database)?;
            validate_positive_number("database.pool_max_size", self.database.pool_max_size as usize, 1)?;
            validate_range(
                "database.pool_min_size",
                self.database.pool_min_size,
                1,
                self.database.pool_max_size,
            )?;
        }
        validate_identifier("database.system_table", &self.database.system_table)?;
        validate_identifier("vector_store.hs_code_table", &self.vector_store.hs_code_table)?;
        validate_identifier(
            "vector_store.country_code_table",
            &self.vector_store.country_code_table,
        )?;
        if self.vector_store.hs_code_table == self.vector_store.country_code_table {
            return Err(ServiceError::ConfigValidationError {
                field: "vector_store.country_code_table".to_string(),
                message: "HS code and country code tables must differ".to_string(),
            });
        }
        validate_range("vector_store.vector_size", self.vector_store.vector_size, 1, 4096)?;

        if self.embedding.provider == EmbeddingProvider::Tei {
            validate_url("embedding.endpoint", &self.embedding.endpoint)?;
        }
        validate_url("wits.base_url", &self.wits.base_url)?;
        validate_url("wto.base_url", &self.wto.base_url)?;
        validate_positive_number("wits.timeout_seconds", self.wits.timeout_seconds as usize, 1)?;
        validate_positive_number("wto.timeout_seconds", self.wto.timeout_seconds as usize, 1)?;

        Ok(())
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
