use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const DEFAULT_EMBEDDING_URL: &str = "http://localhost:11434";
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 768;
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_COLLECTION: &str = "real_estate_vectors";
pub const DEFAULT_ANALYTICS_URL: &str = "postgres://localhost:5432/real_estate";
pub const DEFAULT_MART_TABLE: &str = "property_mart";

const APP_DIR: &str = "estate-indexer";
const PROJECT_FILE: &str = "estate-indexer.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub analytics: AnalyticsConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub region: RegionBounds,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where a loaded configuration came from.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    Explicit(PathBuf),
    Project(PathBuf),
    Global(PathBuf),
    Defaults,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Explicit(p) | ConfigSource::Project(p) | ConfigSource::Global(p) => {
                write!(f, "{}", p.display())
            }
            ConfigSource::Defaults => write!(f, "built-in defaults"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: Config,
    pub source: ConfigSource,
}

impl Config {
    pub fn global_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR).join("config.toml"))
    }

    pub fn project_path() -> Option<PathBuf> {
        std::env::current_dir().ok().map(|p| p.join(PROJECT_FILE))
    }

    /// Resolve configuration: explicit path, project file, global file, defaults.
    /// Environment overrides are applied on top and the result is validated.
    pub fn load(explicit: Option<&Path>) -> Result<ResolvedConfig, ConfigError> {
        let (mut config, source) = if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::PathError(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            (
                Self::from_file(path)?,
                ConfigSource::Explicit(path.to_path_buf()),
            )
        } else if let Some(path) = Self::project_path()
            && path.exists()
        {
            (Self::from_file(&path)?, ConfigSource::Project(path))
        } else if let Some(path) = Self::global_path()
            && path.exists()
        {
            (Self::from_file(&path)?, ConfigSource::Global(path))
        } else {
            (Self::default(), ConfigSource::Defaults)
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(ResolvedConfig { config, source })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Write the default configuration to `path`, creating parent directories.
    pub fn write_default(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(&Self::default())?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("ESTATE_EMBEDDING_URL") {
            self.embedding.url = url;
        }
        if let Some(model) = lookup("ESTATE_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(url) = lookup("ESTATE_VECTOR_URL") {
            self.vector_store.url = url;
        }
        if let Some(key) = lookup("ESTATE_VECTOR_API_KEY") {
            self.vector_store.api_key = Some(key);
        }
        if let Some(url) = lookup("ESTATE_ANALYTICS_URL") {
            self.analytics.url = url;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.pipeline;
        if p.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.batch_size must be greater than 0".to_string(),
            ));
        }
        if p.max_parallel_embeddings == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.max_parallel_embeddings must be greater than 0".to_string(),
            ));
        }
        if p.page_size == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.page_size must be greater than 0".to_string(),
            ));
        }
        if p.embedding_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.embedding_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.vector_store.timeout_secs == 0 || self.analytics.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "store timeouts must be greater than 0".to_string(),
            ));
        }
        if self.embedding.dimension == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.dimension must be greater than 0".to_string(),
            ));
        }
        let r = &self.region;
        if r.min_latitude >= r.max_latitude || r.min_longitude >= r.max_longitude {
            return Err(ConfigError::ValidationError(
                "region bounds are inverted".to_string(),
            ));
        }
        if self.analytics.driver == AnalyticsDriver::Jsonl && self.analytics.path.is_none() {
            return Err(ConfigError::ValidationError(
                "analytics.path is required for the jsonl driver".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_url")]
    pub url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_dimension")]
    pub dimension: u32,

    /// Upper bound for any single HTTP exchange with the provider.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

fn default_embedding_url() -> String {
    DEFAULT_EMBEDDING_URL.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_dimension() -> u32 {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_request_timeout() -> u64 {
    120
}

fn default_max_input_chars() -> usize {
    1000
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            model: default_embedding_model(),
            dimension: default_dimension(),
            request_timeout_secs: default_request_timeout(),
            max_input_chars: default_max_input_chars(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorDriver {
    #[default]
    Qdrant,
    #[serde(alias = "postgres", alias = "pgvector")]
    PostgreSQL,
}

impl fmt::Display for VectorDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VectorDriver::Qdrant => write!(f, "qdrant"),
            VectorDriver::PostgreSQL => write!(f, "postgresql"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub driver: VectorDriver,

    #[serde(default = "default_qdrant_url")]
    pub url: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// PostgreSQL schema for the vector table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(default = "default_pool_max")]
    pub pool_max: u32,

    #[serde(default = "default_pool_acquire_timeout")]
    pub pool_acquire_timeout: u32,

    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

fn default_qdrant_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_pool_max() -> u32 {
    5
}

fn default_pool_acquire_timeout() -> u32 {
    30
}

fn default_store_timeout() -> u64 {
    60
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            driver: VectorDriver::default(),
            url: default_qdrant_url(),
            collection: default_collection(),
            api_key: None,
            schema: None,
            pool_max: default_pool_max(),
            pool_acquire_timeout: default_pool_acquire_timeout(),
            timeout_secs: default_store_timeout(),
        }
    }
}

impl VectorStoreConfig {
    /// Collection name scoped to the embedding model and dimension, so that
    /// switching models never mixes incompatible vectors.
    pub fn collection_for(&self, model: &str, dimension: u64) -> String {
        let model: String = model
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        format!("{}_{}_{}", self.collection, model, dimension)
    }

    pub fn qualified_table_name(&self, collection: &str) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, collection),
            None => collection.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyticsDriver {
    #[default]
    Postgres,
    Jsonl,
}

impl fmt::Display for AnalyticsDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalyticsDriver::Postgres => write!(f, "postgres"),
            AnalyticsDriver::Jsonl => write!(f, "jsonl"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default)]
    pub driver: AnalyticsDriver,

    #[serde(default = "default_analytics_url")]
    pub url: String,

    #[serde(default = "default_mart_table")]
    pub table: String,

    /// Export file for the jsonl driver.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    #[serde(default = "default_min_price")]
    pub min_price: f64,

    #[serde(default = "default_min_area")]
    pub min_area: f64,

    #[serde(default = "default_pool_max")]
    pub pool_max: u32,

    /// Bounds both connection acquisition and each statement.
    #[serde(default = "default_analytics_timeout")]
    pub timeout_secs: u64,
}

fn default_analytics_url() -> String {
    DEFAULT_ANALYTICS_URL.to_string()
}

fn default_mart_table() -> String {
    DEFAULT_MART_TABLE.to_string()
}

fn default_min_price() -> f64 {
    1000.0
}

fn default_min_area() -> f64 {
    9.0
}

fn default_analytics_timeout() -> u64 {
    30
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            driver: AnalyticsDriver::default(),
            url: default_analytics_url(),
            table: default_mart_table(),
            path: None,
            min_price: default_min_price(),
            min_area: default_min_area(),
            pool_max: default_pool_max(),
            timeout_secs: default_analytics_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_max_parallel")]
    pub max_parallel_embeddings: usize,

    #[serde(default = "default_embedding_timeout")]
    pub embedding_timeout_secs: u64,

    #[serde(default = "default_page_size")]
    pub page_size: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

fn default_batch_size() -> usize {
    100
}

fn default_max_parallel() -> usize {
    2
}

fn default_embedding_timeout() -> u64 {
    60
}

fn default_page_size() -> usize {
    10_000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_parallel_embeddings: default_max_parallel(),
            embedding_timeout_secs: default_embedding_timeout(),
            page_size: default_page_size(),
            limit: None,
        }
    }
}

/// Geographic bounding box of the service region (Egypt by default).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionBounds {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl Default for RegionBounds {
    fn default() -> Self {
        Self {
            min_latitude: 22.0,
            max_latitude: 32.0,
            min_longitude: 25.0,
            max_longitude: 37.0,
        }
    }
}

impl RegionBounds {
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&latitude)
            && (self.min_longitude..=self.max_longitude).contains(&longitude)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for run artifacts such as `validation_failures.json`.
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,

    #[serde(default)]
    pub json: bool,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            json: false,
        }
    }
}
