mod config;
mod format;
mod record;
mod summary;

pub use config::{
    AnalyticsConfig, AnalyticsDriver, Config, ConfigSource, DEFAULT_COLLECTION,
    DEFAULT_EMBEDDING_DIMENSION, DEFAULT_EMBEDDING_MODEL, DEFAULT_EMBEDDING_URL,
    DEFAULT_QDRANT_URL, EmbeddingConfig, LoggingConfig, PipelineConfig, RegionBounds,
    ResolvedConfig, VectorDriver, VectorStoreConfig,
};
pub use format::OutputFormat;
pub use record::{CandidateRecord, EnrichedRecord, ValidatedVectorRecord};
pub use summary::{FailedRecord, FailureKind, RunOutcome, RunSummary, Stage};
