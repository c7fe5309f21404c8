//! Error types for the indexing pipeline.

use thiserror::Error;

use crate::models::{FailedRecord, FailureKind};
use crate::utils::retry::Retryable;

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to connect to embedding provider: {0}")]
    ConnectionError(String),

    #[error("embedding provider error: {0}")]
    ServerError(String),

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding timeout")]
    Timeout,
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::ConnectionError(_) | EmbeddingError::Timeout => true,
            // 5xx and throttling from the provider are usually transient
            EmbeddingError::ServerError(msg) => {
                msg.contains("503")
                    || msg.contains("502")
                    || msg.contains("504")
                    || msg.contains("429")
                    || msg.to_lowercase().contains("unavailable")
            }
            EmbeddingError::RequestError(e) => e.is_timeout() || e.is_connect(),
            EmbeddingError::InvalidResponse(_) => false,
        }
    }
}

/// Errors related to vector store operations.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("failed to connect to vector store: {0}")]
    ConnectionError(String),

    #[error("collection error: {0}")]
    CollectionError(String),

    #[error("upsert error: {0}")]
    UpsertError(String),

    #[error("query error: {0}")]
    QueryError(String),

    #[error("PostgreSQL error: {0}")]
    PostgresError(String),

    #[error("pgvector extension error: {0}")]
    PgVectorExtensionError(String),
}

impl Retryable for VectorStoreError {
    fn is_retryable(&self) -> bool {
        match self {
            VectorStoreError::ConnectionError(_) => true,
            VectorStoreError::PgVectorExtensionError(_) => false,
            VectorStoreError::CollectionError(msg)
            | VectorStoreError::UpsertError(msg)
            | VectorStoreError::QueryError(msg)
            | VectorStoreError::PostgresError(msg) => {
                let msg_lower = msg.to_lowercase();
                msg_lower.contains("timeout")
                    || msg_lower.contains("connection")
                    || msg_lower.contains("unavailable")
                    || msg_lower.contains("too many")
            }
        }
    }
}

/// Errors raised by the analytical (candidate) store.
#[derive(Debug, Error)]
pub enum CandidateError {
    #[error("failed to connect to analytical store: {0}")]
    ConnectionError(String),

    #[error("candidate query failed: {0}")]
    QueryError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("malformed candidate at line {line}: {message}")]
    ParseError { line: usize, message: String },
}

impl Retryable for CandidateError {
    fn is_retryable(&self) -> bool {
        match self {
            CandidateError::ConnectionError(_) => true,
            CandidateError::QueryError(msg) => {
                let msg_lower = msg.to_lowercase();
                msg_lower.contains("timeout") || msg_lower.contains("connection")
            }
            CandidateError::IoError(_) | CandidateError::ParseError { .. } => false,
        }
    }
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// A single field that failed a schema constraint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {constraint}")]
pub struct ValidationError {
    pub field: &'static str,
    pub constraint: String,
}

impl ValidationError {
    pub fn new(field: &'static str, constraint: impl Into<String>) -> Self {
        Self {
            field,
            constraint: constraint.into(),
        }
    }
}

/// Failures that abort a pipeline run. No summary is produced.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("embedding provider unavailable: {0}")]
    EmbeddingUnavailable(#[source] EmbeddingError),

    #[error("vector store unavailable: {0}")]
    VectorStoreUnavailable(#[source] VectorStoreError),

    #[error("analytical store unavailable: {0}")]
    CandidateStoreUnavailable(#[source] CandidateError),

    #[error("failed to enumerate indexed ids: {0}")]
    Dedup(#[source] VectorStoreError),

    #[error("failed to fetch candidates: {0}")]
    Fetch(#[source] CandidateError),
}

/// Failures scoped to a record or a write batch. These are accumulated into
/// the run summary and never propagate past their stage.
#[derive(Debug, Error)]
pub enum RecoverableError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("upsert failed: {0}")]
    Upsert(String),
}

impl RecoverableError {
    pub fn into_failed_record(self, id: impl Into<String>) -> FailedRecord {
        let kind = match self {
            RecoverableError::Validation(_) => FailureKind::Validation,
            RecoverableError::Upsert(_) => FailureKind::Upsert,
        };
        FailedRecord {
            id: id.into(),
            reason: self.to_string(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::new("area_sqm", "9 is below minimum 10");
        assert_eq!(err.to_string(), "area_sqm: 9 is below minimum 10");
    }

    #[test]
    fn test_recoverable_into_failed_record() {
        let failed = RecoverableError::Upsert("connection reset".to_string())
            .into_failed_record("aqarmap_48da83f859986cdb");
        assert_eq!(failed.id, "aqarmap_48da83f859986cdb");
        assert_eq!(failed.kind, FailureKind::Upsert);
        assert_eq!(failed.reason, "upsert failed: connection reset");

        let failed = RecoverableError::from(ValidationError::new("title", "too short"))
            .into_failed_record("bayut_0000000000000001");
        assert_eq!(failed.kind, FailureKind::Validation);
        assert_eq!(failed.reason, "title: too short");
    }

    #[test]
    fn test_vector_store_error_retryable() {
        assert!(VectorStoreError::ConnectionError("refused".into()).is_retryable());
        assert!(VectorStoreError::QueryError("request timeout".into()).is_retryable());
        assert!(!VectorStoreError::UpsertError("bad vector".into()).is_retryable());
        assert!(!VectorStoreError::PgVectorExtensionError("missing".into()).is_retryable());
    }
}
