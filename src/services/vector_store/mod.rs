//! Vector store abstraction layer.
//!
//! The pipeline only ever needs four things from a store: its schema, a
//! cursor-paginated list of ids, an idempotent batch write and a point count.
//! Backends (Qdrant, PostgreSQL/pgvector) are selected from configuration.

mod pgvector;
mod qdrant;

pub use pgvector::PgVectorBackend;
pub use qdrant::QdrantBackend;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::VectorStoreError;
use crate::models::{ValidatedVectorRecord, VectorDriver, VectorStoreConfig};

/// Payload and column name that carries the listing identifier.
pub const ID_FIELD: &str = "property_id";

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn health_check(&self) -> Result<(), VectorStoreError>;

    /// Create the collection/table and its indexes if missing.
    async fn ensure_schema(&self) -> Result<(), VectorStoreError>;

    /// Up to `limit` ids strictly after `after`, in the store's stable id
    /// order. A page shorter than `limit` is the last one.
    async fn fetch_id_page(
        &self,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<String>, VectorStoreError>;

    /// Insert-or-replace keyed by property id. Returns the number written.
    async fn upsert_batch(
        &self,
        records: Vec<ValidatedVectorRecord>,
    ) -> Result<u64, VectorStoreError>;

    /// Total number of indexed points.
    async fn stats(&self) -> Result<u64, VectorStoreError>;

    async fn close(&self);

    fn collection(&self) -> &str;
}

/// Open the configured backend and verify it is reachable.
pub async fn create_backend(
    config: &VectorStoreConfig,
    dimension: u64,
) -> Result<Arc<dyn VectorStore>, VectorStoreError> {
    let store: Arc<dyn VectorStore> = match config.driver {
        VectorDriver::Qdrant => Arc::new(QdrantBackend::new(config, dimension)?),
        VectorDriver::PostgreSQL => Arc::new(PgVectorBackend::new(config, dimension).await?),
    };

    store
        .health_check()
        .await
        .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

    tracing::info!(
        driver = %config.driver,
        collection = store.collection(),
        dimension,
        "vector store connected"
    );
    Ok(store)
}
