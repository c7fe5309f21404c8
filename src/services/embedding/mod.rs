//! Embedding service: single and batched encoding with bounded parallelism.
//!
//! The service owns the active dimension. It is learned once in
//! [`EmbeddingService::connect`] by probing the provider, so every vector the
//! pipeline sees (including zero-vector fallbacks) has the same length.

mod ollama;

pub use ollama::OllamaBackend;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::error::EmbeddingError;
use crate::models::EmbeddingConfig;
use crate::utils::{RetryPolicy, with_retry};

const SAMPLE_TEXT: &str = "dimension check";

/// Default per-item timeout for [`EmbeddingService::encode_batch`].
pub const DEFAULT_ITEM_TIMEOUT: Duration = Duration::from_secs(60);

/// What the provider reported during its health check.
#[derive(Debug, Clone, Default)]
pub struct ProviderHealth {
    pub models: Vec<String>,
}

impl ProviderHealth {
    /// Ollama reports tagged names (`nomic-embed-text:latest`), so an untagged
    /// model matches any tag.
    pub fn has_model(&self, model: &str) -> bool {
        self.models.iter().any(|name| {
            name == model
                || name
                    .strip_prefix(model)
                    .is_some_and(|rest| rest.starts_with(':'))
        })
    }
}

/// Transport to an embedding provider. One text per request.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    async fn health_check(&self) -> Result<ProviderHealth, EmbeddingError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    fn model(&self) -> &str;
}

pub struct EmbeddingService {
    backend: Arc<dyn EmbeddingBackend>,
    dimension: usize,
    max_input_chars: usize,
    item_timeout: Duration,
}

impl EmbeddingService {
    /// Health-check the provider and learn the dimension it actually emits.
    ///
    /// Fails if the provider cannot be reached or cannot produce a sample
    /// embedding. A missing model or a dimension that differs from the
    /// configured one only logs a warning.
    pub async fn connect(
        backend: Arc<dyn EmbeddingBackend>,
        config: &EmbeddingConfig,
    ) -> Result<Self, EmbeddingError> {
        let health = with_retry(&RetryPolicy::default(), "embedding health check", || {
            backend.health_check()
        })
        .await?;
        if !health.has_model(backend.model()) {
            tracing::warn!(
                model = backend.model(),
                available = ?health.models,
                "configured embedding model not listed by provider"
            );
        }

        let sample = backend.embed(SAMPLE_TEXT).await?;
        if sample.is_empty() {
            return Err(EmbeddingError::InvalidResponse(
                "sample embedding is empty".to_string(),
            ));
        }

        let configured = config.dimension as usize;
        let dimension = if sample.len() != configured {
            tracing::warn!(
                configured,
                actual = sample.len(),
                "embedding dimension mismatch, adopting provider dimension"
            );
            sample.len()
        } else {
            configured
        };

        tracing::info!(model = backend.model(), dimension, "embedding provider ready");

        Ok(Self {
            backend,
            dimension,
            max_input_chars: config.max_input_chars,
            item_timeout: DEFAULT_ITEM_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_item_timeout(mut self, item_timeout: Duration) -> Self {
        self.item_timeout = item_timeout;
        self
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn model(&self) -> &str {
        self.backend.model()
    }

    pub async fn health_check(&self) -> Result<ProviderHealth, EmbeddingError> {
        self.backend.health_check().await
    }

    /// Encode one text. Errors are logged and returned to the caller.
    pub async fn encode(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let result = match timeout(self.item_timeout, self.request(text)).await {
            Ok(result) => result,
            Err(_) => Err(EmbeddingError::Timeout),
        };
        if let Err(e) = &result {
            tracing::error!(error = %e, "embedding request failed");
        }
        result
    }

    /// Encode `texts` in chunks of `batch_size`, with at most `max_parallel`
    /// requests in flight per chunk.
    ///
    /// The output is aligned with the input. A failed or timed-out item gets a
    /// zero vector of the active dimension and never affects its neighbours.
    pub async fn encode_batch(
        &self,
        texts: &[String],
        batch_size: usize,
        max_parallel: usize,
    ) -> Vec<Vec<f32>> {
        let batch_size = batch_size.max(1);
        let mut vectors = vec![Vec::new(); texts.len()];

        for (chunk_index, chunk) in texts.chunks(batch_size).enumerate() {
            let offset = chunk_index * batch_size;
            let results: Vec<(usize, Vec<f32>)> = stream::iter(chunk.iter().enumerate())
                .map(|(i, text)| async move {
                    let index = offset + i;
                    (index, self.encode_or_zero(index, text).await)
                })
                .buffer_unordered(max_parallel.max(1))
                .collect()
                .await;

            // Completion order is arbitrary; slots are addressed by index.
            for (index, vector) in results {
                vectors[index] = vector;
            }
            tracing::debug!(
                done = offset + chunk.len(),
                total = texts.len(),
                "embedded chunk"
            );
        }

        vectors
    }

    async fn encode_or_zero(&self, index: usize, text: &str) -> Vec<f32> {
        match timeout(self.item_timeout, self.request(text)).await {
            Ok(Ok(vector)) => vector,
            Ok(Err(e)) => {
                tracing::warn!(index, error = %e, "embedding failed, substituting zero vector");
                vec![0.0; self.dimension]
            }
            Err(_) => {
                tracing::warn!(
                    index,
                    timeout_secs = self.item_timeout.as_secs(),
                    "embedding timed out, substituting zero vector"
                );
                vec![0.0; self.dimension]
            }
        }
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let input = truncate_chars(text, self.max_input_chars);
        let vector = self.backend.embed(input).await?;
        Ok(normalize(vector))
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// Replace NaN components with zero and scale to unit length.
fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
    for x in vector.iter_mut() {
        if x.is_nan() {
            *x = 0.0;
        }
    }
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
    vector
}
