mod candidates;
mod embedding;
mod enumerator;
mod normalizer;
mod pipeline;
pub mod report;
mod upserter;
mod validator;
mod vector_store;

#[cfg(test)]
pub(crate) mod test_support;

pub use candidates::{
    CandidateSource, CompletenessPredicate, JsonlCandidateStore, PgCandidateStore, create_source,
};
pub use embedding::{
    DEFAULT_ITEM_TIMEOUT, EmbeddingBackend, EmbeddingService, OllamaBackend, ProviderHealth,
};
pub use enumerator::{collect_existing_ids, enumerate_ids};
pub use normalizer::{MIN_SEARCHABLE_CHARS, TextNormalizer};
pub use pipeline::{CancelFlag, IndexingPipeline, PipelineContext, PipelineOptions};
pub use upserter::{UpsertReport, Upserter};
pub use validator::{RecordValidator, ValidationRules};
pub use vector_store::{ID_FIELD, PgVectorBackend, QdrantBackend, VectorStore, create_backend};
