//! The incremental indexing run.
//!
//! `INIT → DEDUP → FETCH → NORMALIZE → EMBED → VALIDATE → UPSERT → REPORT`.
//! Stages run one after another on a single task; only EMBED fans out. Every
//! non-fatal path ends in REPORT and yields a [`RunSummary`].

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::Instrument;

use crate::error::{FatalError, RecoverableError};
use crate::models::{
    CandidateRecord, Config, EnrichedRecord, RegionBounds, RunOutcome, RunSummary, Stage,
    ValidatedVectorRecord,
};
use crate::services::{
    CandidateSource, EmbeddingService, OllamaBackend, RecordValidator, TextNormalizer, Upserter,
    ValidationRules, VectorStore, collect_existing_ids, create_backend, create_source, report,
};
use crate::utils::{RetryPolicy, with_retry};

/// Shared flag checked between stages. Setting it never interrupts a batch.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Connected collaborators. Built once, then handed to the pipeline.
pub struct PipelineContext {
    pub vector_store: Arc<dyn VectorStore>,
    pub candidates: Arc<dyn CandidateSource>,
    pub embedder: EmbeddingService,
}

impl PipelineContext {
    /// Connect every collaborator. Any failure here aborts the run before DEDUP.
    pub async fn connect(config: &Config) -> Result<Self, FatalError> {
        let backend =
            OllamaBackend::new(&config.embedding).map_err(FatalError::EmbeddingUnavailable)?;
        let embedder = EmbeddingService::connect(Arc::new(backend), &config.embedding)
            .await
            .map_err(FatalError::EmbeddingUnavailable)?
            .with_item_timeout(Duration::from_secs(config.pipeline.embedding_timeout_secs));

        let dimension = embedder.dimension() as u64;
        let mut store_config = config.vector_store.clone();
        store_config.collection = store_config.collection_for(embedder.model(), dimension);

        let vector_store = create_backend(&store_config, dimension)
            .await
            .map_err(FatalError::VectorStoreUnavailable)?;
        vector_store
            .ensure_schema()
            .await
            .map_err(FatalError::VectorStoreUnavailable)?;

        let candidates = create_source(&config.analytics, config.region)
            .await
            .map_err(FatalError::CandidateStoreUnavailable)?;

        Ok(Self {
            vector_store,
            candidates,
            embedder,
        })
    }

    pub async fn close(&self) {
        self.vector_store.close().await;
        self.candidates.close().await;
    }
}

/// Run parameters.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub batch_size: usize,
    pub max_parallel_embeddings: usize,
    pub page_size: usize,
    pub limit: Option<usize>,
    pub region: RegionBounds,
    /// Where side files go. `None` disables them.
    pub report_dir: Option<PathBuf>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.pipeline.batch_size,
            max_parallel_embeddings: config.pipeline.max_parallel_embeddings,
            page_size: config.pipeline.page_size,
            limit: config.pipeline.limit,
            region: config.region,
            report_dir: Some(config.logging.dir.clone()),
        }
    }
}

pub struct IndexingPipeline {
    context: PipelineContext,
    options: PipelineOptions,
    normalizer: TextNormalizer,
    validator: RecordValidator,
}

impl IndexingPipeline {
    pub fn new(context: PipelineContext, options: PipelineOptions) -> Self {
        let rules = ValidationRules::new(context.embedder.dimension(), options.region);
        Self {
            context,
            options,
            normalizer: TextNormalizer::new(),
            validator: RecordValidator::new(rules),
        }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    /// Execute one run. Only DEDUP and FETCH failures are returned as errors;
    /// everything else is folded into the summary.
    pub async fn run(&self, cancel: &CancelFlag) -> Result<RunSummary, FatalError> {
        let started = Instant::now();
        let mut summary = RunSummary {
            started_at: Utc::now().to_rfc3339(),
            stages: vec![Stage::Init],
            ..Default::default()
        };

        if !self.advance(Stage::Dedup, cancel, &mut summary) {
            return Ok(self.report(summary, started).await);
        }
        let store = self.context.vector_store.as_ref();
        let existing = collect_existing_ids(store, self.options.page_size)
            .instrument(tracing::info_span!("stage", name = %Stage::Dedup))
            .await
            .map_err(FatalError::Dedup)?;

        if !self.advance(Stage::Fetch, cancel, &mut summary) {
            return Ok(self.report(summary, started).await);
        }
        let source = self.context.candidates.as_ref();
        let candidates = with_retry(&RetryPolicy::default(), "fetch_candidates", || {
            source.fetch_candidates(&existing, self.options.limit)
        })
        .instrument(tracing::info_span!("stage", name = %Stage::Fetch))
        .await
        .map_err(FatalError::Fetch)?;
        drop(existing);

        summary.total = candidates.len() as u64;
        if candidates.is_empty() {
            tracing::info!("no new candidates");
            return Ok(self.report(summary, started).await);
        }

        if !self.advance(Stage::Normalize, cancel, &mut summary) {
            return Ok(self.report(summary, started).await);
        }
        let (eligible, texts) = self.normalize(candidates, &mut summary);
        if eligible.is_empty() {
            return Ok(self.report(summary, started).await);
        }

        if !self.advance(Stage::Embed, cancel, &mut summary) {
            return Ok(self.report(summary, started).await);
        }
        let vectors = self
            .context
            .embedder
            .encode_batch(
                &texts,
                self.options.batch_size,
                self.options.max_parallel_embeddings,
            )
            .instrument(tracing::info_span!("stage", name = %Stage::Embed))
            .await;
        let enriched: Vec<EnrichedRecord> = eligible
            .into_iter()
            .zip(texts)
            .zip(vectors)
            .map(|((candidate, searchable_text), embedding)| EnrichedRecord {
                candidate,
                searchable_text,
                embedding,
            })
            .collect();

        if !self.advance(Stage::Validate, cancel, &mut summary) {
            return Ok(self.report(summary, started).await);
        }
        let valid = self.validate(&enriched, &mut summary);
        drop(enriched);
        if valid.is_empty() {
            return Ok(self.report(summary, started).await);
        }

        if !self.advance(Stage::Upsert, cancel, &mut summary) {
            return Ok(self.report(summary, started).await);
        }
        let upserter = Upserter::new(self.context.vector_store.clone(), self.options.batch_size);
        let upserted = upserter
            .upsert_all(valid)
            .instrument(tracing::info_span!("stage", name = %Stage::Upsert))
            .await;
        summary.inserted = upserted.inserted;
        summary.failed_records.extend(upserted.failures);

        Ok(self.report(summary, started).await)
    }

    /// Record entry into `stage`, unless the run has been cancelled.
    fn advance(&self, stage: Stage, cancel: &CancelFlag, summary: &mut RunSummary) -> bool {
        if cancel.is_cancelled() {
            tracing::warn!(before = %stage, "run interrupted");
            summary.interrupted = true;
            return false;
        }
        tracing::debug!(stage = %stage, "entering stage");
        summary.stages.push(stage);
        true
    }

    fn normalize(
        &self,
        candidates: Vec<CandidateRecord>,
        summary: &mut RunSummary,
    ) -> (Vec<CandidateRecord>, Vec<String>) {
        let _span = tracing::info_span!("stage", name = %Stage::Normalize).entered();

        let mut eligible = Vec::with_capacity(candidates.len());
        let mut texts = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match self.normalizer.searchable_text(&candidate) {
                Some(text) => {
                    eligible.push(candidate);
                    texts.push(text);
                }
                None => {
                    tracing::debug!(
                        id = %candidate.property_id,
                        "searchable text too short, skipping"
                    );
                    summary.skipped += 1;
                }
            }
        }
        tracing::info!(
            eligible = eligible.len(),
            skipped = summary.skipped,
            "normalized candidates"
        );
        (eligible, texts)
    }

    fn validate(
        &self,
        enriched: &[EnrichedRecord],
        summary: &mut RunSummary,
    ) -> Vec<ValidatedVectorRecord> {
        let _span = tracing::info_span!("stage", name = %Stage::Validate).entered();

        let mut valid = Vec::with_capacity(enriched.len());
        for record in enriched {
            match self.validator.validate(record) {
                Ok(validated) => valid.push(validated),
                Err(e) => {
                    let id = record.candidate.property_id.trim();
                    tracing::warn!(id, reason = %e, "record rejected");
                    summary
                        .failed_records
                        .push(RecoverableError::from(e).into_failed_record(id));
                }
            }
        }
        tracing::info!(
            valid = valid.len(),
            rejected = enriched.len() - valid.len(),
            "validated records"
        );
        valid
    }

    async fn report(&self, mut summary: RunSummary, started: Instant) -> RunSummary {
        summary.stages.push(Stage::Report);
        let span = tracing::info_span!("stage", name = %Stage::Report);

        async {
            match self.context.vector_store.stats().await {
                Ok(count) => {
                    tracing::info!(
                        collection = self.context.vector_store.collection(),
                        count,
                        "vector store total"
                    );
                    summary.store_total = Some(count);
                }
                Err(e) => tracing::warn!(error = %e, "could not read vector store stats"),
            }

            summary.failed = summary.failed_records.len() as u64;
            // Only a completed FETCH can establish that there was nothing new.
            let fetched = summary.stages.contains(&Stage::Fetch);
            summary.outcome = if fetched && summary.eligible() == 0 {
                RunOutcome::SuccessNoNewData
            } else if summary.failed == 0 {
                RunOutcome::Success
            } else {
                RunOutcome::PartialSuccess
            };
            summary.finished_at = Utc::now().to_rfc3339();
            summary.duration_ms = started.elapsed().as_millis() as u64;

            if let Some(dir) = &self.options.report_dir {
                if !summary.failed_records.is_empty() {
                    match report::write_failed_records(dir, &summary.failed_records) {
                        Ok(path) => tracing::warn!(
                            count = summary.failed_records.len(),
                            path = %path.display(),
                            "saved failed records"
                        ),
                        Err(e) => tracing::error!(error = %e, "failed to save failed records"),
                    }
                }
                if let Err(e) = report::write_run_summary(dir, &summary) {
                    tracing::error!(error = %e, "failed to save run summary");
                }
            }

            tracing::info!(
                outcome = %summary.outcome,
                total = summary.total,
                inserted = summary.inserted,
                failed = summary.failed,
                skipped = summary.skipped,
                success_rate = summary.success_rate().unwrap_or(0.0),
                interrupted = summary.interrupted,
                duration_ms = summary.duration_ms,
                "run finished"
            );
        }
        .instrument(span)
        .await;

        summary
    }
}
