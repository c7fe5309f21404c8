//! Batched write path into the vector store.

use std::sync::Arc;

use crate::error::RecoverableError;
use crate::models::{FailedRecord, ValidatedVectorRecord};
use crate::services::VectorStore;

/// Result of writing a set of validated records.
#[derive(Debug, Default)]
pub struct UpsertReport {
    pub inserted: u64,
    pub failures: Vec<FailedRecord>,
}

pub struct Upserter {
    store: Arc<dyn VectorStore>,
    batch_size: usize,
}

impl Upserter {
    pub fn new(store: Arc<dyn VectorStore>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Write `records` in batches. A failed batch turns each of its records
    /// into a [`FailedRecord`] carrying the batch error; later batches still run.
    pub async fn upsert_all(&self, records: Vec<ValidatedVectorRecord>) -> UpsertReport {
        let mut report = UpsertReport::default();
        let total_batches = records.len().div_ceil(self.batch_size);

        let mut records = records.into_iter().peekable();
        let mut batch_number = 0;
        while records.peek().is_some() {
            batch_number += 1;
            let batch: Vec<ValidatedVectorRecord> =
                records.by_ref().take(self.batch_size).collect();
            let ids: Vec<String> = batch.iter().map(|r| r.property_id.clone()).collect();

            match self.store.upsert_batch(batch).await {
                Ok(written) => {
                    report.inserted += written;
                    tracing::info!(
                        batch = batch_number,
                        total_batches,
                        written,
                        "upserted batch"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        batch = batch_number,
                        total_batches,
                        records = ids.len(),
                        error = %e,
                        "batch upsert failed"
                    );
                    let cause = e.to_string();
                    report.failures.extend(ids.into_iter().map(|id| {
                        RecoverableError::Upsert(cause.clone()).into_failed_record(id)
                    }));
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FailureKind;
    use crate::services::test_support::{InMemoryVectorStore, validated_record};

    fn records(n: usize) -> Vec<ValidatedVectorRecord> {
        (0..n).map(validated_record).collect()
    }

    #[tokio::test]
    async fn test_all_batches_succeed() {
        let store = Arc::new(InMemoryVectorStore::new());
        let report = Upserter::new(store.clone(), 2).upsert_all(records(5)).await;

        assert_eq!(report.inserted, 5);
        assert!(report.failures.is_empty());
        assert_eq!(store.upsert_calls(), 3);
        assert_eq!(store.len(), 5);
    }

    #[tokio::test]
    async fn test_failed_middle_batch_is_isolated() {
        let store = Arc::new(InMemoryVectorStore::new().fail_upsert_call(2));
        let input = records(9);
        let batch_two: Vec<String> = input[3..6].iter().map(|r| r.property_id.clone()).collect();

        let report = Upserter::new(store.clone(), 3).upsert_all(input).await;

        assert_eq!(report.inserted, 6);
        assert_eq!(report.failures.len(), 3);
        let failed_ids: Vec<String> = report.failures.iter().map(|f| f.id.clone()).collect();
        assert_eq!(failed_ids, batch_two);
        for failure in &report.failures {
            assert_eq!(failure.kind, FailureKind::Upsert);
            assert!(failure.reason.starts_with("upsert failed: "));
        }
        assert_eq!(store.upsert_calls(), 3);
        assert_eq!(store.len(), 6);
    }

    #[tokio::test]
    async fn test_reupsert_replaces() {
        let store = Arc::new(InMemoryVectorStore::new());
        let upserter = Upserter::new(store.clone(), 10);
        upserter.upsert_all(records(3)).await;
        let report = upserter.upsert_all(records(3)).await;

        assert_eq!(report.inserted, 3);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_calls() {
        let store = Arc::new(InMemoryVectorStore::new());
        let report = Upserter::new(store.clone(), 10).upsert_all(Vec::new()).await;
        assert_eq!(report.inserted, 0);
        assert_eq!(store.upsert_calls(), 0);
    }
}
