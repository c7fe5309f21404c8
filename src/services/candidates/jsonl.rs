use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;

use super::{CandidateSource, CompletenessPredicate};
use crate::error::CandidateError;
use crate::models::CandidateRecord;

/// Reads candidates from a newline-delimited JSON export of the mart.
///
/// Rows without a `property_id` get one derived from `source` and `url`.
/// Lines that are not valid JSON are skipped with a warning.
pub struct JsonlCandidateStore {
    path: PathBuf,
    predicate: CompletenessPredicate,
}

impl JsonlCandidateStore {
    pub fn new(path: PathBuf, predicate: CompletenessPredicate) -> Self {
        Self { path, predicate }
    }

    fn parse(&self, content: &str) -> Vec<CandidateRecord> {
        let mut records = Vec::new();
        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<CandidateRecord>(line) {
                Ok(mut record) => {
                    if record.property_id.trim().is_empty()
                        && let (Some(source), Some(url)) = (&record.source, &record.url)
                    {
                        record.property_id = CandidateRecord::generate_id(source, url);
                    }
                    records.push(record);
                }
                Err(e) => {
                    let err = CandidateError::ParseError {
                        line: index + 1,
                        message: e.to_string(),
                    };
                    tracing::warn!(path = %self.path.display(), error = %err, "skipping row");
                }
            }
        }
        records
    }
}

#[async_trait]
impl CandidateSource for JsonlCandidateStore {
    async fn health_check(&self) -> Result<(), CandidateError> {
        tokio::fs::metadata(&self.path)
            .await
            .map(|_| ())
            .map_err(|e| {
                CandidateError::ConnectionError(format!("{}: {}", self.path.display(), e))
            })
    }

    async fn fetch_candidates(
        &self,
        exclude: &HashSet<String>,
        limit: Option<usize>,
    ) -> Result<Vec<CandidateRecord>, CandidateError> {
        let content = tokio::fs::read_to_string(&self.path).await?;

        let mut candidates: Vec<CandidateRecord> = self
            .parse(&content)
            .into_iter()
            .filter(|r| self.predicate.matches(r))
            .filter(|r| !exclude.contains(&r.property_id))
            .collect();
        candidates.sort_by(|a, b| a.property_id.cmp(&b.property_id));
        candidates.dedup_by(|a, b| a.property_id == b.property_id);
        if let Some(limit) = limit {
            candidates.truncate(limit);
        }

        tracing::info!(
            path = %self.path.display(),
            excluded = exclude.len(),
            fetched = candidates.len(),
            "fetched candidates"
        );
        Ok(candidates)
    }

    async fn close(&self) {}
}
