//! Analytical (mart) store clients that supply indexing candidates.
//!
//! The pipeline never writes here. Every source applies the same completeness
//! predicate and excludes ids that are already indexed.

mod jsonl;
mod postgres;

pub use jsonl::JsonlCandidateStore;
pub use postgres::PgCandidateStore;

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::CandidateError;
use crate::models::{AnalyticsConfig, AnalyticsDriver, CandidateRecord, RegionBounds};

#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn health_check(&self) -> Result<(), CandidateError>;

    /// Eligible candidates whose id is not in `exclude`, ordered by id.
    async fn fetch_candidates(
        &self,
        exclude: &HashSet<String>,
        limit: Option<usize>,
    ) -> Result<Vec<CandidateRecord>, CandidateError>;

    async fn close(&self);
}

/// Minimum data a mart row needs before it is worth embedding.
#[derive(Debug, Clone, Copy)]
pub struct CompletenessPredicate {
    pub min_price: f64,
    pub min_area: f64,
    pub region: RegionBounds,
}

impl CompletenessPredicate {
    pub fn new(config: &AnalyticsConfig, region: RegionBounds) -> Self {
        Self {
            min_price: config.min_price,
            min_area: config.min_area,
            region,
        }
    }

    pub fn matches(&self, record: &CandidateRecord) -> bool {
        let priced = record.price_egp.is_some_and(|p| p > self.min_price);
        let sized = record.area_sqm.is_some_and(|a| a > self.min_area);
        let described = record
            .description
            .as_deref()
            .is_some_and(|d| !d.trim().is_empty());
        let located = match (record.latitude, record.longitude) {
            (Some(lat), Some(lon)) => self.region.contains(lat, lon),
            _ => false,
        };
        priced && sized && described && located
    }
}

/// Open the configured analytical store and verify it is reachable.
pub async fn create_source(
    config: &AnalyticsConfig,
    region: RegionBounds,
) -> Result<Arc<dyn CandidateSource>, CandidateError> {
    let predicate = CompletenessPredicate::new(config, region);
    let source: Arc<dyn CandidateSource> = match config.driver {
        AnalyticsDriver::Postgres => Arc::new(PgCandidateStore::connect(config, predicate).await?),
        AnalyticsDriver::Jsonl => {
            let path = config.path.clone().ok_or_else(|| {
                CandidateError::ConnectionError("analytics.path is not set".to_string())
            })?;
            Arc::new(JsonlCandidateStore::new(path, predicate))
        }
    };

    source.health_check().await?;
    tracing::info!(driver = %config.driver, "analytical store connected");
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::sample_candidate;

    fn predicate() -> CompletenessPredicate {
        CompletenessPredicate::new(&AnalyticsConfig::default(), RegionBounds::default())
    }

    #[test]
    fn test_complete_record_matches() {
        assert!(predicate().matches(&sample_candidate(1)));
    }

    #[test]
    fn test_price_and_area_floors_are_exclusive() {
        let mut record = sample_candidate(1);
        record.price_egp = Some(1000.0);
        assert!(!predicate().matches(&record));

        let mut record = sample_candidate(1);
        record.area_sqm = Some(9.0);
        assert!(!predicate().matches(&record));

        record.area_sqm = Some(9.5);
        assert!(predicate().matches(&record));
    }

    #[test]
    fn test_blank_description_or_missing_coordinates_excluded() {
        let mut record = sample_candidate(1);
        record.description = Some("   ".to_string());
        assert!(!predicate().matches(&record));

        let mut record = sample_candidate(1);
        record.longitude = None;
        assert!(!predicate().matches(&record));

        let mut record = sample_candidate(1);
        record.latitude = Some(40.7);
        assert!(!predicate().matches(&record));
    }
}
