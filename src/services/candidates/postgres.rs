use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use std::collections::HashSet;
use std::time::Duration;

use super::{CandidateSource, CompletenessPredicate};
use crate::error::CandidateError;
use crate::models::{AnalyticsConfig, CandidateRecord};
use crate::utils::postgres::connect_options;

/// Reads candidates from the mart table in PostgreSQL.
pub struct PgCandidateStore {
    pool: PgPool,
    table: String,
    predicate: CompletenessPredicate,
}

impl PgCandidateStore {
    pub async fn connect(
        config: &AnalyticsConfig,
        predicate: CompletenessPredicate,
    ) -> Result<Self, CandidateError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let options = connect_options(&config.url, timeout)
            .map_err(|e| CandidateError::ConnectionError(e.to_string()))?;
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max)
            .acquire_timeout(timeout)
            .connect_with(options)
            .await
            .map_err(|e| CandidateError::ConnectionError(e.to_string()))?;

        Ok(Self {
            pool,
            table: config.table.clone(),
            predicate,
        })
    }
}

fn candidates_sql(table: &str) -> String {
    format!(
        r#"
        SELECT property_id, source, url, title, description, address, location,
               property_type, listing_type,
               price_egp::float8 AS price_egp,
               bedrooms::int4 AS bedrooms,
               bathrooms::int4 AS bathrooms,
               area_sqm::float8 AS area_sqm,
               floor_number::int4 AS floor_number,
               latitude::float8 AS latitude,
               longitude::float8 AS longitude
        FROM {table}
        WHERE property_id IS NOT NULL
          AND price_egp IS NOT NULL AND price_egp > $1
          AND area_sqm IS NOT NULL AND area_sqm > $2
          AND description IS NOT NULL AND btrim(description) <> ''
          AND latitude BETWEEN $3 AND $4
          AND longitude BETWEEN $5 AND $6
          AND property_id <> ALL($7)
        ORDER BY property_id
        LIMIT $8
        "#
    )
}

fn row_to_candidate(row: &PgRow) -> Result<CandidateRecord, sqlx::Error> {
    Ok(CandidateRecord {
        property_id: row.try_get("property_id")?,
        source: row.try_get("source")?,
        url: row.try_get("url")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        address: row.try_get("address")?,
        location: row.try_get("location")?,
        property_type: row.try_get("property_type")?,
        listing_type: row.try_get("listing_type")?,
        price_egp: row.try_get("price_egp")?,
        bedrooms: row.try_get("bedrooms")?,
        bathrooms: row.try_get("bathrooms")?,
        area_sqm: row.try_get("area_sqm")?,
        floor_number: row.try_get("floor_number")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
    })
}

#[async_trait]
impl CandidateSource for PgCandidateStore {
    async fn health_check(&self) -> Result<(), CandidateError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| CandidateError::ConnectionError(e.to_string()))
    }

    async fn fetch_candidates(
        &self,
        exclude: &HashSet<String>,
        limit: Option<usize>,
    ) -> Result<Vec<CandidateRecord>, CandidateError> {
        let exclude: Vec<&str> = exclude.iter().map(String::as_str).collect();
        let region = self.predicate.region;

        let rows = sqlx::query(&candidates_sql(&self.table))
            .bind(self.predicate.min_price)
            .bind(self.predicate.min_area)
            .bind(region.min_latitude)
            .bind(region.max_latitude)
            .bind(region.min_longitude)
            .bind(region.max_longitude)
            .bind(&exclude)
            .bind(limit.map(|n| n as i64))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CandidateError::QueryError(e.to_string()))?;

        let candidates = rows
            .iter()
            .map(row_to_candidate)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CandidateError::QueryError(e.to_string()))?;

        tracing::info!(
            table = %self.table,
            excluded = exclude.len(),
            fetched = candidates.len(),
            "fetched candidates"
        );
        Ok(candidates)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_sql_applies_predicate_and_exclusion() {
        let sql = candidates_sql("property_mart");
        assert!(sql.contains("FROM property_mart"));
        assert!(sql.contains("price_egp > $1"));
        assert!(sql.contains("area_sqm > $2"));
        assert!(sql.contains("property_id <> ALL($7)"));
        assert!(sql.contains("ORDER BY property_id"));
        assert!(sql.contains("LIMIT $8"));
    }

    #[test]
    fn test_candidates_sql_skips_rows_without_id() {
        // An empty exclusion list does not filter NULL ids on its own.
        let sql = candidates_sql("property_mart");
        assert!(sql.contains("WHERE property_id IS NOT NULL"));
    }
}
