use async_trait::async_trait;
use pgvector::Vector;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use super::{ID_FIELD, VectorStore};
use crate::error::VectorStoreError;
use crate::models::{ValidatedVectorRecord, VectorStoreConfig};
use crate::utils::postgres::connect_options;

pub struct PgVectorBackend {
    pool: PgPool,
    table_name: String,
    collection: String,
    schema: Option<String>,
    dimension: u64,
}

impl PgVectorBackend {
    pub async fn new(config: &VectorStoreConfig, dimension: u64) -> Result<Self, VectorStoreError> {
        let options = connect_options(&config.url, Duration::from_secs(config.timeout_secs))
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max)
            .acquire_timeout(Duration::from_secs(config.pool_acquire_timeout.into()))
            .connect_with(options)
            .await
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        let backend = Self {
            pool,
            table_name: config.qualified_table_name(&config.collection),
            collection: config.collection.clone(),
            schema: config.schema.clone(),
            dimension,
        };

        backend.check_pgvector_extension().await?;
        Ok(backend)
    }

    async fn check_pgvector_extension(&self) -> Result<(), VectorStoreError> {
        let result: Option<(String,)> =
            sqlx::query_as("SELECT extname FROM pg_extension WHERE extname = 'vector'")
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| VectorStoreError::PostgresError(e.to_string()))?;

        if result.is_none() {
            return Err(VectorStoreError::PgVectorExtensionError(
                "pgvector extension is not installed. Run: CREATE EXTENSION vector;".to_string(),
            ));
        }

        Ok(())
    }

    async fn execute(&self, sql: &str) -> Result<(), VectorStoreError> {
        sqlx::query(sql)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| VectorStoreError::CollectionError(e.to_string()))
    }
}

fn create_table_sql(table: &str, dimension: u64) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            {ID_FIELD} TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            url TEXT NOT NULL,
            location TEXT NOT NULL,
            embedding vector({dimension}) NOT NULL,
            text TEXT NOT NULL,
            title TEXT NOT NULL,
            property_type TEXT NOT NULL,
            listing_type TEXT NOT NULL,
            price_egp DOUBLE PRECISION NOT NULL,
            bedrooms INTEGER NOT NULL,
            bathrooms INTEGER NOT NULL,
            area_sqm DOUBLE PRECISION NOT NULL,
            floor_number INTEGER NOT NULL,
            latitude DOUBLE PRECISION,
            longitude DOUBLE PRECISION,
            indexed_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#
    )
}

fn upsert_sql(table: &str) -> String {
    format!(
        r#"
        INSERT INTO {table} ({ID_FIELD}, source, url, location, embedding, text, title,
                             property_type, listing_type, price_egp, bedrooms, bathrooms,
                             area_sqm, floor_number, latitude, longitude)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        ON CONFLICT ({ID_FIELD}) DO UPDATE SET
            source = EXCLUDED.source,
            url = EXCLUDED.url,
            location = EXCLUDED.location,
            embedding = EXCLUDED.embedding,
            text = EXCLUDED.text,
            title = EXCLUDED.title,
            property_type = EXCLUDED.property_type,
            listing_type = EXCLUDED.listing_type,
            price_egp = EXCLUDED.price_egp,
            bedrooms = EXCLUDED.bedrooms,
            bathrooms = EXCLUDED.bathrooms,
            area_sqm = EXCLUDED.area_sqm,
            floor_number = EXCLUDED.floor_number,
            latitude = EXCLUDED.latitude,
            longitude = EXCLUDED.longitude,
            indexed_at = now()
        "#
    )
}

fn id_page_sql(table: &str) -> String {
    format!(
        "SELECT {ID_FIELD} FROM {table} \
         WHERE ($1::text IS NULL OR {ID_FIELD} > $1) \
         ORDER BY {ID_FIELD} \
         LIMIT $2"
    )
}

#[async_trait]
impl VectorStore for PgVectorBackend {
    async fn health_check(&self) -> Result<(), VectorStoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))
    }

    async fn ensure_schema(&self) -> Result<(), VectorStoreError> {
        if let Some(ref schema) = self.schema {
            self.execute(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema))
                .await?;
        }

        self.execute(&create_table_sql(&self.table_name, self.dimension))
            .await?;
        self.execute(&format!(
            "CREATE INDEX IF NOT EXISTS {}_embedding_idx ON {} \
             USING hnsw (embedding vector_cosine_ops)",
            self.collection, self.table_name
        ))
        .await?;

        Ok(())
    }

    async fn fetch_id_page(
        &self,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<String>, VectorStoreError> {
        let rows = sqlx::query(&id_page_sql(&self.table_name))
            .bind(after)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VectorStoreError::QueryError(e.to_string()))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>(ID_FIELD)
                    .map_err(|e| VectorStoreError::QueryError(e.to_string()))
            })
            .collect()
    }

    async fn upsert_batch(
        &self,
        records: Vec<ValidatedVectorRecord>,
    ) -> Result<u64, VectorStoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let query = upsert_sql(&self.table_name);
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| VectorStoreError::UpsertError(e.to_string()))?;

        let count = records.len() as u64;
        for record in records {
            sqlx::query(&query)
                .bind(&record.property_id)
                .bind(&record.source)
                .bind(&record.url)
                .bind(&record.location)
                .bind(Vector::from(record.embedding))
                .bind(&record.text)
                .bind(&record.title)
                .bind(&record.property_type)
                .bind(&record.listing_type)
                .bind(record.price_egp)
                .bind(record.bedrooms)
                .bind(record.bathrooms)
                .bind(record.area_sqm)
                .bind(record.floor_number)
                .bind(record.latitude)
                .bind(record.longitude)
                .execute(&mut *tx)
                .await
                .map_err(|e| VectorStoreError::UpsertError(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| VectorStoreError::UpsertError(e.to_string()))?;

        Ok(count)
    }

    async fn stats(&self) -> Result<u64, VectorStoreError> {
        let query = format!("SELECT COUNT(*) FROM {}", self.table_name);
        let row: (i64,) = sqlx::query_as(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| VectorStoreError::PostgresError(e.to_string()))?;

        Ok(row.0 as u64)
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}
