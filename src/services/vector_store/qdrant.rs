//! Qdrant vector store backend implementation.

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, Distance,
    FieldType, PayloadIncludeSelector, PointId, PointStruct, RetrievedPoint, ScrollPointsBuilder,
    UpsertPointsBuilder, Value, VectorParamsBuilder, value::Kind,
};
use std::collections::HashMap;
use std::time::Duration;

use super::{ID_FIELD, VectorStore};
use crate::error::VectorStoreError;
use crate::models::{ValidatedVectorRecord, VectorStoreConfig};

/// Qdrant backend.
///
/// Qdrant only accepts integer or UUID point ids, so each listing is stored
/// under the UUIDv5 of its property id and the property id itself lives in
/// the payload. Scrolling follows point-id order, which is stable.
pub struct QdrantBackend {
    client: Qdrant,
    collection: String,
    dimension: u64,
}

impl QdrantBackend {
    pub fn new(config: &VectorStoreConfig, dimension: u64) -> Result<Self, VectorStoreError> {
        let mut builder =
            Qdrant::from_url(&config.url).timeout(Duration::from_secs(config.timeout_secs));

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
            dimension,
        })
    }
}

#[async_trait]
impl VectorStore for QdrantBackend {
    async fn health_check(&self) -> Result<(), VectorStoreError> {
        self.client
            .health_check()
            .await
            .map(|_| ())
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))
    }

    async fn ensure_schema(&self) -> Result<(), VectorStoreError> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;
        if exists {
            return Ok(());
        }

        tracing::info!(
            collection = %self.collection,
            dimension = self.dimension,
            "creating collection"
        );

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(self.dimension, Distance::Cosine)),
            )
            .await
            .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;

        self.client
            .create_field_index(
                CreateFieldIndexCollectionBuilder::new(
                    &self.collection,
                    ID_FIELD,
                    FieldType::Keyword,
                )
                .wait(true),
            )
            .await
            .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;

        Ok(())
    }

    async fn fetch_id_page(
        &self,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<String>, VectorStoreError> {
        // Scroll offsets are inclusive: ask for one extra row and drop the cursor.
        let request_limit = if after.is_some() { limit + 1 } else { limit };

        let mut scroll = ScrollPointsBuilder::new(&self.collection)
            .limit(request_limit as u32)
            .with_payload(PayloadIncludeSelector {
                fields: vec![ID_FIELD.to_string()],
            })
            .with_vectors(false);

        if let Some(cursor) = after {
            scroll = scroll.offset(PointId::from(ValidatedVectorRecord::point_id(cursor)));
        }

        let response = self
            .client
            .scroll(scroll)
            .await
            .map_err(|e| VectorStoreError::QueryError(e.to_string()))?;

        let ids = response.result.iter().filter_map(property_id_of);
        Ok(page_after(ids, after, limit))
    }

    async fn upsert_batch(
        &self,
        records: Vec<ValidatedVectorRecord>,
    ) -> Result<u64, VectorStoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let count = records.len() as u64;
        let points: Vec<PointStruct> = records.into_iter().map(to_point).collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(|e| VectorStoreError::UpsertError(e.to_string()))?;

        Ok(count)
    }

    async fn stats(&self) -> Result<u64, VectorStoreError> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await
            .map_err(|e| VectorStoreError::QueryError(e.to_string()))?;

        Ok(response.result.map_or(0, |r| r.count))
    }

    async fn close(&self) {}

    fn collection(&self) -> &str {
        &self.collection
    }
}

fn to_point(record: ValidatedVectorRecord) -> PointStruct {
    let point_id = ValidatedVectorRecord::point_id(&record.property_id);
    let mut payload: HashMap<String, Value> = HashMap::new();

    payload.insert(ID_FIELD.to_string(), record.property_id.into());
    payload.insert("source".to_string(), record.source.into());
    payload.insert("url".to_string(), record.url.into());
    payload.insert("location".to_string(), record.location.into());
    payload.insert("text".to_string(), record.text.into());
    payload.insert("title".to_string(), record.title.into());
    payload.insert("property_type".to_string(), record.property_type.into());
    payload.insert("listing_type".to_string(), record.listing_type.into());
    payload.insert("price_egp".to_string(), record.price_egp.into());
    payload.insert("bedrooms".to_string(), i64::from(record.bedrooms).into());
    payload.insert("bathrooms".to_string(), i64::from(record.bathrooms).into());
    payload.insert("area_sqm".to_string(), record.area_sqm.into());
    payload.insert("floor_number".to_string(), i64::from(record.floor_number).into());
    if let Some(latitude) = record.latitude {
        payload.insert("latitude".to_string(), latitude.into());
    }
    if let Some(longitude) = record.longitude {
        payload.insert("longitude".to_string(), longitude.into());
    }

    PointStruct::new(point_id, record.embedding, payload)
}

fn property_id_of(point: &RetrievedPoint) -> Option<String> {
    match &point.payload.get(ID_FIELD)?.kind {
        Some(Kind::StringValue(s)) => Some(s.clone()),
        _ => None,
    }
}

/// Drop the inclusive cursor row and cap the page at `limit`.
fn page_after(
    ids: impl Iterator<Item = String>,
    after: Option<&str>,
    limit: usize,
) -> Vec<String> {
    ids.filter(|id| Some(id.as_str()) != after)
        .take(limit)
        .collect()
}
