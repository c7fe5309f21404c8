//! Listing records as they move through a pipeline run.

use serde::{Deserialize, Serialize};

/// Read-only projection of a mart row that is eligible for indexing.
///
/// Produced by a [`CandidateSource`](crate::services::CandidateSource); the
/// pipeline never mutates it and only ever enriches a copy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateRecord {
    pub property_id: String,
    pub source: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub location: Option<String>,
    pub property_type: Option<String>,
    pub listing_type: Option<String>,
    pub price_egp: Option<f64>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub area_sqm: Option<f64>,
    pub floor_number: Option<i32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl CandidateRecord {
    /// Builds the `<source>_<16 hex>` identifier used by the scrapers.
    pub fn generate_id(source: &str, url: &str) -> String {
        use sha2::{Digest, Sha256};
        let hash = Sha256::digest(url.as_bytes());
        format!("{}_{}", source.trim().to_lowercase(), &hex::encode(hash)[..16])
    }
}

/// A candidate plus its searchable text and embedding. Lives for one run.
#[derive(Debug, Clone)]
pub struct EnrichedRecord {
    pub candidate: CandidateRecord,
    pub searchable_text: String,
    pub embedding: Vec<f32>,
}

/// The only shape ever written to the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedVectorRecord {
    pub property_id: String,
    pub source: String,
    pub url: String,
    pub location: String,
    pub embedding: Vec<f32>,
    pub text: String,
    pub title: String,
    pub property_type: String,
    pub listing_type: String,
    pub price_egp: f64,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub area_sqm: f64,
    pub floor_number: i32,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl ValidatedVectorRecord {
    /// Deterministic point id for stores that only accept UUID keys.
    pub fn point_id(property_id: &str) -> String {
        use uuid::Uuid;
        Uuid::new_v5(&Uuid::NAMESPACE_OID, property_id.as_bytes()).to_string()
    }
}
