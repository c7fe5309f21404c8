//! In-memory doubles for the pipeline's three collaborators.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{CandidateError, EmbeddingError, VectorStoreError};
use crate::models::{CandidateRecord, ValidatedVectorRecord};
use crate::services::{CandidateSource, EmbeddingBackend, ProviderHealth, VectorStore};

pub fn property_id(i: usize) -> String {
    format!("aqarmap_{:016x}", i)
}

/// A mart row that passes the completeness predicate and validation.
pub fn sample_candidate(i: usize) -> CandidateRecord {
    let id = property_id(i);
    CandidateRecord {
        url: Some(format!("https://aqarmap.com.eg/en/listing/{}", id)),
        property_id: id,
        source: Some("aqarmap".to_string()),
        title: Some(format!("Apartment {} for sale in Maadi", i)),
        description: Some("Fully finished apartment with a sea view".to_string()),
        address: Some("Road 9".to_string()),
        location: Some("Maadi, Cairo".to_string()),
        property_type: Some("apartment".to_string()),
        listing_type: Some("sale".to_string()),
        price_egp: Some(3_500_000.0),
        bedrooms: Some(3),
        bathrooms: Some(2),
        area_sqm: Some(150.0),
        floor_number: Some(4),
        latitude: Some(29.96),
        longitude: Some(31.25),
    }
}

pub fn validated_record(i: usize) -> ValidatedVectorRecord {
    validated_record_with_id(&property_id(i))
}

fn validated_record_with_id(id: &str) -> ValidatedVectorRecord {
    ValidatedVectorRecord {
        property_id: id.to_string(),
        source: "aqarmap".to_string(),
        url: format!("https://aqarmap.com.eg/en/listing/{}", id),
        location: "Maadi, Cairo".to_string(),
        embedding: vec![0.6, 0.8],
        text: "Apartment for sale in Maadi".to_string(),
        title: "Apartment for sale".to_string(),
        property_type: "apartment".to_string(),
        listing_type: "sale".to_string(),
        price_egp: 3_500_000.0,
        bedrooms: 3,
        bathrooms: 2,
        area_sqm: 150.0,
        floor_number: 0,
        latitude: None,
        longitude: None,
    }
}

/// Vector store keyed by property id, ordered lexicographically.
#[derive(Default)]
pub struct InMemoryVectorStore {
    points: Mutex<BTreeMap<String, ValidatedVectorRecord>>,
    page_calls: Mutex<Vec<(Option<String>, usize)>>,
    upsert_calls: AtomicUsize,
    fail_upsert_call: Option<usize>,
    fail_pages: bool,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        let store = Self::new();
        {
            let mut points = store.points.lock().unwrap();
            for id in ids {
                points.insert(id.to_string(), validated_record_with_id(id));
            }
        }
        store
    }

    /// Make the `n`-th upsert call (1-based) fail.
    pub fn fail_upsert_call(mut self, n: usize) -> Self {
        self.fail_upsert_call = Some(n);
        self
    }

    pub fn fail_pages(mut self) -> Self {
        self.fail_pages = true;
        self
    }

    pub fn len(&self) -> usize {
        self.points.lock().unwrap().len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.points.lock().unwrap().contains_key(id)
    }

    pub fn page_calls(&self) -> Vec<(Option<String>, usize)> {
        self.page_calls.lock().unwrap().clone()
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn health_check(&self) -> Result<(), VectorStoreError> {
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<(), VectorStoreError> {
        Ok(())
    }

    async fn fetch_id_page(
        &self,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<String>, VectorStoreError> {
        self.page_calls
            .lock()
            .unwrap()
            .push((after.map(String::from), limit));

        if self.fail_pages {
            return Err(VectorStoreError::QueryError("page rejected".to_string()));
        }

        let lower = match after {
            Some(id) => Bound::Excluded(id.to_string()),
            None => Bound::Unbounded,
        };
        let points = self.points.lock().unwrap();
        Ok(points
            .range((lower, Bound::Unbounded))
            .take(limit)
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn upsert_batch(
        &self,
        records: Vec<ValidatedVectorRecord>,
    ) -> Result<u64, VectorStoreError> {
        let call = self.upsert_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_upsert_call == Some(call) {
            return Err(VectorStoreError::UpsertError("simulated outage".to_string()));
        }

        let count = records.len() as u64;
        let mut points = self.points.lock().unwrap();
        for record in records {
            points.insert(record.property_id.clone(), record);
        }
        Ok(count)
    }

    async fn stats(&self) -> Result<u64, VectorStoreError> {
        Ok(self.len() as u64)
    }

    async fn close(&self) {}

    fn collection(&self) -> &str {
        "in_memory"
    }
}

/// Candidate source over a fixed list; honours exclusion and limit.
#[derive(Default)]
pub struct StaticCandidateSource {
    records: Vec<CandidateRecord>,
    fail: bool,
    last_exclude: Mutex<Option<HashSet<String>>>,
    closed: AtomicBool,
}

impl StaticCandidateSource {
    pub fn new(records: Vec<CandidateRecord>) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn last_exclude(&self) -> Option<HashSet<String>> {
        self.last_exclude.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CandidateSource for StaticCandidateSource {
    async fn health_check(&self) -> Result<(), CandidateError> {
        Ok(())
    }

    async fn fetch_candidates(
        &self,
        exclude: &HashSet<String>,
        limit: Option<usize>,
    ) -> Result<Vec<CandidateRecord>, CandidateError> {
        *self.last_exclude.lock().unwrap() = Some(exclude.clone());
        if self.fail {
            return Err(CandidateError::QueryError("mart unavailable".to_string()));
        }

        let mut records: Vec<CandidateRecord> = self
            .records
            .iter()
            .filter(|r| !exclude.contains(&r.property_id))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.property_id.cmp(&b.property_id));
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Deterministic embedding backend derived from a hash of the input.
pub struct FakeEmbeddingBackend {
    dimension: usize,
    fail: HashSet<String>,
    slow: HashSet<String>,
    unreachable: bool,
    seen: Mutex<Vec<String>>,
}

impl FakeEmbeddingBackend {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fail: HashSet::new(),
            slow: HashSet::new(),
            unreachable: false,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, text: &str) -> Self {
        self.fail.insert(text.to_string());
        self
    }

    pub fn slow_on(mut self, text: &str) -> Self {
        self.slow.insert(text.to_string());
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmbeddingBackend for FakeEmbeddingBackend {
    async fn health_check(&self) -> Result<ProviderHealth, EmbeddingError> {
        if self.unreachable {
            return Err(EmbeddingError::ConnectionError("connection refused".to_string()));
        }
        Ok(ProviderHealth {
            models: vec!["fake-embed:latest".to_string()],
        })
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.seen.lock().unwrap().push(text.to_string());
        if self.unreachable {
            return Err(EmbeddingError::ConnectionError("connection refused".to_string()));
        }
        if self.fail.contains(text) {
            return Err(EmbeddingError::ServerError("status 500: simulated".to_string()));
        }
        if self.slow.contains(text) {
            tokio::time::sleep(Duration::from_secs(10)).await;
        }

        let hash = Sha256::digest(text.as_bytes());
        Ok((0..self.dimension)
            .map(|i| f32::from(hash[i % hash.len()]) + 1.0)
            .collect())
    }

    fn model(&self) -> &str {
        "fake-embed"
    }
}
