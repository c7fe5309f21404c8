//! Strict schema check applied to every record before it reaches the store.
//!
//! Validation is pure: no I/O, no shared state, so a batch can be checked in
//! any order or in parallel. Each rule names the field it guards, and the first
//! violated rule becomes the record's failure reason.

use regex::Regex;
use std::ops::RangeInclusive;
use std::sync::LazyLock;

use crate::error::ValidationError;
use crate::models::{EnrichedRecord, RegionBounds, ValidatedVectorRecord};

static PROPERTY_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2,11}_[a-f0-9]{16}$").unwrap());

/// Bounds applied by [`RecordValidator`].
#[derive(Debug, Clone)]
pub struct ValidationRules {
    pub dimension: usize,
    pub source_len: RangeInclusive<usize>,
    pub url_len: RangeInclusive<usize>,
    pub location_len: RangeInclusive<usize>,
    pub text_len: RangeInclusive<usize>,
    pub title_len: RangeInclusive<usize>,
    pub property_type_len: RangeInclusive<usize>,
    pub listing_type_max: usize,
    /// Exclusive on both ends.
    pub price_egp: (f64, f64),
    pub bedrooms: RangeInclusive<i32>,
    pub bathrooms: RangeInclusive<i32>,
    pub area_sqm: RangeInclusive<f64>,
    pub floor_number: RangeInclusive<i32>,
    pub region: RegionBounds,
}

impl ValidationRules {
    pub fn new(dimension: usize, region: RegionBounds) -> Self {
        Self {
            dimension,
            source_len: 1..=200,
            url_len: 1..=500,
            location_len: 2..=200,
            text_len: 10..=12_000,
            title_len: 3..=500,
            property_type_len: 1..=100,
            listing_type_max: 50,
            price_egp: (1_000.0, 1_000_000_000.0),
            bedrooms: 0..=25,
            bathrooms: 0..=15,
            area_sqm: 10.0..=10_000.0,
            floor_number: -2..=100,
            region,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordValidator {
    rules: ValidationRules,
}

impl RecordValidator {
    pub fn new(rules: ValidationRules) -> Self {
        Self { rules }
    }

    pub fn validate(
        &self,
        record: &EnrichedRecord,
    ) -> Result<ValidatedVectorRecord, ValidationError> {
        let r = &self.rules;
        let c = &record.candidate;

        let property_id = c.property_id.trim();
        if property_id.is_empty() {
            return Err(ValidationError::new("property_id", "is required"));
        }
        if !PROPERTY_ID.is_match(property_id) {
            return Err(ValidationError::new(
                "property_id",
                format!("'{}' does not match <source>_<16 hex chars>", property_id),
            ));
        }

        let source = required_text("source", c.source.as_deref(), &r.source_len)?;
        let url = required_text("url", c.url.as_deref(), &r.url_len)?;
        let location = required_text("location", c.location.as_deref(), &r.location_len)?;
        let text = required_text("text", Some(&record.searchable_text), &r.text_len)?;
        let title = required_text("title", c.title.as_deref(), &r.title_len)?;
        let property_type =
            required_text("property_type", c.property_type.as_deref(), &r.property_type_len)?;
        let listing_type = required_text(
            "listing_type",
            c.listing_type.as_deref(),
            &(0..=r.listing_type_max),
        )?;

        let price_egp = required("price_egp", c.price_egp)?;
        let (price_min, price_max) = r.price_egp;
        if !(price_egp > price_min && price_egp < price_max) {
            return Err(ValidationError::new(
                "price_egp",
                format!("{} is outside ({}, {})", price_egp, price_min, price_max),
            ));
        }

        let bedrooms = in_range("bedrooms", required("bedrooms", c.bedrooms)?, &r.bedrooms)?;
        let bathrooms = in_range("bathrooms", required("bathrooms", c.bathrooms)?, &r.bathrooms)?;
        let area_sqm = required("area_sqm", c.area_sqm)?;
        if !r.area_sqm.contains(&area_sqm) {
            return Err(ValidationError::new(
                "area_sqm",
                format!(
                    "{} is outside [{}, {}]",
                    area_sqm,
                    r.area_sqm.start(),
                    r.area_sqm.end()
                ),
            ));
        }
        let floor_number = in_range("floor_number", c.floor_number.unwrap_or(0), &r.floor_number)?;

        let latitude = c
            .latitude
            .map(|lat| {
                in_range(
                    "latitude",
                    lat,
                    &(r.region.min_latitude..=r.region.max_latitude),
                )
            })
            .transpose()?;
        let longitude = c
            .longitude
            .map(|lon| {
                in_range(
                    "longitude",
                    lon,
                    &(r.region.min_longitude..=r.region.max_longitude),
                )
            })
            .transpose()?;

        check_dimension(&record.embedding, r.dimension)?;
        let embedding = check_magnitude(&record.embedding)?;

        Ok(ValidatedVectorRecord {
            property_id: property_id.to_string(),
            source,
            url,
            location,
            embedding,
            text,
            title,
            property_type,
            listing_type,
            price_egp,
            bedrooms,
            bathrooms,
            area_sqm,
            floor_number,
            latitude,
            longitude,
        })
    }
}

fn required<T>(field: &'static str, value: Option<T>) -> Result<T, ValidationError> {
    value.ok_or_else(|| ValidationError::new(field, "is required"))
}

fn required_text(
    field: &'static str,
    value: Option<&str>,
    len: &RangeInclusive<usize>,
) -> Result<String, ValidationError> {
    let value = required(field, value)?.trim();
    let count = value.chars().count();
    if !len.contains(&count) {
        return Err(ValidationError::new(
            field,
            format!(
                "length {} is outside [{}, {}]",
                count,
                len.start(),
                len.end()
            ),
        ));
    }
    Ok(value.to_string())
}

fn in_range<T>(
    field: &'static str,
    value: T,
    range: &RangeInclusive<T>,
) -> Result<T, ValidationError>
where
    T: PartialOrd + std::fmt::Display,
{
    if !range.contains(&value) {
        return Err(ValidationError::new(
            field,
            format!("{} is outside [{}, {}]", value, range.start(), range.end()),
        ));
    }
    Ok(value)
}

/// Length check only. Magnitude is a separate rule.
fn check_dimension(embedding: &[f32], dimension: usize) -> Result<(), ValidationError> {
    if embedding.len() != dimension {
        return Err(ValidationError::new(
            "embedding",
            format!(
                "expected {} dimensions, got {}",
                dimension,
                embedding.len()
            ),
        ));
    }
    Ok(())
}

/// Rejects non-finite and zero vectors; returns the unit-normalised copy.
fn check_magnitude(embedding: &[f32]) -> Result<Vec<f32>, ValidationError> {
    if embedding.iter().any(|x| !x.is_finite()) {
        return Err(ValidationError::new(
            "embedding",
            "contains non-finite values",
        ));
    }
    let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return Err(ValidationError::new("embedding", "cannot be a zero vector"));
    }
    Ok(embedding.iter().map(|x| x / norm).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CandidateRecord;

    const DIM: usize = 8;

    fn valid_record() -> EnrichedRecord {
        EnrichedRecord {
            candidate: CandidateRecord {
                property_id: "aqarmap_48da83f859986cdb".to_string(),
                source: Some("aqarmap".to_string()),
                url: Some("https://aqarmap.com.eg/en/listing/1".to_string()),
                title: Some("Apartment for sale in Maadi".to_string()),
                description: Some("Fully finished apartment".to_string()),
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
            },
            searchable_text: "Apartment for sale in Maadi Road 9".to_string(),
            embedding: vec![0.5; DIM],
        }
    }

    fn validator() -> RecordValidator {
        RecordValidator::new(ValidationRules::new(DIM, RegionBounds::default()))
    }

    fn field_of(result: Result<ValidatedVectorRecord, ValidationError>) -> &'static str {
        result.expect_err("expected validation failure").field
    }

    #[test]
    fn test_valid_record_passes() {
        let validated = validator().validate(&valid_record()).unwrap();
        assert_eq!(validated.property_id, "aqarmap_48da83f859986cdb");
        assert_eq!(validated.floor_number, 4);
        let norm: f32 = validated.embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_area_boundary() {
        let mut record = valid_record();
        record.candidate.area_sqm = Some(9.0);
        assert_eq!(field_of(validator().validate(&record)), "area_sqm");

        record.candidate.area_sqm = Some(10.0);
        assert!(validator().validate(&record).is_ok());

        record.candidate.area_sqm = Some(10_000.0);
        assert!(validator().validate(&record).is_ok());

        record.candidate.area_sqm = Some(10_000.5);
        assert_eq!(field_of(validator().validate(&record)), "area_sqm");
    }

    #[test]
    fn test_price_bounds_are_exclusive() {
        let mut record = valid_record();
        record.candidate.price_egp = Some(1_000.0);
        assert_eq!(field_of(validator().validate(&record)), "price_egp");

        record.candidate.price_egp = Some(1_000.01);
        assert!(validator().validate(&record).is_ok());

        record.candidate.price_egp = None;
        assert_eq!(field_of(validator().validate(&record)), "price_egp");
    }

    #[test]
    fn test_zero_vector_rejected_independently_of_dimension() {
        let mut record = valid_record();
        record.embedding = vec![0.0; DIM];
        let err = validator().validate(&record).unwrap_err();
        assert_eq!(err.field, "embedding");
        assert!(err.constraint.contains("zero vector"));

        record.embedding = vec![0.5; DIM - 1];
        let err = validator().validate(&record).unwrap_err();
        assert_eq!(err.field, "embedding");
        assert!(err.constraint.contains("dimensions"));
    }

    #[test]
    fn test_non_finite_embedding_rejected() {
        let mut record = valid_record();
        record.embedding[3] = f32::NAN;
        assert_eq!(field_of(validator().validate(&record)), "embedding");
    }

    #[test]
    fn test_property_id_format() {
        let mut record = valid_record();
        for bad in [
            "aqarmap48da83f859986cdb",
            "aqarmap_48DA83F859986CDB",
            "aqarmap_48da83f85998",
            "a_48da83f859986cdb",
            "  ",
        ] {
            record.candidate.property_id = bad.to_string();
            assert_eq!(field_of(validator().validate(&record)), "property_id", "{}", bad);
        }

        record.candidate.property_id = "  bayut_0123456789abcdef ".to_string();
        assert_eq!(
            validator().validate(&record).unwrap().property_id,
            "bayut_0123456789abcdef"
        );
    }

    #[test]
    fn test_strings_are_trimmed_before_length_checks() {
        let mut record = valid_record();
        record.candidate.title = Some("  ab   ".to_string());
        assert_eq!(field_of(validator().validate(&record)), "title");

        record.candidate.title = Some("  abc   ".to_string());
        assert_eq!(validator().validate(&record).unwrap().title, "abc");
    }

    #[test]
    fn test_short_text_rejected() {
        let mut record = valid_record();
        record.searchable_text = "too short".to_string();
        assert_eq!(field_of(validator().validate(&record)), "text");
    }

    #[test]
    fn test_counts_and_floor() {
        let mut record = valid_record();
        record.candidate.bedrooms = Some(26);
        assert_eq!(field_of(validator().validate(&record)), "bedrooms");

        let mut record = valid_record();
        record.candidate.bathrooms = Some(-1);
        assert_eq!(field_of(validator().validate(&record)), "bathrooms");

        let mut record = valid_record();
        record.candidate.floor_number = None;
        assert_eq!(validator().validate(&record).unwrap().floor_number, 0);

        record.candidate.floor_number = Some(-3);
        assert_eq!(field_of(validator().validate(&record)), "floor_number");
    }

    #[test]
    fn test_coordinates_optional_but_bounded() {
        let mut record = valid_record();
        record.candidate.latitude = None;
        record.candidate.longitude = None;
        assert!(validator().validate(&record).is_ok());

        record.candidate.latitude = Some(40.7);
        assert_eq!(field_of(validator().validate(&record)), "latitude");
    }

    #[test]
    fn test_listing_type_may_be_empty_but_not_missing() {
        let mut record = valid_record();
        record.candidate.listing_type = Some(String::new());
        assert!(validator().validate(&record).is_ok());

        record.candidate.listing_type = None;
        assert_eq!(field_of(validator().validate(&record)), "listing_type");
    }

    #[test]
    fn test_error_reason_names_field() {
        let mut record = valid_record();
        record.candidate.location = Some("C".to_string());
        let err = validator().validate(&record).unwrap_err();
        assert_eq!(err.to_string(), "location: length 1 is outside [2, 200]");
    }
}
