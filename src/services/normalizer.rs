//! Searchable-text construction for Arabic/English listing fields.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::CandidateRecord;

/// Minimum characters for a searchable text to be worth embedding.
pub const MIN_SEARCHABLE_CHARS: usize = 10;

static BULLETS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[▪•●◼◾▫◽]").unwrap());
static LINE_BREAKS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\n\r\t]+").unwrap());
// Tashkeel (fathatan..sukun) and tatweel carry no lexical meaning for search.
static DIACRITICS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\u{064B}-\u{0652}\u{0640}]").unwrap());
static ALEF_VARIANTS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[إأآا]").unwrap());
static YEH_VARIANTS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[يى]").unwrap());
static HAMZA_SEATS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ؤئ]").unwrap());
static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[،/!؟💰:()+.,\-]").unwrap());
static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s\u{0600}-\u{06FF}%]").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Deterministic cleaner that turns listing fields into one canonical string.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextNormalizer;

impl TextNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Clean a single free-text field.
    pub fn clean(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let text = BULLETS.replace_all(text, " ");
        let text = LINE_BREAKS.replace_all(&text, " ");
        let text = DIACRITICS.replace_all(&text, "");
        let text = ALEF_VARIANTS.replace_all(&text, "ا");
        let text = YEH_VARIANTS.replace_all(&text, "ي");
        let text = HAMZA_SEATS.replace_all(&text, "ء");
        let text = PUNCTUATION.replace_all(&text, " ");
        let text = DISALLOWED.replace_all(&text, "");
        let text = WHITESPACE.replace_all(&text, " ");

        text.trim().to_string()
    }

    /// Build the searchable text for a candidate.
    ///
    /// Fields are joined in a fixed order: title, address, description,
    /// location, property type. Returns `None` when the result is shorter than
    /// [`MIN_SEARCHABLE_CHARS`]; that marks the record ineligible, not failed.
    pub fn searchable_text(&self, record: &CandidateRecord) -> Option<String> {
        let fields = [
            record.title.as_deref(),
            record.address.as_deref(),
            record.description.as_deref(),
            record.location.as_deref(),
            record.property_type.as_deref(),
        ];

        let parts: Vec<String> = fields
            .into_iter()
            .flatten()
            .map(|field| self.clean(field))
            .filter(|cleaned| !cleaned.is_empty())
            .collect();

        let text = parts.join(" ");
        if text.chars().count() < MIN_SEARCHABLE_CHARS {
            return None;
        }
        Some(text)
    }
}
