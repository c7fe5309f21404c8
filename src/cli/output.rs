use std::fmt::Write as FmtWrite;

use crate::models::{FailureKind, OutputFormat, RunSummary};

pub trait Formatter {
    fn format_summary(&self, summary: &RunSummary) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ComponentStatus {
    pub name: String,
    pub target: String,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StatusInfo {
    pub embedding: ComponentStatus,
    pub vector_store: ComponentStatus,
    pub analytics: ComponentStatus,
    pub collection: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexed: Option<u64>,
}

impl StatusInfo {
    pub fn all_connected(&self) -> bool {
        self.embedding.connected && self.vector_store.connected && self.analytics.connected
    }
}

/// Number of failure reasons listed in text output.
const MAX_LISTED_FAILURES: usize = 10;

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_summary(&self, summary: &RunSummary) -> String {
        let mut output = String::new();
        writeln!(output, "Indexing Run: {}", summary.outcome).unwrap();
        writeln!(output, "------------------------------").unwrap();
        writeln!(output, "Candidates:  {}", summary.total).unwrap();
        writeln!(output, "Inserted:    {}", summary.inserted).unwrap();
        writeln!(
            output,
            "Failed:      {} ({} validation, {} upsert)",
            summary.failed,
            summary.validation_failures(),
            summary.upsert_failures()
        )
        .unwrap();
        writeln!(output, "Skipped:     {}", summary.skipped).unwrap();
        if let Some(rate) = summary.success_rate() {
            writeln!(output, "Success:     {:.1}%", rate).unwrap();
        }
        if let Some(total) = summary.store_total {
            writeln!(output, "Store total: {}", total).unwrap();
        }
        writeln!(output, "Duration:    {}ms", summary.duration_ms).unwrap();
        if summary.interrupted {
            writeln!(output, "Interrupted: yes (re-run to resume)").unwrap();
        }

        if !summary.failed_records.is_empty() {
            writeln!(output).unwrap();
            writeln!(output, "Failures:").unwrap();
            for record in summary.failed_records.iter().take(MAX_LISTED_FAILURES) {
                let kind = match record.kind {
                    FailureKind::Validation => "validation",
                    FailureKind::Upsert => "upsert",
                };
                writeln!(output, "  [{}] {}: {}", kind, record.id, record.reason).unwrap();
            }
            let hidden = summary.failed_records.len().saturating_sub(MAX_LISTED_FAILURES);
            if hidden > 0 {
                writeln!(output, "  ... and {} more", hidden).unwrap();
            }
        }

        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();

        for component in [&status.embedding, &status.vector_store, &status.analytics] {
            let state = if component.connected {
                "[CONNECTED]"
            } else {
                "[DISCONNECTED]"
            };
            writeln!(output, "{:<14} {} {}", component.name, state, component.target).unwrap();
            if let Some(ref detail) = component.detail {
                writeln!(output, "  {}", detail).unwrap();
            }
        }
        writeln!(output).unwrap();
        writeln!(output, "Collection:    {}", status.collection).unwrap();
        if let Some(indexed) = status.indexed {
            writeln!(output, "Indexed:       {}", indexed).unwrap();
        }

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render<T: serde::Serialize>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
    }
}

impl Formatter for JsonFormatter {
    fn format_summary(&self, summary: &RunSummary) -> String {
        self.render(summary)
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        self.render(status)
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FailedRecord, RunOutcome};

    fn summary_with_failures(n: usize) -> RunSummary {
        let failed_records: Vec<FailedRecord> = (0..n)
            .map(|i| FailedRecord {
                id: format!("aqarmap_{:016x}", i),
                reason: "area_sqm: 9 is outside [10, 10000]".to_string(),
                kind: FailureKind::Validation,
            })
            .collect();
        RunSummary {
            total: 20,
            inserted: 20 - n as u64,
            failed: n as u64,
            failed_records,
            outcome: RunOutcome::PartialSuccess,
            ..Default::default()
        }
    }

    #[test]
    fn test_text_summary_lists_capped_failures() {
        let output = TextFormatter.format_summary(&summary_with_failures(12));
        assert!(output.contains("Indexing Run: PARTIAL_SUCCESS"));
        assert!(output.contains("Failed:      12 (12 validation, 0 upsert)"));
        assert!(output.contains("... and 2 more"));
        assert!(output.contains("Success:     40.0%"));
    }

    #[test]
    fn test_text_summary_marks_interruption() {
        let summary = RunSummary {
            interrupted: true,
            ..Default::default()
        };
        let output = TextFormatter.format_summary(&summary);
        assert!(output.contains("Interrupted: yes"));
        assert!(!output.contains("Success:"));
    }

    #[test]
    fn test_json_summary() {
        let output = JsonFormatter::new(false).format_summary(&summary_with_failures(1));
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["outcome"], "PARTIAL_SUCCESS");
        assert_eq!(value["failed_records"][0]["kind"], "validation");
    }

    #[test]
    fn test_status_formatting() {
        let component = |name: &str, connected| ComponentStatus {
            name: name.to_string(),
            target: "http://localhost".to_string(),
            connected,
            detail: None,
        };
        let status = StatusInfo {
            embedding: component("Embedding", true),
            vector_store: component("Vector Store", false),
            analytics: component("Analytics", true),
            collection: "real_estate_vectors_nomic_embed_text_768".to_string(),
            indexed: None,
        };
        assert!(!status.all_connected());
        let output = TextFormatter.format_status(&status);
        assert!(output.contains("[DISCONNECTED]"));
        assert!(!output.contains("Indexed:"));
    }
}
