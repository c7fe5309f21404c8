//! JSON side files written at the end of a run.

use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};

use crate::models::{FailedRecord, RunSummary};

pub const FAILED_RECORDS_FILE: &str = "validation_failures.json";
pub const RUN_SUMMARY_FILE: &str = "vector_run_summary.json";

/// Write the failed records of a run to `<dir>/validation_failures.json`.
pub fn write_failed_records(dir: &Path, records: &[FailedRecord]) -> io::Result<PathBuf> {
    write_pretty(dir, FAILED_RECORDS_FILE, records)
}

/// Write the run summary to `<dir>/vector_run_summary.json`.
pub fn write_run_summary(dir: &Path, summary: &RunSummary) -> io::Result<PathBuf> {
    write_pretty(dir, RUN_SUMMARY_FILE, summary)
}

fn write_pretty<T: Serialize + ?Sized>(dir: &Path, name: &str, value: &T) -> io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(name);
    // serde_json leaves non-ASCII text unescaped, so Arabic reasons stay readable.
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    std::fs::write(&path, json)?;
    Ok(path)
}
