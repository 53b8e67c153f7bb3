//! Spreadsheet uploads and generated report files.

use serde::Serialize;
use std::path::PathBuf;

/// A binary file returned by one of the report endpoints.
#[derive(Debug, Clone)]
pub struct ReportFile {
    /// Suggested file name (from `Content-Disposition` or a fixed default)
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// A spreadsheet that passed the client-side upload checks.
#[derive(Debug, Clone, Serialize)]
pub struct UploadCandidate {
    pub path: PathBuf,
    pub filename: String,
    /// Size in bytes
    pub size: u64,
}

impl UploadCandidate {
    /// Size in KB with two decimals, as shown after selection.
    pub fn size_kb(&self) -> String {
        format!("{:.2} KB", self.size as f64 / 1024.0)
    }
}
