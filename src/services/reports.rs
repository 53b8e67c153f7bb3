// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Spreadsheet upload and report generation.

use crate::error::{ClientError, Result};
use crate::forms::validate_upload;
use crate::models::UploadCandidate;
use crate::services::ApiClient;
use std::path::{Path, PathBuf};

#[derive(Clone)]
pub struct ReportService {
    api: ApiClient,
}

impl ReportService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Pick a spreadsheet for upload, checking format and size.
    pub async fn select(&self, path: &Path) -> Result<UploadCandidate> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ClientError::Validation(format!("Not a file: {}", path.display())))?
            .to_string();

        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(ClientError::Validation(format!(
                "Not a file: {}",
                path.display()
            )));
        }

        validate_upload(&filename, metadata.len())?;

        Ok(UploadCandidate {
            path: path.to_path_buf(),
            filename,
            size: metadata.len(),
        })
    }

    /// Upload the spreadsheet and save the generated workbook in `output_dir`.
    pub async fn generate(
        &self,
        candidate: &UploadCandidate,
        output_dir: &Path,
    ) -> Result<PathBuf> {
        if !self.api.is_authenticated() {
            return Err(ClientError::NotAuthenticated);
        }

        let bytes = tokio::fs::read(&candidate.path).await?;
        tracing::info!(file = %candidate.filename, size = candidate.size, "Uploading spreadsheet for report generation");

        let report = self.api.generate_report(&candidate.filename, bytes).await?;

        tokio::fs::create_dir_all(output_dir).await?;
        let target = output_dir.join(&report.filename);
        tokio::fs::write(&target, &report.bytes).await?;

        tracing::info!(path = %target.display(), bytes = report.bytes.len(), "Report saved");
        Ok(target)
    }
}
