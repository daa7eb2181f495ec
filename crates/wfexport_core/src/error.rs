use std::path::PathBuf;

use thiserror::Error;

/// Failure kinds surfaced by an export run.
///
/// Configuration and row-source errors are fatal and abort before any content
/// file is written. The remaining kinds are collected per output and reported
/// once every dispatched task has settled.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("configuration missing at {}: {detail}", .path.display())]
    ConfigurationMissing { path: PathBuf, detail: String },

    #[error("row source unavailable at {}: {detail}", .path.display())]
    RowSourceUnavailable { path: PathBuf, detail: String },

    #[error("front matter opened but never closed (scanned {line_count} lines)")]
    MalformedFrontMatter { line_count: usize },

    #[error("failed to write {}: {detail}", .path.display())]
    WriteFailure { path: PathBuf, detail: String },

    #[error("failed to copy assets from {} to {}: {detail}", .from.display(), .to.display())]
    AssetCopyFailure {
        from: PathBuf,
        to: PathBuf,
        detail: String,
    },
}

impl ExportError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigurationMissing { .. } => "configuration_missing",
            Self::RowSourceUnavailable { .. } => "row_source_unavailable",
            Self::MalformedFrontMatter { .. } => "malformed_front_matter",
            Self::WriteFailure { .. } => "write_failure",
            Self::AssetCopyFailure { .. } => "asset_copy_failure",
        }
    }
}
