//! Error types for the veridoc library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`AnalysisError`] — **Fatal**: the analysis cannot proceed at all
//!   (nonexistent case folder, invalid configuration, report write failure).
//!   Returned as `Err(AnalysisError)` from the top-level entry points.
//!
//! * [`DocError`] — **Non-fatal**: a single document failed (corrupt PDF,
//!   rasterisation glitch, capability call failure) but the rest of the
//!   bundle is fine. Stage functions record these as human-readable strings
//!   in [`crate::state::PipelineState::errors`] and keep going.
//!
//! The separation lets callers decide their own tolerance: inspect the error
//! list for a post-run report, or treat any warning as a reason to re-scan.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the veridoc library.
///
/// Document-level failures use [`DocError`] and are accumulated in
/// [`crate::state::PipelineState`] rather than propagated here.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Case folder was not found at the given path.
    #[error("Case folder not found: '{path}'\nCheck the path exists and is readable.")]
    FolderNotFound { path: PathBuf },

    /// The given path exists but is not a directory.
    #[error("Not a directory: '{path}'")]
    NotADirectory { path: PathBuf },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not create or write a report file.
    #[error("Failed to write report file '{path}': {source}")]
    ReportWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error scoped to a single document or rendered page image.
///
/// Converted to a string and appended to the pipeline error list; the run
/// continues with the remaining documents.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum DocError {
    /// The PDF could not be opened or has no pages.
    #[error("Rejected '{name}': {detail}")]
    Rejected { name: String, detail: String },

    /// Rasterisation failed for this PDF.
    #[error("Rasterisation failed for '{name}': {detail}")]
    RasterisationFailed { name: String, detail: String },

    /// Rasterisation exceeded the configured timeout.
    #[error("Rasterisation timed out after {secs}s for '{name}'")]
    RenderTimeout { name: String, secs: u64 },

    /// The page image could not be read or encoded for transmission.
    #[error("Image encoding failed for '{name}': {detail}")]
    EncodingFailed { name: String, detail: String },

    /// The vision capability call failed.
    #[error("Extraction failed for '{name}': {detail}")]
    ExtractionFailed { name: String, detail: String },

    /// The vision capability call exceeded the configured timeout.
    #[error("Extraction timed out after {secs}s for '{name}'")]
    ExtractionTimeout { name: String, secs: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_not_found_display() {
        let e = AnalysisError::FolderNotFound {
            path: PathBuf::from("/no/such/case"),
        };
        assert!(e.to_string().contains("/no/such/case"));
    }

    #[test]
    fn extraction_timeout_display() {
        let e = DocError::ExtractionTimeout {
            name: "cin_page_01.png".into(),
            secs: 60,
        };
        let msg = e.to_string();
        assert!(msg.contains("60s"), "got: {msg}");
        assert!(msg.contains("cin_page_01.png"));
    }

    #[test]
    fn rejected_display_includes_detail() {
        let e = DocError::Rejected {
            name: "broken.pdf".into(),
            detail: "zero pages".into(),
        };
        assert!(e.to_string().contains("zero pages"));
    }
}
