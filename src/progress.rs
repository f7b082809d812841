//! Progress-callback trait for pipeline events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::AnalysisConfigBuilder::progress_callback`] to receive
//! real-time events as the pipeline advances through its stages and
//! processes each document image.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers
//! can forward events to a channel, a WebSocket, a database row, or a
//! terminal progress bar without the library knowing anything about how the
//! host application communicates. The trait is `Send + Sync` because
//! extraction events fire concurrently from the fan-out workers.

use crate::state::PipelineStatus;

/// Called by the pipeline as it advances.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// `on_document_complete` and `on_document_error` may be called concurrently
/// from different tasks during extraction fan-out. Implementations must
/// protect shared mutable state accordingly.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called when the pipeline enters a new stage.
    fn on_stage_change(&self, status: PipelineStatus) {
        let _ = status;
    }

    /// Called once before extraction begins, with the number of page images
    /// that will be processed.
    fn on_extraction_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called when one document image has been extracted.
    ///
    /// `quality_tier` is the stable label of the quality tier
    /// (`EXCELLENT`, `BON`, `MOYEN`, `FAIBLE`).
    fn on_document_complete(&self, name: &str, quality_tier: &str) {
        let _ = (name, quality_tier);
    }

    /// Called when extraction failed for one document image.
    fn on_document_error(&self, name: &str, error: &str) {
        let _ = (name, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}
