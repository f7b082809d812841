//! Pipeline state threaded through the analysis stages.
//!
//! The whole run is modelled as a value: each stage consumes the previous
//! [`PipelineState`] and returns a new one, updating its own slice of the
//! record and appending to the error list. No stage mutates shared state in
//! place, which makes re-runs idempotent and the stages independently
//! testable — a stage can be driven with a hand-built state in a unit test
//! without touching the filesystem stages before it.
//!
//! A fresh state is created per invocation and discarded once the report is
//! handed off; nothing accumulates across runs.

use crate::concordance::ConcordanceResult;
use crate::pipeline::extract::ExtractionOutcome;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Status tag advanced by each stage. Strictly sequential: no stage is
/// skipped, and every stage transitions forward even when its input is
/// empty. [`Error`](PipelineStatus::Error) is reached only for a malformed
/// initial input (nonexistent case folder).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PipelineStatus {
    #[default]
    Initialized,
    Loading,
    Validating,
    Rasterizing,
    Extracting,
    ConcordanceCheck,
    Reporting,
    Done,
    Error,
}

impl PipelineStatus {
    /// Human-readable stage name for progress display and logs.
    pub fn label(&self) -> &'static str {
        match self {
            PipelineStatus::Initialized => "initialized",
            PipelineStatus::Loading => "loading documents",
            PipelineStatus::Validating => "validating PDFs",
            PipelineStatus::Rasterizing => "rasterizing pages",
            PipelineStatus::Extracting => "extracting fields",
            PipelineStatus::ConcordanceCheck => "checking concordance",
            PipelineStatus::Reporting => "building report",
            PipelineStatus::Done => "done",
            PipelineStatus::Error => "error",
        }
    }
}

/// Aggregate counters exposed for observability collaborators (dashboards).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineCounters {
    /// PDF files found in the case folder.
    pub pdfs_found: usize,
    /// PDFs rejected by validation (unreadable or empty).
    pub pdfs_rejected: usize,
    /// Page images produced by rasterisation.
    pub images_rendered: usize,
    /// Page images that went through field extraction.
    pub documents_analyzed: usize,
}

/// Coarse outcome of a run, for callers that need to tell the user whether
/// anything was processed at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    /// Nothing to process: the folder held no usable PDF.
    Empty,
    /// Processed, but with rejections, per-document errors, or discrepancies.
    WithWarnings,
    /// Processed cleanly: every document extracted, bundle concordant.
    Clean,
}

/// The orchestration record for one analysis run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineState {
    /// Root case folder under analysis.
    pub folder: PathBuf,
    /// PDF paths found by the loader (valid subset after validation).
    pub pdf_paths: Vec<PathBuf>,
    /// PDFs rejected by validation.
    pub rejected_pdfs: Vec<PathBuf>,
    /// Rendered page images, in production order.
    pub image_paths: Vec<PathBuf>,
    /// Per-image extraction outcome (record, quality, raw transcript), keyed
    /// by source image path.
    pub extractions: BTreeMap<PathBuf, ExtractionOutcome>,
    /// Concordance analysis result; `None` until that stage has run.
    pub concordance: Option<ConcordanceResult>,
    /// Final case report; `None` until the reporting stage has run.
    pub report: Option<crate::report::CaseReport>,
    /// Accumulated human-readable error strings; never empties a stage out.
    pub errors: Vec<String>,
    /// Current stage tag.
    pub status: PipelineStatus,
    /// Aggregate counters.
    pub counters: PipelineCounters,
    /// Wall-clock duration of the whole run, set by the orchestrator.
    pub duration_ms: u64,
}

impl PipelineState {
    /// Fresh state rooted at the given case folder.
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        PipelineState {
            folder: folder.into(),
            ..Default::default()
        }
    }

    /// Push a non-fatal error, stringified.
    pub fn record_error(&mut self, err: impl ToString) {
        self.errors.push(err.to_string());
    }

    /// Snapshot the extracted records as a case bundle for concordance.
    pub fn bundle(&self) -> BTreeMap<PathBuf, crate::record::DocumentRecord> {
        self.extractions
            .iter()
            .map(|(path, outcome)| (path.clone(), outcome.record.clone()))
            .collect()
    }

    /// Classify the finished run for user-visible messaging.
    pub fn outcome(&self) -> RunOutcome {
        if self.counters.documents_analyzed == 0 {
            return RunOutcome::Empty;
        }
        let discordant = self
            .concordance
            .as_ref()
            .map(|c| !c.is_concordant)
            .unwrap_or(false);
        if self.counters.pdfs_rejected > 0 || !self.errors.is_empty() || discordant {
            RunOutcome::WithWarnings
        } else {
            RunOutcome::Clean
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_is_initialized() {
        let state = PipelineState::new("/cases/req-42");
        assert_eq!(state.status, PipelineStatus::Initialized);
        assert!(state.errors.is_empty());
        assert_eq!(state.counters, PipelineCounters::default());
    }

    #[test]
    fn outcome_empty_when_nothing_analyzed() {
        let state = PipelineState::new("/cases/req-42");
        assert_eq!(state.outcome(), RunOutcome::Empty);
    }

    #[test]
    fn outcome_with_warnings_on_rejections() {
        let mut state = PipelineState::new("/cases/req-42");
        state.counters.documents_analyzed = 2;
        state.counters.pdfs_rejected = 1;
        assert_eq!(state.outcome(), RunOutcome::WithWarnings);
    }

    #[test]
    fn outcome_clean_without_errors() {
        let mut state = PipelineState::new("/cases/req-42");
        state.counters.documents_analyzed = 2;
        assert_eq!(state.outcome(), RunOutcome::Clean);
    }
}
