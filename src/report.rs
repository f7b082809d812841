//! Case report: the plain structured output handed to external renderers.
//!
//! The pipeline's deliverable is data, not presentation: the concordance
//! result, the full source-path → record mapping, per-document extraction
//! quality, aggregate counters and the error list. Everything here derives
//! `Serialize`, so storage and rendering collaborators (JSON archive,
//! dashboard, PDF recap) consume it without the core knowing about them.
//!
//! Two small conveniences are built in because every caller wants them: a
//! sectioned plain-text rendering, and an atomic save of the text + JSON
//! pair into the case folder (write to a temp name, then rename, so a
//! crash never leaves a half-written report).

use crate::concordance::ConcordanceResult;
use crate::error::AnalysisError;
use crate::pipeline::extract::ExtractionMode;
use crate::pipeline::quality::QualityTier;
use crate::record::DocumentRecord;
use crate::state::{PipelineCounters, PipelineState, RunOutcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

/// Extraction summary for one document image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub document_type: String,
    pub quality_tier: String,
    pub quality_score: u8,
    pub mode: ExtractionMode,
}

/// Aggregate extraction statistics over the bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionSummary {
    pub total_documents: usize,
    /// Documents whose quality tier reached MOYEN or better.
    pub documents_ok: usize,
    pub documents_excellent: usize,
    pub documents_recovered: usize,
    /// Per-image summary, keyed by source path.
    pub per_document: BTreeMap<String, DocumentSummary>,
}

/// The full report for one analysed case folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseReport {
    /// Case reference: the folder basename.
    pub reference: String,
    /// RFC 3339 generation timestamp.
    pub generated_at: String,
    pub outcome: RunOutcome,
    pub counters: PipelineCounters,
    pub extraction: ExtractionSummary,
    pub concordance: ConcordanceResult,
    /// Source path → extracted record.
    pub records: BTreeMap<String, DocumentRecord>,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl CaseReport {
    /// Build the report from a finished (or partially finished) pipeline
    /// state.
    pub fn from_state(state: &PipelineState) -> Self {
        let mut extraction = ExtractionSummary {
            total_documents: state.extractions.len(),
            ..Default::default()
        };
        let mut records = BTreeMap::new();

        for (path, outcome) in &state.extractions {
            let key = path.display().to_string();
            let tier = outcome.quality.tier;
            if matches!(
                tier,
                QualityTier::Excellent | QualityTier::Good | QualityTier::Average
            ) {
                extraction.documents_ok += 1;
            }
            if tier == QualityTier::Excellent {
                extraction.documents_excellent += 1;
            }
            if outcome.mode == ExtractionMode::Recovery {
                extraction.documents_recovered += 1;
            }
            extraction.per_document.insert(
                key.clone(),
                DocumentSummary {
                    document_type: outcome.record.document_type.label().to_string(),
                    quality_tier: tier.label().to_string(),
                    quality_score: outcome.quality.score,
                    mode: outcome.mode,
                },
            );
            records.insert(key, outcome.record.clone());
        }

        CaseReport {
            reference: state
                .folder
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| state.folder.display().to_string()),
            generated_at: chrono::Utc::now().to_rfc3339(),
            outcome: state.outcome(),
            counters: state.counters,
            extraction,
            concordance: state.concordance.clone().unwrap_or_default(),
            records,
            errors: state.errors.clone(),
            duration_ms: state.duration_ms,
        }
    }

    /// Render the sectioned plain-text report.
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "DOCUMENT ANALYSIS REPORT");
        let _ = writeln!(out, "========================");
        let _ = writeln!(out);
        let _ = writeln!(out, "Case reference: {}", self.reference);
        let _ = writeln!(out, "Generated at:   {}", self.generated_at);
        let _ = writeln!(out);

        // ── Executive summary ────────────────────────────────────────────
        let _ = writeln!(out, "EXECUTIVE SUMMARY");
        let _ = writeln!(out, "-----------------");
        let _ = writeln!(out, "Documents analysed: {}", self.extraction.total_documents);
        let _ = writeln!(
            out,
            "Concordant:         {}",
            if self.concordance.is_concordant { "yes" } else { "no" }
        );
        if !self.concordance.is_concordant {
            let _ = writeln!(
                out,
                "Problems detected:  {}",
                self.concordance.discrepancies.len()
            );
        }
        let _ = writeln!(
            out,
            "Confidence score:   {:.1}/100",
            self.concordance.confidence_score
        );
        let _ = writeln!(out, "PDFs found:         {}", self.counters.pdfs_found);
        let _ = writeln!(out, "PDFs rejected:      {}", self.counters.pdfs_rejected);
        let _ = writeln!(out, "Pages rendered:     {}", self.counters.images_rendered);
        let _ = writeln!(out);

        let cov = &self.concordance.coverage;
        let _ = writeln!(out, "Field coverage:");
        let _ = writeln!(out, "- documents with a name:        {}", cov.with_full_name);
        let _ = writeln!(out, "- documents with a first name:  {}", cov.with_first_name);
        let _ = writeln!(out, "- documents with an address:    {}", cov.with_address);
        let _ = writeln!(out, "- documents with a national ID: {}", cov.with_national_id);
        let _ = writeln!(out);

        // ── Per-document details ─────────────────────────────────────────
        let _ = writeln!(out, "DOCUMENT DETAILS");
        let _ = writeln!(out, "----------------");
        for (source, record) in &self.records {
            let name = Path::new(source)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| source.clone());
            let _ = writeln!(out);
            let _ = writeln!(out, "Document: {name}");
            let _ = writeln!(out, "   Type: {}", record.document_type.label());
            if let Some(summary) = self.extraction.per_document.get(source) {
                let _ = writeln!(
                    out,
                    "   Quality: {} ({}/100)",
                    summary.quality_tier, summary.quality_score
                );
                if summary.mode == ExtractionMode::Recovery {
                    let _ = writeln!(out, "   Extracted in recovery mode");
                }
            }
            if let Some(v) = &record.full_name {
                let _ = writeln!(out, "   Name: {v}");
            }
            if let Some(v) = &record.first_name {
                let _ = writeln!(out, "   First name: {v}");
            }
            if let Some(v) = &record.birth_date {
                let _ = writeln!(out, "   Birth date: {v}");
            }
            if let Some(v) = &record.address {
                let _ = writeln!(out, "   Address: {v}");
            }
            if let Some(v) = &record.document_number {
                let _ = writeln!(out, "   Document number: {v}");
            }
            if let Some(v) = &record.issue_date {
                let _ = writeln!(out, "   Issue date: {v}");
            }
            if let Some(v) = &record.expiry_date {
                let _ = writeln!(out, "   Expiry date: {v}");
            }
            for (key, value) in &record.extra_fields {
                let _ = writeln!(out, "   {key}: {value}");
            }
        }
        let _ = writeln!(out);

        // ── Concordance analysis ─────────────────────────────────────────
        let _ = writeln!(out, "CONCORDANCE ANALYSIS");
        let _ = writeln!(out, "--------------------");
        if self.concordance.is_concordant {
            let _ = writeln!(out, "All cross-document checks passed.");
        } else {
            for problem in &self.concordance.discrepancies {
                let _ = writeln!(out, "- {problem}");
            }
        }
        let _ = writeln!(out);

        if !self.concordance.recommendations.is_empty() {
            let _ = writeln!(out, "RECOMMENDATIONS");
            let _ = writeln!(out, "---------------");
            for rec in &self.concordance.recommendations {
                let _ = writeln!(out, "- {rec}");
            }
            let _ = writeln!(out);
        }

        if !self.errors.is_empty() {
            let _ = writeln!(out, "ERRORS");
            let _ = writeln!(out, "------");
            for err in &self.errors {
                let _ = writeln!(out, "- {err}");
            }
            let _ = writeln!(out);
        }

        out
    }

    /// Write `analysis_report.txt` and `analysis_report.json` into `dir`.
    ///
    /// Atomic per file: content goes to a `.tmp` sibling first, then a
    /// rename replaces the previous report.
    pub async fn save(&self, dir: &Path) -> Result<(), AnalysisError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AnalysisError::Internal(format!("report serialisation: {e}")))?;

        write_atomic(&dir.join("analysis_report.txt"), self.render_text().as_bytes()).await?;
        write_atomic(&dir.join("analysis_report.json"), json.as_bytes()).await?;

        info!("report saved to {}", dir.display());
        Ok(())
    }
}

async fn write_atomic(path: &Path, content: &[u8]) -> Result<(), AnalysisError> {
    let tmp_path = path.with_extension("tmp");
    let fail = |source: std::io::Error| AnalysisError::ReportWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    tokio::fs::write(&tmp_path, content).await.map_err(&fail)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(&fail)?;
    Ok(())
}
